mod app;
mod catalog;
mod config;
mod constants;
mod display;
mod embed;
mod extract;
mod form;
mod gesture;
mod graphics;
mod input;
mod menu;
mod mpv;
mod overlay;
mod overlay_ui;
mod store;
mod theme;
mod thumbnail;
mod timers;
mod ui;
mod view;

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::{
    event::{self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture, Event, KeyEventKind},
    execute,
  },
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use catalog::{Catalog, NewVideo};
use config::Config;
use constants::constants;
use display::CliDisplayMode;
use embed::EmbedLoader;
use extract::{extract_video_id, watch_url};
use store::{FileStore, Store};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Thumbnail rendering: 'auto', 'direct' (half-block) or 'ascii'
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Directory holding the shelf and logs (overrides prefs.toml)
  #[arg(long)]
  data_dir: Option<PathBuf>,

  /// mpv executable used for playback
  #[arg(long)]
  mpv: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print every collection and video on the shelf
  List,
  /// Add a video without opening the interface
  Add {
    /// Video URL or 11-character id
    url: String,
    title: String,
    /// Collection to file it under; created if missing
    #[arg(short, long)]
    collection: Option<String>,
  },
  /// Print a shell completion script
  Completions { shell: Shell },
}

// --- Setup ---

/// Daily rolling file log under `<data>/logs`. The terminal belongs to the UI,
/// so nothing is written to stderr.
fn init_logging(data_dir: Option<&Path>) -> Option<WorkerGuard> {
  let log_dir = data_dir?.join("logs");
  if let Err(e) = std::fs::create_dir_all(&log_dir) {
    eprintln!("Logging disabled: {}: {}", log_dir.display(), e);
    return None;
  }
  let file_appender = tracing_appender::rolling::daily(&log_dir, format!("{}.log", constants().app_name));
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,anaty=debug"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(file_writer)
    .with_target(true)
    .with_ansi(false)
    .init();
  Some(guard)
}

fn open_store(data_dir: Option<&Path>) -> Store {
  match data_dir {
    Some(dir) => Store::new(Box::new(FileStore::new(dir))),
    None => {
      warn!("store: no data directory, shelf will not persist");
      Store::in_memory()
    }
  }
}

// --- Subcommands ---

fn print_shelf(catalog: &Catalog) {
  if catalog.videos().is_empty() && catalog.groupings().is_empty() {
    println!("Your shelf is empty.");
    return;
  }
  for grouping in catalog.groupings() {
    println!("{} ({})", grouping.name, catalog.member_count(&grouping.id));
    for video in catalog.videos_in(&grouping.id) {
      println!("  {}  {}", video.title, watch_url(&video.external_id));
    }
  }
  let ungrouped: Vec<_> = catalog.ungrouped().collect();
  if !ungrouped.is_empty() {
    println!("General ({})", ungrouped.len());
    for video in ungrouped {
      println!("  {}  {}", video.title, watch_url(&video.external_id));
    }
  }
}

fn add_from_cli(catalog: &mut Catalog, url: &str, title: &str, collection: Option<&str>) -> Result<()> {
  let Some(external_id) = extract_video_id(url) else {
    bail!("Not a recognised video URL or id: {}", url);
  };
  let title = title.trim();
  if title.is_empty() {
    bail!("Title must not be empty");
  }
  match collection.map(str::trim).filter(|c| !c.is_empty()) {
    None => {
      catalog.add_video(external_id, title.to_string(), None);
      println!("Added \"{}\"", title);
    }
    Some(name) => match catalog.grouping_named(name).map(|g| g.id.clone()) {
      Some(id) => {
        catalog.add_video(external_id, title.to_string(), Some(id));
        println!("Added \"{}\" to {}", title, name);
      }
      None => {
        let video = NewVideo { external_id, title: title.to_string() };
        catalog.create_grouping(name.to_string(), vec![video]);
        println!("Created collection {} with \"{}\"", name, title);
      }
    },
  }
  Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(Command::Completions { shell }) = &args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(*shell, &mut cmd, name, &mut std::io::stdout());
    return Ok(());
  }

  let config = Config::load();
  let data_dir = args.data_dir.clone().or_else(|| config.data_dir());
  let _guard = init_logging(data_dir.as_deref());
  info!(version = env!("CARGO_PKG_VERSION"), data_dir = ?data_dir, "app: starting");

  let mut catalog = Catalog::load(open_store(data_dir.as_deref()));

  match &args.command {
    Some(Command::List) => {
      print_shelf(&catalog);
      return Ok(());
    }
    Some(Command::Add { url, title, collection }) => {
      return add_from_cli(&mut catalog, url, title, collection.as_deref());
    }
    _ => {}
  }

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    let _ = execute!(std::io::stdout(), DisableMouseCapture, DisableBracketedPaste);
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  execute!(std::io::stdout(), EnableMouseCapture, EnableBracketedPaste)?;
  let result = run(&mut terminal, args, catalog, config);
  let _ = execute!(std::io::stdout(), DisableMouseCapture, DisableBracketedPaste);
  ratatui::restore();
  result
}

fn run(terminal: &mut DefaultTerminal, args: Args, catalog: Catalog, config: Config) -> Result<()> {
  let display_mode = display::resolve_display_mode(args.display_mode, config.display_mode.as_deref());
  let loader = EmbedLoader::new(args.mpv.unwrap_or_else(|| config.mpv_path()));
  let mut app = App::new(catalog, config, display_mode, loader);
  let frame = Duration::from_millis(constants().frame_poll_ms);

  loop {
    app.check_pending();
    app.tick(Instant::now());

    terminal.draw(|f| ui::ui(f, &mut app))?;

    // Wake early for the overlay's next timer.
    let timeout = app
      .next_deadline()
      .map_or(frame, |deadline| deadline.saturating_duration_since(Instant::now()).min(frame));

    if event::poll(timeout)? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key, Instant::now());
        }
        Event::Mouse(mouse) => input::handle_mouse_event(&mut app, mouse, Instant::now()),
        Event::Paste(text) => input::handle_paste(&mut app, &text),
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.close_player();
  Ok(())
}

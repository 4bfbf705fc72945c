use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::constants;

/// User preferences from `prefs.toml`. Every key is optional.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
pub struct Config {
  pub mpv_path: Option<String>,
  pub ytdl_format: Option<String>,
  pub data_dir: Option<PathBuf>,
  pub display_mode: Option<String>,
}

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", &constants().app_name)
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs()
      && let Ok(content) = std::fs::read_to_string(proj_dirs.config_dir().join("prefs.toml"))
    {
      return Self::parse(&content);
    }
    Self::default()
  }

  /// Malformed files fall back to defaults.
  pub fn parse(content: &str) -> Self {
    toml::from_str(content).unwrap_or_default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = project_dirs() {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok()
        && let Ok(content) = toml::to_string(self)
      {
        let _ = std::fs::write(config_dir.join("prefs.toml"), content);
      }
    }
  }

  pub fn mpv_path(&self) -> PathBuf {
    PathBuf::from(self.mpv_path.as_deref().unwrap_or("mpv"))
  }

  pub fn ytdl_format(&self) -> String {
    self.ytdl_format.clone().unwrap_or_else(|| constants().default_ytdl_format.clone())
  }

  /// Where the shelf and logs live. `None` means nothing persists.
  pub fn data_dir(&self) -> Option<PathBuf> {
    self.data_dir.clone().or_else(|| project_dirs().map(|d| d.data_dir().to_path_buf()))
  }
}

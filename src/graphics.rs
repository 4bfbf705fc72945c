use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

use crate::display::DisplayMode;

// --- Thumbnail Widget ---

/// Draws an image already sized with [`fit_to_area`], centred in the area.
pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_CHARS: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_direct(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
    }
  }
}

/// Resize to cover `area` at the mode's cell resolution.
pub fn fit_to_area(image: &DynamicImage, area: Rect, mode: DisplayMode) -> DynamicImage {
  let w = (area.width as u32).max(1);
  let h = (area.height as u32 * mode.rows_per_cell()).max(1);
  image.resize_to_fill(w, h, FilterType::Triangle)
}

/// Largest 16:9 rect centred inside `area`, allowing for cells being about
/// twice as tall as wide.
pub fn widescreen_rect(area: Rect) -> Rect {
  let ideal_h = (area.width as f32 * 9.0 / 32.0).round() as u16;
  if ideal_h <= area.height {
    let y = area.y + (area.height - ideal_h) / 2;
    return Rect { y, height: ideal_h, ..area };
  }
  let ideal_w = (area.height as f32 * 32.0 / 9.0).round() as u16;
  let w = ideal_w.min(area.width);
  Rect { x: area.x + (area.width - w) / 2, width: w, ..area }
}

/// An image already resized for one area.
pub struct Fitted {
  key: String,
  area: Rect,
  mode: DisplayMode,
  image: DynamicImage,
}

/// The image for `key` resized to `area`, reusing the cached one while nothing
/// changed. `source` only runs when the cache is stale.
pub fn fitted<'a>(
  slot: &'a mut Option<Fitted>,
  key: &str,
  area: Rect,
  mode: DisplayMode,
  source: impl FnOnce() -> Option<DynamicImage>,
) -> Option<&'a DynamicImage> {
  let fresh = slot.as_ref().is_some_and(|f| f.key == key && f.area == area && f.mode == mode);
  if !fresh {
    *slot = source().map(|img| Fitted { key: key.to_string(), area, mode, image: fit_to_area(&img, area, mode) });
  }
  slot.as_ref().map(|f| &f.image)
}

fn cell_origin(area: Rect, img_w: u32, img_rows: u32) -> (u16, u16) {
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_rows) / 2;
  (area.x.saturating_add(offset_x as u16), area.y.saturating_add(offset_y as u16))
}

fn render_direct(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let img_w = rgb.width().min(area.width as u32);
  let img_h = rgb.height();
  let rows = img_h.div_ceil(2).min(area.height as u32);
  let (ox, oy) = cell_origin(area, img_w, rows);

  for y in 0..rows {
    for x in 0..img_w {
      let upper = rgb.get_pixel(x, y * 2);
      let lower_y = y * 2 + 1;
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if lower_y < img_h {
        let lower = rgb.get_pixel(x, lower_y);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      buf.set_string(ox + x as u16, oy + y as u16, "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let img_w = luma.width().min(area.width as u32);
  let img_h = luma.height().min(area.height as u32);
  let (ox, oy) = cell_origin(area, img_w, img_h);

  for y in 0..img_h {
    for x in 0..img_w {
      let pixel = luma.get_pixel(x, y)[0];
      let idx = ((pixel as f32 / 255.0) * (ASCII_CHARS.len() - 1) as f32).round() as usize;
      buf.set_string(ox + x as u16, oy + y as u16, ASCII_CHARS[idx.min(ASCII_CHARS.len() - 1)], Style::default());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn solid(w: u32, h: u32, px: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(px)))
  }

  #[test]
  fn direct_uses_half_blocks() {
    let area = Rect::new(0, 0, 4, 2);
    let mut buf = Buffer::empty(area);
    let img = solid(4, 4, [255, 0, 0]);
    ThumbnailWidget { image: &img, display_mode: DisplayMode::Direct }.render(area, &mut buf);
    let cell = buf.cell((1, 1)).unwrap();
    assert_eq!(cell.symbol(), "▀");
    assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
    assert_eq!(cell.bg, Color::Rgb(255, 0, 0));
  }

  #[test]
  fn ascii_maps_brightness() {
    let area = Rect::new(0, 0, 2, 1);
    let mut buf = Buffer::empty(area);
    let img = solid(2, 1, [255, 255, 255]);
    ThumbnailWidget { image: &img, display_mode: DisplayMode::Ascii }.render(area, &mut buf);
    assert_eq!(buf.cell((0, 0)).unwrap().symbol(), "@");
  }

  #[test]
  fn small_image_is_centred() {
    let area = Rect::new(0, 0, 6, 3);
    let mut buf = Buffer::empty(area);
    let img = solid(2, 2, [0, 0, 255]);
    ThumbnailWidget { image: &img, display_mode: DisplayMode::Direct }.render(area, &mut buf);
    assert_eq!(buf.cell((2, 1)).unwrap().symbol(), "▀");
    assert_eq!(buf.cell((0, 0)).unwrap().symbol(), " ");
  }

  #[test]
  fn fit_matches_cell_resolution() {
    let img = solid(64, 36, [9, 9, 9]);
    let fitted = fit_to_area(&img, Rect::new(0, 0, 32, 9), DisplayMode::Direct);
    assert_eq!((fitted.width(), fitted.height()), (32, 18));
  }

  #[test]
  fn fitted_reuses_until_area_changes() {
    let mut slot = None;
    let mut calls = 0;
    let area = Rect::new(0, 0, 8, 4);
    for _ in 0..3 {
      fitted(&mut slot, "a", area, DisplayMode::Direct, || {
        calls += 1;
        Some(solid(16, 16, [1, 2, 3]))
      });
    }
    assert_eq!(calls, 1);
    let img = fitted(&mut slot, "a", Rect::new(0, 0, 4, 2), DisplayMode::Direct, || Some(solid(16, 16, [1, 2, 3])));
    assert_eq!(img.map(|i| i.width()), Some(4));
    assert!(fitted(&mut slot, "b", area, DisplayMode::Direct, || None).is_none());
  }

  #[test]
  fn widescreen_fits_inside() {
    let r = widescreen_rect(Rect::new(0, 0, 64, 40));
    assert_eq!(r.width, 64);
    assert_eq!(r.height, 18);
    assert_eq!(r.y, 11);
    let r = widescreen_rect(Rect::new(0, 0, 200, 9));
    assert_eq!(r.height, 9);
    assert_eq!(r.width, 32);
  }
}

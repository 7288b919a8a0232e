//! Region selection geometry and saving captured pixels (selections or whole
//! windows) as timestamped templates.

use crate::errors::Result;
use crate::screenshot::{save_png, ScreenSource, ScreenshotResult};
use crate::types::Rect;
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::info;

/// Selections narrower or shorter than this are treated as a plain click.
pub const MIN_SELECTION_SIDE: i32 = 2;

/// The two phases of a region capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionPhase {
    /// Waiting for the arm hotkey while the user keeps working elsewhere.
    Armed,
    /// The selection overlay covers the screen.
    Selecting,
}

impl RegionPhase {
    /// Only the selection overlay listens for ESC. While armed, the session
    /// ends by hotkey or timeout alone.
    pub fn escape_cancels(self) -> bool {
        matches!(self, RegionPhase::Selecting)
    }
}

/// A drag in progress: where the button went down and where it is now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSelection {
    pub start: (i32, i32),
    pub end: (i32, i32),
}

impl DragSelection {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            start: (x, y),
            end: (x, y),
        }
    }

    pub fn update(&mut self, x: i32, y: i32) {
        self.end = (x, y);
    }

    /// Normalized rectangle spanned by the drag, regardless of direction.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.start.0.min(self.end.0),
            self.start.1.min(self.end.1),
            self.start.0.max(self.end.0),
            self.start.1.max(self.end.1),
        )
    }

    /// The selected rectangle, or `None` when it is too small to be a selection.
    pub fn selection(&self) -> Option<Rect> {
        let rect = self.bounds();
        (rect.width() >= MIN_SELECTION_SIDE && rect.height() >= MIN_SELECTION_SIDE).then_some(rect)
    }
}

pub fn capture_file_name(now: DateTime<Local>) -> String {
    format!("capture_{}.png", now.format("%Y%m%d_%H%M%S"))
}

/// Save `pixels` into `templates_dir` under a timestamped name and return
/// that name. A second capture within the same second gets a numeric suffix
/// instead of overwriting the first.
pub fn save_capture(pixels: &RgbaImage, templates_dir: &Path, now: DateTime<Local>) -> Result<String> {
    let mut name = capture_file_name(now);
    let mut path: PathBuf = templates_dir.join(&name);
    let mut n = 1;
    while path.exists() {
        name = format!("capture_{}_{n}.png", now.format("%Y%m%d_%H%M%S"));
        path = templates_dir.join(&name);
        n += 1;
    }
    save_png(pixels, &path)?;
    info!(
        "saved capture {} ({}x{})",
        path.display(),
        pixels.width(),
        pixels.height()
    );
    Ok(name)
}

/// Crop `rect` out of `screen` and save it into `templates_dir`.
///
/// Returns the saved file's name (relative to `templates_dir`), or `None` when
/// the rectangle does not overlap the capture.
pub fn save_selection(
    screen: &ScreenshotResult,
    rect: Rect,
    templates_dir: &Path,
    now: DateTime<Local>,
) -> Result<Option<String>> {
    let Some(pixels) = screen.crop(rect) else {
        return Ok(None);
    };
    save_capture(&pixels, templates_dir, now).map(Some)
}

/// Grab everything `source` shows and save it as a template.
pub fn capture_to_templates(
    source: &dyn ScreenSource,
    templates_dir: &Path,
    now: DateTime<Local>,
) -> Result<String> {
    let shot = source.capture()?;
    save_capture(&shot.image, templates_dir, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn escape_only_cancels_while_selecting() {
        assert!(!RegionPhase::Armed.escape_cancels());
        assert!(RegionPhase::Selecting.escape_cancels());
    }

    #[test]
    fn zero_size_drag_is_no_selection() {
        let drag = DragSelection::new(100, 100);
        assert_eq!(drag.selection(), None);

        let mut thin = DragSelection::new(100, 100);
        thin.update(101, 300);
        assert_eq!(thin.selection(), None);
    }

    #[test]
    fn drag_in_any_direction_normalizes() {
        let mut drag = DragSelection::new(300, 250);
        drag.update(100, 100);
        assert_eq!(drag.selection(), Some(Rect::new(100, 100, 300, 250)));
    }

    #[test]
    fn saved_asset_has_selected_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let screen = ScreenshotResult::new(
            RgbaImage::from_fn(640, 480, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 7, 255])),
            (0, 0),
        );

        let mut drag = DragSelection::new(100, 100);
        drag.update(300, 250);
        let rect = drag.selection().unwrap();

        let name = save_selection(&screen, rect, &templates, fixed_time())
            .unwrap()
            .unwrap();
        assert_eq!(name, "capture_20240309_140507.png");

        let saved = image::open(templates.join(&name)).unwrap().to_rgba8();
        assert_eq!(saved.dimensions(), (200, 150));
        assert_eq!(saved.get_pixel(0, 0), &Rgba([100, 100, 7, 255]));

        let second = save_selection(&screen, rect, &templates, fixed_time())
            .unwrap()
            .unwrap();
        assert_eq!(second, "capture_20240309_140507_1.png");
    }

    struct WindowShot;

    impl ScreenSource for WindowShot {
        fn capture(&self) -> Result<ScreenshotResult> {
            Ok(ScreenshotResult::new(
                RgbaImage::from_pixel(320, 240, Rgba([9, 8, 7, 255])),
                (-1200, 40),
            ))
        }
    }

    #[test]
    fn window_capture_is_saved_whole_with_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");

        let name = capture_to_templates(&WindowShot, &templates, fixed_time()).unwrap();
        assert_eq!(name, "capture_20240309_140507.png");
        let saved = image::open(templates.join(&name)).unwrap().to_rgba8();
        assert_eq!(saved.dimensions(), (320, 240));

        let again = capture_to_templates(&WindowShot, &templates, fixed_time()).unwrap();
        assert_eq!(again, "capture_20240309_140507_1.png");
    }

    #[test]
    fn selection_off_screen_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let screen = ScreenshotResult::new(RgbaImage::new(100, 100), (0, 0));
        let saved =
            save_selection(&screen, Rect::new(200, 200, 260, 260), dir.path(), fixed_time()).unwrap();
        assert_eq!(saved, None);
    }
}

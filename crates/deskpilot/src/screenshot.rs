use crate::errors::{AutomationError, Result};
use crate::types::Rect;
use image::RgbaImage;
use std::path::Path;

/// Holds one capture of the primary screen
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// RGBA pixels
    pub image: RgbaImage,
    /// Desktop coordinate of the image's top-left pixel
    pub origin: (i32, i32),
}

impl ScreenshotResult {
    pub fn new(image: RgbaImage, origin: (i32, i32)) -> Self {
        Self { image, origin }
    }

    /// Desktop rectangle covered by this capture.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(
            self.origin.0,
            self.origin.1,
            self.image.width() as i32,
            self.image.height() as i32,
        )
    }

    /// Copy out the pixels under a desktop rectangle, clipped to the capture.
    pub fn crop(&self, rect: Rect) -> Option<RgbaImage> {
        let clipped = rect.intersect(&self.bounds())?;
        let x = (clipped.left - self.origin.0) as u32;
        let y = (clipped.top - self.origin.1) as u32;
        Some(
            image::imageops::crop_imm(
                &self.image,
                x,
                y,
                clipped.width() as u32,
                clipped.height() as u32,
            )
            .to_image(),
        )
    }
}

/// Encode an image as PNG at `path`, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Source of screen pixels for template matching and region capture.
pub trait ScreenSource: Send + Sync {
    fn capture(&self) -> Result<ScreenshotResult>;
}

/// Captures the primary monitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryMonitor;

#[cfg(any(target_os = "windows", target_os = "macos"))]
impl ScreenSource for PrimaryMonitor {
    fn capture(&self) -> Result<ScreenshotResult> {
        use xcap::Monitor;

        let monitors = Monitor::all()
            .map_err(|e| AutomationError::PlatformError(format!("failed to list monitors: {e}")))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or_else(|| AutomationError::PlatformError("no monitor found".to_string()))?;

        let origin = (monitor.x().unwrap_or(0), monitor.y().unwrap_or(0));
        let image = monitor
            .capture_image()
            .map_err(|e| AutomationError::PlatformError(format!("screen capture failed: {e}")))?;
        Ok(ScreenshotResult::new(image, origin))
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
impl ScreenSource for PrimaryMonitor {
    fn capture(&self) -> Result<ScreenshotResult> {
        Err(AutomationError::UnsupportedPlatform(
            "screen capture is only available on Windows and macOS".to_string(),
        ))
    }
}

/// Captures whichever top-level window currently has focus.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForegroundWindow;

#[cfg(any(target_os = "windows", target_os = "macos"))]
impl ScreenSource for ForegroundWindow {
    fn capture(&self) -> Result<ScreenshotResult> {
        use xcap::Window;

        let all = Window::all()
            .map_err(|e| AutomationError::PlatformError(format!("failed to list windows: {e}")))?;
        let window = focused_window(all)?;
        let title = window.title().unwrap_or_default();
        let origin = (window.x().unwrap_or(0), window.y().unwrap_or(0));
        let image = window.capture_image().map_err(|e| {
            AutomationError::PlatformError(format!("failed to capture window {title:?}: {e}"))
        })?;
        tracing::debug!("captured foreground window {:?}", title);
        Ok(ScreenshotResult::new(image, origin))
    }
}

#[cfg(target_os = "windows")]
fn focused_window(all: Vec<xcap::Window>) -> Result<xcap::Window> {
    use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.0.is_null() {
        return Err(AutomationError::PlatformError(
            "no foreground window".to_string(),
        ));
    }
    let id = hwnd.0 as usize as u32;
    all.into_iter()
        .find(|w| w.id().map(|wid| wid == id).unwrap_or(false))
        .ok_or_else(|| AutomationError::PlatformError("foreground window cannot be captured".to_string()))
}

#[cfg(target_os = "macos")]
fn focused_window(all: Vec<xcap::Window>) -> Result<xcap::Window> {
    all.into_iter()
        .find(|w| w.is_focused().unwrap_or(false))
        .ok_or_else(|| AutomationError::PlatformError("no focused window".to_string()))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
impl ScreenSource for ForegroundWindow {
    fn capture(&self) -> Result<ScreenshotResult> {
        Err(AutomationError::UnsupportedPlatform(
            "window capture is only available on Windows and macOS".to_string(),
        ))
    }
}

//! Drivers perform the physical actions a flow asks for.

pub mod image;

#[cfg(target_os = "windows")]
pub mod accessibility;

pub use self::image::ImageDriver;

#[cfg(target_os = "windows")]
pub use accessibility::AccessibilityDriver;

use crate::errors::{AutomationError, Result};
use crate::locator::TemplateMatch;
use crate::step::ControlDescriptor;
use crate::types::Rect;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};

/// Capabilities the step engine needs from a desktop backend.
///
/// Locate operations report "not found" as `Ok(None)` / `Ok(false)`;
/// errors are reserved for the backend itself failing.
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    fn launch(&self, path: &str, args: &[String], cwd: Option<&str>) -> Result<()>;

    /// Block until a matching top-level window exists or `timeout` passes.
    fn wait_window(
        &self,
        title: Option<&str>,
        class_name: Option<&str>,
        timeout: Duration,
    ) -> Result<bool>;

    fn click(&self, x: i32, y: i32) -> Result<()>;

    fn type_text(&self, text: &str) -> Result<()>;

    fn hotkey(&self, keys: &[String]) -> Result<()>;

    fn close_window(
        &self,
        title: Option<&str>,
        class_name: Option<&str>,
        kill_process: bool,
    ) -> Result<bool>;

    fn locate_image(&self, path: &Path, threshold: f32) -> Result<TemplateMatch>;

    fn locate_control(&self, control: &ControlDescriptor) -> Result<Option<Rect>>;

    /// Bounds of the first top-level window whose title contains `title`.
    fn window_rect(&self, title: &str) -> Result<Option<Rect>>;

    /// Template-match, then click the centre of the accepted match.
    fn find_and_click_image(&self, path: &Path, threshold: f32) -> Result<TemplateMatch> {
        let outcome = self.locate_image(path, threshold)?;
        if let TemplateMatch::Found(found) = &outcome {
            let (x, y) = found.rect.center();
            self.click(x, y)?;
        }
        Ok(outcome)
    }

    fn find_and_click_control(&self, control: &ControlDescriptor) -> Result<bool> {
        match self.locate_control(control)? {
            Some(rect) => {
                let (x, y) = rect.center();
                self.click(x, y)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Start a detached process.
pub(crate) fn spawn_process(path: &str, args: &[String], cwd: Option<&str>) -> Result<()> {
    let mut command = Command::new(path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(cwd) = cwd.filter(|c| !c.is_empty()) {
        command.current_dir(cwd);
    }
    let child = command.spawn().map_err(|e| {
        AutomationError::PlatformError(format!("failed to launch {path:?}: {e}"))
    })?;
    info!("launched {:?} (pid {})", path, child.id());
    Ok(())
}

/// Pick the best driver this machine supports: the accessibility driver when
/// UI Automation initializes, otherwise the image/coordinate driver.
pub fn select_driver() -> Box<dyn Driver> {
    #[cfg(target_os = "windows")]
    {
        match AccessibilityDriver::new() {
            Ok(driver) => return Box::new(driver),
            Err(e) => warn!("UI Automation unavailable, using image driver: {}", e),
        }
    }
    #[cfg(not(target_os = "windows"))]
    warn!("no accessibility backend on this platform, using image driver");
    Box::new(ImageDriver::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_is_reported() {
        let err = spawn_process("/definitely/not/a/real/binary", &[], None).unwrap_err();
        assert!(matches!(err, AutomationError::PlatformError(_)));
        assert!(err.to_string().contains("failed to launch"));
    }
}

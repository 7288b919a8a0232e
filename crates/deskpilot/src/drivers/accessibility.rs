//! UI Automation driver. Window waits, window closing and control lookup use
//! the accessibility tree; pointer, keyboard and image work go through the
//! owned image driver.

use super::image::ImageDriver;
use super::{spawn_process, Driver};
use crate::errors::{AutomationError, Result};
use crate::locator::{control_candidates, select_unique, target_window, TemplateMatch};
use crate::platforms::windows::uia::{element_rect, UiaBackend, WINDOW_POLL_INTERVAL};
use crate::step::ControlDescriptor;
use crate::types::Rect;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uiautomation::patterns::UIWindowPattern;

/// How long control lookup waits for its top-level window to appear.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `close_window` looks for the window before giving up.
const CLOSE_FIND_TIMEOUT: Duration = Duration::from_secs(3);
/// How long `close_window` waits for a closed window to disappear.
const CLOSE_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AccessibilityDriver {
    uia: UiaBackend,
    fallback: ImageDriver,
}

impl AccessibilityDriver {
    pub fn new() -> Result<Self> {
        Self::with_fallback(ImageDriver::new())
    }

    pub fn with_fallback(fallback: ImageDriver) -> Result<Self> {
        let uia = UiaBackend::new()?;
        info!("UI Automation backend initialized");
        Ok(Self { uia, fallback })
    }

    fn wait_gone(&self, title: Option<&str>, class_name: Option<&str>) -> Result<bool> {
        let deadline = Instant::now() + CLOSE_SETTLE_TIMEOUT;
        loop {
            if self.uia.find_window(title, class_name)?.is_none() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(WINDOW_POLL_INTERVAL.min(deadline - now));
        }
    }
}

impl Driver for AccessibilityDriver {
    fn name(&self) -> &'static str {
        "accessibility"
    }

    fn launch(&self, path: &str, args: &[String], cwd: Option<&str>) -> Result<()> {
        spawn_process(path, args, cwd)
    }

    #[instrument(level = "debug", skip(self))]
    fn wait_window(
        &self,
        title: Option<&str>,
        class_name: Option<&str>,
        timeout: Duration,
    ) -> Result<bool> {
        if title.filter(|t| !t.is_empty()).is_none() && class_name.filter(|c| !c.is_empty()).is_none() {
            warn!("wait_window without title or class can never match");
            return Ok(false);
        }
        let found = self.uia.wait_for_window(title, class_name, timeout)?;
        Ok(found.is_some())
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        self.fallback.click(x, y)
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.fallback.type_text(text)
    }

    fn hotkey(&self, keys: &[String]) -> Result<()> {
        self.fallback.hotkey(keys)
    }

    #[instrument(level = "debug", skip(self))]
    fn close_window(
        &self,
        title: Option<&str>,
        class_name: Option<&str>,
        kill_process: bool,
    ) -> Result<bool> {
        if kill_process {
            return self.fallback.close_window(title, class_name, true);
        }
        let Some(window) = self
            .uia
            .wait_for_window(title, class_name, CLOSE_FIND_TIMEOUT)?
        else {
            debug!("no window to close");
            return Ok(false);
        };
        let pattern = window.get_pattern::<UIWindowPattern>().map_err(|e| {
            AutomationError::PlatformError(format!("window does not support closing: {e}"))
        })?;
        pattern
            .close()
            .map_err(|e| AutomationError::PlatformError(format!("failed to close window: {e}")))?;
        self.wait_gone(title, class_name)
    }

    fn locate_image(&self, path: &Path, threshold: f32) -> Result<TemplateMatch> {
        self.fallback.locate_image(path, threshold)
    }

    #[instrument(level = "debug", skip(self, control), fields(control = %control.summary()))]
    fn locate_control(&self, control: &ControlDescriptor) -> Result<Option<Rect>> {
        let Some((title, class_name)) = target_window(control) else {
            debug!("control has no window title or class");
            return Ok(None);
        };
        let Some(window) = self
            .uia
            .wait_for_window(title, class_name, CONNECT_TIMEOUT)?
        else {
            debug!("target window not found within {:?}", CONNECT_TIMEOUT);
            return Ok(None);
        };

        let candidates = control_candidates(control);
        if candidates.is_empty() {
            return Ok(None);
        }
        let props = self.uia.descendants(&window)?;
        debug!(
            "matching {} candidates against {} elements",
            candidates.len(),
            props.len()
        );

        match select_unique(&candidates, &props) {
            Some((qi, ei)) => {
                debug!("control matched by {}", candidates[qi].describe());
                Ok(props[ei].rect)
            }
            None => Ok(None),
        }
    }

    fn window_rect(&self, title: &str) -> Result<Option<Rect>> {
        let window = self.uia.find_window(Some(title), None)?;
        Ok(window.and_then(|w| element_rect(&w)))
    }
}

//! Image/coordinate driver: everything it knows about the desktop comes from
//! screen pixels, and everything it does goes through synthesized input.

use super::{spawn_process, Driver};
use crate::errors::{AutomationError, Result};
use crate::input::{parse_chord, InputSink, NativeInput};
use crate::locator::{match_template, TemplateMatch};
use crate::screenshot::{PrimaryMonitor, ScreenSource};
use crate::step::ControlDescriptor;
use crate::types::Rect;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, Signal, System};
use tracing::{debug, info, warn};

/// Without window enumeration, waiting for a window is a fixed grace period.
const WINDOW_GRACE_PERIOD: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct ImageDriver {
    screen: Arc<dyn ScreenSource>,
    input: Arc<dyn InputSink>,
}

impl Default for ImageDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDriver {
    pub fn new() -> Self {
        Self::with_backends(Arc::new(PrimaryMonitor), Arc::new(NativeInput))
    }

    pub fn with_backends(screen: Arc<dyn ScreenSource>, input: Arc<dyn InputSink>) -> Self {
        Self { screen, input }
    }

    pub fn screen(&self) -> &Arc<dyn ScreenSource> {
        &self.screen
    }
}

fn load_template(path: &Path) -> std::result::Result<::image::RgbaImage, String> {
    if !path.is_file() {
        return Err("template file missing".to_string());
    }
    ::image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("unreadable template: {e}"))
}

/// Terminate every process whose name contains `needle`, case-insensitively.
fn kill_processes_matching(needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut killed = false;
    for (pid, process) in system.processes() {
        let name = process.name().to_string_lossy().to_lowercase();
        if !name.contains(&needle) {
            continue;
        }
        let terminated = process
            .kill_with(Signal::Term)
            .unwrap_or_else(|| process.kill());
        if terminated {
            info!("terminated process {} ({})", name, pid);
            killed = true;
        } else {
            warn!("failed to terminate process {} ({})", name, pid);
        }
    }
    killed
}

impl Driver for ImageDriver {
    fn name(&self) -> &'static str {
        "image"
    }

    fn launch(&self, path: &str, args: &[String], cwd: Option<&str>) -> Result<()> {
        spawn_process(path, args, cwd)
    }

    fn wait_window(
        &self,
        title: Option<&str>,
        class_name: Option<&str>,
        timeout: Duration,
    ) -> Result<bool> {
        let grace = WINDOW_GRACE_PERIOD.min(timeout);
        debug!(
            "image driver cannot see windows; sleeping {:?} for title={:?} class={:?}",
            grace, title, class_name
        );
        thread::sleep(grace);
        Ok(true)
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        self.input.click(x, y)
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.input.type_text(text)
    }

    fn hotkey(&self, keys: &[String]) -> Result<()> {
        let chord = parse_chord(keys)?;
        self.input.chord(&chord)
    }

    fn close_window(
        &self,
        title: Option<&str>,
        _class_name: Option<&str>,
        kill_process: bool,
    ) -> Result<bool> {
        match title.filter(|t| !t.is_empty()) {
            Some(title) if kill_process => Ok(kill_processes_matching(title)),
            _ => Ok(false),
        }
    }

    fn locate_image(&self, path: &Path, threshold: f32) -> Result<TemplateMatch> {
        let template = match load_template(path) {
            Ok(template) => template,
            Err(reason) => {
                warn!("{}: {}", path.display(), reason);
                return Ok(TemplateMatch::Unavailable(reason));
            }
        };
        let shot = self.screen.capture()?;
        let outcome = match_template(&shot.image, shot.origin, &template, threshold);
        debug!(
            "template {} -> {:?} (threshold {:.2})",
            path.display(),
            outcome,
            threshold
        );
        Ok(outcome)
    }

    fn locate_control(&self, _control: &ControlDescriptor) -> Result<Option<Rect>> {
        Err(AutomationError::UnsupportedPlatform(
            "control lookup needs the accessibility backend".to_string(),
        ))
    }

    fn window_rect(&self, _title: &str) -> Result<Option<Rect>> {
        Err(AutomationError::UnsupportedPlatform(
            "window geometry needs the accessibility backend".to_string(),
        ))
    }
}

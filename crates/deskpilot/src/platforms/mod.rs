//! Platform dispatch for the interactive features that need native windows.
//! Everything here reports `UnsupportedPlatform` outside Windows.

use crate::errors::Result;
use crate::step::ControlDescriptor;
use crate::types::{BlinkHandle, Rect};
use std::path::Path;
use std::time::Duration;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
use crate::errors::AutomationError;

#[cfg(not(target_os = "windows"))]
fn unsupported<T>(feature: &str) -> Result<T> {
    Err(AutomationError::UnsupportedPlatform(format!(
        "{feature} is only available on Windows"
    )))
}

/// Whether accessibility-based control lookup can be used here.
pub fn accessibility_available() -> bool {
    #[cfg(target_os = "windows")]
    {
        windows::uia::is_available()
    }
    #[cfg(not(target_os = "windows"))]
    {
        false
    }
}

/// Let the user point at a control and confirm it with Ctrl+Shift+C.
pub fn run_control_picker(timeout: Duration) -> Result<Option<ControlDescriptor>> {
    #[cfg(target_os = "windows")]
    {
        windows::run_control_picker(timeout)
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = timeout;
        unsupported("control capture")
    }
}

/// Describe the control under the cursor immediately.
pub fn pick_control_at_cursor() -> Result<Option<ControlDescriptor>> {
    #[cfg(target_os = "windows")]
    {
        windows::pick_control_at_cursor()
    }
    #[cfg(not(target_os = "windows"))]
    {
        unsupported("control picking")
    }
}

/// Let the user drag out a screen region and save it under `templates_dir`.
pub fn run_region_capture(templates_dir: &Path, timeout: Duration) -> Result<Option<String>> {
    #[cfg(target_os = "windows")]
    {
        windows::run_region_capture(templates_dir, timeout)
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = (templates_dir, timeout);
        unsupported("region capture")
    }
}

/// Flash a frame around `rect` for a couple of seconds.
pub fn blink(rect: Rect) -> Result<BlinkHandle> {
    #[cfg(target_os = "windows")]
    {
        windows::blink_rect(rect)
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = rect;
        unsupported("highlighting")
    }
}

//! Blinking red frame around a located rectangle.

use super::overlay::{pump_messages, FrameWindow};
use crate::errors::{AutomationError, Result};
use crate::types::{BlinkHandle, Rect};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const BLINK_INTERVAL: Duration = Duration::from_millis(240);
const BLINK_DURATION: Duration = Duration::from_millis(2400);
const LOOP_SLEEP: Duration = Duration::from_millis(10);

pub fn blink_rect(rect: Rect) -> Result<BlinkHandle> {
    if rect.is_degenerate() {
        return Err(AutomationError::InvalidStep(format!(
            "cannot highlight an empty rectangle {rect:?}"
        )));
    }

    let should_close = Arc::new(AtomicBool::new(false));
    let stop = should_close.clone();

    let handle = thread::Builder::new()
        .name("deskpilot-blink".to_string())
        .spawn(move || {
            let frame = match FrameWindow::create() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("highlight overlay unavailable: {}", e);
                    return;
                }
            };
            if let Err(e) = frame.surround(rect) {
                warn!("failed to position highlight: {}", e);
                return;
            }

            let started = Instant::now();
            let mut visible = true;
            let mut last_toggle = started;
            while !stop.load(Ordering::Relaxed) && started.elapsed() < BLINK_DURATION {
                if pump_messages(|_| std::ops::ControlFlow::Continue(())).is_break() {
                    break;
                }
                if last_toggle.elapsed() >= BLINK_INTERVAL {
                    visible = !visible;
                    frame.set_visible(visible);
                    last_toggle = Instant::now();
                }
                thread::sleep(LOOP_SLEEP);
            }
            debug!("highlight of {:?} finished", rect);
        })
        .map_err(|e| AutomationError::PlatformError(format!("failed to start highlight: {e}")))?;

    Ok(BlinkHandle {
        should_close,
        handle: Some(handle),
    })
}

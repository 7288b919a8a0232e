//! Hover-to-highlight control picker confirmed with Ctrl+Shift+C.

use super::input::cursor_position;
use super::overlay::{pump_messages, FrameWindow, HotkeyRegistration};
use super::uia::UiaBackend;
use crate::capture::hit_test::HoverRefresh;
use crate::capture::session::{CaptureSession, SessionContext};
use crate::errors::Result;
use crate::step::ControlDescriptor;
use crate::types::Rect;
use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PICKER_HOTKEY_ID: i32 = 0xC0C;
const PICKER_HOTKEY: char = 'C';

/// How often the element under the cursor is re-resolved.
const HOVER_REFRESH: Duration = Duration::from_millis(50);
const LOOP_SLEEP: Duration = Duration::from_millis(10);
/// Frame drawn around the cursor when nothing usable is under it.
const FALLBACK_BOX: i32 = 60;

/// Run the picker until the hotkey is pressed or `timeout` passes.
pub fn run_control_picker(timeout: Duration) -> Result<Option<ControlDescriptor>> {
    info!("control picker armed; press Ctrl+Shift+C over a control");
    let session = CaptureSession::start("control-picker", picker_loop)?;
    Ok(session.wait(timeout))
}

/// Resolve the control under the cursor right now, without a session.
pub fn pick_control_at_cursor() -> Result<Option<ControlDescriptor>> {
    let uia = UiaBackend::new()?;
    let (x, y) = cursor_position()?;
    let picked = uia.element_at(x, y).map(|hit| hit.descriptor);
    match &picked {
        Some(descriptor) => info!("control at ({}, {}): {}", x, y, descriptor.summary()),
        None => debug!("no control at ({}, {})", x, y),
    }
    Ok(picked)
}

fn picker_loop(ctx: &SessionContext<ControlDescriptor>) {
    let uia = match UiaBackend::new() {
        Ok(uia) => uia,
        Err(e) => {
            warn!("control picker unavailable: {}", e);
            return;
        }
    };
    let hotkey = match HotkeyRegistration::register(PICKER_HOTKEY_ID, PICKER_HOTKEY) {
        Ok(hotkey) => hotkey,
        Err(e) => {
            warn!("control picker could not register its hotkey: {}", e);
            return;
        }
    };
    let frame = match FrameWindow::create() {
        Ok(frame) => frame,
        Err(e) => {
            warn!("control picker could not create its overlay: {}", e);
            return;
        }
    };

    let mut refresh = HoverRefresh::new(HOVER_REFRESH);
    let mut last_rect: Option<Rect> = None;

    while !ctx.is_cancelled() {
        let mut confirmed = false;
        let pumped = pump_messages(|msg| {
            if hotkey.is_trigger(msg) {
                confirmed = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });

        if confirmed {
            frame.set_visible(false);
            let picked = cursor_position()
                .ok()
                .and_then(|(x, y)| uia.element_at(x, y));
            match picked {
                Some(hit) => {
                    info!("picked control: {}", hit.descriptor.summary());
                    ctx.publish(hit.descriptor);
                }
                None => info!("no control under the cursor; picker closed"),
            }
            return;
        }
        if pumped.is_break() {
            debug!("control picker message loop quit");
            return;
        }

        if refresh.due(Instant::now()) {
            if let Ok((x, y)) = cursor_position() {
                let rect = uia
                    .element_at(x, y)
                    .map(|hit| hit.rect)
                    .unwrap_or_else(|| Rect::centered_on(x, y, FALLBACK_BOX));
                if last_rect != Some(rect) {
                    last_rect = Some(rect);
                    if let Err(e) = frame.surround(rect) {
                        debug!("failed to move picker frame: {}", e);
                    }
                }
            }
        }

        thread::sleep(LOOP_SLEEP);
    }
    debug!("control picker cancelled");
}

//! Two-phase region capture: arm with Ctrl+Shift+R, then Ctrl+drag a
//! rectangle on a full-screen overlay. ESC cancels the selection phase; the
//! armed phase only ends by hotkey or timeout.

use super::input::{cursor_position, is_key_down};
use super::overlay::{
    primary_screen_rect, pump_messages, FrameWindow, HotkeyRegistration, SelectionOverlay,
};
use crate::capture::region::{save_selection, DragSelection, RegionPhase};
use crate::capture::session::{CaptureSession, SessionContext};
use crate::errors::Result;
use crate::screenshot::{PrimaryMonitor, ScreenSource};
use chrono::Local;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use windows::Win32::UI::Input::KeyboardAndMouse::{VK_CONTROL, VK_ESCAPE};
use windows::Win32::UI::WindowsAndMessaging::{
    WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
};

const ARM_HOTKEY_ID: i32 = 0xC0D;
const ARM_HOTKEY: char = 'R';

const LOOP_SLEEP: Duration = Duration::from_millis(10);
/// Time for the overlays to disappear before the screen is grabbed.
const HIDE_SETTLE: Duration = Duration::from_millis(50);

/// Run both phases against one overall deadline and return the saved file
/// name relative to `templates_dir`.
pub fn run_region_capture(templates_dir: &Path, timeout: Duration) -> Result<Option<String>> {
    let deadline = Instant::now() + timeout;

    info!("region capture waiting for Ctrl+Shift+R");
    let arm = CaptureSession::start("region-arm", arm_loop)?;
    if arm.wait_until(deadline).is_none() {
        return Ok(None);
    }

    info!("region capture armed; hold Ctrl and drag to select, ESC to cancel");
    let dir: PathBuf = templates_dir.to_path_buf();
    let select = CaptureSession::start("region-select", move |ctx| select_loop(ctx, &dir))?;
    Ok(select.wait_until(deadline))
}

/// Ends on the hotkey or cancellation. Key state is not polled here since
/// the user is still typing into other applications.
fn arm_loop(ctx: &SessionContext<()>) {
    let hotkey = match HotkeyRegistration::register(ARM_HOTKEY_ID, ARM_HOTKEY) {
        Ok(hotkey) => hotkey,
        Err(e) => {
            warn!("region capture could not register its hotkey: {}", e);
            return;
        }
    };

    while !ctx.is_cancelled() {
        let mut armed = false;
        let pumped = pump_messages(|msg| {
            if hotkey.is_trigger(msg) {
                armed = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        if armed {
            ctx.publish(());
            return;
        }
        if pumped.is_break() {
            return;
        }
        thread::sleep(LOOP_SLEEP);
    }
}

fn escape_pressed(phase: RegionPhase) -> bool {
    phase.escape_cancels() && is_key_down(VK_ESCAPE)
}

enum DragEvent {
    Down,
    Move,
    Up,
    Escape,
}

fn select_loop(ctx: &SessionContext<String>, templates_dir: &Path) {
    let overlay = match SelectionOverlay::create(primary_screen_rect()) {
        Ok(overlay) => overlay,
        Err(e) => {
            warn!("region capture could not create its overlay: {}", e);
            return;
        }
    };
    let frame = match FrameWindow::create() {
        Ok(frame) => frame,
        Err(e) => {
            warn!("region capture could not create its frame: {}", e);
            return;
        }
    };

    let mut drag: Option<DragSelection> = None;

    while !ctx.is_cancelled() {
        if escape_pressed(RegionPhase::Selecting) {
            debug!("region capture cancelled");
            return;
        }

        let mut events = Vec::new();
        let pumped = pump_messages(|msg| {
            match msg.message {
                WM_LBUTTONDOWN => events.push(DragEvent::Down),
                WM_MOUSEMOVE => events.push(DragEvent::Move),
                WM_LBUTTONUP => events.push(DragEvent::Up),
                WM_KEYDOWN if msg.wParam.0 == usize::from(VK_ESCAPE.0) => {
                    events.push(DragEvent::Escape);
                    return ControlFlow::Break(());
                }
                _ => {}
            }
            ControlFlow::Continue(())
        });

        for event in events {
            if matches!(event, DragEvent::Escape) {
                debug!("region capture cancelled");
                return;
            }
            let Ok((x, y)) = cursor_position() else { continue };
            match event {
                DragEvent::Escape => return,
                DragEvent::Down if is_key_down(VK_CONTROL) => {
                    overlay.capture_mouse();
                    drag = Some(DragSelection::new(x, y));
                }
                DragEvent::Down => {}
                DragEvent::Move => {
                    if let Some(d) = drag.as_mut() {
                        d.update(x, y);
                        if let Err(e) = frame.surround(d.bounds()) {
                            debug!("failed to move selection frame: {}", e);
                        }
                    }
                }
                DragEvent::Up => {
                    let Some(mut finished) = drag.take() else { continue };
                    finished.update(x, y);
                    overlay.release_mouse();

                    let Some(rect) = finished.selection() else {
                        info!("empty selection; region capture closed");
                        return;
                    };
                    overlay.hide();
                    frame.set_visible(false);
                    thread::sleep(HIDE_SETTLE);

                    match PrimaryMonitor
                        .capture()
                        .and_then(|screen| save_selection(&screen, rect, templates_dir, Local::now()))
                    {
                        Ok(Some(name)) => {
                            ctx.publish(name);
                        }
                        Ok(None) => info!("selection is outside the screen; nothing saved"),
                        Err(e) => warn!("failed to save region capture: {}", e),
                    }
                    return;
                }
            }
        }

        if pumped.is_break() {
            return;
        }
        thread::sleep(LOOP_SLEEP);
    }
}

//! Mouse input and cursor queries for Windows

use crate::errors::{AutomationError, Result};
use tracing::debug;
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_VIRTUALDESK,
    MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN,
};

fn mouse_input(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// Left-click at absolute desktop coordinates.
///
/// Coordinates are normalized against the virtual desktop so that targets on
/// secondary monitors are reachable.
pub fn send_mouse_click(x: i32, y: i32) -> Result<()> {
    let (abs_x, abs_y) = unsafe {
        let left = GetSystemMetrics(SM_XVIRTUALSCREEN);
        let top = GetSystemMetrics(SM_YVIRTUALSCREEN);
        let width = GetSystemMetrics(SM_CXVIRTUALSCREEN).max(2);
        let height = GetSystemMetrics(SM_CYVIRTUALSCREEN).max(2);
        // Normalized 0..=65535 range
        (
            (i64::from(x - left) * 65535 / i64::from(width - 1)) as i32,
            (i64::from(y - top) * 65535 / i64::from(height - 1)) as i32,
        )
    };

    let base = MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK;
    let inputs = [
        mouse_input(abs_x, abs_y, base | MOUSEEVENTF_MOVE),
        mouse_input(abs_x, abs_y, base | MOUSEEVENTF_LEFTDOWN),
        mouse_input(abs_x, abs_y, base | MOUSEEVENTF_LEFTUP),
    ];

    let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(AutomationError::PlatformError(format!(
            "SendInput delivered {sent} of {} events",
            inputs.len()
        )));
    }
    debug!("sent left click at ({}, {})", x, y);
    Ok(())
}

pub fn cursor_position() -> Result<(i32, i32)> {
    let mut pos = POINT::default();
    unsafe { GetCursorPos(&mut pos) }
        .map_err(|e| AutomationError::PlatformError(format!("GetCursorPos failed: {e}")))?;
    Ok((pos.x, pos.y))
}

/// Whether a key is down right now, regardless of which window has focus.
pub fn is_key_down(key: VIRTUAL_KEY) -> bool {
    unsafe { GetAsyncKeyState(i32::from(key.0)) < 0 }
}

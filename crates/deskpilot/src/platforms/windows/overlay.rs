//! Native overlay building blocks shared by the picker, region capture and
//! highlight blink: a click-through frame window, a full-screen selection
//! overlay, a non-blocking message pump and scoped global hotkeys.

use crate::errors::{AutomationError, Result};
use crate::types::Rect;
use std::ops::ControlFlow;
use tracing::debug;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::*;

/// Border thickness of every frame overlay, in pixels.
pub(crate) const FRAME_BORDER: i32 = 3;

const FRAME_CLASS_NAME: PCWSTR = w!("DeskpilotFrameOverlay");
const SELECTION_CLASS_NAME: PCWSTR = w!("DeskpilotSelectionOverlay");

// BGR
const FRAME_COLOR: COLORREF = COLORREF(0x0000FF);
const SELECTION_SHADE: COLORREF = COLORREF(0x404040);
// Colour-keyed pixels are both invisible and click-through.
const TRANSPARENT_KEY: COLORREF = COLORREF(0x000000);

/// Opacity of the full-screen region selection overlay.
const SELECTION_ALPHA: u8 = 180;

fn platform_err(what: &str, e: impl std::fmt::Display) -> AutomationError {
    AutomationError::PlatformError(format!("{what} failed: {e}"))
}

fn register_class(
    class_name: PCWSTR,
    background: COLORREF,
    cursor: PCWSTR,
    proc: WNDPROC,
) -> Result<HINSTANCE> {
    unsafe {
        let module = GetModuleHandleW(None).map_err(|e| platform_err("GetModuleHandleW", e))?;
        let instance = HINSTANCE(module.0);
        let brush = CreateSolidBrush(background);

        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: proc,
            hInstance: instance,
            hCursor: LoadCursorW(None, cursor).unwrap_or_default(),
            hbrBackground: brush,
            lpszClassName: class_name,
            ..Default::default()
        };

        if RegisterClassExW(&wc) == 0 {
            // Already registered by an earlier session; keep the first brush.
            let _ = DeleteObject(brush.into());
            debug!("window class already registered");
        }
        Ok(instance)
    }
}

/// Rectangle of the primary monitor in desktop coordinates.
pub(crate) fn primary_screen_rect() -> Rect {
    unsafe {
        Rect::from_origin_size(
            0,
            0,
            GetSystemMetrics(SM_CXSCREEN),
            GetSystemMetrics(SM_CYSCREEN),
        )
    }
}

/// Drain this thread's message queue without blocking.
///
/// `handler` sees every message before it is dispatched and can end the pump
/// by returning `Break`. `WM_QUIT` always breaks.
pub(crate) fn pump_messages<F>(mut handler: F) -> ControlFlow<()>
where
    F: FnMut(&MSG) -> ControlFlow<()>,
{
    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            if msg.message == WM_QUIT {
                return ControlFlow::Break(());
            }
            if handler(&msg).is_break() {
                return ControlFlow::Break(());
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    ControlFlow::Continue(())
}

/// Ctrl+Shift+`key` registered for the calling thread; unregistered on drop.
/// `WM_HOTKEY` arrives in the thread queue, so the owning thread must pump.
pub(crate) struct HotkeyRegistration {
    id: i32,
    key: char,
}

impl HotkeyRegistration {
    pub(crate) fn register(id: i32, key: char) -> Result<Self> {
        unsafe {
            RegisterHotKey(
                None,
                id,
                MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
                key.to_ascii_uppercase() as u32,
            )
        }
        .map_err(|e| platform_err(&format!("RegisterHotKey(Ctrl+Shift+{key})"), e))?;
        debug!("registered hotkey Ctrl+Shift+{}", key);
        Ok(Self { id, key })
    }

    pub(crate) fn is_trigger(&self, msg: &MSG) -> bool {
        msg.message == WM_HOTKEY && msg.wParam.0 == self.id as usize
    }
}

impl Drop for HotkeyRegistration {
    fn drop(&mut self) {
        unsafe {
            let _ = UnregisterHotKey(None, self.id);
        }
        debug!("unregistered hotkey Ctrl+Shift+{}", self.key);
    }
}

/// Borderless, click-through, topmost window drawn as a hollow red frame.
pub(crate) struct FrameWindow {
    hwnd: HWND,
}

impl FrameWindow {
    pub(crate) fn create() -> Result<Self> {
        let instance = register_class(
            FRAME_CLASS_NAME,
            TRANSPARENT_KEY,
            IDC_ARROW,
            Some(frame_window_proc),
        )?;
        unsafe {
            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                FRAME_CLASS_NAME,
                w!("deskpilot frame"),
                WS_POPUP,
                0,
                0,
                0,
                0,
                None,
                None,
                Some(instance),
                None,
            )
            .map_err(|e| platform_err("CreateWindowExW", e))?;

            let frame = Self { hwnd };
            SetLayeredWindowAttributes(hwnd, TRANSPARENT_KEY, 255, LWA_COLORKEY)
                .map_err(|e| platform_err("SetLayeredWindowAttributes", e))?;
            Ok(frame)
        }
    }

    /// Move the frame so its inner edge traces `rect`, and show it.
    pub(crate) fn surround(&self, rect: Rect) -> Result<()> {
        let outer = rect.inflate(FRAME_BORDER);
        unsafe {
            SetWindowPos(
                self.hwnd,
                Some(HWND_TOPMOST),
                outer.left,
                outer.top,
                outer.width(),
                outer.height(),
                SWP_NOACTIVATE | SWP_SHOWWINDOW,
            )
            .map_err(|e| platform_err("SetWindowPos", e))?;
            let _ = InvalidateRect(Some(self.hwnd), None, TRUE);
        }
        Ok(())
    }

    pub(crate) fn set_visible(&self, visible: bool) {
        unsafe {
            let _ = ShowWindow(self.hwnd, if visible { SW_SHOWNOACTIVATE } else { SW_HIDE });
        }
    }
}

impl Drop for FrameWindow {
    fn drop(&mut self) {
        unsafe {
            if IsWindow(Some(self.hwnd)).as_bool() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
        debug!("frame overlay destroyed");
    }
}

unsafe extern "system" fn frame_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_ERASEBKGND => LRESULT(1),
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);

            let mut client = RECT::default();
            let _ = GetClientRect(hwnd, &mut client);

            let border = CreateSolidBrush(FRAME_COLOR);
            FillRect(hdc, &client, border);
            let _ = DeleteObject(border.into());

            let inner = RECT {
                left: client.left + FRAME_BORDER,
                top: client.top + FRAME_BORDER,
                right: client.right - FRAME_BORDER,
                bottom: client.bottom - FRAME_BORDER,
            };
            if inner.right > inner.left && inner.bottom > inner.top {
                let hole = CreateSolidBrush(TRANSPARENT_KEY);
                FillRect(hdc, &inner, hole);
                let _ = DeleteObject(hole.into());
            }

            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Full-screen, semi-transparent shade that receives the mouse while a
/// region is being dragged out.
pub(crate) struct SelectionOverlay {
    hwnd: HWND,
}

impl SelectionOverlay {
    pub(crate) fn create(bounds: Rect) -> Result<Self> {
        let instance = register_class(
            SELECTION_CLASS_NAME,
            SELECTION_SHADE,
            IDC_CROSS,
            Some(selection_window_proc),
        )?;
        unsafe {
            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_LAYERED | WS_EX_TOOLWINDOW,
                SELECTION_CLASS_NAME,
                w!("deskpilot region capture"),
                WS_POPUP,
                bounds.left,
                bounds.top,
                bounds.width(),
                bounds.height(),
                None,
                None,
                Some(instance),
                None,
            )
            .map_err(|e| platform_err("CreateWindowExW", e))?;

            let overlay = Self { hwnd };
            SetLayeredWindowAttributes(hwnd, COLORREF(0), SELECTION_ALPHA, LWA_ALPHA)
                .map_err(|e| platform_err("SetLayeredWindowAttributes", e))?;
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = SetForegroundWindow(hwnd);
            Ok(overlay)
        }
    }

    pub(crate) fn capture_mouse(&self) {
        unsafe {
            SetCapture(self.hwnd);
        }
    }

    pub(crate) fn release_mouse(&self) {
        unsafe {
            let _ = ReleaseCapture();
        }
    }

    pub(crate) fn hide(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }
}

impl Drop for SelectionOverlay {
    fn drop(&mut self) {
        self.release_mouse();
        unsafe {
            if IsWindow(Some(self.hwnd)).as_bool() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
        debug!("selection overlay destroyed");
    }
}

unsafe extern "system" fn selection_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // Closing goes through the owner's Drop, not the system menu.
        WM_CLOSE => LRESULT(0),
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

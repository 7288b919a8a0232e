//! Synthesized mouse and keyboard input.

use crate::errors::{AutomationError, Result};

/// Keys accepted by hotkey steps, named the way flow files spell them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Control,
    Shift,
    Alt,
    Meta,
    Enter,
    Tab,
    Escape,
    Space,
    Backspace,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
    Char(char),
}

pub fn parse_key(name: &str) -> Result<KeyCode> {
    let lower = name.trim().to_lowercase();
    let key = match lower.as_str() {
        "ctrl" | "control" | "ctrlleft" | "ctrlright" => KeyCode::Control,
        "shift" | "shiftleft" | "shiftright" => KeyCode::Shift,
        "alt" | "altleft" | "altright" | "option" => KeyCode::Alt,
        "win" | "winleft" | "winright" | "cmd" | "command" | "super" | "meta" => KeyCode::Meta,
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "esc" | "escape" => KeyCode::Escape,
        "space" => KeyCode::Space,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        other => {
            if let Some(n) = other
                .strip_prefix('f')
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| (1..=12).contains(n))
            {
                KeyCode::F(n)
            } else {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => {
                        return Err(AutomationError::InvalidStep(format!(
                            "unknown key name: {name:?}"
                        )))
                    }
                }
            }
        }
    };
    Ok(key)
}

pub fn parse_chord(keys: &[String]) -> Result<Vec<KeyCode>> {
    keys.iter().map(|k| parse_key(k)).collect()
}

/// Sink for synthesized input. Coordinates are desktop pixels.
pub trait InputSink: Send + Sync {
    fn click(&self, x: i32, y: i32) -> Result<()>;
    fn type_text(&self, text: &str) -> Result<()>;
    /// Press `keys` in order, then release them in reverse order.
    fn chord(&self, keys: &[KeyCode]) -> Result<()>;
}

/// Input through the operating system's event queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeInput;

#[cfg(any(target_os = "windows", target_os = "macos"))]
mod native {
    use super::{InputSink, KeyCode, NativeInput};
    use crate::errors::{AutomationError, Result};
    use enigo::{Direction, Enigo, Key, Keyboard, Settings};
    use tracing::debug;

    fn connect() -> Result<Enigo> {
        Enigo::new(&Settings::default())
            .map_err(|e| AutomationError::PlatformError(format!("input backend unavailable: {e:?}")))
    }

    fn input_err(e: enigo::InputError) -> AutomationError {
        AutomationError::PlatformError(format!("input synthesis failed: {e:?}"))
    }

    fn to_enigo(key: KeyCode) -> Key {
        match key {
            KeyCode::Control => Key::Control,
            KeyCode::Shift => Key::Shift,
            KeyCode::Alt => Key::Alt,
            KeyCode::Meta => Key::Meta,
            KeyCode::Enter => Key::Return,
            KeyCode::Tab => Key::Tab,
            KeyCode::Escape => Key::Escape,
            KeyCode::Space => Key::Space,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::Up => Key::UpArrow,
            KeyCode::Down => Key::DownArrow,
            KeyCode::Left => Key::LeftArrow,
            KeyCode::Right => Key::RightArrow,
            KeyCode::F(n) => match n {
                1 => Key::F1,
                2 => Key::F2,
                3 => Key::F3,
                4 => Key::F4,
                5 => Key::F5,
                6 => Key::F6,
                7 => Key::F7,
                8 => Key::F8,
                9 => Key::F9,
                10 => Key::F10,
                11 => Key::F11,
                _ => Key::F12,
            },
            KeyCode::Char(c) => Key::Unicode(c),
        }
    }

    impl InputSink for NativeInput {
        fn click(&self, x: i32, y: i32) -> Result<()> {
            debug!("click at ({}, {})", x, y);
            #[cfg(target_os = "windows")]
            {
                crate::platforms::windows::input::send_mouse_click(x, y)
            }
            #[cfg(not(target_os = "windows"))]
            {
                use enigo::{Button, Coordinate, Mouse};
                let mut enigo = connect()?;
                enigo.move_mouse(x, y, Coordinate::Abs).map_err(input_err)?;
                enigo
                    .button(Button::Left, Direction::Click)
                    .map_err(input_err)
            }
        }

        fn type_text(&self, text: &str) -> Result<()> {
            if text.is_empty() {
                return Ok(());
            }
            let mut enigo = connect()?;
            enigo.text(text).map_err(input_err)
        }

        fn chord(&self, keys: &[KeyCode]) -> Result<()> {
            let mut enigo = connect()?;
            let mut pressed = Vec::with_capacity(keys.len());
            let mut outcome = Ok(());
            for &key in keys {
                match enigo.key(to_enigo(key), Direction::Press) {
                    Ok(()) => pressed.push(key),
                    Err(e) => {
                        outcome = Err(input_err(e));
                        break;
                    }
                }
            }
            // Release whatever went down, even after a failure.
            for key in pressed.into_iter().rev() {
                let _ = enigo.key(to_enigo(key), Direction::Release);
            }
            outcome
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
impl InputSink for NativeInput {
    fn click(&self, _x: i32, _y: i32) -> Result<()> {
        Err(unsupported())
    }

    fn type_text(&self, _text: &str) -> Result<()> {
        Err(unsupported())
    }

    fn chord(&self, _keys: &[KeyCode]) -> Result<()> {
        Err(unsupported())
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn unsupported() -> AutomationError {
    AutomationError::UnsupportedPlatform(
        "input synthesis is only available on Windows and macOS".to_string(),
    )
}

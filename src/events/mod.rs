use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояние клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
    Repeat,
}

/// Код клавиши (evdev коды)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Имя из карты, если код известен; голый номер не выдаёт себя
        // за несуществующее evdev-имя
        match crate::services::keycode_map::KeycodeMap::get_key_name(self.0) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// Решение по перехваченному событию: поглотить или пробросить дальше.
/// Поглощённое событие никогда не доходит до приложения с фокусом.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecision {
    Absorb,
    PassThrough,
}

/// Событие клавиатуры
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: KeyCode,
    pub state: KeyState,
    pub timestamp: std::time::Instant,
    pub device_name: String,
}

impl KeyEvent {
    pub fn new(key_code: KeyCode, state: KeyState, device_name: String) -> Self {
        Self {
            key_code,
            state,
            timestamp: std::time::Instant::now(),
            device_name,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {:?} ({})",
            self.key_code,
            self.device_name,
            self.state,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// События для виртуальной клавиатуры
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualKeyEvent {
    pub key_code: KeyCode,
    pub state: KeyState,
}

impl VirtualKeyEvent {
    pub fn new(key_code: KeyCode, state: KeyState) -> Self {
        Self { key_code, state }
    }

    #[allow(dead_code)]
    pub fn press(key_code: KeyCode) -> Self {
        Self::new(key_code, KeyState::Pressed)
    }

    #[allow(dead_code)]
    pub fn release(key_code: KeyCode) -> Self {
        Self::new(key_code, KeyState::Released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_code_value() {
        let code = KeyCode::new(52);
        assert_eq!(code.value(), 52);
    }

    #[test]
    fn test_key_code_display_uses_key_name() {
        // Известный код печатается именем клавиши
        assert_eq!(format!("{}", KeyCode::new(52)), "period");
        assert_eq!(format!("{}", KeyCode::new(29)), "leftctrl");
        // Неизвестный - голым номером, без вида evdev-имени
        assert_eq!(format!("{}", KeyCode::new(999)), "#999");
    }

    #[test]
    fn test_virtual_key_event_constructors() {
        let press = VirtualKeyEvent::press(KeyCode::new(30));
        let release = VirtualKeyEvent::release(KeyCode::new(30));

        assert_eq!(press.state, KeyState::Pressed);
        assert_eq!(release.state, KeyState::Released);
        assert_eq!(press.key_code, release.key_code);
    }
}

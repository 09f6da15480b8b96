use crate::events::KeyState;
use evdev::KeyCode as EvdevKey;

/// Состояние модификаторов, отслеживаемое по захваченному потоку событий.
/// Shift - физически удержан (левый и правый раздельно, чтобы инжектор мог
/// временно отпустить и вернуть именно нажатые клавиши), CapsLock -
/// переключён. Снимок читается только в момент коммита буквы, а не при
/// накоплении символов.
#[derive(Debug, Default)]
pub struct ModifierState {
    left_shift: bool,
    right_shift: bool,
    caps_lock: bool,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_key(&mut self, key_code: u16, state: KeyState) {
        let pressed = match state {
            KeyState::Pressed => true,
            KeyState::Released => false,
            KeyState::Repeat => return,
        };

        match EvdevKey::new(key_code) {
            EvdevKey::KEY_LEFTSHIFT => self.left_shift = pressed,
            EvdevKey::KEY_RIGHTSHIFT => self.right_shift = pressed,
            // Тоггл по нажатию; клавиша пробрасывается дальше, поэтому
            // системное состояние CapsLock остаётся синхронным
            EvdevKey::KEY_CAPSLOCK => {
                if pressed {
                    self.caps_lock = !self.caps_lock;
                }
            }
            _ => {}
        }
    }

    /// Засеять тоггл CapsLock фактическим состоянием системы (LED
    /// устройства) при старте; дальше он ведётся по потоку событий
    pub fn set_caps_lock(&mut self, on: bool) {
        self.caps_lock = on;
    }

    pub fn shift_pressed(&self) -> bool {
        self.left_shift || self.right_shift
    }

    pub fn caps_lock_on(&self) -> bool {
        self.caps_lock
    }

    /// Коды физически удержанных Shift-клавиш
    pub fn held_shift_codes(&self) -> Vec<u16> {
        let mut codes = Vec::new();
        if self.left_shift {
            codes.push(EvdevKey::KEY_LEFTSHIFT.code());
        }
        if self.right_shift {
            codes.push(EvdevKey::KEY_RIGHTSHIFT.code());
        }
        codes
    }
}

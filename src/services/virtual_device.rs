use crate::error::{MorseError, Result};
use crate::events::{KeyState, VirtualKeyEvent};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

use super::keyboard_listener::ModifierState;
use super::keycode_map::KeycodeMap;

const KEY_LEFTSHIFT: u16 = 42;

/// Инъекция синтетического ввода: печать символа и проброс перехваченных
/// событий. Доставка не подтверждается - работаем по принципу "отправил и
/// забыл". Трейт позволяет тестировать движок без реального uinput.
pub trait InputInjector: Send + Sync {
    /// Синтезировать пару нажатие+отпускание для символа
    fn inject_char(&self, ch: char) -> Result<()>;

    /// Пробросить перехваченное событие без изменений
    fn forward_key(&self, event: VirtualKeyEvent) -> Result<()>;
}

/// План записи для печати одного символа с учётом состояния модификаторов,
/// действующего на виртуальном устройстве. Модификаторы пробрасываются в то
/// же устройство, поэтому к моменту инъекции CapsLock и физически удержанный
/// Shift уже активны в системе:
///   - для буквы Shift нужен, когда её регистр не совпадает с CapsLock
///     (CapsLock XOR Shift даёт верхний регистр);
///   - физически удержанный Shift временно отпускается, иначе цифра
///     напечатается как символ верхнего ряда, и возвращается после пары.
fn char_key_plan(keycode: u16, ch: char, caps_on: bool, held_shifts: &[u16]) -> Vec<(u16, i32)> {
    let wrap_shift = ch.is_ascii_alphabetic() && (ch.is_ascii_uppercase() ^ caps_on);

    let mut plan = Vec::with_capacity(held_shifts.len() * 2 + 4);
    for &code in held_shifts {
        plan.push((code, 0));
    }
    if wrap_shift {
        plan.push((KEY_LEFTSHIFT, 1));
    }
    plan.push((keycode, 1));
    plan.push((keycode, 0));
    if wrap_shift {
        plan.push((KEY_LEFTSHIFT, 0));
    }
    for &code in held_shifts {
        plan.push((code, 1));
    }
    plan
}

pub struct VirtualDevice {
    device: Option<Mutex<uinput::Device>>,
    device_name: String,
    modifier_state: Arc<RwLock<ModifierState>>,
    dry_run: bool,
}

impl VirtualDevice {
    pub fn new(
        device_name: &str,
        modifier_state: Arc<RwLock<ModifierState>>,
        dry_run: bool,
    ) -> Result<Self> {
        info!("Инициализация VirtualDevice '{}' (dry_run: {})", device_name, dry_run);

        let device = if dry_run {
            None
        } else {
            Some(Mutex::new(Self::create_virtual_device(device_name)?))
        };

        Ok(Self {
            device,
            device_name: device_name.to_string(),
            modifier_state,
            dry_run,
        })
    }

    fn create_virtual_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}' для инъекции клавиш", device_name);

        let virtual_device = uinput::default()?
            .name(device_name)
            .map_err(|e| MorseError::Internal(format!("Не удалось задать имя устройства '{}': {}", device_name, e)))?
            .event(uinput::event::Keyboard::All)
            .map_err(|e| MorseError::Internal(format!("Не удалось объявить клавиатурные события: {}", e)))?
            .create()
            .map_err(|e| MorseError::Internal(format!("Не удалось создать виртуальное устройство '{}': {}", device_name, e)))?;

        info!("Виртуальное устройство '{}' создано успешно", device_name);
        Ok(virtual_device)
    }

    /// Отправить одно событие клавиши и SYN-синхронизацию
    fn write_key(&self, keycode: u16, value: i32) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| MorseError::Internal("Виртуальное устройство недоступно".to_string()))?;

        let mut device = device.lock();

        // Отправляем событие клавиши (EV_KEY)
        if let Err(e) = device.write(1, keycode as i32, value) {
            return Err(MorseError::Internal(format!(
                "Не удалось отправить событие клавиши {}: {}",
                keycode, e
            )));
        }

        // Синхронизируем события (EV_SYN)
        if let Err(e) = device.write(0, 0, 0) {
            return Err(MorseError::Internal(format!(
                "Не удалось синхронизировать события: {}",
                e
            )));
        }

        Ok(())
    }
}

impl InputInjector for VirtualDevice {
    fn inject_char(&self, ch: char) -> Result<()> {
        let keycode = KeycodeMap::keycode_for_char(ch).ok_or_else(|| {
            MorseError::Internal(format!("Нет кода клавиши для символа {:?}", ch))
        })?;

        if self.dry_run {
            info!("[DRY RUN] Печать символа {:?} через '{}'", ch, self.device_name);
            return Ok(());
        }

        let (caps_on, held_shifts) = {
            let modifiers = self.modifier_state.read();
            (modifiers.caps_lock_on(), modifiers.held_shift_codes())
        };

        debug!(
            "Печать символа {:?} (код {}, caps: {}, удержан shift: {})",
            ch,
            keycode,
            caps_on,
            !held_shifts.is_empty()
        );

        for (code, value) in char_key_plan(keycode, ch, caps_on, &held_shifts) {
            self.write_key(code, value)?;
        }

        Ok(())
    }

    fn forward_key(&self, event: VirtualKeyEvent) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] Виртуальное событие: {:?}", event);
            return Ok(());
        }

        debug!("Проброс виртуального события: {:?}", event);

        let value = match event.state {
            KeyState::Pressed => 1,
            KeyState::Released => 0,
            KeyState::Repeat => 2,
        };

        self.write_key(event.key_code.value(), value)?;

        debug!("Виртуальное событие {} отправлено", event.key_code);
        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if !self.dry_run {
            info!("Закрытие виртуального устройства");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_E: u16 = 18;
    const KEY_7: u16 = 8;
    const KEY_SPACE: u16 = 57;
    const KEY_RIGHTSHIFT: u16 = 54;

    #[test]
    fn test_plan_uppercase_with_caps_off_wraps_shift() {
        let plan = char_key_plan(KEY_E, 'E', false, &[]);
        assert_eq!(
            plan,
            vec![(KEY_LEFTSHIFT, 1), (KEY_E, 1), (KEY_E, 0), (KEY_LEFTSHIFT, 0)]
        );
    }

    #[test]
    fn test_plan_uppercase_with_caps_on_needs_no_shift() {
        // CapsLock уже активен в системе - дополнительный Shift дал бы
        // нижний регистр
        let plan = char_key_plan(KEY_E, 'E', true, &[]);
        assert_eq!(plan, vec![(KEY_E, 1), (KEY_E, 0)]);
    }

    #[test]
    fn test_plan_lowercase_with_caps_on_wraps_shift() {
        // Shift компенсирует CapsLock: caps XOR shift -> нижний регистр
        let plan = char_key_plan(KEY_E, 'e', true, &[]);
        assert_eq!(
            plan,
            vec![(KEY_LEFTSHIFT, 1), (KEY_E, 1), (KEY_E, 0), (KEY_LEFTSHIFT, 0)]
        );
    }

    #[test]
    fn test_plan_digit_releases_held_shift_and_restores() {
        // Иначе вместо "7" напечатается "&"
        let plan = char_key_plan(KEY_7, '7', false, &[KEY_RIGHTSHIFT]);
        assert_eq!(
            plan,
            vec![(KEY_RIGHTSHIFT, 0), (KEY_7, 1), (KEY_7, 0), (KEY_RIGHTSHIFT, 1)]
        );
    }

    #[test]
    fn test_plan_digit_ignores_caps_lock() {
        let plan = char_key_plan(KEY_7, '7', true, &[]);
        assert_eq!(plan, vec![(KEY_7, 1), (KEY_7, 0)]);
    }

    #[test]
    fn test_plan_letter_with_held_shift_and_caps() {
        // Удержанный Shift отпущен, CapsLock компенсируется обёрткой
        let plan = char_key_plan(KEY_E, 'e', true, &[KEY_LEFTSHIFT]);
        assert_eq!(
            plan,
            vec![
                (KEY_LEFTSHIFT, 0),
                (KEY_LEFTSHIFT, 1),
                (KEY_E, 1),
                (KEY_E, 0),
                (KEY_LEFTSHIFT, 0),
                (KEY_LEFTSHIFT, 1),
            ]
        );
    }

    #[test]
    fn test_plan_space_is_plain_pair() {
        let plan = char_key_plan(KEY_SPACE, ' ', false, &[]);
        assert_eq!(plan, vec![(KEY_SPACE, 1), (KEY_SPACE, 0)]);
    }
}

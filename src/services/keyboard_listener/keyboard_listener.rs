use crate::config::Config;
use crate::error::{MorseError, Result};
use crate::events::{KeyCode, KeyDecision, KeyEvent, KeyState, VirtualKeyEvent};
use crate::morse::MorseEngine;
use crate::services::virtual_device::InputInjector;
use crate::utils::DeviceFinder;
use evdev::{Device, EventType};
use parking_lot::RwLock;
use std::io::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::modifier_state::ModifierState;
use super::r#trait::KeyboardListenerTrait;

pub struct RealKeyboardListener {
    config: Arc<Config>,
    engine: Arc<MorseEngine>,
    injector: Arc<dyn InputInjector>,
    modifier_state: Arc<RwLock<ModifierState>>,
    running: Arc<AtomicBool>,
    device: Device,
}

impl RealKeyboardListener {
    pub fn new(
        config: Arc<Config>,
        engine: Arc<MorseEngine>,
        injector: Arc<dyn InputInjector>,
        modifier_state: Arc<RwLock<ModifierState>>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        info!("Инициализация RealKeyboardListener");

        let device_path = DeviceFinder::find_keyboard_device(&config.input.device_path)?;

        let mut device = Device::open(&device_path).map_err(|e| {
            MorseError::DeviceNotFound(format!(
                "Не удалось открыть устройство {:?}: {}",
                device_path, e
            ))
        })?;

        // Захват неудался - фатально: без эксклюзивного перехвата
        // события нельзя ни поглощать, ни классифицировать
        match device.grab() {
            Ok(_) => Self::log_grabbed_device(&mut device),
            Err(e) => {
                Self::log_grab_error(device_path, &e);
                return Err(MorseError::Permission(
                    format!("Не удалось захватить устройство эксклюзивно: {}. Device busy - скорее всего используется X11/Wayland", e)
                ));
            }
        }

        // Тоггл CapsLock засевается фактическим состоянием системы,
        // иначе до первого нажатия CapsLock регистр букв инвертирован
        match device.get_led_state() {
            Ok(leds) => {
                let caps_on = leds.contains(evdev::LedCode::LED_CAPSL);
                modifier_state.write().set_caps_lock(caps_on);
                info!("Начальное состояние CapsLock: {}", caps_on);
            }
            Err(e) => warn!("Не удалось прочитать LED устройства: {}", e),
        }

        Ok(Self {
            config,
            engine,
            injector,
            modifier_state,
            running,
            device,
        })
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("RealKeyboardListener запущен, начинаем чтение событий");

        let keys = self.config.resolved();
        info!(
            "Перехватываем: точка {}, тире {}, коммит {:?}, выход {}",
            keys.dot, keys.dash, keys.commit, keys.exit
        );

        while self.running.load(Ordering::SeqCst) {
            // Обработка событий клавиатуры (неблокирующая)
            let events_vec = match self.device.fetch_events() {
                Ok(events) => events.collect::<Vec<_>>(),
                Err(e) => {
                    error!("Ошибка чтения событий: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                    continue;
                }
            };

            for event in events_vec {
                if let Err(e) = self.handle_event(event) {
                    error!("Ошибка обработки события: {}", e);
                }
            }

            // Небольшая задержка для предотвращения 100% загрузки CPU
            tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
        }

        info!("Цикл чтения событий остановлен");
        Ok(())
    }

    /// Синхронная обработка одного события: классификация и решение
    /// движка, затем проброс всего, что не было поглощено. Блокировать
    /// здесь нельзя - задержка останавливает доставку всей клавиатуры.
    fn handle_event(&mut self, event: evdev::InputEvent) -> Result<()> {
        if event.event_type() != EventType::KEY {
            debug!("Проброс не-клавиатурного события: {:?}", event);
            return Ok(());
        }

        let key_code = event.code();
        let key_state = match event.value() {
            0 => KeyState::Released,
            1 => KeyState::Pressed,
            2 => KeyState::Repeat,
            _ => {
                debug!("Неизвестное значение события: {}", event.value());
                return Ok(());
            }
        };

        {
            let mut modifier_state = self.modifier_state.write();
            modifier_state.update_key(key_code, key_state);
        }

        let key_event = KeyEvent::new(
            KeyCode(key_code),
            key_state,
            self.device.name().unwrap_or("Unknown").to_string(),
        );

        debug!("Событие клавиши: {}", key_event);

        match self.engine.handle_key_event(&key_event) {
            KeyDecision::Absorb => {
                debug!("Событие {} поглощено", key_event.key_code);
            }
            KeyDecision::PassThrough => {
                self.passthrough_event(&key_event)?;
            }
        }

        Ok(())
    }

    /// Устройство захвачено эксклюзивно, поэтому всё непоглощённое
    /// нужно переинъецировать через виртуальную клавиатуру
    fn passthrough_event(&self, key_event: &KeyEvent) -> Result<()> {
        let virtual_event = VirtualKeyEvent::new(key_event.key_code, key_event.state);

        if let Err(e) = self.injector.forward_key(virtual_event) {
            debug!(
                "Не удалось пробросить событие для клавиши {}: {}",
                key_event.key_code.value(),
                e
            );
        }

        Ok(())
    }

    fn log_grabbed_device(device: &mut Device) {
        info!("Устройство: {}", device.name().unwrap_or("Unknown"));
        info!("Физический путь: {:?}", device.physical_path());
        info!("Уникальный ID: {:?}", device.unique_name());
        info!("Устройство захвачено эксклюзивно");
    }

    fn log_grab_error(device_path: PathBuf, e: &Error) {
        warn!(
            "Не удалось захватить устройство {}: {}",
            device_path.display(),
            e
        );
        warn!("Попробуйте:");
        warn!("1. Закрыть X11/Wayland сессию и запустить из консоли");
        warn!("2. Добавить пользователя в группу input: sudo usermod -a -G input $USER");
        warn!("3. Перезайти в систему после добавления в группу");
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for RealKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

impl Drop for RealKeyboardListener {
    fn drop(&mut self) {
        info!("Освобождение захваченного устройства");
        if let Err(e) = self.device.ungrab() {
            error!("Не удалось освободить устройство: {}", e);
        }
    }
}

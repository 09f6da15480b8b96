use crate::error::{MorseError, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tracing::{info, warn};

/// Проверить права доступа к необходимым ресурсам до запуска сервисов
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    // Чтение событий: /dev/input/
    check_input_devices_access()?;

    // Инъекция ввода: /dev/uinput
    check_uinput_access()?;

    // Рекомендация безопасности: не запускаться от root
    check_not_root();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access() -> Result<()> {
    let input_dir = "/dev/input";

    if !std::path::Path::new(input_dir).exists() {
        return Err(MorseError::Permission(
            format!("Директория {} не существует", input_dir)
        ));
    }

    match fs::read_dir(input_dir) {
        Ok(_) => {
            info!("Доступ к {} подтвержден", input_dir);
            Ok(())
        }
        Err(e) => {
            Err(MorseError::Permission(
                format!("Нет доступа к {}: {}. Добавьте пользователя в группу 'input'", input_dir, e)
            ))
        }
    }
}

fn check_uinput_access() -> Result<()> {
    let uinput_device = "/dev/uinput";

    if !std::path::Path::new(uinput_device).exists() {
        warn!("{} не существует, возможно модуль uinput не загружен", uinput_device);
        return Ok(()); // Модуль может быть загружен позже, создание устройства упадёт само
    }

    match fs::metadata(uinput_device) {
        Ok(metadata) => {
            let permissions = metadata.permissions();
            let mode = permissions.mode();

            if mode & 0o006 == 0 && mode & 0o060 == 0 {
                return Err(MorseError::Permission(
                    format!("Нет прав доступа к {}. Добавьте пользователя в группу 'uinput' или 'input'", uinput_device)
                ));
            }

            info!("Доступ к {} подтвержден", uinput_device);
            Ok(())
        }
        Err(e) => {
            Err(MorseError::Permission(
                format!("Не удалось проверить права доступа к {}: {}", uinput_device, e)
            ))
        }
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Рекомендуется добавить пользователя в группы 'input' и 'uinput'");
            warn!("   и запускать приложение от имени обычного пользователя:");
            warn!("   sudo usermod -a -G input,uinput $USER");
            warn!("   sudo modprobe uinput");
            warn!("   (затем перезайдите в систему)");
        }
        Ok(user) => {
            info!("Приложение запущено от имени пользователя: {}", user);
        }
        Err(_) => {
            warn!("Не удалось определить пользователя");
        }
    }
}

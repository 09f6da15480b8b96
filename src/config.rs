use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::events::KeyCode;
use crate::services::keycode_map::KeycodeMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub keys: KeysConfig,
    pub decode: DecodeConfig,
    // Разрешённые коды клавиш - не сериализуются, строятся после загрузки
    #[serde(skip)]
    resolved: ResolvedKeys,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    pub device_path: String,
}

/// Имена клавиш (см. KeycodeMap)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeysConfig {
    pub dot: String,
    pub dash: String,
    /// Клавиша немедленного коммита; None - только по таймауту
    #[serde(default)]
    pub commit: Option<String>,
    pub exit: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecodeConfig {
    /// "tap" - символ по клавише; "duration" - символ по длительности удержания
    pub mode: String,
    pub dash_threshold_ms: u64,
    pub letter_timeout_ms: u64,
    pub word_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

/// Политика классификации символа
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Tap,
    Duration,
}

/// Коды клавиш, разрешённые из имён после загрузки конфигурации
#[derive(Debug, Clone)]
pub struct ResolvedKeys {
    pub dot: KeyCode,
    pub dash: KeyCode,
    pub commit: Option<KeyCode>,
    pub exit: KeyCode,
    pub mode: DecodeMode,
}

impl Default for ResolvedKeys {
    fn default() -> Self {
        Self {
            dot: KeyCode::new(0),
            dash: KeyCode::new(0),
            commit: None,
            exit: KeyCode::new(0),
            mode: DecodeMode::Tap,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                filter: "morsekey=info".to_string(),
            },
            input: InputConfig {
                device_path: "auto".to_string(),
            },
            keys: KeysConfig {
                dot: "period".to_string(),
                dash: "minus".to_string(),
                commit: Some("leftctrl".to_string()),
                exit: "esc".to_string(),
            },
            decode: DecodeConfig {
                mode: "tap".to_string(),
                dash_threshold_ms: 300,
                letter_timeout_ms: 700,
                word_timeout_ms: 1400,
                poll_interval_ms: 80,
            },
            resolved: ResolvedKeys::default(),
        };
        config
            .resolve_keys()
            .expect("ключи конфигурации по умолчанию всегда разрешимы");
        config
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("MORSEKEY_"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.resolve_keys()?;

        Ok(config)
    }

    /// Разрешает имена клавиш в evdev-коды для горячего пути
    pub fn resolve_keys(&mut self) -> Result<()> {
        let resolve = |name: &str| -> Result<KeyCode> {
            KeycodeMap::get_keycode(name)
                .map(KeyCode::new)
                .map_err(|e| anyhow::anyhow!("Неразрешимая клавиша в конфигурации: {}", e))
        };

        let mode = match self.decode.mode.as_str() {
            "tap" => DecodeMode::Tap,
            "duration" => DecodeMode::Duration,
            other => anyhow::bail!("Неверный режим декодирования: {}", other),
        };

        self.resolved = ResolvedKeys {
            dot: resolve(&self.keys.dot)?,
            dash: resolve(&self.keys.dash)?,
            commit: self
                .keys
                .commit
                .as_deref()
                .map(resolve)
                .transpose()?,
            exit: resolve(&self.keys.exit)?,
            mode,
        };

        Ok(())
    }

    pub fn resolved(&self) -> &ResolvedKeys {
        &self.resolved
    }

    pub fn dash_threshold(&self) -> Duration {
        Duration::from_millis(self.decode.dash_threshold_ms)
    }

    pub fn letter_timeout(&self) -> Duration {
        Duration::from_millis(self.decode.letter_timeout_ms)
    }

    pub fn word_timeout(&self) -> Duration {
        Duration::from_millis(self.decode.word_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.decode.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация режима декодирования
        match self.decode.mode.as_str() {
            "tap" | "duration" => {}
            _ => anyhow::bail!("Неверный режим декодирования: {}", self.decode.mode),
        }

        // Валидация порогов сегментации
        if self.decode.dash_threshold_ms == 0 {
            anyhow::bail!("dash_threshold_ms должно быть больше 0");
        }

        if self.decode.letter_timeout_ms >= self.decode.word_timeout_ms {
            anyhow::bail!(
                "letter_timeout_ms ({}) должно быть меньше word_timeout_ms ({})",
                self.decode.letter_timeout_ms,
                self.decode.word_timeout_ms
            );
        }

        // Интервал опроса должен быть заметно меньше letter_timeout,
        // иначе задержка коммита становится видимой пользователю
        if self.decode.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms должно быть больше 0");
        }

        if self.decode.poll_interval_ms * 2 > self.decode.letter_timeout_ms {
            anyhow::bail!(
                "poll_interval_ms ({}) слишком велик относительно letter_timeout_ms ({})",
                self.decode.poll_interval_ms,
                self.decode.letter_timeout_ms
            );
        }

        // Валидация клавиш
        if self.keys.dot.is_empty() || self.keys.dash.is_empty() || self.keys.exit.is_empty() {
            anyhow::bail!("Имена клавиш не могут быть пустыми");
        }

        if self.keys.dot == self.keys.dash {
            anyhow::bail!(
                "Клавиши точки и тире должны различаться: {}",
                self.keys.dot
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_resolved_keys() {
        let config = Config::default();
        let resolved = config.resolved();

        assert_eq!(resolved.dot.value(), 52); // KEY_DOT
        assert_eq!(resolved.dash.value(), 12); // KEY_MINUS
        assert_eq!(resolved.commit.map(|k| k.value()), Some(29)); // KEY_LEFTCTRL
        assert_eq!(resolved.exit.value(), 1); // KEY_ESC
        assert_eq!(resolved.mode, DecodeMode::Tap);
    }

    #[test]
    fn test_validate_rejects_equal_keys() {
        let mut config = Config::default();
        config.keys.dash = "period".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_timeouts() {
        let mut config = Config::default();
        config.decode.letter_timeout_ms = 1400;
        config.decode.word_timeout_ms = 700;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_coarse_polling() {
        let mut config = Config::default();
        config.decode.poll_interval_ms = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_keys_duration_mode() {
        let mut config = Config::default();
        config.decode.mode = "duration".to_string();
        config.keys.commit = None;

        config.resolve_keys().unwrap();

        assert_eq!(config.resolved().mode, DecodeMode::Duration);
        assert!(config.resolved().commit.is_none());
    }

    #[test]
    fn test_resolve_keys_rejects_unknown_name() {
        let mut config = Config::default();
        config.keys.dot = "no_such_key".to_string();
        assert!(config.resolve_keys().is_err());
    }
}

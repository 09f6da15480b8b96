use crate::config::Config;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::r#trait::KeyboardListenerTrait;

pub struct DryRunKeyboardListener {
    config: Arc<Config>,
    running: Arc<AtomicBool>,
}

impl DryRunKeyboardListener {
    pub fn new(config: Arc<Config>, running: Arc<AtomicBool>) -> Result<Self> {
        info!("Инициализация DryRunKeyboardListener");
        Ok(Self { config, running })
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - KeyboardListener работает в режиме эмуляции");
        info!(
            "Режим декодирования: {}, точка: {}, тире: {} (dry-run)",
            self.config.decode.mode, self.config.keys.dot, self.config.keys.dash
        );

        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
            debug!("KeyboardListener работает в dry-run режиме");
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for DryRunKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

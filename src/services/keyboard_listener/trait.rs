use crate::config::Config;
use crate::error::Result;
use crate::morse::MorseEngine;
use crate::services::virtual_device::InputInjector;
use parking_lot::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::modifier_state::ModifierState;

/// Trait for keyboard listeners that can run in different modes
#[async_trait::async_trait]
pub trait KeyboardListenerTrait {
    /// Run the keyboard listener
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate keyboard listener based on the dry_run flag
pub fn create_keyboard_listener(
    config: Arc<Config>,
    engine: Arc<MorseEngine>,
    injector: Arc<dyn InputInjector>,
    modifier_state: Arc<RwLock<ModifierState>>,
    running: Arc<AtomicBool>,
    dry_run: bool,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_keyboard_listener::DryRunKeyboardListener::new(
            config,
            running,
        )?))
    } else {
        Ok(Box::new(super::keyboard_listener::RealKeyboardListener::new(
            config,
            engine,
            injector,
            modifier_state,
            running,
        )?))
    }
}

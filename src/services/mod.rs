pub mod keyboard_listener;
pub mod keycode_map;
pub mod virtual_device;

pub use keyboard_listener::{create_keyboard_listener, ModifierState};
pub use virtual_device::{InputInjector, VirtualDevice};

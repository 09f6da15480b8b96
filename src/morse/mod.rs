pub mod engine;
pub mod state;
pub mod table;

pub use engine::MorseEngine;

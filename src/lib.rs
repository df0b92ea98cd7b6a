pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod loader;
pub mod maze;
pub mod notify;
pub mod replay;
pub mod runtime;
pub mod types;
pub mod world;

pub use config::{GameConfig, MapSource};
pub use engine::GameEngine;
pub use error::{GameError, GameResult};
pub use runtime::{GameHandle, GameRuntime};

pub mod blank;
pub mod client;
pub mod config;
pub mod demo;
pub mod error;
pub mod http;
pub mod producer;
pub mod refresh;
pub mod registry;
pub mod server;
pub mod snapshot;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use producer::FrameSlot;
pub use server::Server;

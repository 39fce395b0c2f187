pub mod agent;
pub mod auth;
pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod enforcer;
pub mod error;
pub mod heating;
pub mod monitor;
pub mod sensor;
pub mod state;

// Re-export commonly used items
pub use agent::Agent;
pub use config::Config;
pub use error::{AppError, Result};

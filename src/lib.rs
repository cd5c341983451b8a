pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod parser;
pub mod state;

pub use core::schema::{ExecutionStatus, Status};
pub use error::{Error, Result};
pub use state::StatusManager;

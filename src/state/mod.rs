//! Status store: persistence, migration, and read-only queries.

pub mod manager;
pub mod migration;
pub mod query;

pub use manager::StatusManager;
pub use query::{JobRef, ModuleSummary, Summary};

pub mod catalog;
pub mod config;
pub mod constants;
pub mod executor;
pub mod lock;
pub mod notifier;
pub mod probe;
pub mod status;
pub mod workflow;
pub mod error;

pub use error::{Result, RestoreError};

pub mod action;
pub mod action_log;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod executor;
pub mod io;
pub mod outbox;
pub mod paths;
pub mod prompt;
pub mod response;
pub mod seed;
pub mod store;
pub mod types;

pub use error::{DealerError, Result};

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod features;
pub mod reconcile;
pub mod scheduler;
pub mod sync;
pub mod understat;

pub use error::{Error, Result};

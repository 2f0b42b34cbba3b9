pub mod client;
pub mod types;

pub use client::{is_valid_season, FetchBatch, UnderstatClient};
pub use types::{FixtureRecord, ResultRecord};

pub mod config;
pub mod export;
pub mod query;
pub mod record;
pub mod report;
pub mod verify;

mod dates;

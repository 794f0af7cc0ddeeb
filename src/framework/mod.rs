pub mod config;
pub use config::Config;

pub mod data;
pub use data::{Error as DataError, PoiseData};

pub mod db;
pub mod event_handler;
pub mod logging;
pub mod poise;

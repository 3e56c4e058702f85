pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod roster;
pub mod service;
pub mod simulator;

pub use error::{AppError, Result};
pub use export::export_to_csv;
pub use simulator::simulate_attendance;

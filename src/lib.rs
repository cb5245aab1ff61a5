pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod network;
pub mod session;
pub mod simulator;
pub mod trade;
pub mod utils;
pub mod view;

pub use config::Config;
pub use error::RunError;

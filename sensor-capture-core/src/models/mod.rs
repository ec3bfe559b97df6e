pub mod capture_report;
pub mod config;
pub mod error;
pub mod sensor_models;
pub mod state;

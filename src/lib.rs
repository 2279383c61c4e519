//! Root library crate: wires together the `experimenter-*` workspace
//! members behind one `AppError` and one `AppConfig`.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::AppError;

//! # FormScout Config
//!
//! Configuration management for the FormScout crawler.

mod backoff;
mod error;
mod loader;
mod schema;
mod validator;

pub use backoff::Backoff;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};

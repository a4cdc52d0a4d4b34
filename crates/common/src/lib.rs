//! Shared utilities, configuration, and error handling for Colloquy
//!
//! This crate provides common functionality used across the Colloquy workspace:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - State-machine error support

pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub use config::{Config, TableConfig};
pub use db::map_constraint_violation;
pub use error::{Error, Result};
pub use state::StateError;

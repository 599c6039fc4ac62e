//! Psamathe Settings Crate
//!
//! Handles controller configuration and persistence.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, MotionSettings, TableSettings};
pub use error::{Result, SettingsError};

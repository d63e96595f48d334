//! Configuration module for the m4b conversion engine
//!
//! Handles loading configuration from TOML files and environment variable overrides.

pub mod config;

pub use config::*;

//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory, falls back to defaults on first run, and
//! converts the file settings into the policy types the application layer
//! understands.

pub mod config;

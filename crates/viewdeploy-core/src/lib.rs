//! viewdeploy core
//!
//! Deployment configuration shared by the tools: target environments, their
//! connection settings and the schema names substituted into SQL text.

pub mod config;
pub mod substitute;

pub use config::{Config, ConfigError, Environment, EnvironmentConfig, DEFAULT_SCHEMAS};
pub use substitute::SchemaSubstitution;

// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod link;

// Re-export all public types
pub use config::{
    Config, MailConfig, MatcherConfig, PollConfig, ServerConfig, SourceConfig, StorageBackend,
    StorageConfig,
};
pub use link::{Link, LinkRecord};

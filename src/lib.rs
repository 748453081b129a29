// src/lib.rs

//! hnwatch: Hacker News keyword watcher

pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod utils;

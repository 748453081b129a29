//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listing page and scraping settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Title keywords
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Notification mail settings
    #[serde(default)]
    pub mail: MailConfig,

    /// Dedup store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP trigger endpoint
    #[serde(default)]
    pub server: ServerConfig,

    /// Poll cycle behavior
    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.url)
            .map_err(|e| AppError::validation(format!("source.url: {e}")))?;
        url::Url::parse(&self.source.base_url)
            .map_err(|e| AppError::validation(format!("source.base_url: {e}")))?;
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.item_href_prefix.is_empty() {
            return Err(AppError::validation("source.item_href_prefix is empty"));
        }

        if self.matcher.keywords.is_empty() {
            return Err(AppError::validation("No keywords defined"));
        }
        // Tokens are stripped to letters before comparison, so anything
        // else in a keyword could never match.
        for keyword in &self.matcher.keywords {
            if keyword.is_empty() || !keyword.chars().all(char::is_alphabetic) {
                return Err(AppError::validation(format!(
                    "keyword {keyword:?} must be a non-empty run of letters"
                )));
            }
        }

        for (field, address) in [
            ("mail.sender", &self.mail.sender),
            ("mail.recipient", &self.mail.recipient),
        ] {
            if !address.contains('@') {
                return Err(AppError::validation(format!(
                    "{field} is not an email address: {address:?}"
                )));
            }
        }
        url::Url::parse(&self.mail.api_url)
            .map_err(|e| AppError::validation(format!("mail.api_url: {e}")))?;

        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.trim().is_empty() {
            return Err(AppError::validation("storage.bucket is required for s3"));
        }
        Ok(())
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("HNWATCH_MAIL_TOKEN") {
            if !token.trim().is_empty() {
                self.mail.api_token = Some(token);
            }
        }
        if let Ok(bind) = std::env::var("HNWATCH_BIND") {
            self.server.bind = bind;
        }
        if let Ok(dir) = std::env::var("HNWATCH_STORAGE_DIR") {
            self.storage.dir = dir;
        }
        if let Ok(bucket) = std::env::var("S3_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Ok(prefix) = std::env::var("S3_PREFIX") {
            self.storage.prefix = prefix;
        }
    }
}

/// Where and how the listing is fetched and scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page polled on every cycle
    #[serde(default = "defaults::source_url")]
    pub url: String,

    /// Base for discussion URLs and relative story links
    #[serde(default = "defaults::source_url")]
    pub base_url: String,

    /// Selector for story title anchors
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// Href prefix identifying a discussion-item reference
    #[serde(default = "defaults::item_href_prefix")]
    pub item_href_prefix: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::source_url(),
            base_url: defaults::source_url(),
            title_selector: defaults::title_selector(),
            item_href_prefix: defaults::item_href_prefix(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Case-insensitive whole-token keywords
    #[serde(default = "defaults::keywords")]
    pub keywords: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            keywords: defaults::keywords(),
        }
    }
}

/// Notification mail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "defaults::mail_address")]
    pub sender: String,

    #[serde(default = "defaults::mail_address")]
    pub recipient: String,

    /// Prepended to the story title
    #[serde(default = "defaults::subject_prefix")]
    pub subject_prefix: String,

    /// Plain-text body; `{title}`, `{url}` and `{item_url}` are substituted
    #[serde(default = "defaults::body_template")]
    pub body_template: String,

    /// Postmark-compatible send endpoint
    #[serde(default = "defaults::mail_api_url")]
    pub api_url: String,

    /// Server token; without one, messages are only logged
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: defaults::mail_address(),
            recipient: defaults::mail_address(),
            subject_prefix: defaults::subject_prefix(),
            body_template: defaults::body_template(),
            api_url: defaults::mail_api_url(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::storage_dir")]
    pub dir: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default = "defaults::s3_prefix")]
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: defaults::storage_dir(),
            bucket: String::new(),
            prefix: defaults::s3_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::bind")]
    pub bind: String,

    /// Built-in trigger period; unset leaves polling to an external scheduler
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
            poll_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollConfig {
    /// Abort the cycle on the first claim failure instead of continuing
    #[serde(default)]
    pub fail_fast: bool,
}

mod defaults {
    pub fn source_url() -> String {
        "https://news.ycombinator.com/".into()
    }
    pub fn title_selector() -> String {
        "td.title > a, span.titleline > a".into()
    }
    pub fn item_href_prefix() -> String {
        "item?id=".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; hnwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn keywords() -> Vec<String> {
        vec!["go".into(), "golang".into(), "google".into()]
    }

    pub fn mail_address() -> String {
        "hnwatch@localhost".into()
    }
    pub fn subject_prefix() -> String {
        "HN: ".into()
    }
    pub fn body_template() -> String {
        "\nA new item has appeared on Hacker News.\n\nTitle: {title}\nURL: {url}\nDiscussion: {item_url}\n"
            .into()
    }
    pub fn mail_api_url() -> String {
        "https://api.postmarkapp.com/email".into()
    }

    pub fn storage_dir() -> String {
        "storage".into()
    }
    pub fn s3_prefix() -> String {
        "hnwatch".into()
    }

    pub fn bind() -> String {
        "127.0.0.1:8080".into()
    }
}

//! Link data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A story discovered on the listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    /// Story title as shown on the listing
    pub title: String,

    /// External target the story points to
    pub url: String,

    /// Discussion page on the aggregator (the dedup key)
    pub item_url: String,
}

impl Link {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        item_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            item_url: item_url.into(),
        }
    }

    /// Key under which this link is claimed.
    pub fn key(&self) -> &str {
        &self.item_url
    }
}

/// Persisted "seen" marker. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkRecord {
    #[serde(flatten)]
    pub link: Link,

    /// When the claim succeeded
    pub seen_at: DateTime<Utc>,
}

impl LinkRecord {
    pub fn new(link: Link) -> Self {
        Self {
            link,
            seen_at: Utc::now(),
        }
    }
}

// src/listing.rs

//! Listing page scanning.
//!
//! The site-specific layout lives behind [`ListingFormat`]; everything
//! downstream only sees owned [`Link`]s.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::matcher::TitleMatcher;
use crate::models::{Link, SourceConfig};
use crate::utils::resolve;

/// Layout knowledge for one listing source.
pub trait ListingFormat: Send + Sync {
    /// Story title anchors, in page order.
    fn entries<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>>;

    /// Canonical discussion URL for an entry.
    fn item_url(&self, entry: ElementRef<'_>) -> Option<String>;

    /// External target of an entry, absolute.
    fn story_url(&self, entry: ElementRef<'_>) -> String;
}

/// Hacker News front page layout.
///
/// Each story is a `tr` holding the title anchor, followed by a sibling
/// `tr` whose links include `item?id=N` for the discussion page.
#[derive(Debug, Clone)]
pub struct HackerNewsListing {
    base_url: String,
    title_selector: String,
    item_href_prefix: String,
}

impl HackerNewsListing {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            title_selector: config.title_selector.clone(),
            item_href_prefix: config.item_href_prefix.clone(),
        }
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    fn join_base(&self, href: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), href)
    }
}

impl ListingFormat for HackerNewsListing {
    fn entries<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>> {
        let title_sel = Self::parse_selector(&self.title_selector)?;
        Ok(document.select(&title_sel).collect())
    }

    fn item_url(&self, entry: ElementRef<'_>) -> Option<String> {
        let row = entry
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "tr")?;
        let next_row = row.next_siblings().find_map(ElementRef::wrap)?;

        // The subtext row links the item several times (age, comments);
        // any of them will do, the last one wins.
        let anchor_sel = Selector::parse("a[href]").ok()?;
        next_row
            .select(&anchor_sel)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.starts_with(&self.item_href_prefix))
            .last()
            .map(|href| self.join_base(href))
    }

    fn story_url(&self, entry: ElementRef<'_>) -> String {
        let href = entry.value().attr("href").unwrap_or("");
        resolve(&self.base_url, href).unwrap_or_else(|| href.to_string())
    }
}

/// Outcome of scanning one listing page.
#[derive(Debug, Default)]
pub struct ListingScan {
    /// Title anchors found
    pub entries: usize,
    /// Matched stories with a discussion URL, in page order
    pub matches: Vec<Link>,
    /// Matched stories with no discussion URL
    pub skipped: usize,
}

/// Classify every entry and extract the matched ones.
///
/// Synchronous on purpose: the parsed document must not live across an
/// `.await`.
pub fn scan_listing(
    format: &dyn ListingFormat,
    matcher: &TitleMatcher,
    html: &str,
) -> Result<ListingScan> {
    let document = Html::parse_document(html);
    let entries = format.entries(&document)?;

    let mut scan = ListingScan {
        entries: entries.len(),
        ..ListingScan::default()
    };

    for entry in entries {
        let title = entry.text().collect::<String>().trim().to_string();
        let Some(keyword) = matcher.matching_keyword(&title) else {
            continue;
        };
        debug!(%title, keyword, "Title matched");

        match format.item_url(entry) {
            Some(item_url) => {
                let url = format.story_url(entry);
                scan.matches.push(Link::new(title, url, item_url));
            }
            None => {
                warn!(%title, "Matched story has no discussion link, skipping");
                scan.skipped += 1;
            }
        }
    }

    Ok(scan)
}

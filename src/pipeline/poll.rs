// src/pipeline/poll.rs

//! One poll cycle: fetch, scan, claim, notify.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::error::{PollError, Result};
use crate::listing::{HackerNewsListing, ListingFormat, scan_listing};
use crate::matcher::TitleMatcher;
use crate::models::Config;
use crate::notify::{Notifier, NotifyQueue};
use crate::storage::{DedupStore, open_store};
use crate::utils::http::{create_async_client, fetch_page_async};

/// Summary of a poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Title anchors on the page
    pub entries: usize,
    /// Titles that matched a keyword and had a discussion link
    pub matched: usize,
    /// Matches seen for the first time (notification queued)
    pub claimed: usize,
    /// Matches without a discussion link
    pub skipped: usize,
    /// Matches whose claim errored
    pub failed: usize,
}

/// Drives the fetch → scan → claim → notify cycle.
///
/// Overlapping calls to [`Poller::poll`] are allowed; the store's atomic
/// claim is what keeps notifications at-most-once.
pub struct Poller {
    client: reqwest::Client,
    url: String,
    format: Box<dyn ListingFormat>,
    matcher: TitleMatcher,
    store: Arc<dyn DedupStore>,
    queue: NotifyQueue,
    fail_fast: bool,
}

impl Poller {
    pub fn new(
        config: &Config,
        client: reqwest::Client,
        store: Arc<dyn DedupStore>,
        queue: NotifyQueue,
    ) -> Self {
        Self {
            client,
            url: config.source.url.clone(),
            format: Box::new(HackerNewsListing::new(&config.source)),
            matcher: TitleMatcher::new(&config.matcher.keywords),
            store,
            queue,
            fail_fast: config.poll.fail_fast,
        }
    }

    /// Wire the HTTP client, configured store and notification worker.
    ///
    /// The returned handle completes once the poller is dropped and every
    /// queued notification has been attempted.
    pub async fn from_config(config: &Config) -> Result<(Self, JoinHandle<()>)> {
        let client = create_async_client(&config.source)?;
        let store = open_store(&config.storage).await?;
        let notifier = Notifier::from_config(client.clone(), &config.mail);
        let (queue, worker) = NotifyQueue::spawn(notifier);
        Ok((Self::new(config, client, store, queue), worker))
    }

    /// Replace the listing layout.
    pub fn with_format(mut self, format: Box<dyn ListingFormat>) -> Self {
        self.format = format;
        self
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn poll(&self) -> std::result::Result<PollReport, PollError> {
        let html = fetch_page_async(&self.client, &self.url)
            .await
            .map_err(PollError::Fetch)?;

        let scan =
            scan_listing(self.format.as_ref(), &self.matcher, &html).map_err(PollError::Parse)?;

        let mut report = PollReport {
            entries: scan.entries,
            matched: scan.matches.len(),
            skipped: scan.skipped,
            ..PollReport::default()
        };
        let mut first_error = None;

        for link in scan.matches {
            match self.store.claim(&link).await {
                Ok(true) => {
                    info!(title = %link.title, item_url = %link.item_url, "New matching story");
                    report.claimed += 1;
                    self.queue.enqueue(link);
                }
                Ok(false) => {}
                Err(e) if self.fail_fast => return Err(PollError::Storage(e)),
                Err(e) => {
                    error!(item_url = %link.item_url, "Claim failed: {}", e);
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if report.entries == 0 {
            warn!("Listing had no entries; the page layout may have changed");
        }
        info!(
            entries = report.entries,
            matched = report.matched,
            claimed = report.claimed,
            failed = report.failed,
            "Poll complete"
        );

        match first_error {
            Some(e) => Err(PollError::Storage(e)),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;
    use crate::error::AppError;
    use crate::listing::tests::front_page;
    use crate::models::Link;
    use crate::notify::tests::RecordingTransport;
    use crate::storage::MemoryStore;

    /// Serve a fixed page on an ephemeral port and return its URL.
    pub(crate) async fn serve_page(status: StatusCode, body: String) -> String {
        let app = Router::new().route(
            "/",
            get(move || {
                let body = body.clone();
                async move { (status, body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/")
    }

    pub(crate) fn config_for(url: &str) -> Config {
        let mut config = Config::default();
        config.source.url = url.to_string();
        config.source.base_url = "https://news.ycombinator.com/".into();
        config
    }

    pub(crate) struct Harness {
        pub poller: Poller,
        pub store: Arc<MemoryStore>,
        pub transport: Arc<RecordingTransport>,
        pub worker: JoinHandle<()>,
    }

    pub(crate) fn harness(config: &Config) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::default());
        let (queue, worker) =
            NotifyQueue::spawn(Notifier::new(transport.clone(), config.mail.clone()));
        let poller = Poller::new(config, reqwest::Client::new(), store.clone(), queue);
        Harness {
            poller,
            store,
            transport,
            worker,
        }
    }

    impl Harness {
        /// Drop the poller (and its queue handle) and wait for delivery.
        pub(crate) async fn finish(self) -> (Arc<MemoryStore>, Arc<RecordingTransport>) {
            drop(self.poller);
            self.worker.await.unwrap();
            (self.store, self.transport)
        }
    }

    /// Store that counts calls and fails claims for chosen keys.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_keys: Vec<String>,
        claims: AtomicUsize,
    }

    #[async_trait]
    impl DedupStore for FlakyStore {
        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }

        async fn load(&self, key: &str) -> Result<Option<Link>> {
            self.inner.load(key).await
        }

        async fn claim(&self, link: &Link) -> Result<bool> {
            self.claims.fetch_add(1, Ordering::SeqCst);
            if self.fail_keys.iter().any(|k| k == link.key()) {
                return Err(AppError::validation("datastore unavailable"));
            }
            self.inner.claim(link).await
        }
    }

    #[tokio::test]
    async fn test_match_is_claimed_and_mailed() {
        let page = front_page(&[
            ("Why Go is awesome", "https://go.dev/blog", 123),
            ("Rust vs C++", "https://example.com/rust", 124),
        ]);
        let url = serve_page(StatusCode::OK, page).await;
        let h = harness(&config_for(&url));

        let report = h.poller.poll().await.unwrap();
        assert_eq!(
            report,
            PollReport {
                entries: 2,
                matched: 1,
                claimed: 1,
                skipped: 0,
                failed: 0,
            }
        );

        let (store, transport) = h.finish().await;
        assert!(
            store
                .exists("https://news.ycombinator.com/item?id=123")
                .await
                .unwrap()
        );
        assert!(
            !store
                .exists("https://news.ycombinator.com/item?id=124")
                .await
                .unwrap()
        );

        let sent = transport.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "HN: Why Go is awesome");
        assert!(
            sent[0]
                .body
                .contains("Discussion: https://news.ycombinator.com/item?id=123")
        );
    }

    #[tokio::test]
    async fn test_no_keyword_no_claim_no_mail() {
        let page = front_page(&[("Rust vs C++", "https://example.com/rust", 5)]);
        let url = serve_page(StatusCode::OK, page).await;
        let h = harness(&config_for(&url));

        let report = h.poller.poll().await.unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(report.claimed, 0);

        let (store, transport) = h.finish().await;
        assert!(store.is_empty());
        assert!(transport.messages().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_polls_notify_once() {
        let page = front_page(&[
            ("Go 1.23 released", "https://go.dev/doc/go1.23", 1),
            ("Google open-sources a thing", "https://example.com/g", 2),
        ]);
        let url = serve_page(StatusCode::OK, page).await;
        let h = harness(&config_for(&url));

        let first = h.poller.poll().await.unwrap();
        let second = h.poller.poll().await.unwrap();
        assert_eq!(first.claimed, 2);
        assert_eq!(second.claimed, 0);
        assert_eq!(second.matched, 2);

        let (_, transport) = h.finish().await;
        assert_eq!(transport.messages().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_polls_notify_once() {
        let page = front_page(&[("Golang tips", "https://example.com/tips", 10)]);
        let url = serve_page(StatusCode::OK, page).await;
        let h = harness(&config_for(&url));

        let (a, b, c) = tokio::join!(h.poller.poll(), h.poller.poll(), h.poller.poll());
        let claimed = a.unwrap().claimed + b.unwrap().claimed + c.unwrap().claimed;
        assert_eq!(claimed, 1);

        let (_, transport) = h.finish().await;
        assert_eq!(transport.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_status_touches_nothing() {
        let page = front_page(&[("Why Go is awesome", "https://go.dev/", 123)]);
        let url = serve_page(StatusCode::SERVICE_UNAVAILABLE, page).await;
        let h = harness(&config_for(&url));

        let err = h.poller.poll().await.unwrap_err();
        assert!(matches!(err, PollError::Fetch(_)));

        let (store, transport) = h.finish().await;
        assert!(store.is_empty());
        assert!(transport.messages().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_source_is_fetch_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let h = harness(&config_for(&format!("http://{addr}/")));
        assert!(matches!(h.poller.poll().await, Err(PollError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_bad_selector_is_parse_error() {
        let url = serve_page(StatusCode::OK, front_page(&[])).await;
        let mut config = config_for(&url);
        config.source.title_selector = "[[invalid".into();
        let h = harness(&config);

        assert!(matches!(h.poller.poll().await, Err(PollError::Parse(_))));
    }

    fn flaky_poller(
        config: &Config,
        store: Arc<FlakyStore>,
    ) -> (Poller, Arc<RecordingTransport>, JoinHandle<()>) {
        let transport = Arc::new(RecordingTransport::default());
        let (queue, worker) =
            NotifyQueue::spawn(Notifier::new(transport.clone(), config.mail.clone()));
        let poller = Poller::new(config, reqwest::Client::new(), store, queue);
        (poller, transport, worker)
    }

    fn flaky_page() -> String {
        front_page(&[
            ("Go one", "https://example.com/1", 1),
            ("Go two", "https://example.com/2", 2),
            ("Go three", "https://example.com/3", 3),
        ])
    }

    #[tokio::test]
    async fn test_claim_failure_is_isolated_by_default() {
        let url = serve_page(StatusCode::OK, flaky_page()).await;
        let store = Arc::new(FlakyStore {
            fail_keys: vec!["https://news.ycombinator.com/item?id=2".into()],
            ..FlakyStore::default()
        });
        let (poller, transport, worker) = flaky_poller(&config_for(&url), store.clone());

        let err = poller.poll().await.unwrap_err();
        assert!(matches!(err, PollError::Storage(_)));
        assert_eq!(store.claims.load(Ordering::SeqCst), 3);

        drop(poller);
        worker.await.unwrap();
        let subjects: Vec<String> = transport.messages().into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects, vec!["HN: Go one", "HN: Go three"]);
    }

    #[tokio::test]
    async fn test_claim_failure_aborts_when_fail_fast() {
        let url = serve_page(StatusCode::OK, flaky_page()).await;
        let store = Arc::new(FlakyStore {
            fail_keys: vec!["https://news.ycombinator.com/item?id=2".into()],
            ..FlakyStore::default()
        });
        let mut config = config_for(&url);
        config.poll.fail_fast = true;
        let (poller, transport, worker) = flaky_poller(&config, store.clone());

        assert!(matches!(poller.poll().await, Err(PollError::Storage(_))));
        assert_eq!(store.claims.load(Ordering::SeqCst), 2);

        drop(poller);
        worker.await.unwrap();
        assert_eq!(transport.messages().len(), 1);
    }

    /// A bare `<li>` layout carrying the discussion URL as a data attribute.
    struct DataAttrListing;

    impl ListingFormat for DataAttrListing {
        fn entries<'a>(
            &self,
            document: &'a scraper::Html,
        ) -> Result<Vec<scraper::ElementRef<'a>>> {
            let sel = scraper::Selector::parse("li > a").unwrap();
            Ok(document.select(&sel).collect())
        }

        fn item_url(&self, entry: scraper::ElementRef<'_>) -> Option<String> {
            entry.value().attr("data-item").map(str::to_string)
        }

        fn story_url(&self, entry: scraper::ElementRef<'_>) -> String {
            entry.value().attr("href").unwrap_or("").to_string()
        }
    }

    #[tokio::test]
    async fn test_custom_listing_format() {
        let page = r#"<html><body><ul>
<li><a href="https://go.dev/" data-item="https://lobste.rs/s/abc">Go turns 15</a></li>
<li><a href="https://example.com/" data-item="https://lobste.rs/s/def">Zig news</a></li>
</ul></body></html>"#;
        let url = serve_page(StatusCode::OK, page.to_string()).await;
        let mut h = harness(&config_for(&url));
        h.poller = h.poller.with_format(Box::new(DataAttrListing));

        let report = h.poller.poll().await.unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.claimed, 1);

        let (store, transport) = h.finish().await;
        assert_eq!(
            store.load("https://lobste.rs/s/abc").await.unwrap(),
            Some(Link::new(
                "Go turns 15",
                "https://go.dev/",
                "https://lobste.rs/s/abc"
            ))
        );
        assert_eq!(transport.messages()[0].subject, "HN: Go turns 15");
    }

    #[tokio::test]
    async fn test_mail_failure_keeps_claim() {
        let url = serve_page(
            StatusCode::OK,
            front_page(&[("Go is fine", "https://example.com/", 8)]),
        )
        .await;
        let config = config_for(&url);
        let store = Arc::new(MemoryStore::new());
        let (queue, worker) = NotifyQueue::spawn(Notifier::new(
            Arc::new(RecordingTransport::failing()),
            config.mail.clone(),
        ));
        let poller = Poller::new(&config, reqwest::Client::new(), store.clone(), queue);

        assert_eq!(poller.poll().await.unwrap().claimed, 1);
        drop(poller);
        worker.await.unwrap();

        assert!(
            store
                .exists("https://news.ycombinator.com/item?id=8")
                .await
                .unwrap()
        );
    }
}

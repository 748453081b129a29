//! Notification rendering and delivery.
//!
//! Delivery is best-effort. A claimed link is handed to [`NotifyQueue`] and
//! the poll moves on; if rendering or sending fails the error is logged and
//! the link is never retried, since its "seen" record is already durable.

mod queue;
mod transport;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::models::{Link, MailConfig};

pub use queue::NotifyQueue;
pub use transport::{LogTransport, MailTransport, PostmarkTransport};

/// A rendered plain-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub sender: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Render the notification for one story.
    pub fn for_link(link: &Link, mail: &MailConfig) -> Self {
        Self {
            sender: mail.sender.clone(),
            to: vec![mail.recipient.clone()],
            subject: format!("{}{}", mail.subject_prefix, link.title),
            body: render_body(&mail.body_template, link),
        }
    }
}

/// Substitute `{title}`, `{url}` and `{item_url}` in `template`.
///
/// Single pass: substituted values are copied verbatim, never rescanned.
/// Unknown `{...}` sequences are kept as-is.
pub fn render_body(template: &str, link: &Link) -> String {
    let placeholders = [
        ("{title}", link.title.as_str()),
        ("{url}", link.url.as_str()),
        ("{item_url}", link.item_url.as_str()),
    ];

    let mut out = String::with_capacity(template.len() + 128);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match placeholders
            .iter()
            .find(|(name, _)| rest.starts_with(name))
        {
            Some((name, value)) => {
                out.push_str(value);
                rest = &rest[name.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders and sends the notification for a matched story.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    mail: MailConfig,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, mail: MailConfig) -> Self {
        Self { transport, mail }
    }

    /// Build a notifier from configuration: Postmark when a token is set,
    /// otherwise a dry-run transport that only logs.
    pub fn from_config(client: reqwest::Client, mail: &MailConfig) -> Self {
        let transport: Arc<dyn MailTransport> = match &mail.api_token {
            Some(token) => Arc::new(PostmarkTransport::new(client, &mail.api_url, token)),
            None => {
                info!("No mail token configured, notifications will only be logged");
                Arc::new(LogTransport)
            }
        };
        Self::new(transport, mail.clone())
    }

    pub async fn notify(&self, link: &Link) -> Result<()> {
        let message = EmailMessage::for_link(link, &self.mail);
        self.transport.send(&message).await?;
        info!(subject = %message.subject, "Notification sent");
        Ok(())
    }
}

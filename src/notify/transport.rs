//! Outbound mail transports.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, Result};
use crate::notify::EmailMessage;

/// Trait for mail delivery backends.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Sends through the Postmark HTTP API (or anything speaking its format).
pub struct PostmarkTransport {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmail<'a> {
    from: &'a str,
    to: String,
    subject: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

impl PostmarkTransport {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl MailTransport for PostmarkTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = PostmarkEmail {
            from: &message.sender,
            to: message.to.join(","),
            subject: &message.subject,
            text_body: &message.body,
            message_stream: "outbound",
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.token)
            .json(&payload)
            .send()
            .await
            .map_err(AppError::notify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notify(format!(
                "mail API returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// Dry-run transport: logs instead of sending.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            from = %message.sender,
            to = ?message.to,
            subject = %message.subject,
            "Would send notification:\n{}",
            message.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    use super::*;

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn mock_mail_api(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let sink = Arc::clone(&captured);
        let app = Router::new().route(
            "/email",
            post(move |headers: HeaderMap, body: axum::Json<serde_json::Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    let token = headers
                        .get("X-Postmark-Server-Token")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    sink.lock().unwrap().push((token, body.0));
                    (status, "{}")
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/email"), captured)
    }

    fn message() -> EmailMessage {
        EmailMessage {
            sender: "watch@example.com".into(),
            to: vec!["me@example.com".into()],
            subject: "HN: Go 2".into(),
            body: "body".into(),
        }
    }

    #[tokio::test]
    async fn test_postmark_payload() {
        let (url, captured) = mock_mail_api(StatusCode::OK).await;
        let transport = PostmarkTransport::new(reqwest::Client::new(), url, "secret");

        transport.send(&message()).await.unwrap();

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (token, body) = &calls[0];
        assert_eq!(token.as_deref(), Some("secret"));
        assert_eq!(body["From"], "watch@example.com");
        assert_eq!(body["To"], "me@example.com");
        assert_eq!(body["Subject"], "HN: Go 2");
        assert_eq!(body["TextBody"], "body");
    }

    #[tokio::test]
    async fn test_postmark_error_status() {
        let (url, _) = mock_mail_api(StatusCode::UNPROCESSABLE_ENTITY).await;
        let transport = PostmarkTransport::new(reqwest::Client::new(), url, "secret");

        let err = transport.send(&message()).await.unwrap_err();
        assert!(matches!(err, AppError::Notify(_)));
        assert!(err.to_string().contains("422"));
    }

    #[tokio::test]
    async fn test_log_transport_never_fails() {
        assert!(LogTransport.send(&message()).await.is_ok());
    }
}

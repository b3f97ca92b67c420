//! Notification transport
//!
//! [`ResendNotifier`] posts to the Resend email API. Anything implementing
//! [`Notifier`] can stand in for it.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::payload::NotificationPayload;
use crate::errors::DeliveryError;

/// Request timeout for a single send
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends a notification and returns the provider's message id
///
/// `Ok(None)` means the provider accepted the message without reporting an
/// id. That is still a delivery; retrying it would send a duplicate.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<Option<String>, DeliveryError>;
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    attachments: Vec<EmailAttachment<'a>>,
}

#[derive(Serialize)]
struct EmailAttachment<'a> {
    filename: &'a str,
    /// Base64 encoded bytes
    content: String,
}

#[derive(Deserialize)]
struct EmailResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

/// Resend API client
pub struct ResendNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ResendNotifier {
    /// Create a client for `api_url` (e.g. `https://api.resend.com`)
    pub fn new(api_url: &str, api_key: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .user_agent(concat!("certdrop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/emails", api_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<Option<String>, DeliveryError> {
        let request = EmailRequest {
            from: &payload.from,
            to: &payload.to,
            subject: &payload.subject,
            html: &payload.html,
            text: &payload.text,
            attachments: payload
                .attachments
                .iter()
                .map(|a| EmailAttachment {
                    filename: &a.filename,
                    content: STANDARD.encode(&a.content),
                })
                .collect(),
        };

        trace!(endpoint = %self.endpoint, "Posting notification");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let id = serde_json::from_str::<EmailResponse>(&body)
            .ok()
            .and_then(|r| r.id);

        match id {
            Some(ref id) => debug!(message_id = %id, "Notification accepted"),
            None => warn!(
                status = status.as_u16(),
                "Notification accepted but the response carried no message id"
            ),
        }
        Ok(id)
    }
}

impl std::fmt::Debug for ResendNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendNotifier")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliver::payload::NotificationPayload;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> NotificationPayload {
        NotificationPayload::certificate_notice(
            "Cert Bot <certs@example.com>".to_string(),
            vec!["ops@example.com".to_string(), "dev@example.com".to_string()],
            "example.com",
            "bundle.tar.gz",
            b"archive".to_vec(),
        )
    }

    #[tokio::test]
    async fn test_send_success_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({
                "from": "Cert Bot <certs@example.com>",
                "to": ["ops@example.com", "dev@example.com"],
                "attachments": [{ "filename": "bundle.tar.gz", "content": "YXJjaGl2ZQ==" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_123" })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = ResendNotifier::new(&server.uri(), "re_test").unwrap();
        let id = notifier.send(&payload()).await.unwrap();

        assert_eq!(id.as_deref(), Some("msg_123"));
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "statusCode": 422,
                "name": "validation_error",
                "message": "Invalid `from` field"
            })))
            .mount(&server)
            .await;

        let notifier = ResendNotifier::new(&server.uri(), "re_test").unwrap();
        let err = notifier.send(&payload()).await.unwrap_err();

        match err {
            DeliveryError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Invalid `from` field");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_without_id_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = ResendNotifier::new(&server.uri(), "re_test").unwrap();
        assert_eq!(notifier.send(&payload()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let notifier = ResendNotifier::new("http://127.0.0.1:1", "re_test").unwrap();
        assert!(matches!(
            notifier.send(&payload()).await,
            Err(DeliveryError::Transport(_))
        ));
    }
}

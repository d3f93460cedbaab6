//! Outbound messaging through the Twilio Messages API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use wxbot_core::{with_retry, HttpConfig, RetryConfig, TransportConfig};

use crate::subscriber::WHATSAPP_PREFIX;

/// Twilio rejects bodies longer than this many characters
pub const MAX_BODY_CHARS: usize = 1600;

/// Accepted by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Provider message id
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendErrorKind {
    /// Provider answered with a non-success status
    Rejected { status: u16, detail: String },
    /// Body exceeds the provider limit; not sent
    PayloadTooLarge { limit: usize },
    /// Credentials or sender missing; not sent
    NotConfigured,
    Transport(String),
    Timeout,
}

impl std::fmt::Display for SendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { status, detail } => write!(f, "rejected with status {}: {}", status, detail),
            Self::PayloadTooLarge { limit } => write!(f, "payload exceeds {} characters", limit),
            Self::NotConfigured => f.write_str("transport not configured"),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Timeout => f.write_str("timed out"),
        }
    }
}

/// A message that could not be delivered to the provider.
#[derive(Debug, Clone, Error)]
#[error("Send to {recipient} ({body_bytes} bytes) failed: {kind}")]
pub struct SendError {
    pub recipient: String,
    pub body_bytes: usize,
    pub kind: SendErrorKind,
}

impl SendError {
    pub fn new(recipient: &str, text: &str, kind: SendErrorKind) -> Self {
        Self {
            recipient: recipient.to_string(),
            body_bytes: text.len(),
            kind,
        }
    }
}

/// Anything that can deliver a text to a recipient.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<Ack, SendError>;
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwilioTransport {
    client: Arc<Client>,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    retry: RetryConfig,
}

impl TwilioTransport {
    pub fn new(config: &TransportConfig, http: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(http.timeout()).build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: config.from.clone(),
            retry: http.retry(),
        })
    }

    /// Sender address matching the recipient's channel
    fn sender_for(&self, recipient: &str) -> String {
        let bare = self.from.strip_prefix(WHATSAPP_PREFIX).unwrap_or(&self.from);
        if recipient.starts_with(WHATSAPP_PREFIX) {
            format!("{}{}", WHATSAPP_PREFIX, bare)
        } else {
            bare.to_string()
        }
    }

    fn error_from_reqwest(recipient: &str, text: &str, err: reqwest::Error) -> SendError {
        let kind = if err.is_timeout() {
            SendErrorKind::Timeout
        } else {
            SendErrorKind::Transport(err.to_string())
        };
        SendError::new(recipient, text, kind)
    }
}

#[async_trait]
impl MessageTransport for TwilioTransport {
    #[instrument(skip(self, text), fields(bytes = text.len()), level = "debug")]
    async fn send(&self, recipient: &str, text: &str) -> Result<Ack, SendError> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() || self.from.is_empty() {
            return Err(SendError::new(recipient, text, SendErrorKind::NotConfigured));
        }

        if text.chars().count() > MAX_BODY_CHARS {
            return Err(SendError::new(
                recipient,
                text,
                SendErrorKind::PayloadTooLarge { limit: MAX_BODY_CHARS },
            ));
        }

        let url = format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid);
        let from = self.sender_for(recipient);
        tracing::info!("Sending message from {} to {}", from, recipient);

        let response = with_retry(&self.retry, || {
            self.client
                .post(&url)
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .form(&[("To", recipient), ("From", from.as_str()), ("Body", text)])
                .send()
        })
        .await
        .map_err(|e| Self::error_from_reqwest(recipient, text, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TwilioError>(&body) {
                Ok(TwilioError { code: Some(code), message: Some(message) }) => format!("{} ({})", message, code),
                Ok(TwilioError { message: Some(message), .. }) => message,
                _ => body,
            };
            return Err(SendError::new(
                recipient,
                text,
                SendErrorKind::Rejected { status: status.as_u16(), detail },
            ));
        }

        let message: TwilioMessage = response.json().await.map_err(|e| {
            SendError::new(recipient, text, SendErrorKind::Transport(format!("invalid response: {}", e)))
        })?;

        tracing::debug!("Message accepted with sid {}", message.sid);
        Ok(Ack { message_id: message.sid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(from: &str) -> TwilioTransport {
        let config = TransportConfig {
            account_sid: "AC123".into(),
            auth_token: "token".into(),
            from: from.into(),
            ..TransportConfig::default()
        };
        TwilioTransport::new(&config, &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_sender_matches_channel() {
        let t = transport("whatsapp:+14155238886");
        assert_eq!(t.sender_for("whatsapp:+46700000001"), "whatsapp:+14155238886");
        assert_eq!(t.sender_for("+46700000001"), "+14155238886");

        let t = transport("+14155238886");
        assert_eq!(t.sender_for("whatsapp:+46700000001"), "whatsapp:+14155238886");
    }

    #[test]
    fn test_send_error_display() {
        let err = SendError::new("whatsapp:+4670", "hello", SendErrorKind::Timeout);
        assert_eq!(err.body_bytes, 5);
        assert_eq!(err.to_string(), "Send to whatsapp:+4670 (5 bytes) failed: timed out");
    }

    #[test]
    fn test_body_bytes_counts_utf8() {
        let err = SendError::new("+4670", "21°", SendErrorKind::NotConfigured);
        assert_eq!(err.body_bytes, 4);
    }
}

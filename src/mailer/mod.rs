//! Email transport.
//!
//! The send executors talk to an [`EmailTransport`] trait; production
//! wires in a Mandrill-compatible HTTP JSON API client. Account
//! validation failures are permanent, send failures are transient.

use async_trait::async_trait;
use serde_json::json;

/// A fully assembled outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub subject: String,
    /// Display from-address, e.g. "Standup Digest <team@example.com>".
    pub from: String,
    pub to: Vec<String>,
    pub text_body: String,
    pub html_body: Option<String>,
    /// External sending-account tag, when the team has one.
    pub subaccount: Option<String>,
}

/// Transport-level failure.
#[derive(Debug)]
pub enum MailError {
    /// The referenced sending account does not exist or is rejected.
    InvalidAccount(String),
    /// The transport failed to accept the message.
    Transport(String),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::InvalidAccount(msg) => write!(f, "invalid account: {}", msg),
            MailError::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for MailError {}

/// External email-sending service.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Check that a sending-account reference is known to the provider.
    async fn validate_account(&self, account_ref: &str) -> Result<(), MailError>;

    /// Deliver a message.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Mandrill-compatible HTTP API client.
pub struct MandrillMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl MandrillMailer {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl EmailTransport for MandrillMailer {
    async fn validate_account(&self, account_ref: &str) -> Result<(), MailError> {
        let url = format!("{}/subaccounts/info.json", self.api_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "key": self.api_key, "id": account_ref }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| MailError::InvalidAccount(format!("lookup failed: {}", e)))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(MailError::InvalidAccount(format!(
                "subaccount {}: {} {}",
                account_ref, status, body
            )))
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let url = format!("{}/messages/send.json", self.api_url);
        let to: Vec<_> = email.to.iter().map(|addr| json!({ "email": addr })).collect();
        let message = json!({
            "subject": email.subject,
            "from_email": email.from,
            "to": to,
            "text": email.text_body,
            "html": email.html_body,
            "subaccount": email.subaccount,
            "preserve_recipients": true,
        });

        let resp = self
            .client
            .post(&url)
            .json(&json!({ "key": self.api_key, "message": message }))
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(MailError::Transport(format!("{} {}", status, body)))
        }
    }
}

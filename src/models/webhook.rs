//! Inbound webhook capture models.

use serde::{Deserialize, Serialize};

/// Append-only audit row for a raw inbound message, with an optional
/// link to the update it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundWebhookRequest {
    pub id: i64,
    pub timestamp: String,
    pub message: String,
    pub update_id: Option<i64>,
}

/// Payload the inbound email provider posts to the webhook endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundMessage {
    /// Raw message text as forwarded by the provider.
    pub text: String,
    /// The team inbox the message was addressed to.
    pub email: String,
    /// The sender's address.
    pub from_email: String,
}

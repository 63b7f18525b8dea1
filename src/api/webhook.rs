//! Inbound webhook endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::{ApiResponse, ApiResult};
use crate::errors::AppError;
use crate::models::InboundMessage;
use crate::tasks;
use crate::AppState;

/// What the capture produced: always an audit row, and an update when
/// the message parsed.
#[derive(Debug, Serialize)]
pub struct InboundReceipt {
    pub request_id: i64,
    pub update_id: Option<i64>,
}

/// POST /api/webhooks/inbound - Capture an inbound update email.
pub async fn receive_inbound(
    State(state): State<AppState>,
    Json(message): Json<InboundMessage>,
) -> ApiResult<InboundReceipt> {
    // Validate required fields
    if message.email.trim().is_empty() || message.from_email.trim().is_empty() {
        return Err(AppError::Validation(
            "Team and sender addresses are required".to_string(),
        ));
    }

    let (request_id, update) = tasks::receive_update(&state.ctx, &message).await?;
    Ok(ApiResponse::new(InboundReceipt {
        request_id,
        update_id: update.map(|u| u.id),
    }))
}

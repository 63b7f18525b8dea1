//! Inbound update capture.
//!
//! Inbound emails arrive as webhook posts. The raw payload is appended
//! to the audit log first, then split with the line-marker rule:
//! '-' done, '+' will-do, '*' blocker. Anything that yields no items
//! gets a wrong-format auto-reply instead of an update.

use chrono::Utc;

use crate::errors::{AppError, SendError};
use crate::mailer::OutgoingEmail;
use crate::models::{InboundMessage, Update, UpdateDraft};
use crate::queue::Job;
use crate::templates;

use super::TaskContext;

/// Split an inbound message into update fields by line markers.
/// Returns `None` when no line carries a marker.
pub fn parse_update_text(text: &str) -> Option<UpdateDraft> {
    let mut done = Vec::new();
    let mut will_do = Vec::new();
    let mut blocker = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix('-') {
            done.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix('+') {
            will_do.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix('*') {
            blocker.push(rest.trim().to_string());
        }
    }

    let draft = UpdateDraft {
        done: done.join("\n"),
        will_do: will_do.join("\n"),
        blocker: blocker.join("\n"),
    };
    if draft.is_empty() {
        None
    } else {
        Some(draft)
    }
}

/// Capture one inbound message: audit it, parse it, store the update
/// for today's business date, and link the audit row. An unparseable
/// message enqueues an auto-reply and produces no update.
pub async fn receive_update(
    ctx: &TaskContext,
    message: &InboundMessage,
) -> Result<(i64, Option<Update>), AppError> {
    let raw = serde_json::to_string(message)?;
    let request_id = ctx.repo.record_inbound_request(&raw).await?;

    let Some(draft) = parse_update_text(&message.text) else {
        tracing::warn!(from = %message.from_email, "inbound message has no parsable update");
        ctx.queue.submit(Job::WrongFormatReply {
            team_email: message.email.clone(),
            sender_email: message.from_email.clone(),
            body: message.text.clone(),
        });
        return Ok((request_id, None));
    };

    let Some(member) = ctx
        .repo
        .membership_by_emails(&message.email, &message.from_email)
        .await?
    else {
        return Err(AppError::NotFound(format!(
            "No active membership for {} on team inbox {}",
            message.from_email, message.email
        )));
    };

    let today = ctx.clock.local_date(Utc::now());
    let update = ctx.repo.create_update(member.membership_id, today, &draft).await?;
    ctx.repo.link_inbound_update(request_id, update.id).await?;

    tracing::info!(membership_id = member.membership_id, update_id = update.id, "update captured");
    Ok((request_id, Some(update)))
}

/// Send the wrong-format auto-reply from the team inbox to the sender.
pub async fn wrong_format_reply(
    ctx: &TaskContext,
    team_email: &str,
    sender_email: &str,
    body: &str,
) -> Result<(), SendError> {
    let email = OutgoingEmail {
        subject: "We could not read your update".to_string(),
        from: team_email.to_string(),
        to: vec![sender_email.to_string()],
        text_body: templates::auto_reply_text(body),
        html_body: None,
        subaccount: None,
    };

    ctx.mailer
        .send(&email)
        .await
        .map_err(|e| SendError::Transient(format!("Auto-reply sending failed: {}", e)))?;

    Ok(())
}

//! Reminder fan-out and per-member delivery.

use chrono::Utc;

use crate::errors::SendError;
use crate::mailer::OutgoingEmail;
use crate::queue::Job;
use crate::templates::{self, ReminderContext};

use super::TaskContext;

/// Fan out reminder deliveries to all active members of a team.
///
/// Runs at the scheduled ETA, so everything is validated again: the
/// team must still be active, have members, and carry a sending
/// account the transport recognizes. Each member's delivery is its own
/// job; one failure never blocks the rest.
pub async fn send_reminders(ctx: &TaskContext, team_id: i64) -> Result<(), SendError> {
    let Some(team) = ctx.repo.active_team(team_id).await? else {
        return Err(SendError::Permanent(format!(
            "Active team with {} ID does not exist.",
            team_id
        )));
    };

    let members = ctx.repo.active_memberships(team.id).await?;
    if members.is_empty() {
        return Err(SendError::Permanent(format!(
            "Active team {} has no active members. Sending of reminders aborted.",
            team.name
        )));
    }

    let Some(account) = team.subaccount_id.as_deref() else {
        return Err(SendError::Permanent(format!(
            "Active team {} has no subaccount. Sending of reminders aborted.",
            team.name
        )));
    };
    if let Err(e) = ctx.mailer.validate_account(account).await {
        return Err(SendError::Permanent(format!(
            "Active team {} has an invalid subaccount ({}). Sending of reminders aborted.",
            team.name, e
        )));
    }

    let today = ctx.clock.local_date(Utc::now());
    for member in members {
        let update = ctx.repo.update_for_date(member.membership_id, today).await?;

        match update {
            Some(update) if !update.will_do.is_empty() || !update.blocker.is_empty() => {
                ctx.queue.submit(Job::RemindMember {
                    membership_id: member.membership_id,
                    todos: Some(update.will_do_as_list()),
                    blockers: Some(update.blocker_as_list()),
                });
            }
            _ => {
                ctx.queue.submit(Job::RemindMember {
                    membership_id: member.membership_id,
                    todos: None,
                    blockers: None,
                });
            }
        }
    }

    Ok(())
}

/// Deliver one member's reminder email.
///
/// The membership may have been deactivated between enqueue and
/// execution; that is a permanent skip. Transport failures retry.
pub async fn remind_team_member(
    ctx: &TaskContext,
    membership_id: i64,
    todos: Option<Vec<String>>,
    blockers: Option<Vec<String>>,
) -> Result<(), SendError> {
    let Some(member) = ctx.repo.active_membership(membership_id).await? else {
        return Err(SendError::Permanent(format!(
            "Active Membership with {} ID does not exist.",
            membership_id
        )));
    };

    let domain = ctx.domain_or_empty();
    let text_body = templates::reminder_text(&ReminderContext {
        team_name: &member.team_name,
        team_email: &member.team_email,
        todos: todos.as_deref(),
        blockers: blockers.as_deref(),
        domain: &domain,
    });

    let email = OutgoingEmail {
        subject: "What did you get done today?".to_string(),
        from: format!("Standup Reminder <{}>", member.team_email),
        to: vec![member.recipient()],
        text_body,
        html_body: None,
        subaccount: member.team_subaccount.clone(),
    };

    ctx.mailer.send(&email).await.map_err(|e| {
        SendError::Transient(format!(
            "Failed to send reminder to membership {}: {}",
            membership_id, e
        ))
    })?;

    tracing::info!(membership_id, "reminder sent");
    Ok(())
}

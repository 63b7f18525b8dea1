//! Digest delivery.

use chrono::{DateTime, Utc};

use crate::errors::SendError;
use crate::mailer::OutgoingEmail;
use crate::templates::{self, DigestContext, DigestEntry};

use super::TaskContext;

/// Deliver a team's digest for the given date.
///
/// `for_date` is an absolute instant; the roster is built against its
/// business-local calendar day. When `for_project_managers` is set the
/// digest goes to the team owner alone (the early preview); otherwise
/// to the de-duplicated union of active members, silent recipients, and
/// the owner.
pub async fn send_digest(
    ctx: &TaskContext,
    team_id: i64,
    for_date: DateTime<Utc>,
    for_project_managers: bool,
) -> Result<(), SendError> {
    let Some(team) = ctx.repo.active_team(team_id).await? else {
        return Err(SendError::Permanent(format!(
            "Active team with {} ID does not exist.",
            team_id
        )));
    };

    let members = ctx.repo.active_memberships(team.id).await?;
    if members.is_empty() {
        return Err(SendError::Permanent(format!(
            "Team {} has no active members. Sending of digest aborted.",
            team.name
        )));
    }

    let local_date = ctx.clock.local_date(for_date);
    let mut entries = Vec::with_capacity(members.len());
    for member in &members {
        let update = ctx.repo.update_for_date(member.membership_id, local_date).await?;
        entries.push(match update {
            Some(update) => DigestEntry {
                name: member.full_name.clone(),
                role: member.role.clone(),
                done: update.done_as_list(),
                will_do: update.will_do_as_list(),
                blockers: update.blocker_as_list(),
                has_update: true,
            },
            None => DigestEntry {
                name: member.full_name.clone(),
                role: member.role.clone(),
                done: vec![],
                will_do: vec![],
                blockers: vec![],
                has_update: false,
            },
        });
    }

    let recipients = ctx.repo.digest_recipients(team.id, for_project_managers).await?;

    let date_label = ctx.clock.date_label(for_date);
    let domain = ctx.domain_or_empty();
    let digest_ctx = DigestContext {
        team_name: &team.name,
        date: &date_label,
        domain: &domain,
        entries: &entries,
    };

    let email = OutgoingEmail {
        subject: format!("Digest for {} for {}", team.name, date_label),
        from: format!("Standup Digest <{}>", team.email),
        to: recipients,
        text_body: templates::digest_text(&digest_ctx),
        html_body: Some(templates::digest_html(&digest_ctx)),
        subaccount: team.subaccount_id.clone(),
    };

    ctx.mailer.send(&email).await.map_err(|e| {
        SendError::Transient(format!(
            "Digest sending failed for team with ID: {}: {}",
            team_id, e
        ))
    })?;

    tracing::info!(team = %team.name, %for_date, for_project_managers, "digest sent");
    Ok(())
}

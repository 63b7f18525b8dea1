//! Scheduling and send tasks.
//!
//! A task runs as an independent asynchronous unit dispatched through
//! the job queue: SCHEDULED, then validated at execution time, then
//! either skipped permanently, sent, or retried on a transient
//! transport failure up to the cap.

mod digest;
mod inbound;
mod reminders;
mod schedule;

pub use digest::send_digest;
pub use inbound::{parse_update_text, receive_update, wrong_format_reply};
pub use reminders::{remind_team_member, send_reminders};
pub use schedule::{schedule_digest, schedule_reminders, spawn_scheduler};

use std::sync::Arc;
use std::time::Duration;

use crate::clock::BusinessClock;
use crate::db::Repository;
use crate::errors::SendError;
use crate::mailer::EmailTransport;
use crate::queue::{Job, JobQueue};

/// Fixed delay before each retry of a transiently failed send.
pub const RETRY_COUNTDOWN: Duration = Duration::from_secs(300);

/// Maximum number of retries per send unit.
pub const MAX_RETRIES: u32 = 5;

/// Everything a task needs, injected once at startup.
pub struct TaskContext {
    pub repo: Repository,
    pub mailer: Arc<dyn EmailTransport>,
    pub queue: Arc<dyn JobQueue>,
    pub clock: BusinessClock,
    /// Public hostname for links in email bodies, if configured.
    pub domain: Option<String>,
}

impl TaskContext {
    /// The configured public hostname, degrading to an empty string
    /// (with an error log) when unset so sends still go out.
    pub fn domain_or_empty(&self) -> String {
        match &self.domain {
            Some(domain) => domain.clone(),
            None => {
                tracing::error!("Public domain is not configured.");
                String::new()
            }
        }
    }
}

/// Execute one job and settle its outcome: permanent skips are logged
/// and dropped, transient failures re-enter the queue until the retry
/// cap, then terminate as failed.
pub async fn run(ctx: &TaskContext, job: Job, attempt: u32) {
    let outcome = match job.clone() {
        Job::SendReminders { team_id } => send_reminders(ctx, team_id).await,
        Job::RemindMember {
            membership_id,
            todos,
            blockers,
        } => remind_team_member(ctx, membership_id, todos, blockers).await,
        Job::SendDigest {
            team_id,
            for_date,
            for_project_managers,
        } => send_digest(ctx, team_id, for_date, for_project_managers).await,
        Job::WrongFormatReply {
            team_email,
            sender_email,
            body,
        } => wrong_format_reply(ctx, &team_email, &sender_email, &body).await,
    };

    match outcome {
        Ok(()) => {}
        Err(SendError::Permanent(reason)) => {
            tracing::error!(%reason, "job skipped");
        }
        Err(SendError::Transient(reason)) => {
            if attempt < MAX_RETRIES {
                tracing::warn!(
                    %reason,
                    attempt,
                    "send failed, retrying in {} seconds",
                    RETRY_COUNTDOWN.as_secs()
                );
                ctx.queue.submit_retry(job, RETRY_COUNTDOWN, attempt + 1);
            } else {
                tracing::error!(%reason, "send failed after {} retries, giving up", MAX_RETRIES);
            }
        }
    }
}

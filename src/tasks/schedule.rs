//! Daily scheduling pass.
//!
//! Invoked once per tick. Each pass only looks at "today" on the
//! business clock: for every eligible team whose send days include
//! today's weekday, a delayed job is enqueued at the configured
//! wall-clock time. A send time already past for today is submitted
//! as-is and the queue runs it immediately; nothing rolls to tomorrow.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{at_local_time, weekday_index};
use crate::queue::Job;

use super::TaskContext;

/// Enqueue reminder fan-out jobs for every team due today.
pub async fn schedule_reminders(ctx: &TaskContext, now: DateTime<Utc>) {
    let teams = match ctx.repo.eligible_teams().await {
        Ok(teams) => teams,
        Err(e) => {
            tracing::error!(error = %e, "could not load eligible teams, skipping reminder pass");
            return;
        }
    };

    let local_now = ctx.clock.to_local(now);
    let today = weekday_index(local_now);

    for team in teams {
        if !team.sends_on(today) {
            continue;
        }
        // Malformed team data only skips that team, never the batch.
        let Some(eta) = at_local_time(local_now, team.send_reminders_at) else {
            tracing::error!(team = %team.name, "invalid reminder send time, skipping team");
            continue;
        };
        tracing::info!(team = %team.name, %eta, "scheduling reminders");
        ctx.queue
            .submit_at(Job::SendReminders { team_id: team.id }, eta.with_timezone(&Utc));
    }
}

/// Enqueue digest jobs for every team due today: the regular digest at
/// the configured time and a project-managers-only preview exactly one
/// hour earlier. The two are independent enqueues and may race.
pub async fn schedule_digest(ctx: &TaskContext, now: DateTime<Utc>) {
    let teams = match ctx.repo.eligible_teams().await {
        Ok(teams) => teams,
        Err(e) => {
            tracing::error!(error = %e, "could not load eligible teams, skipping digest pass");
            return;
        }
    };

    let local_now = ctx.clock.to_local(now);
    let today = weekday_index(local_now);

    for team in teams {
        if !team.sends_on(today) {
            continue;
        }
        let Some(eta) = at_local_time(local_now, team.send_digest_at) else {
            tracing::error!(team = %team.name, "invalid digest send time, skipping team");
            continue;
        };
        let eta_utc = eta.with_timezone(&Utc);
        tracing::info!(team = %team.name, eta = %eta_utc, "scheduling digest");

        ctx.queue.submit_at(
            Job::SendDigest {
                team_id: team.id,
                for_date: eta_utc,
                for_project_managers: false,
            },
            eta_utc,
        );

        // Early preview for project managers, one hour ahead.
        ctx.queue.submit_at(
            Job::SendDigest {
                team_id: team.id,
                for_date: eta_utc,
                for_project_managers: true,
            },
            eta_utc - chrono::Duration::hours(1),
        );
    }
}

/// Spawn the scheduler tick loop.
pub fn spawn_scheduler(ctx: Arc<TaskContext>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let now = Utc::now();
            schedule_reminders(&ctx, now).await;
            schedule_digest(&ctx, now).await;
        }
    });
}

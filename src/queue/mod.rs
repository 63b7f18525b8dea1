//! Asynchronous job queue.
//!
//! The scheduling core only decides what to run and when; it hands jobs
//! to a [`JobQueue`]. The in-process implementation backs production and
//! executes each envelope on its own tokio task, so units run
//! concurrently with no ordering guarantee and at-least-once semantics
//! from the caller's point of view. There is no cancellation: an
//! enqueued envelope runs unless the process exits first.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::tasks::{self, TaskContext};

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Job {
    /// Fan out reminder deliveries for one team.
    SendReminders { team_id: i64 },
    /// Deliver one member's reminder, optionally carrying the items
    /// from their last update.
    RemindMember {
        membership_id: i64,
        todos: Option<Vec<String>>,
        blockers: Option<Vec<String>>,
    },
    /// Deliver a team digest for a date (an absolute instant, so the
    /// executor is zone-independent).
    SendDigest {
        team_id: i64,
        for_date: DateTime<Utc>,
        for_project_managers: bool,
    },
    /// Tell a sender their inbound update could not be parsed.
    WrongFormatReply {
        team_email: String,
        sender_email: String,
        body: String,
    },
}

/// A job plus its delivery metadata.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub job: Job,
    /// Run no earlier than this instant; `None` means as soon as possible.
    pub run_at: Option<DateTime<Utc>>,
    /// How many times this job has already failed transiently.
    pub attempt: u32,
}

/// Job-submission interface: now, delayed, or retry-with-countdown.
pub trait JobQueue: Send + Sync {
    /// Run as soon as a worker picks the job up.
    fn submit(&self, job: Job);

    /// Run no earlier than `eta`. A past `eta` runs immediately; the
    /// scheduler relies on this for send times already gone by today.
    fn submit_at(&self, job: Job, eta: DateTime<Utc>);

    /// Re-submit a transiently failed job after `countdown`, carrying
    /// its attempt count.
    fn submit_retry(&self, job: Job, countdown: Duration, attempt: u32);
}

/// Tokio-backed queue; envelopes flow over an unbounded channel to the
/// worker spawned by [`spawn_worker`].
pub struct InProcessQueue {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl InProcessQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, envelope: Envelope) {
        // Send only fails when the worker is gone, i.e. at shutdown.
        if self.tx.send(envelope).is_err() {
            tracing::warn!("job queue worker is gone, dropping job");
        }
    }
}

impl JobQueue for InProcessQueue {
    fn submit(&self, job: Job) {
        self.push(Envelope {
            job,
            run_at: None,
            attempt: 0,
        });
    }

    fn submit_at(&self, job: Job, eta: DateTime<Utc>) {
        self.push(Envelope {
            job,
            run_at: Some(eta),
            attempt: 0,
        });
    }

    fn submit_retry(&self, job: Job, countdown: Duration, attempt: u32) {
        let eta =
            Utc::now() + chrono::Duration::from_std(countdown).unwrap_or_else(|_| chrono::Duration::zero());
        self.push(Envelope {
            job,
            run_at: Some(eta),
            attempt,
        });
    }
}

/// Spawn the queue worker. Each received envelope sleeps out its delay
/// and executes on its own task, so one slow send never blocks siblings.
pub fn spawn_worker(ctx: Arc<TaskContext>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if let Some(eta) = envelope.run_at {
                    let delay = (eta - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                tasks::run(&ctx, envelope.job, envelope.attempt).await;
            });
        }
    });
}

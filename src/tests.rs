//! Integration tests for the standup backend.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::clock::BusinessClock;
use crate::db::{init_database, Repository};
use crate::errors::SendError;
use crate::mailer::{EmailTransport, MailError, OutgoingEmail};
use crate::models::{CreateTeamRequest, InboundMessage, Team, UpdateDraft, User};
use crate::queue::{Job, JobQueue};
use crate::tasks::{self, TaskContext, MAX_RETRIES};
use crate::{create_router, AppState};

/// Queue double that records submissions instead of executing them.
#[derive(Default)]
struct RecordingQueue {
    entries: Mutex<Vec<QueuedJob>>,
}

#[derive(Debug, Clone)]
struct QueuedJob {
    job: Job,
    eta: Option<DateTime<Utc>>,
    countdown: Option<Duration>,
    attempt: u32,
}

impl RecordingQueue {
    fn jobs(&self) -> Vec<QueuedJob> {
        self.entries.lock().unwrap().clone()
    }
}

impl JobQueue for RecordingQueue {
    fn submit(&self, job: Job) {
        self.entries.lock().unwrap().push(QueuedJob {
            job,
            eta: None,
            countdown: None,
            attempt: 0,
        });
    }

    fn submit_at(&self, job: Job, eta: DateTime<Utc>) {
        self.entries.lock().unwrap().push(QueuedJob {
            job,
            eta: Some(eta),
            countdown: None,
            attempt: 0,
        });
    }

    fn submit_retry(&self, job: Job, countdown: Duration, attempt: u32) {
        self.entries.lock().unwrap().push(QueuedJob {
            job,
            eta: None,
            countdown: Some(countdown),
            attempt,
        });
    }
}

/// Transport double recording deliveries, with injectable failures.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    rejected_accounts: Mutex<HashSet<String>>,
    failures_remaining: Mutex<u32>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    fn reject_account(&self, account: &str) {
        self.rejected_accounts.lock().unwrap().insert(account.to_string());
    }

    fn fail_next_sends(&self, count: u32) {
        *self.failures_remaining.lock().unwrap() = count;
    }
}

#[async_trait]
impl EmailTransport for RecordingMailer {
    async fn validate_account(&self, account_ref: &str) -> Result<(), MailError> {
        if self.rejected_accounts.lock().unwrap().contains(account_ref) {
            Err(MailError::InvalidAccount(account_ref.to_string()))
        } else {
            Ok(())
        }
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let mut failures = self.failures_remaining.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(MailError::Transport("injected failure".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Test fixture wiring a real repository to recording doubles.
struct TestFixture {
    ctx: Arc<TaskContext>,
    repo: Repository,
    queue: Arc<RecordingQueue>,
    mailer: Arc<RecordingMailer>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Repository::new(pool);

        let queue = Arc::new(RecordingQueue::default());
        let mailer = Arc::new(RecordingMailer::default());

        let ctx = Arc::new(TaskContext {
            repo: repo.clone(),
            mailer: mailer.clone(),
            queue: queue.clone(),
            clock: BusinessClock::new(FixedOffset::east_opt(8 * 3600).unwrap()),
            domain: Some("standup.example.com".to_string()),
        });

        TestFixture {
            ctx,
            repo,
            queue,
            mailer,
            _temp_dir: temp_dir,
        }
    }

    /// A Monday-to-Friday team with a creator, digest at 09:00 and
    /// reminders at 18:00 business time.
    async fn seed_team(&self, name: &str, email: &str) -> (Team, User) {
        self.seed_team_with(name, email, vec![0, 1, 2, 3, 4]).await
    }

    async fn seed_team_with(&self, name: &str, email: &str, days: Vec<u8>) -> (Team, User) {
        let creator = self
            .repo
            .create_user("Team", "Creator", &format!("creator.{}@test.ph", name))
            .await
            .unwrap();
        let team = self
            .repo
            .create_team(&CreateTeamRequest {
                name: name.to_string(),
                description: String::new(),
                email: email.to_string(),
                active: true,
                subaccount_id: Some(format!("acct-{}", name)),
                timezone: "UTC".to_string(),
                digest_days_sent: days,
                send_digest_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                send_reminders_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                created_by: creator.id,
            })
            .await
            .unwrap();
        (team, creator)
    }

    async fn add_member(&self, team: &Team, first: &str, last: &str, email: &str) -> (i64, User) {
        let user = self.repo.create_user(first, last, email).await.unwrap();
        let membership = self
            .repo
            .create_membership(team.id, user.id, None, true)
            .await
            .unwrap();
        (membership.id, user)
    }

    /// Today's calendar date on the business clock, as the executors
    /// compute it.
    fn today(&self) -> NaiveDate {
        self.ctx.clock.local_date(Utc::now())
    }
}

fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 5, 0, 0, 0).unwrap()
}

fn saturday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 3, 0, 0, 0).unwrap()
}

// ==================== SCHEDULING ====================

#[tokio::test]
async fn test_no_reminders_on_non_send_day() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    tasks::schedule_reminders(&fixture.ctx, saturday()).await;

    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_reminders_scheduled_on_send_day() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    tasks::schedule_reminders(&fixture.ctx, monday()).await;

    let jobs = fixture.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job, Job::SendReminders { team_id: team.id });
    // 18:00 at +08:00 on the same local day is 10:00 UTC.
    let expected_eta = Utc.with_ymd_and_hms(2015, 1, 5, 10, 0, 0).unwrap();
    assert_eq!(jobs[0].eta, Some(expected_eta));
}

#[tokio::test]
async fn test_inactive_team_is_never_scheduled() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture.repo.set_team_active(team.id, false).await.unwrap();

    tasks::schedule_reminders(&fixture.ctx, monday()).await;
    tasks::schedule_digest(&fixture.ctx, monday()).await;

    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_empty_send_days_is_never_scheduled() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture
        .seed_team_with("platform", "platform@test.ph", vec![])
        .await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    tasks::schedule_reminders(&fixture.ctx, monday()).await;
    tasks::schedule_digest(&fixture.ctx, monday()).await;

    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_team_without_active_members_is_never_scheduled() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture
        .repo
        .set_membership_active(membership_id, false)
        .await
        .unwrap();

    tasks::schedule_reminders(&fixture.ctx, monday()).await;
    tasks::schedule_digest(&fixture.ctx, monday()).await;

    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_digest_schedules_regular_and_pm_preview() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    tasks::schedule_digest(&fixture.ctx, monday()).await;

    let jobs = fixture.queue.jobs();
    assert_eq!(jobs.len(), 2);

    // 09:00 at +08:00 on the same local day is 01:00 UTC.
    let expected_eta = Utc.with_ymd_and_hms(2015, 1, 5, 1, 0, 0).unwrap();
    assert_eq!(
        jobs[0].job,
        Job::SendDigest {
            team_id: team.id,
            for_date: expected_eta,
            for_project_managers: false,
        }
    );
    assert_eq!(jobs[0].eta, Some(expected_eta));

    // The preview fires one hour earlier but carries the same date.
    assert_eq!(
        jobs[1].job,
        Job::SendDigest {
            team_id: team.id,
            for_date: expected_eta,
            for_project_managers: true,
        }
    );
    assert_eq!(jobs[1].eta, Some(expected_eta - chrono::Duration::hours(1)));
}

#[tokio::test]
async fn test_past_send_time_is_still_submitted_for_today() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    // Monday 20:00 business time, two hours after the reminder slot.
    let monday_evening = Utc.with_ymd_and_hms(2015, 1, 5, 12, 0, 0).unwrap();
    tasks::schedule_reminders(&fixture.ctx, monday_evening).await;

    let jobs = fixture.queue.jobs();
    assert_eq!(jobs.len(), 1);
    let eta = jobs[0].eta.unwrap();
    assert_eq!(eta, Utc.with_ymd_and_hms(2015, 1, 5, 10, 0, 0).unwrap());
    assert!(eta < monday_evening);
}

// ==================== REMINDER FAN-OUT ====================

#[tokio::test]
async fn test_send_reminders_fans_out_per_member() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (with_update, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    let (without_update, _) = fixture.add_member(&team, "John", "Roe", "john@test.ph").await;

    fixture
        .repo
        .create_update(
            with_update,
            fixture.today(),
            &UpdateDraft {
                done: "Ticket #99".to_string(),
                will_do: "Finish Ticket #102\nOpen PR for Ticket #103\n".to_string(),
                blocker: "Slow internet connection\nPower outage".to_string(),
            },
        )
        .await
        .unwrap();

    tasks::send_reminders(&fixture.ctx, team.id).await.unwrap();

    let jobs = fixture.queue.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(
        jobs[0].job,
        Job::RemindMember {
            membership_id: with_update,
            todos: Some(vec![
                "Finish Ticket #102".to_string(),
                "Open PR for Ticket #103".to_string(),
            ]),
            blockers: Some(vec![
                "Slow internet connection".to_string(),
                "Power outage".to_string(),
            ]),
        }
    );
    assert_eq!(
        jobs[1].job,
        Job::RemindMember {
            membership_id: without_update,
            todos: None,
            blockers: None,
        }
    );
}

#[tokio::test]
async fn test_send_reminders_unknown_team_is_permanent_skip() {
    let fixture = TestFixture::new().await;

    let result = tasks::send_reminders(&fixture.ctx, 999).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_send_reminders_inactive_team_is_permanent_skip() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture.repo.set_team_active(team.id, false).await.unwrap();

    let result = tasks::send_reminders(&fixture.ctx, team.id).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_send_reminders_without_members_aborts() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;

    let result = tasks::send_reminders(&fixture.ctx, team.id).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_send_reminders_invalid_subaccount_aborts() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture.mailer.reject_account("acct-platform");

    let result = tasks::send_reminders(&fixture.ctx, team.id).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_send_reminders_missing_subaccount_aborts() {
    let fixture = TestFixture::new().await;
    let creator = fixture
        .repo
        .create_user("Team", "Creator", "creator@test.ph")
        .await
        .unwrap();
    let team = fixture
        .repo
        .create_team(&CreateTeamRequest {
            name: "platform".to_string(),
            description: String::new(),
            email: "platform@test.ph".to_string(),
            active: true,
            subaccount_id: None,
            timezone: "UTC".to_string(),
            digest_days_sent: vec![0, 1, 2, 3, 4],
            send_digest_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            send_reminders_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            created_by: creator.id,
        })
        .await
        .unwrap();
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    let result = tasks::send_reminders(&fixture.ctx, team.id).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.queue.jobs().is_empty());
}

// ==================== REMINDER DELIVERY ====================

#[tokio::test]
async fn test_remind_member_sends_email() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, jane) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    tasks::remind_team_member(&fixture.ctx, membership_id, None, None)
        .await
        .unwrap();

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "What did you get done today?");
    assert_eq!(sent[0].from, "Standup Reminder <platform@test.ph>");
    assert_eq!(
        sent[0].to,
        vec![format!("{} <{}>", jane.full_name(), jane.email)]
    );
    assert_eq!(sent[0].subaccount.as_deref(), Some("acct-platform"));
}

#[tokio::test]
async fn test_remind_member_includes_todos_and_blockers() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    let todos = vec![
        "Finish Ticket #102".to_string(),
        "Open PR for Ticket #103".to_string(),
    ];
    let blockers = vec!["Slow internet connection".to_string(), "Power outage".to_string()];
    tasks::remind_team_member(
        &fixture.ctx,
        membership_id,
        Some(todos.clone()),
        Some(blockers.clone()),
    )
    .await
    .unwrap();

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    for todo in &todos {
        assert!(sent[0].text_body.contains(todo));
    }
    for blocker in &blockers {
        assert!(sent[0].text_body.contains(blocker));
    }
}

#[tokio::test]
async fn test_remind_member_inactive_membership_sends_nothing() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture
        .repo
        .set_membership_active(membership_id, false)
        .await
        .unwrap();

    let result = tasks::remind_team_member(&fixture.ctx, membership_id, None, None).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_remind_member_unknown_membership_sends_nothing() {
    let fixture = TestFixture::new().await;

    let result = tasks::remind_team_member(&fixture.ctx, 999, None, None).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.mailer.sent().is_empty());
}

// ==================== RETRY POLICY ====================

#[tokio::test]
async fn test_transport_failure_registers_single_retry() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture.mailer.fail_next_sends(1);

    let job = Job::RemindMember {
        membership_id,
        todos: None,
        blockers: None,
    };
    tasks::run(&fixture.ctx, job.clone(), 0).await;

    let jobs = fixture.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job, job);
    assert_eq!(jobs[0].countdown, Some(Duration::from_secs(300)));
    assert_eq!(jobs[0].attempt, 1);
    assert!(fixture.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_exhausted_retries_stop_rescheduling() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture.mailer.fail_next_sends(1);

    let job = Job::RemindMember {
        membership_id,
        todos: None,
        blockers: None,
    };
    tasks::run(&fixture.ctx, job, MAX_RETRIES).await;

    assert!(fixture.queue.jobs().is_empty());
    assert!(fixture.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_permanent_skip_never_retries() {
    let fixture = TestFixture::new().await;

    let job = Job::SendDigest {
        team_id: 999,
        for_date: monday(),
        for_project_managers: false,
    };
    tasks::run(&fixture.ctx, job, 0).await;

    assert!(fixture.queue.jobs().is_empty());
    assert!(fixture.mailer.sent().is_empty());
}

// ==================== DIGEST DELIVERY ====================

/// Digest instant: Monday 09:00 business time as UTC.
fn digest_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 5, 1, 0, 0).unwrap()
}

#[tokio::test]
async fn test_send_digest_to_members_silent_recipients_and_owner() {
    let fixture = TestFixture::new().await;
    let (team, creator) = fixture.seed_team("Success Team", "success@test.com").await;
    let (_, dev) = fixture.add_member(&team, "Dev", "One", "dev_1@test.ph").await;
    let silent = fixture
        .repo
        .create_user("Silent", "One", "silent_1@test.ph")
        .await
        .unwrap();
    fixture
        .repo
        .add_silent_recipient(team.id, silent.id)
        .await
        .unwrap();

    tasks::send_digest(&fixture.ctx, team.id, digest_instant(), false)
        .await
        .unwrap();

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Digest for Success Team for Mon, Jan 05 2015");
    assert_eq!(sent[0].from, "Standup Digest <success@test.com>");

    let mut recipients = sent[0].to.clone();
    recipients.sort();
    let mut expected = vec![creator.email, dev.email, silent.email];
    expected.sort();
    assert_eq!(recipients, expected);
    assert!(sent[0].html_body.is_some());
}

#[tokio::test]
async fn test_send_digest_deduplicates_owner_membership() {
    let fixture = TestFixture::new().await;
    let (team, creator) = fixture.seed_team("platform", "platform@test.ph").await;
    // The owner is also an active member; their address must appear once.
    fixture
        .repo
        .create_membership(team.id, creator.id, None, true)
        .await
        .unwrap();

    tasks::send_digest(&fixture.ctx, team.id, digest_instant(), false)
        .await
        .unwrap();

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec![creator.email]);
}

#[tokio::test]
async fn test_send_digest_pm_preview_goes_to_owner_only() {
    let fixture = TestFixture::new().await;
    let (team, creator) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    let silent = fixture
        .repo
        .create_user("Silent", "One", "silent_1@test.ph")
        .await
        .unwrap();
    fixture
        .repo
        .add_silent_recipient(team.id, silent.id)
        .await
        .unwrap();

    tasks::send_digest(&fixture.ctx, team.id, digest_instant(), true)
        .await
        .unwrap();

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec![creator.email]);
}

#[tokio::test]
async fn test_send_digest_without_members_sends_nothing() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;

    let result = tasks::send_digest(&fixture.ctx, team.id, digest_instant(), false).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_send_digest_inactive_team_sends_nothing() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;
    fixture.repo.set_team_active(team.id, false).await.unwrap();

    let result = tasks::send_digest(&fixture.ctx, team.id, digest_instant(), false).await;

    assert!(matches!(result, Err(SendError::Permanent(_))));
    assert!(fixture.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_send_digest_body_contains_member_updates() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;

    // Jane carries a role; it shows up next to her name in the digest.
    let role = fixture.repo.create_role("Developer").await.unwrap();
    let jane = fixture.repo.create_user("Jane", "Doe", "jane@test.ph").await.unwrap();
    let with_update = fixture
        .repo
        .create_membership(team.id, jane.id, Some(role.id), true)
        .await
        .unwrap()
        .id;
    fixture.add_member(&team, "John", "Roe", "john@test.ph").await;

    // The roster is built for the digest instant's business-local day.
    let digest_day = fixture.ctx.clock.local_date(digest_instant());
    fixture
        .repo
        .create_update(
            with_update,
            digest_day,
            &UpdateDraft {
                done: "Shipped the API".to_string(),
                will_do: "Write docs".to_string(),
                blocker: String::new(),
            },
        )
        .await
        .unwrap();

    tasks::send_digest(&fixture.ctx, team.id, digest_instant(), false)
        .await
        .unwrap();

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text_body.contains("Jane Doe (Developer)"));
    assert!(sent[0].text_body.contains("Shipped the API"));
    assert!(sent[0].text_body.contains("Write docs"));
    assert!(sent[0].text_body.contains("No update submitted."));
}

// ==================== REPOSITORY RULES ====================

#[tokio::test]
async fn test_eligible_teams_applies_all_filters() {
    let fixture = TestFixture::new().await;

    let (eligible, _) = fixture.seed_team("eligible", "eligible@test.ph").await;
    fixture.add_member(&eligible, "Jane", "Doe", "jane@test.ph").await;

    let (no_days, _) = fixture
        .seed_team_with("no-days", "no-days@test.ph", vec![])
        .await;
    fixture.add_member(&no_days, "John", "Roe", "john@test.ph").await;

    let (inactive, _) = fixture.seed_team("inactive", "inactive@test.ph").await;
    fixture.add_member(&inactive, "Jill", "Poe", "jill@test.ph").await;
    fixture.repo.set_team_active(inactive.id, false).await.unwrap();

    fixture.seed_team("memberless", "memberless@test.ph").await;

    let teams = fixture.repo.eligible_teams().await.unwrap();
    let names: Vec<_> = teams.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["eligible"]);
}

#[tokio::test]
async fn test_update_for_date_takes_lowest_id() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    let date = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap();
    let first = fixture
        .repo
        .create_update(
            membership_id,
            date,
            &UpdateDraft {
                done: "first".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    fixture
        .repo
        .create_update(
            membership_id,
            date,
            &UpdateDraft {
                done: "second".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let found = fixture
        .repo
        .update_for_date(membership_id, date)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.done, "first");
}

// ==================== INBOUND CAPTURE ====================

#[tokio::test]
async fn test_inbound_message_creates_update_and_links_audit() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    let (membership_id, _) = fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    let message = InboundMessage {
        text: "-shipped the api\n+write docs\n*waiting on review".to_string(),
        email: "platform@test.ph".to_string(),
        from_email: "jane@test.ph".to_string(),
    };
    let (request_id, update) = tasks::receive_update(&fixture.ctx, &message).await.unwrap();

    let update = update.unwrap();
    assert_eq!(update.membership_id, membership_id);
    assert_eq!(update.for_date, fixture.today());
    assert_eq!(update.done, "shipped the api");
    assert_eq!(update.will_do, "write docs");
    assert_eq!(update.blocker, "waiting on review");

    let audit = fixture
        .repo
        .inbound_request(request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(audit.update_id, Some(update.id));
    assert!(audit.message.contains("jane@test.ph"));
}

#[tokio::test]
async fn test_inbound_message_wrong_format_enqueues_auto_reply() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    let message = InboundMessage {
        text: "just chatting about lunch".to_string(),
        email: "platform@test.ph".to_string(),
        from_email: "jane@test.ph".to_string(),
    };
    let (request_id, update) = tasks::receive_update(&fixture.ctx, &message).await.unwrap();

    assert!(update.is_none());
    let jobs = fixture.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].job,
        Job::WrongFormatReply {
            team_email: "platform@test.ph".to_string(),
            sender_email: "jane@test.ph".to_string(),
            body: "just chatting about lunch".to_string(),
        }
    );

    // The audit row exists but links to no update.
    let audit = fixture
        .repo
        .inbound_request(request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(audit.update_id, None);
}

#[tokio::test]
async fn test_wrong_format_reply_sends_from_team_inbox() {
    let fixture = TestFixture::new().await;

    tasks::wrong_format_reply(
        &fixture.ctx,
        "platform@test.ph",
        "jane@test.ph",
        "email content",
    )
    .await
    .unwrap();

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "platform@test.ph");
    assert_eq!(sent[0].to, vec!["jane@test.ph".to_string()]);
    assert!(sent[0].text_body.contains("email content"));
}

// ==================== HTTP SURFACE ====================

#[tokio::test]
async fn test_health_teams_and_webhook_over_http() {
    let fixture = TestFixture::new().await;
    let (team, _) = fixture.seed_team("platform", "platform@test.ph").await;
    fixture.add_member(&team, "Jane", "Doe", "jane@test.ph").await;

    let app = create_router(AppState {
        ctx: fixture.ctx.clone(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let base_url = format!("http://{}", addr);

    let resp = client.get(format!("{}/health", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = client.get(format!("{}/api/teams", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["name"], "platform");

    let resp = client
        .post(format!("{}/api/webhooks/inbound", base_url))
        .json(&serde_json::json!({
            "text": "-shipped the api",
            "email": "platform@test.ph",
            "from_email": "jane@test.ph"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["data"]["update_id"].is_i64());
}

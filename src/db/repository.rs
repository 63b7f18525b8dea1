//! Database repository exposing named query methods.
//!
//! The scheduling core depends only on these methods, never on raw
//! queries; eligibility and lookup rules live here in one place.

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    CreateTeamRequest, InboundWebhookRequest, MemberProfile, Membership, Role, Team, Update,
    UpdateDraft, User,
};

const TEAM_COLUMNS: &str = "id, name, description, email, active, subaccount_id, timezone, \
     digest_days_sent, send_digest_at, send_reminders_at, created_by";

const PROFILE_COLUMNS: &str = "m.id AS membership_id, t.name AS team_name, \
     t.email AS team_email, t.subaccount_id AS team_subaccount, \
     u.first_name, u.last_name, u.email, r.name AS role";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== SCHEDULING QUERIES ====================

    /// Teams eligible for scheduling: marked active, at least one
    /// configured send day, and at least one active membership.
    pub async fn eligible_teams(&self) -> Result<Vec<Team>, AppError> {
        let sql = format!(
            "SELECT DISTINCT t.{} FROM teams t \
             JOIN memberships m ON m.team_id = t.id AND m.is_active = 1 \
             WHERE t.active = 1 AND t.digest_days_sent <> '[]' \
             ORDER BY t.id",
            TEAM_COLUMNS.replace(", ", ", t.")
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(team_from_row).collect())
    }

    /// Get a team by ID, only if it is still marked active.
    pub async fn active_team(&self, id: i64) -> Result<Option<Team>, AppError> {
        let sql = format!("SELECT {} FROM teams WHERE id = ? AND active = 1", TEAM_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(team_from_row))
    }

    /// All active memberships of a team, joined with user and team data,
    /// ordered by membership id.
    pub async fn active_memberships(&self, team_id: i64) -> Result<Vec<MemberProfile>, AppError> {
        let sql = format!(
            "SELECT {} FROM memberships m \
             JOIN teams t ON t.id = m.team_id \
             JOIN users u ON u.id = m.user_id \
             LEFT JOIN roles r ON r.id = m.role_id \
             WHERE m.team_id = ? AND m.is_active = 1 \
             ORDER BY m.id",
            PROFILE_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(team_id).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(profile_from_row).collect())
    }

    /// Get a membership by ID, only if it is still active.
    pub async fn active_membership(&self, id: i64) -> Result<Option<MemberProfile>, AppError> {
        let sql = format!(
            "SELECT {} FROM memberships m \
             JOIN teams t ON t.id = m.team_id \
             JOIN users u ON u.id = m.user_id \
             LEFT JOIN roles r ON r.id = m.role_id \
             WHERE m.id = ? AND m.is_active = 1",
            PROFILE_COLUMNS
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    /// The active membership addressed by a team inbox and sender pair.
    pub async fn membership_by_emails(
        &self,
        team_email: &str,
        user_email: &str,
    ) -> Result<Option<MemberProfile>, AppError> {
        let sql = format!(
            "SELECT {} FROM memberships m \
             JOIN teams t ON t.id = m.team_id \
             JOIN users u ON u.id = m.user_id \
             LEFT JOIN roles r ON r.id = m.role_id \
             WHERE t.email = ? AND u.email = ? AND m.is_active = 1 \
             ORDER BY m.id LIMIT 1",
            PROFILE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(team_email)
            .bind(user_email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    /// A member's update for an exact calendar date. Multiple rows may
    /// exist for one date; the lowest id (earliest created) wins.
    pub async fn update_for_date(
        &self,
        membership_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Update>, AppError> {
        let row = sqlx::query(
            "SELECT id, membership_id, for_date, done, will_do, blocker FROM updates \
             WHERE membership_id = ? AND for_date = ? ORDER BY id LIMIT 1",
        )
        .bind(membership_id)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(update_from_row))
    }

    /// Digest recipient addresses for a team, de-duplicated.
    ///
    /// Project-managers-only digests go to the team owner alone; regular
    /// digests go to active members, silent recipients, and the owner.
    pub async fn digest_recipients(
        &self,
        team_id: i64,
        for_project_managers: bool,
    ) -> Result<Vec<String>, AppError> {
        let owner_sql = "SELECT u.email FROM users u \
             JOIN teams t ON t.created_by = u.id WHERE t.id = ?";

        let rows = if for_project_managers {
            sqlx::query(owner_sql).bind(team_id).fetch_all(&self.pool).await?
        } else {
            let sql = format!(
                "{} UNION \
                 SELECT u.email FROM users u \
                 JOIN memberships m ON m.user_id = u.id \
                 WHERE m.team_id = ? AND m.is_active = 1 \
                 UNION \
                 SELECT u.email FROM users u \
                 JOIN silent_recipients s ON s.user_id = u.id \
                 JOIN team_silent_recipients ts ON ts.silent_recipient_id = s.id \
                 WHERE ts.team_id = ?",
                owner_sql
            );
            sqlx::query(&sql)
                .bind(team_id)
                .bind(team_id)
                .bind(team_id)
                .fetch_all(&self.pool)
                .await?
        };

        Ok(rows.iter().map(|row| row.get("email")).collect())
    }

    // ==================== TEAM OPERATIONS ====================

    /// List all teams.
    pub async fn list_teams(&self) -> Result<Vec<Team>, AppError> {
        let sql = format!("SELECT {} FROM teams ORDER BY name", TEAM_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(team_from_row).collect())
    }

    /// Create a new team.
    pub async fn create_team(&self, request: &CreateTeamRequest) -> Result<Team, AppError> {
        let days_json = serde_json::to_string(&request.digest_days_sent).unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO teams (name, description, email, active, subaccount_id, timezone, \
             digest_days_sent, send_digest_at, send_reminders_at, created_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.email)
        .bind(request.active as i32)
        .bind(&request.subaccount_id)
        .bind(&request.timezone)
        .bind(&days_json)
        .bind(request.send_digest_at.format("%H:%M").to_string())
        .bind(request.send_reminders_at.format("%H:%M").to_string())
        .bind(request.created_by)
        .execute(&self.pool)
        .await?;

        Ok(Team {
            id: result.last_insert_rowid(),
            name: request.name.clone(),
            description: request.description.clone(),
            email: request.email.clone(),
            active: request.active,
            subaccount_id: request.subaccount_id.clone(),
            timezone: request.timezone.clone(),
            digest_days_sent: request.digest_days_sent.clone(),
            send_digest_at: request.send_digest_at,
            send_reminders_at: request.send_reminders_at,
            created_by: request.created_by,
        })
    }

    /// Flip a team's active flag.
    pub async fn set_team_active(&self, id: i64, active: bool) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE teams SET active = ? WHERE id = ?")
            .bind(active as i32)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Team {} not found", id)));
        }
        Ok(())
    }

    // ==================== USER / MEMBERSHIP OPERATIONS ====================

    /// Create a new user.
    pub async fn create_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<User, AppError> {
        let result = sqlx::query("INSERT INTO users (first_name, last_name, email) VALUES (?, ?, ?)")
            .bind(first_name)
            .bind(last_name)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
        })
    }

    /// Create a new role.
    pub async fn create_role(&self, name: &str) -> Result<Role, AppError> {
        let result = sqlx::query("INSERT INTO roles (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Role {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Create a membership linking a user to a team.
    pub async fn create_membership(
        &self,
        team_id: i64,
        user_id: i64,
        role_id: Option<i64>,
        is_active: bool,
    ) -> Result<Membership, AppError> {
        let result = sqlx::query(
            "INSERT INTO memberships (team_id, user_id, role_id, is_active) VALUES (?, ?, ?, ?)",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role_id)
        .bind(is_active as i32)
        .execute(&self.pool)
        .await?;

        Ok(Membership {
            id: result.last_insert_rowid(),
            team_id,
            user_id,
            role_id,
            is_active,
        })
    }

    /// Flip a membership's active flag.
    pub async fn set_membership_active(&self, id: i64, is_active: bool) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE memberships SET is_active = ? WHERE id = ?")
            .bind(is_active as i32)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Membership {} not found", id)));
        }
        Ok(())
    }

    /// Register a user as a silent digest recipient of a team.
    pub async fn add_silent_recipient(&self, team_id: i64, user_id: i64) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO silent_recipients (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id FROM silent_recipients WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let recipient_id: i64 = row.get("id");

        sqlx::query(
            "INSERT OR IGNORE INTO team_silent_recipients (team_id, silent_recipient_id) VALUES (?, ?)",
        )
        .bind(team_id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== UPDATE OPERATIONS ====================

    /// Store a new update for a membership and date.
    pub async fn create_update(
        &self,
        membership_id: i64,
        for_date: NaiveDate,
        draft: &UpdateDraft,
    ) -> Result<Update, AppError> {
        let result = sqlx::query(
            "INSERT INTO updates (membership_id, for_date, done, will_do, blocker) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(membership_id)
        .bind(for_date.format("%Y-%m-%d").to_string())
        .bind(&draft.done)
        .bind(&draft.will_do)
        .bind(&draft.blocker)
        .execute(&self.pool)
        .await?;

        Ok(Update {
            id: result.last_insert_rowid(),
            membership_id,
            for_date,
            done: draft.done.clone(),
            will_do: draft.will_do.clone(),
            blocker: draft.blocker.clone(),
        })
    }

    // ==================== WEBHOOK AUDIT LOG ====================

    /// Append a raw inbound payload to the audit log.
    pub async fn record_inbound_request(&self, message: &str) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        let result =
            sqlx::query("INSERT INTO inbound_webhook_requests (timestamp, message) VALUES (?, ?)")
                .bind(&now)
                .bind(message)
                .execute(&self.pool)
                .await?;

        Ok(result.last_insert_rowid())
    }

    /// Link an audit row to the update it produced.
    pub async fn link_inbound_update(&self, request_id: i64, update_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE inbound_webhook_requests SET update_id = ? WHERE id = ?")
            .bind(update_id)
            .bind(request_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Fetch an audit row by id.
    pub async fn inbound_request(&self, id: i64) -> Result<Option<InboundWebhookRequest>, AppError> {
        let row = sqlx::query(
            "SELECT id, timestamp, message, update_id FROM inbound_webhook_requests WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| InboundWebhookRequest {
            id: row.get("id"),
            timestamp: row.get("timestamp"),
            message: row.get("message"),
            update_id: row.get("update_id"),
        }))
    }
}

// Helper functions for row conversion

fn team_from_row(row: &sqlx::sqlite::SqliteRow) -> Team {
    let active: i32 = row.get("active");
    let days_str: String = row.get("digest_days_sent");
    let digest_at: String = row.get("send_digest_at");
    let reminders_at: String = row.get("send_reminders_at");
    Team {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        email: row.get("email"),
        active: active != 0,
        subaccount_id: row.get("subaccount_id"),
        timezone: row.get("timezone"),
        digest_days_sent: serde_json::from_str(&days_str).unwrap_or_default(),
        send_digest_at: parse_time(&digest_at),
        send_reminders_at: parse_time(&reminders_at),
        created_by: row.get("created_by"),
    }
}

fn profile_from_row(row: &sqlx::sqlite::SqliteRow) -> MemberProfile {
    let first_name: String = row.get("first_name");
    let last_name: String = row.get("last_name");
    MemberProfile {
        membership_id: row.get("membership_id"),
        team_name: row.get("team_name"),
        team_email: row.get("team_email"),
        team_subaccount: row.get("team_subaccount"),
        full_name: format!("{} {}", first_name, last_name).trim().to_string(),
        email: row.get("email"),
        role: row.get("role"),
    }
}

fn update_from_row(row: &sqlx::sqlite::SqliteRow) -> Update {
    let date_str: String = row.get("for_date");
    Update {
        id: row.get("id"),
        membership_id: row.get("membership_id"),
        for_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        done: row.get("done"),
        will_do: row.get("will_do"),
        blocker: row.get("blocker"),
    }
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap_or_default()
}

//! Team model and creation request.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A team whose members submit daily updates and receive reminder and
/// digest emails on the configured weekdays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub email: String,
    pub active: bool,
    /// Reference to the external sending account the transport tags
    /// outgoing mail with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subaccount_id: Option<String>,
    /// Persisted per-team zone name. Informational only: scheduling runs
    /// on the process-wide business clock, not this field.
    pub timezone: String,
    /// Weekday indexes (Monday = 0 .. Sunday = 6) on which reminders and
    /// digests go out. Empty means the team is never scheduled.
    pub digest_days_sent: Vec<u8>,
    pub send_digest_at: NaiveTime,
    pub send_reminders_at: NaiveTime,
    pub created_by: i64,
}

impl Team {
    /// Whether the given business-zone weekday index is a send day.
    pub fn sends_on(&self, weekday: u8) -> bool {
        self.digest_days_sent.contains(&weekday)
    }
}

/// Request body for creating a new team.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub email: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub subaccount_id: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub digest_days_sent: Vec<u8>,
    pub send_digest_at: NaiveTime,
    pub send_reminders_at: NaiveTime,
    pub created_by: i64,
}

fn default_active() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

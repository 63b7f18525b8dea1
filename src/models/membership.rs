//! Membership model and the joined delivery profile.

use serde::{Deserialize, Serialize};

/// Links a user to a team. Unique per (team, user); only active
/// memberships receive reminders or appear in digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub team_id: i64,
    pub user_id: i64,
    pub role_id: Option<i64>,
    pub is_active: bool,
}

/// A membership joined with its user and team, as the send executors
/// consume it: everything needed to address one member is in one row.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub membership_id: i64,
    pub team_name: String,
    pub team_email: String,
    pub team_subaccount: Option<String>,
    pub full_name: String,
    pub email: String,
    pub role: Option<String>,
}

impl MemberProfile {
    /// RFC 5322-style display recipient ("Jane Doe <jane@example.com>").
    pub fn recipient(&self) -> String {
        format!("{} <{}>", self.full_name, self.email)
    }
}

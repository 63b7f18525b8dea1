//! Daily update model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One member's status update for one calendar date.
///
/// The three fields are free multi-line text; consumers read them as
/// non-empty trimmed line lists. History is unbounded and dates are not
/// unique per membership; lookups take the lowest-id match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub id: i64,
    pub membership_id: i64,
    pub for_date: NaiveDate,
    pub done: String,
    pub will_do: String,
    pub blocker: String,
}

impl Update {
    pub fn done_as_list(&self) -> Vec<String> {
        non_empty_lines(&self.done)
    }

    pub fn will_do_as_list(&self) -> Vec<String> {
        non_empty_lines(&self.will_do)
    }

    pub fn blocker_as_list(&self) -> Vec<String> {
        non_empty_lines(&self.blocker)
    }
}

/// The parsed fields of an update before it is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDraft {
    pub done: String,
    pub will_do: String,
    pub blocker: String,
}

impl UpdateDraft {
    pub fn is_empty(&self) -> bool {
        self.done.is_empty() && self.will_do.is_empty() && self.blocker.is_empty()
    }
}

/// Split free text into trimmed, non-empty lines.
pub fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

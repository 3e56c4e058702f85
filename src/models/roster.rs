//! Roster entries as supplied by the student directory.

use serde::{Deserialize, Serialize};

/// One student of a class, as read from the `students` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub full_name: String,
    pub roll_number: String,
}

impl RosterEntry {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>, roll_number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            roll_number: roll_number.into(),
        }
    }
}

//! Class and attendance-session view models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Class row from the `classes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
}

/// Class name/section embedded in a joined select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    pub name: String,
    #[serde(default)]
    pub section: Option<String>,
}

/// Past attendance session from the `attendance_sessions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSessionSummary {
    pub id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub status: String,
    /// Joined class info; absent when the class row was deleted.
    #[serde(default, rename = "classes")]
    pub class: Option<ClassRef>,
}

/// Format `name` or `name - section`.
fn label(name: &str, section: Option<&str>) -> String {
    match section.filter(|s| !s.is_empty()) {
        Some(section) => format!("{name} - {section}"),
        None => name.to_string(),
    }
}

impl Class {
    /// Display label used in class pickers.
    pub fn label(&self) -> String {
        label(&self.name, self.section.as_deref())
    }
}

impl ClassRef {
    pub fn label(&self) -> String {
        label(&self.name, self.section.as_deref())
    }
}

impl AttendanceSessionSummary {
    /// Whether the session reached its terminal state.
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn class_label(&self) -> String {
        self.class.as_ref().map(ClassRef::label).unwrap_or_default()
    }
}

//! Attendance records and run summaries.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::roster::RosterEntry;

/// Presence status for one student in one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }

    /// Capitalized label used in tables and exports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
            Self::Late => "Late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One student's status for a single attendance session.
///
/// `confidence` is set only when the record came out of a detector;
/// manually entered records carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAttendanceRecord {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    pub status: AttendanceStatus,
    pub confidence: Option<u8>,
}

impl StudentAttendanceRecord {
    /// Record produced by a detector.
    pub fn detected(entry: &RosterEntry, status: AttendanceStatus, confidence: u8) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.full_name.clone(),
            roll_number: entry.roll_number.clone(),
            status,
            confidence: Some(confidence.min(100)),
        }
    }

    /// Manually entered record, without a confidence score.
    pub fn manual(entry: &RosterEntry, status: AttendanceStatus) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.full_name.clone(),
            roll_number: entry.roll_number.clone(),
            status,
            confidence: None,
        }
    }

    /// Confidence as shown to the user: `92%` or `N/A`.
    pub fn confidence_label(&self) -> String {
        match self.confidence {
            Some(c) => format!("{c}%"),
            None => "N/A".to_string(),
        }
    }
}

/// Per-status counts over a list of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
}

impl AttendanceSummary {
    pub fn from_records(records: &[StudentAttendanceRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            acc.total += 1;
            match r.status {
                AttendanceStatus::Present => acc.present += 1,
                AttendanceStatus::Late => acc.late += 1,
                AttendanceStatus::Absent => acc.absent += 1,
            }
            acc
        })
    }

    /// Share of present students in percent, 0 for an empty list.
    pub fn present_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.present as f64 * 100.0 / self.total as f64
    }

    /// Message shown once processing finishes.
    pub fn message(&self) -> String {
        format!("Detected {} present students.", self.present)
    }
}

//! Attendance-taking orchestration.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::models::{AttendanceSummary, StudentAttendanceRecord};
use crate::roster::RosterSource;
use crate::simulator::PresenceDetector;

/// Result of one attendance-taking run.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRun {
    pub class_id: String,
    pub records: Vec<StudentAttendanceRecord>,
    pub summary: AttendanceSummary,
    pub taken_at: DateTime<Local>,
}

/// Runs roster fetch, processing pause and detection for a class.
pub struct AttendanceService<S, D> {
    roster: S,
    detector: D,
    processing_delay: Duration,
}

impl<S: RosterSource, D: PresenceDetector> AttendanceService<S, D> {
    /// Create a new attendance service.
    pub fn new(roster: S, detector: D, processing_delay: Duration) -> Self {
        Self {
            roster,
            detector,
            processing_delay,
        }
    }

    /// Take attendance for a class.
    pub async fn take_attendance(&mut self, class_id: &str) -> Result<AttendanceRun> {
        self.take_attendance_with_progress(class_id, |_, _| {}).await
    }

    /// Take attendance with progress callback.
    pub async fn take_attendance_with_progress<F>(&mut self, class_id: &str, mut on_progress: F) -> Result<AttendanceRun>
    where
        F: FnMut(f32, &str),
    {
        info!("Taking attendance for class {class_id}");

        on_progress(0.0, "Loading class roster...");
        let roster = self.roster.list_students(class_id).await?;
        on_progress(0.2, &format!("Loaded {} students", roster.len()));

        on_progress(0.3, "Processing photo...");
        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        let records = self.detector.detect(&roster);
        let summary = AttendanceSummary::from_records(&records);

        info!(
            "Attendance complete: {} present, {} late, {} absent",
            summary.present, summary.late, summary.absent
        );
        on_progress(1.0, &summary.message());

        Ok(AttendanceRun {
            class_id: class_id.to_string(),
            records,
            summary,
            taken_at: Local::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{AttendanceStatus, RosterEntry};
    use crate::roster::CsvRoster;
    use crate::simulator::{AttendanceSimulator, ScriptedRandom};

    fn roster() -> Vec<RosterEntry> {
        vec![
            RosterEntry::new("1", "Jane Doe", "CS001"),
            RosterEntry::new("2", "Sam Lee", "CS002"),
            RosterEntry::new("3", "Ana Ruiz", "CS003"),
        ]
    }

    #[tokio::test]
    async fn test_take_attendance_scripted() {
        // present, late, absent
        let rng = ScriptedRandom::new([0.9, 0.0, 0.1, 0.8, 0.5, 0.1, 0.2, 0.5]);
        let mut service = AttendanceService::new(roster(), AttendanceSimulator::with_source(rng), Duration::ZERO);

        let run = service.take_attendance("physics").await.unwrap();

        assert_eq!(run.class_id, "physics");
        let statuses: Vec<_> = run.records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![AttendanceStatus::Present, AttendanceStatus::Late, AttendanceStatus::Absent]
        );
        assert_eq!(run.summary.present, 1);
        assert_eq!(run.summary.total, 3);
    }

    #[tokio::test]
    async fn test_progress_reports_completion() {
        let mut service = AttendanceService::new(roster(), AttendanceSimulator::seeded(3), Duration::ZERO);
        let mut steps = Vec::new();

        service
            .take_attendance_with_progress("physics", |p, msg| steps.push((p, msg.to_string())))
            .await
            .unwrap();

        assert_eq!(steps.first().unwrap().0, 0.0);
        let (last_p, last_msg) = steps.last().unwrap();
        assert_eq!(*last_p, 1.0);
        assert!(last_msg.starts_with("Detected "));
    }

    #[tokio::test]
    async fn test_empty_roster_yields_empty_run() {
        let mut service = AttendanceService::new(Vec::new(), AttendanceSimulator::seeded(1), Duration::ZERO);
        let run = service.take_attendance("empty").await.unwrap();

        assert!(run.records.is_empty());
        assert_eq!(run.summary, AttendanceSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_delay_is_applied() {
        let mut service = AttendanceService::new(roster(), AttendanceSimulator::seeded(1), Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        service.take_attendance("physics").await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_roster_error_propagates() {
        let source = CsvRoster::new("/nonexistent/rollcall/roster.csv");
        let mut service = AttendanceService::new(source, AttendanceSimulator::seeded(1), Duration::ZERO);

        assert!(matches!(service.take_attendance("x").await, Err(AppError::Io(_))));
    }
}

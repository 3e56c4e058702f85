//! Data models for classes, rosters, and attendance records.

pub mod attendance;
pub mod class;
pub mod roster;

pub use attendance::{AttendanceStatus, AttendanceSummary, StudentAttendanceRecord};
pub use class::{AttendanceSessionSummary, Class, ClassRef};
pub use roster::RosterEntry;

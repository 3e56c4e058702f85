//! Roster sources.
//!
//! The attendance flow only needs "the students of class X". The hosted
//! backend provides that online (`client::BackendRoster`); a local CSV file
//! provides it offline.

use std::future::Future;
use std::io::Read;
use std::path::PathBuf;

use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::RosterEntry;

/// Supplies the roster of a class.
pub trait RosterSource {
    fn list_students(&self, class_id: &str) -> impl Future<Output = Result<Vec<RosterEntry>>> + Send;
}

/// Fixed in-memory roster; the class id is ignored.
impl RosterSource for Vec<RosterEntry> {
    async fn list_students(&self, _class_id: &str) -> Result<Vec<RosterEntry>> {
        Ok(self.clone())
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    id: String,
    full_name: String,
    roll_number: String,
    #[serde(default)]
    class_id: Option<String>,
}

/// Roster read from a CSV file with headers
/// `id,full_name,roll_number[,class_id]`.
///
/// Without a `class_id` column every row belongs to every class.
#[derive(Debug, Clone)]
pub struct CsvRoster {
    path: PathBuf,
}

impl CsvRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RosterSource for CsvRoster {
    async fn list_students(&self, class_id: &str) -> Result<Vec<RosterEntry>> {
        let content = tokio::fs::read(&self.path).await?;
        let roster = parse_roster(content.as_slice(), Some(class_id))?;
        debug!("Loaded {} students from {}", roster.len(), self.path.display());
        Ok(roster)
    }
}

/// Parse roster CSV, keeping rows of `class_id` when the file has one.
pub fn parse_roster<R: Read>(reader: R, class_id: Option<&str>) -> Result<Vec<RosterEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);

    let mut roster = Vec::new();
    for (line, result) in reader.deserialize::<RosterRow>().enumerate() {
        let row = result?;
        if row.id.is_empty() || row.roll_number.is_empty() {
            return Err(AppError::validation(format!(
                "Roster line {}: id and roll_number are required",
                line + 2
            )));
        }

        let keep = match (class_id, row.class_id.as_deref()) {
            (Some(wanted), Some(actual)) if !actual.is_empty() => wanted == actual,
            _ => true,
        };
        if keep {
            roster.push(RosterEntry::new(row.id, row.full_name, row.roll_number));
        }
    }
    Ok(roster)
}

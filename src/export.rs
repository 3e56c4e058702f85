//! CSV and Excel export of attendance records.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::StudentAttendanceRecord;

/// Column headers shared by every export format.
pub const HEADERS: [&str; 4] = ["Roll Number", "Student Name", "Status", "Confidence"];

/// Output file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// How CSV fields are quoted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CsvStyle {
    /// Wrap each field in `"` as-is. Embedded quotes are not escaped, so a
    /// name containing `"` yields a malformed row.
    #[default]
    Verbatim,
    /// RFC 4180 quoting: every field quoted, embedded `"` doubled.
    Escaped,
}

/// One data row read back from an exported CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedRow {
    pub roll_number: String,
    pub name: String,
    pub status: String,
    pub confidence: String,
}

fn row_fields(record: &StudentAttendanceRecord) -> [String; 4] {
    [
        record.roll_number.clone(),
        record.name.clone(),
        record.status.label().to_string(),
        record.confidence_label(),
    ]
}

/// `"a","b",...` without escaping.
fn quote_verbatim<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(|f| format!("\"{f}\"")).collect::<Vec<_>>().join(",")
}

fn ensure_not_empty(records: &[StudentAttendanceRecord]) -> Result<()> {
    if records.is_empty() {
        warn!("Export requested with no attendance records");
        return Err(AppError::NoData);
    }
    Ok(())
}

/// Serialize records to CSV text with [`CsvStyle::Verbatim`] quoting.
///
/// Returns [`AppError::NoData`] for an empty list.
pub fn export_to_csv(records: &[StudentAttendanceRecord]) -> Result<String> {
    export_to_csv_with_style(records, CsvStyle::Verbatim)
}

/// Serialize records to CSV text. Rows are separated by `\n` with no
/// trailing newline.
pub fn export_to_csv_with_style(records: &[StudentAttendanceRecord], style: CsvStyle) -> Result<String> {
    ensure_not_empty(records)?;

    match style {
        CsvStyle::Verbatim => {
            let mut lines = Vec::with_capacity(records.len() + 1);
            lines.push(quote_verbatim(HEADERS.iter().copied()));
            for record in records {
                let fields = row_fields(record);
                lines.push(quote_verbatim(fields.iter().map(String::as_str)));
            }
            Ok(lines.join("\n"))
        }
        CsvStyle::Escaped => {
            let mut writer = WriterBuilder::new()
                .quote_style(QuoteStyle::Always)
                .terminator(Terminator::Any(b'\n'))
                .from_writer(Vec::new());

            writer.write_record(HEADERS)?;
            for record in records {
                writer.write_record(row_fields(record))?;
            }

            let bytes = writer.into_inner().map_err(|e| AppError::Io(e.into_error()))?;
            let mut text = String::from_utf8(bytes).map_err(|e| AppError::validation(e.to_string()))?;
            if text.ends_with('\n') {
                text.pop();
            }
            Ok(text)
        }
    }
}

/// Read exported CSV text back into rows (header skipped).
pub fn parse_csv_export(text: &str) -> Result<Vec<ExportedRow>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        rows.push(ExportedRow {
            roll_number: field(0),
            name: field(1),
            status: field(2),
            confidence: field(3),
        });
    }
    Ok(rows)
}

/// `attendance_YYYY-MM-DD.<ext>` for the given date.
pub fn generate_export_filename(date: NaiveDate, format: ExportFormat) -> String {
    format!("attendance_{date}.{ext}", date = date.format("%Y-%m-%d"), ext = format.extension())
}

/// Export file name for today's UTC date.
pub fn default_export_filename(format: ExportFormat) -> String {
    generate_export_filename(Utc::now().date_naive(), format)
}

/// Write the CSV export into `dir` and return the file path.
pub fn save_csv_export(records: &[StudentAttendanceRecord], dir: &Path, style: CsvStyle) -> Result<PathBuf> {
    let content = export_to_csv_with_style(records, style)?;
    let path = dir.join(default_export_filename(ExportFormat::Csv));

    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, content)?;

    info!("Exported {} records to {}", records.len(), path.display());
    Ok(path)
}

/// Write attendance records to an Excel workbook.
pub fn export_attendance_to_excel(records: &[StudentAttendanceRecord], path: &Path) -> Result<()> {
    ensure_not_empty(records)?;
    write_workbook(records, path)
}

fn write_workbook(records: &[StudentAttendanceRecord], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    worksheet.set_name("Attendance")?;

    // Header format
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_color(Color::White)
        .set_border(FormatBorder::Thin);

    let percent_format = Format::new().set_num_format("0\"%\"").set_align(FormatAlign::Right);
    let na_format = Format::new().set_align(FormatAlign::Right);

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    worksheet.set_column_width(0, 14)?; // Roll Number
    worksheet.set_column_width(1, 30)?; // Student Name
    worksheet.set_column_width(2, 10)?; // Status
    worksheet.set_column_width(3, 12)?; // Confidence

    for (idx, record) in records.iter().enumerate() {
        let row = (idx + 1) as u32;

        worksheet.write_string(row, 0, &record.roll_number)?;
        worksheet.write_string(row, 1, &record.name)?;
        worksheet.write_string(row, 2, record.status.label())?;

        match record.confidence {
            Some(c) => worksheet.write_number_with_format(row, 3, f64::from(c), &percent_format)?,
            None => worksheet.write_string_with_format(row, 3, "N/A", &na_format)?,
        };
    }

    let last_row = records.len() as u32;
    worksheet.autofilter(0, 0, last_row, 3)?;
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save(path)?;
    Ok(())
}

/// Write the Excel export into `dir` and return the file path.
pub fn save_excel_export(records: &[StudentAttendanceRecord], dir: &Path) -> Result<PathBuf> {
    ensure_not_empty(records)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(default_export_filename(ExportFormat::Xlsx));
    write_workbook(records, &path)?;

    info!("Exported {} records to {}", records.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, RosterEntry};

    fn jane() -> StudentAttendanceRecord {
        StudentAttendanceRecord::detected(&RosterEntry::new("1", "Jane Doe", "CS001"), AttendanceStatus::Present, 92)
    }

    fn sam() -> StudentAttendanceRecord {
        StudentAttendanceRecord::manual(&RosterEntry::new("2", "Sam Lee", "CS002"), AttendanceStatus::Absent)
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rollcall-test-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_empty_export_is_no_data() {
        let err = export_to_csv(&[]).unwrap_err();
        assert!(err.is_no_data());

        let err = export_to_csv_with_style(&[], CsvStyle::Escaped).unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_single_record_exact_text() {
        let csv = export_to_csv(&[jane()]).unwrap();
        assert_eq!(
            csv,
            "\"Roll Number\",\"Student Name\",\"Status\",\"Confidence\"\n\"CS001\",\"Jane Doe\",\"Present\",\"92%\""
        );
    }

    #[test]
    fn test_missing_confidence_is_na() {
        let csv = export_to_csv(&[sam()]).unwrap();
        let last = csv.lines().last().unwrap();
        assert_eq!(last, "\"CS002\",\"Sam Lee\",\"Absent\",\"N/A\"");
    }

    #[test]
    fn test_no_trailing_newline() {
        let csv = export_to_csv(&[jane(), sam()]).unwrap();
        assert!(!csv.ends_with('\n'));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_round_trip() {
        let records = vec![jane(), sam()];
        let csv = export_to_csv(&records).unwrap();
        let rows = parse_csv_export(&csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            ExportedRow {
                roll_number: "CS001".to_string(),
                name: "Jane Doe".to_string(),
                status: "Present".to_string(),
                confidence: "92%".to_string(),
            }
        );
        assert_eq!(rows[1].roll_number, "CS002");
        assert_eq!(rows[1].name, "Sam Lee");
        assert_eq!(rows[1].status, "Absent");
        assert_eq!(rows[1].confidence, "N/A");
    }

    #[test]
    fn test_styles_agree_on_plain_names() {
        let records = vec![jane(), sam()];
        assert_eq!(
            export_to_csv_with_style(&records, CsvStyle::Verbatim).unwrap(),
            export_to_csv_with_style(&records, CsvStyle::Escaped).unwrap()
        );
    }

    #[test]
    fn test_verbatim_does_not_escape_quotes() {
        let mut record = jane();
        record.name = "Jane \"JJ\" Doe".to_string();
        let csv = export_to_csv(&[record]).unwrap();
        assert!(csv.ends_with("\"CS001\",\"Jane \"JJ\" Doe\",\"Present\",\"92%\""));
    }

    #[test]
    fn test_escaped_doubles_quotes_and_round_trips() {
        let mut record = jane();
        record.name = "Doe, Jane \"JJ\"".to_string();
        let csv = export_to_csv_with_style(&[record], CsvStyle::Escaped).unwrap();

        assert!(csv.ends_with("\"CS001\",\"Doe, Jane \"\"JJ\"\"\",\"Present\",\"92%\""));

        let rows = parse_csv_export(&csv).unwrap();
        assert_eq!(rows[0].name, "Doe, Jane \"JJ\"");
    }

    #[test]
    fn test_generate_export_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(generate_export_filename(date, ExportFormat::Csv), "attendance_2025-01-09.csv");
        assert_eq!(generate_export_filename(date, ExportFormat::Xlsx), "attendance_2025-01-09.xlsx");
    }

    #[test]
    fn test_save_csv_export_writes_file() {
        let dir = temp_dir("csv");
        let path = save_csv_export(&[jane()], &dir, CsvStyle::Verbatim).unwrap();

        assert!(path.file_name().unwrap().to_string_lossy().starts_with("attendance_"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, export_to_csv(&[jane()]).unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_empty_writes_nothing() {
        let dir = temp_dir("empty");
        let err = save_csv_export(&[], &dir, CsvStyle::Verbatim).unwrap_err();

        assert!(err.is_no_data());
        assert!(!dir.exists());
    }

    #[test]
    fn test_excel_export_writes_file() {
        let dir = temp_dir("xlsx");
        let path = save_excel_export(&[jane(), sam()], &dir).unwrap();

        assert_eq!(path.extension().unwrap(), "xlsx");
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_excel_empty_writes_nothing() {
        let dir = temp_dir("xlsx-empty");
        let err = save_excel_export(&[], &dir).unwrap_err();

        assert!(err.is_no_data());
        assert!(!dir.exists());
    }

    #[test]
    fn test_default_filename_uses_utc_date() {
        let name = default_export_filename(ExportFormat::Csv);
        assert_eq!(name, generate_export_filename(Utc::now().date_naive(), ExportFormat::Csv));
    }

    #[test]
    fn test_excel_export_empty_is_no_data() {
        let path = std::env::temp_dir().join("rollcall-never-written.xlsx");
        assert!(export_attendance_to_excel(&[], &path).unwrap_err().is_no_data());
    }
}

//! Run report.
//!
//! The finished run is handed to a [`ReportSink`]. [`XlsxReport`] writes a
//! two-sheet workbook, "Run Summary" and "Audit Report", named
//! `<prefix>_<yyyymmdd-HHMM>.xlsx`. The workbook is rendered in memory and
//! moved into place with a rename, so an aborted run never leaves a partial
//! file behind.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::catalog::UserProfile;
use crate::error::{Error, Result};
use crate::model::{AuditRecord, RunConfig, RunSummary};

/// Everything a report describes.
pub struct RunReport<'a> {
    pub started: DateTime<Local>,
    pub user: &'a UserProfile,
    pub run: &'a RunConfig,
    pub records: &'a [AuditRecord],
    pub summary: &'a RunSummary,
}

/// Consumer of a finished run.
pub trait ReportSink {
    /// Persist the report; `None` when there was nothing to write.
    fn write(&self, report: &RunReport<'_>) -> Result<Option<PathBuf>>;
}

/// Excel workbook writer
pub struct XlsxReport {
    directory: PathBuf,
    prefix: String,
}

const AUDIT_HEADERS: [&str; 12] = [
    "Position",
    "Status",
    "Reason",
    "Artist",
    "Title",
    "Old Album",
    "Old ID",
    "New Title",
    "New Album",
    "New ID",
    "Score",
    "Mutation",
];

impl XlsxReport {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    /// `<prefix>_<yyyymmdd-HHMM>.xlsx`
    pub fn file_name(&self, started: &DateTime<Local>) -> String {
        format!("{}_{}.xlsx", self.prefix, started.format("%Y%m%d-%H%M"))
    }

    fn render(report: &RunReport<'_>) -> std::result::Result<Vec<u8>, XlsxError> {
        let bold = Format::new().set_bold();
        let mut workbook = Workbook::new();

        let mut summary = Worksheet::new();
        summary.set_name("Run Summary")?;
        summary.set_column_width(0, 24)?;
        summary.set_column_width(1, 40)?;
        let mut row = 0;
        for (label, value) in summary_rows(report) {
            if value.is_empty() {
                // Section heading
                summary.write_string_with_format(row, 0, label, &bold)?;
            } else {
                summary.write_string(row, 0, label)?;
                summary.write_string(row, 1, value)?;
            }
            row += 1;
        }
        workbook.push_worksheet(summary);

        let mut audit = Worksheet::new();
        audit.set_name("Audit Report")?;
        for (col, header) in AUDIT_HEADERS.iter().enumerate() {
            audit.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        audit.set_freeze_panes(1, 0)?;
        for (i, record) in report.records.iter().enumerate() {
            let row = i as u32 + 1;
            audit.write_number(row, 0, (record.position + 1) as f64)?;
            for (offset, text) in text_columns(record).into_iter().enumerate() {
                // Columns 1..=9 and 11; the score sits in column 10
                let col: u16 = if offset < 9 { offset as u16 + 1 } else { 11 };
                audit.write_string(row, col, text)?;
            }
            if let Some(score) = record.score {
                audit.write_number(row, 10, (score * 1000.0).round() / 1000.0)?;
            }
        }
        for (col, width) in [8, 12, 40, 28, 36, 28, 24, 36, 28, 24, 8, 18].into_iter().enumerate() {
            audit.set_column_width(col as u16, width)?;
        }
        workbook.push_worksheet(audit);

        workbook.save_to_buffer()
    }
}

impl ReportSink for XlsxReport {
    fn write(&self, report: &RunReport<'_>) -> Result<Option<PathBuf>> {
        if report.records.is_empty() {
            tracing::info!("No tracks audited, skipping report");
            return Ok(None);
        }

        let path = self.directory.join(self.file_name(&report.started));
        let bytes = Self::render(report).map_err(|e| Error::report(&path, e.to_string()))?;
        write_atomically(&path, &bytes)?;

        tracing::info!("Report written to {}", path.display());
        Ok(Some(path))
    }
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&temp, bytes).map_err(|e| Error::report(path, e.to_string()))?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(Error::report(path, e.to_string()));
    }
    Ok(())
}

/// Label/value rows of the summary sheet; an empty value marks a heading.
fn summary_rows(report: &RunReport<'_>) -> Vec<(&'static str, String)> {
    let run = report.run;
    let s = report.summary;
    vec![
        ("Run Parameters", String::new()),
        ("Run timestamp", report.started.format("%Y-%m-%d %H:%M:%S").to_string()),
        (
            "Authenticated user",
            format!("{} ({})", report.user.display_name, report.user.id),
        ),
        ("Source", run.source.to_string()),
        (
            "Mode",
            if run.dry_run { "Dry run" } else { "Live" }.to_string(),
        ),
        ("Market", run.market.to_string()),
        (
            "Artist filter",
            run.artist_filter.clone().unwrap_or_else(|| "None".to_string()),
        ),
        ("Scan Statistics", String::new()),
        ("Total tracks", s.total.to_string()),
        ("OK", s.ok.to_string()),
        ("Unplayable", s.unplayable.to_string()),
        ("Relinked", s.relinked.to_string()),
        ("Unknown", s.unknown.to_string()),
        ("Replacements found", s.replacements_found.to_string()),
        ("Mutated", s.mutated.to_string()),
        ("Failed", s.failed.to_string()),
    ]
}

/// Text cells of one audit row, in column order without position and score.
fn text_columns(record: &AuditRecord) -> [String; 10] {
    let old = &record.original;
    let new = record.replacement.as_ref();
    [
        record.status.to_string(),
        record.reason.clone(),
        old.artists.join(", "),
        old.name.clone(),
        old.album.clone(),
        old.id.clone(),
        new.map(|t| t.name.clone()).unwrap_or_default(),
        new.map(|t| t.album.clone()).unwrap_or_default(),
        new.map(|t| t.id.clone()).unwrap_or_default(),
        record.mutation.map(|m| m.to_string()).unwrap_or_default(),
    ]
}

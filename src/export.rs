//! Learning export: drain the store, then append to the project document.
//!
//! The store-side drain commits before the document is touched. If the append
//! fails the learnings stay marked exported and are reported in
//! [`ExportReport::document_error`]; the external write is at-most-once.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StoreResult;
use crate::memory::learnings;
use crate::memory::types::Learning;

#[derive(Debug, Serialize)]
pub struct ExportReport {
    pub exported: Vec<Learning>,
    pub document: PathBuf,
    /// `true` only if the block was appended.
    pub document_written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_error: Option<String>,
}

/// Drain unexported learnings and append them to `document` if it exists.
pub fn export_learnings(
    conn: &mut Connection,
    document: &Path,
    now: DateTime<Utc>,
) -> StoreResult<ExportReport> {
    let exported = learnings::export_learnings(conn)?;
    let mut report = ExportReport {
        exported,
        document: document.to_path_buf(),
        document_written: false,
        document_error: None,
    };

    if report.exported.is_empty() {
        return Ok(report);
    }

    if !document.is_file() {
        tracing::info!(
            document = %document.display(),
            count = report.exported.len(),
            "learnings document not found, skipping append"
        );
        return Ok(report);
    }

    let block = format_learnings(&report.exported, now);
    match append_to_document(document, &block) {
        Ok(()) => {
            report.document_written = true;
            tracing::info!(document = %document.display(), count = report.exported.len(), "learnings appended");
        }
        Err(e) => {
            tracing::warn!(
                document = %document.display(),
                error = %e,
                count = report.exported.len(),
                "learnings exported from store but document append failed"
            );
            report.document_error = Some(e.to_string());
        }
    }

    Ok(report)
}

/// Render learnings as a timestamped markdown section with one bullet each.
pub fn format_learnings(learnings: &[Learning], now: DateTime<Utc>) -> String {
    let mut out = format!("\n## Learnings ({})\n\n", now.format("%Y-%m-%d %H:%M UTC"));
    for learning in learnings {
        let content = learning.content.split_whitespace().collect::<Vec<_>>().join(" ");
        out.push_str(&format!("- [{}] {}\n", learning.learning_type, content));
    }
    out
}

fn append_to_document(document: &Path, block: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().append(true).open(document)?;
    file.write_all(block.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn learning(kind: &str, content: &str) -> Learning {
        Learning {
            id: 1,
            learning_type: kind.into(),
            content: content.into(),
            exported: false,
            created_at: String::new(),
        }
    }

    #[test]
    fn format_groups_bullets_under_heading() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let text = format_learnings(
            &[learning("pattern", "Validate at API boundary"), learning("gotcha", "multi\nline")],
            now,
        );
        assert_eq!(
            text,
            "\n## Learnings (2026-03-01 09:30 UTC)\n\n\
             - [pattern] Validate at API boundary\n\
             - [gotcha] multi line\n"
        );
    }
}

use rusqlite::Connection;
use serde::Deserialize;
use tracing::{info, warn};

use crate::assignment_sync;
use crate::bulk_import::{
    AssignmentImportSummary, ImportError, MatchRef, RowError, begin_row, parse_rows,
    resolve_referee, validate_rows,
};
use crate::db;
use crate::model::RefereeRole;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    #[serde(flatten)]
    pub target: MatchRef,
    #[serde(default)]
    pub referee_slug: Option<String>,
    #[serde(default)]
    pub referee_id: Option<String>,
    pub role: RefereeRole,
}

impl AssignmentRow {
    fn validate(&self) -> Result<(), String> {
        self.target.validate()?;
        let has_referee = [&self.referee_id, &self.referee_slug]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()));
        if !has_referee {
            return Err("refereeSlug 또는 refereeId가 필요합니다.".to_string());
        }
        Ok(())
    }
}

enum RowOutcome {
    Created,
    Skipped,
}

/// Imports `{"assignments": [...]}`. Rows whose (match, referee, role) already exists are
/// skipped, so re-uploading an overlapping file is harmless.
pub fn import_assignments(
    conn: &mut Connection,
    raw: &str,
) -> Result<AssignmentImportSummary, ImportError> {
    let rows: Vec<AssignmentRow> = parse_rows(raw, "assignments")?;
    validate_rows(&rows, AssignmentRow::validate)?;

    let mut summary = AssignmentImportSummary::default();
    for (idx, row) in rows.iter().enumerate() {
        match import_row(conn, row) {
            Ok(RowOutcome::Created) => summary.created += 1,
            Ok(RowOutcome::Skipped) => summary.skipped += 1,
            Err(err) => {
                let err = err.at(idx + 1);
                warn!(
                    row = idx + 1,
                    error = %err,
                    created = summary.created,
                    "assignment import aborted"
                );
                return Err(err);
            }
        }
    }

    info!(
        rows = rows.len(),
        created = summary.created,
        skipped = summary.skipped,
        "assignment import complete"
    );
    Ok(summary)
}

fn import_row(conn: &mut Connection, row: &AssignmentRow) -> Result<RowOutcome, RowError> {
    let tx = begin_row(conn)?;
    let match_id = row.target.resolve(&tx)?;
    let referee_id = resolve_referee(&tx, row.referee_id.as_deref(), row.referee_slug.as_deref())?;

    if db::try_insert_assignment(&tx, &match_id, &referee_id, row.role)?.is_none() {
        return Ok(RowOutcome::Skipped);
    }
    assignment_sync::on_assignment_created(&tx, &match_id, &referee_id, row.role)?;
    tx.commit()?;
    Ok(RowOutcome::Created)
}

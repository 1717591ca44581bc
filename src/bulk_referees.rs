use rusqlite::Connection;
use serde::Deserialize;
use tracing::{info, warn};

use crate::bulk_import::{
    ImportError, RefereeImportSummary, RowError, begin_row, parse_rows, validate_rows,
};
use crate::db;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefereeRow {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl RefereeRow {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name이 비어 있습니다.".to_string());
        }
        if !is_valid_slug(self.slug.trim()) {
            return Err(format!(
                "slug '{}'은(는) 영문 소문자, 숫자, '-'만 사용할 수 있습니다.",
                self.slug
            ));
        }
        Ok(())
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Imports `{"referees": [...]}`. Existing slugs are skipped.
pub fn import_referees(
    conn: &mut Connection,
    raw: &str,
) -> Result<RefereeImportSummary, ImportError> {
    let rows: Vec<RefereeRow> = parse_rows(raw, "referees")?;
    validate_rows(&rows, RefereeRow::validate)?;

    let mut summary = RefereeImportSummary::default();
    for (idx, row) in rows.iter().enumerate() {
        match import_row(conn, row) {
            Ok(true) => summary.created += 1,
            Ok(false) => summary.skipped += 1,
            Err(err) => {
                let err = err.at(idx + 1);
                warn!(row = idx + 1, error = %err, "referee import aborted");
                return Err(err);
            }
        }
    }

    info!(
        created = summary.created,
        skipped = summary.skipped,
        "referee import complete"
    );
    Ok(summary)
}

fn import_row(conn: &mut Connection, row: &RefereeRow) -> Result<bool, RowError> {
    let tx = begin_row(conn)?;
    let link = row.link.as_deref().map(str::trim).filter(|l| !l.is_empty());
    let created = db::try_insert_referee(&tx, row.name.trim(), row.slug.trim(), link)?;
    tx.commit()?;
    Ok(created.is_some())
}

#[cfg(test)]
mod tests {
    use super::is_valid_slug;

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("go-hyeongjin"));
        assert!(is_valid_slug("kim2"));
        assert!(!is_valid_slug("Go-Hyeongjin"));
        assert!(!is_valid_slug("-kim"));
        assert!(!is_valid_slug("kim-"));
        assert!(!is_valid_slug("kim jonghyeok"));
        assert!(!is_valid_slug("고형진"));
        assert!(!is_valid_slug(""));
    }
}

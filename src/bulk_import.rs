//! Shared plumbing for the admin JSON bulk imports.
//!
//! Every import runs in three steps:
//! 1. parse the document and decode every row (any failure rejects the whole batch);
//! 2. validate every row's values (same policy);
//! 3. resolve and apply rows strictly in order, each row inside its own transaction.
//!
//! A resolution or persistence failure in step 3 stops the batch at that row. The row's own
//! writes are rolled back, rows before it stay committed.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::match_identifier::{self, MatchIdentifier, ResolveError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("JSON 형식이 올바르지 않습니다: {0}")]
    InvalidJson(String),
    #[error("'{0}' 배열이 없거나 비어 있습니다.")]
    MissingArray(&'static str),
    #[error("{row}번째 항목: {message}")]
    Validation { row: usize, message: String },
    #[error("{row}번째 항목: {message}")]
    Resolution { row: usize, message: String },
    #[error("{row}번째 항목을 저장하는 중 오류가 발생했습니다.")]
    Persistence {
        row: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl ImportError {
    /// 1-based position of the offending row, when the error belongs to one.
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::Validation { row, .. }
            | ImportError::Resolution { row, .. }
            | ImportError::Persistence { row, .. } => Some(*row),
            ImportError::InvalidJson(_) | ImportError::MissingArray(_) => None,
        }
    }
}

/// Failure of a single row before it is tagged with its position.
#[derive(Debug)]
pub(crate) enum RowError {
    Resolution(String),
    Persistence(anyhow::Error),
}

impl RowError {
    pub(crate) fn at(self, row: usize) -> ImportError {
        match self {
            RowError::Resolution(message) => ImportError::Resolution { row, message },
            RowError::Persistence(source) => ImportError::Persistence { row, source },
        }
    }
}

impl From<anyhow::Error> for RowError {
    fn from(err: anyhow::Error) -> Self {
        RowError::Persistence(err)
    }
}

impl From<rusqlite::Error> for RowError {
    fn from(err: rusqlite::Error) -> Self {
        RowError::Persistence(err.into())
    }
}

impl From<ResolveError> for RowError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Store(err) => RowError::Persistence(err.into()),
            other => RowError::Resolution(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentImportSummary {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultImportSummary {
    pub updated: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefereeImportSummary {
    pub created: usize,
    pub skipped: usize,
}

/// Target match of a row: a direct key or a [`MatchIdentifier`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRef {
    #[serde(default)]
    pub match_id: Option<String>,
    #[serde(default)]
    pub match_identifier: Option<MatchIdentifier>,
}

impl MatchRef {
    pub(crate) fn validate(&self) -> Result<(), String> {
        match (&self.match_id, &self.match_identifier) {
            (Some(id), _) if !id.trim().is_empty() => Ok(()),
            (_, Some(ident)) if ident.is_complete() => Ok(()),
            (_, Some(_)) => Err("matchIdentifier에 roundOrder 또는 homeTeam/awayTeam이 필요합니다."
                .to_string()),
            _ => Err("matchId 또는 matchIdentifier가 필요합니다.".to_string()),
        }
    }

    pub(crate) fn resolve(&self, conn: &Connection) -> Result<String, ResolveError> {
        match (&self.match_id, &self.match_identifier) {
            (Some(id), _) if !id.trim().is_empty() => match_identifier::resolve_match_id(conn, id),
            (_, Some(ident)) => match_identifier::resolve(conn, ident),
            _ => Err(ResolveError::Incomplete),
        }
    }
}

/// Parses `raw`, requires a non-empty array under `key` and decodes every row.
pub(crate) fn parse_rows<T: DeserializeOwned>(
    raw: &str,
    key: &'static str,
) -> Result<Vec<T>, ImportError> {
    let mut doc: Value =
        serde_json::from_str(raw.trim()).map_err(|err| ImportError::InvalidJson(err.to_string()))?;
    let rows = match doc.get_mut(key).map(Value::take) {
        Some(Value::Array(rows)) if !rows.is_empty() => rows,
        _ => return Err(ImportError::MissingArray(key)),
    };

    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            serde_json::from_value::<T>(row).map_err(|err| ImportError::Validation {
                row: idx + 1,
                message: format!("형식 오류: {err}"),
            })
        })
        .collect()
}

/// Runs `check` on every row before anything is written.
pub(crate) fn validate_rows<T>(
    rows: &[T],
    check: impl Fn(&T) -> Result<(), String>,
) -> Result<(), ImportError> {
    for (idx, row) in rows.iter().enumerate() {
        check(row).map_err(|message| ImportError::Validation {
            row: idx + 1,
            message,
        })?;
    }
    Ok(())
}

pub(crate) fn begin_row(conn: &mut Connection) -> Result<Transaction<'_>, RowError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

pub(crate) fn non_negative(field: &str, value: Option<i64>) -> Result<(), String> {
    match value {
        Some(v) if v < 0 => Err(format!("{field}는 0 이상이어야 합니다.")),
        _ => Ok(()),
    }
}

pub(crate) fn resolve_referee(
    conn: &Connection,
    referee_id: Option<&str>,
    referee_slug: Option<&str>,
) -> Result<String, RowError> {
    if let Some(id) = referee_id.map(str::trim).filter(|id| !id.is_empty()) {
        if crate::db::referee_exists(conn, id)? {
            return Ok(id.to_string());
        }
        return Err(RowError::Resolution(format!(
            "심판 ID '{id}'을(를) 찾을 수 없습니다."
        )));
    }
    let slug = referee_slug.map(str::trim).unwrap_or_default();
    crate::db::referee_id_by_slug(conn, slug)?
        .ok_or_else(|| RowError::Resolution(format!("심판 '{slug}'을(를) 찾을 수 없습니다.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Row {
        n: i64,
    }

    #[test]
    fn invalid_json_and_missing_array_fail_whole_batch() {
        assert!(matches!(
            parse_rows::<Row>("{not json", "rows"),
            Err(ImportError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_rows::<Row>(r#"{"other": [{"n": 1}]}"#, "rows"),
            Err(ImportError::MissingArray("rows"))
        ));
        assert!(matches!(
            parse_rows::<Row>(r#"{"rows": []}"#, "rows"),
            Err(ImportError::MissingArray("rows"))
        ));
        assert!(matches!(
            parse_rows::<Row>(r#"{"rows": {"n": 1}}"#, "rows"),
            Err(ImportError::MissingArray("rows"))
        ));
    }

    #[test]
    fn decode_error_names_row_position() {
        let err = parse_rows::<Row>(r#"{"rows": [{"n": 1}, {"n": "x"}]}"#, "rows").unwrap_err();
        assert_eq!(err.row(), Some(2));
        assert!(err.to_string().starts_with("2번째 항목"));
    }

    #[test]
    fn match_ref_requires_target() {
        assert!(MatchRef::default().validate().is_err());
        let by_id = MatchRef {
            match_id: Some("m1".to_string()),
            match_identifier: None,
        };
        assert!(by_id.validate().is_ok());
        let partial = MatchRef {
            match_id: None,
            match_identifier: Some(MatchIdentifier {
                year: 2026,
                league_slug: "kleague1".to_string(),
                round_number: 1,
                round_order: None,
                home_team: Some("울산".to_string()),
                away_team: None,
            }),
        };
        assert!(partial.validate().is_err());
    }
}

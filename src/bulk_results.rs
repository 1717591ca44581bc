use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::bulk_import::{
    ImportError, MatchRef, ResultImportSummary, RowError, begin_row, non_negative, parse_rows,
    resolve_referee, validate_rows,
};
use crate::card_sync;
use crate::db;
use crate::model::{CardCounts, MatchStatus, RefereeRole};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    #[serde(flatten)]
    pub target: MatchRef,
    #[serde(default)]
    pub status: Option<MatchStatus>,
    #[serde(default)]
    pub score_home: Option<i64>,
    #[serde(default)]
    pub score_away: Option<i64>,
    #[serde(default)]
    pub referee_cards: Vec<RefereeCardRow>,
}

/// Card counts for one assignment; omitted counts are zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefereeCardRow {
    pub referee_slug: String,
    pub role: RefereeRole,
    #[serde(default)]
    pub home_yellow_cards: i64,
    #[serde(default)]
    pub home_red_cards: i64,
    #[serde(default)]
    pub away_yellow_cards: i64,
    #[serde(default)]
    pub away_red_cards: i64,
}

impl RefereeCardRow {
    fn cards(&self) -> Result<CardCounts, String> {
        let count = |field: &str, value: i64| {
            u32::try_from(value).map_err(|_| format!("{field}는 0 이상이어야 합니다."))
        };
        Ok(CardCounts {
            home_yellow_cards: count("homeYellowCards", self.home_yellow_cards)?,
            home_red_cards: count("homeRedCards", self.home_red_cards)?,
            away_yellow_cards: count("awayYellowCards", self.away_yellow_cards)?,
            away_red_cards: count("awayRedCards", self.away_red_cards)?,
        })
    }
}

impl ResultRow {
    fn validate(&self) -> Result<(), String> {
        self.target.validate()?;
        non_negative("scoreHome", self.score_home)?;
        non_negative("scoreAway", self.score_away)?;
        for entry in &self.referee_cards {
            if entry.referee_slug.trim().is_empty() {
                return Err("refereeCards 항목에 refereeSlug가 필요합니다.".to_string());
            }
            entry.cards()?;
        }
        Ok(())
    }
}

/// Imports `{"results": [...]}`. Every resolvable row counts as updated; card entries
/// are applied as deltas against the assignment's stored counts.
pub fn import_results(
    conn: &mut Connection,
    raw: &str,
) -> Result<ResultImportSummary, ImportError> {
    let rows: Vec<ResultRow> = parse_rows(raw, "results")?;
    validate_rows(&rows, ResultRow::validate)?;

    let mut summary = ResultImportSummary::default();
    for (idx, row) in rows.iter().enumerate() {
        if let Err(err) = import_row(conn, row) {
            let err = err.at(idx + 1);
            warn!(row = idx + 1, error = %err, updated = summary.updated, "result import aborted");
            return Err(err);
        }
        summary.updated += 1;
    }

    info!(updated = summary.updated, "result import complete");
    Ok(summary)
}

fn import_row(conn: &mut Connection, row: &ResultRow) -> Result<(), RowError> {
    let tx = begin_row(conn)?;
    let match_id = row.target.resolve(&tx)?;
    db::update_match_result(&tx, &match_id, row.status, row.score_home, row.score_away)?;

    for entry in &row.referee_cards {
        let referee_id = resolve_referee(&tx, None, Some(&entry.referee_slug))?;
        let Some(assignment) = db::find_assignment(&tx, &match_id, &referee_id, entry.role)? else {
            return Err(RowError::Resolution(format!(
                "심판 '{}'의 {} 배정 정보가 없습니다.",
                entry.referee_slug.trim(),
                entry.role.label()
            )));
        };
        let cards = entry.cards().map_err(RowError::Resolution)?;
        let outcome = card_sync::apply_card_delta(&tx, &assignment.id, &cards)?;
        debug!(assignment_id = %assignment.id, ?outcome, "result import card sync");
        db::store_assignment_cards(&tx, &assignment.id, &cards)?;
    }

    tx.commit()?;
    Ok(())
}

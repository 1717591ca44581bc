//! Fan rating average per referee/team, recomputed from the visible reviews on every call.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use crate::model::ReviewStatus;
use crate::stats_store;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRating {
    pub average: f64,
    pub count: u32,
}

pub fn recompute_team_rating(
    conn: &Connection,
    referee_id: &str,
    team_id: &str,
) -> Result<TeamRating> {
    let (count, sum): (u32, i64) = conn
        .query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(rating), 0)
            FROM fan_reviews
            WHERE referee_id = ?1 AND fan_team_id = ?2 AND status = ?3
            "#,
            params![referee_id, team_id, ReviewStatus::Visible],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .context("aggregate visible fan reviews")?;

    let average = if count == 0 {
        0.0
    } else {
        sum as f64 / f64::from(count)
    };
    stats_store::set_team_rating(conn, referee_id, team_id, average, count)?;
    Ok(TeamRating { average, count })
}

/// Recomputes the pair a review feeds. Reviews without a fan team feed no aggregate.
pub fn recompute_for_review(conn: &Connection, review_id: &str) -> Result<Option<TeamRating>> {
    let pair: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT referee_id, fan_team_id FROM fan_reviews WHERE id = ?1",
            params![review_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .context("load fan review")?;

    match pair {
        Some((referee_id, Some(team_id))) => {
            recompute_team_rating(conn, &referee_id, &team_id).map(Some)
        }
        Some((_, None)) => Ok(None),
        None => {
            debug!(review_id, "rating sync skipped: review not found");
            Ok(None)
        }
    }
}

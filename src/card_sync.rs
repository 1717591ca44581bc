//! Per-team yellow/red card totals.
//!
//! Totals are sums across every assignment of a referee/team pair, so a change to one
//! assignment is always applied as a delta against that assignment's stored counts.

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::db;
use crate::model::{CardCounts, MatchContext};
use crate::stats_store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardSyncOutcome {
    Applied,
    Unchanged,
    MissingAssignment,
}

/// Applies `new_cards - stored cards` for the assignment onto both teams' totals.
///
/// The assignment row itself is left untouched; callers persist `new_cards` afterwards.
pub fn apply_card_delta(
    conn: &Connection,
    assignment_id: &str,
    new_cards: &CardCounts,
) -> Result<CardSyncOutcome> {
    let Some(assignment) = db::load_assignment(conn, assignment_id)? else {
        debug!(assignment_id, "card sync skipped: assignment not found");
        return Ok(CardSyncOutcome::MissingAssignment);
    };
    let Some(ctx) = db::load_match_context(conn, &assignment.match_id)? else {
        debug!(
            assignment_id,
            match_id = %assignment.match_id,
            "card sync skipped: match not found"
        );
        return Ok(CardSyncOutcome::MissingAssignment);
    };
    apply_card_change(conn, &ctx, &assignment.referee_id, &assignment.cards, new_cards)
}

pub(crate) fn apply_card_change(
    conn: &Connection,
    ctx: &MatchContext,
    referee_id: &str,
    old_cards: &CardCounts,
    new_cards: &CardCounts,
) -> Result<CardSyncOutcome> {
    let delta = old_cards.delta_to(new_cards);
    if delta.is_zero() {
        return Ok(CardSyncOutcome::Unchanged);
    }

    stats_store::apply_team_cards(
        conn,
        referee_id,
        &ctx.home_team_id,
        new_cards.home_yellow_cards,
        new_cards.home_red_cards,
        delta.home_yellow,
        delta.home_red,
    )?;
    stats_store::apply_team_cards(
        conn,
        referee_id,
        &ctx.away_team_id,
        new_cards.away_yellow_cards,
        new_cards.away_red_cards,
        delta.away_yellow,
        delta.away_red,
    )?;
    Ok(CardSyncOutcome::Applied)
}

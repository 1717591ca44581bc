use anyhow::{Context, Result};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::info;

use crate::assignment_sync;
use crate::card_sync::{self, CardSyncOutcome};
use crate::db;
use crate::model::CardCounts;
use crate::rating_sync;
use crate::stats_store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub assignments: usize,
    pub assignments_with_cards: usize,
    pub rating_pairs: usize,
}

/// Drops both aggregate tables and replays them from the live assignments and reviews.
///
/// Zero-count role rows left behind by deletes are not recreated.
pub fn rebuild_all_stats(conn: &mut Connection) -> Result<RebuildReport> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("begin rebuild transaction")?;
    stats_store::clear_all(&tx)?;

    let mut report = RebuildReport::default();
    let none = CardCounts::default();
    for assignment in db::load_all_assignments(&tx)? {
        let Some(ctx) = db::load_match_context(&tx, &assignment.match_id)? else {
            continue;
        };
        assignment_sync::apply_created(&tx, &ctx, &assignment.referee_id, assignment.role)?;
        report.assignments += 1;
        let outcome = card_sync::apply_card_change(
            &tx,
            &ctx,
            &assignment.referee_id,
            &none,
            &assignment.cards,
        )?;
        if outcome == CardSyncOutcome::Applied {
            report.assignments_with_cards += 1;
        }
    }

    let pairs = {
        let mut stmt = tx
            .prepare(
                "SELECT DISTINCT referee_id, fan_team_id FROM fan_reviews
                 WHERE fan_team_id IS NOT NULL ORDER BY referee_id, fan_team_id",
            )
            .context("prepare rating pairs query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("query rating pairs")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode rating pair")?);
        }
        out
    };
    for (referee_id, team_id) in &pairs {
        rating_sync::recompute_team_rating(&tx, referee_id, team_id)?;
    }
    report.rating_pairs = pairs.len();

    tx.commit().context("commit rebuild transaction")?;
    info!(
        assignments = report.assignments,
        with_cards = report.assignments_with_cards,
        rating_pairs = report.rating_pairs,
        "aggregate rebuild complete"
    );
    Ok(report)
}

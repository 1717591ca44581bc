//! Keeps per-role match counts and per-team assignment totals in step with the
//! assignment lifecycle.
//!
//! These calls are not idempotent: each one must correspond to exactly one real
//! create or delete of a `match_referees` row.

use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

use crate::db;
use crate::model::{MatchContext, RefereeRole};
use crate::stats_store;

pub fn on_assignment_created(
    conn: &Connection,
    match_id: &str,
    referee_id: &str,
    role: RefereeRole,
) -> Result<()> {
    let Some(ctx) = db::load_match_context(conn, match_id)? else {
        debug!(match_id, referee_id, %role, "assignment create sync skipped: match not found");
        return Ok(());
    };
    apply_created(conn, &ctx, referee_id, role)
}

pub fn on_assignment_deleted(
    conn: &Connection,
    match_id: &str,
    referee_id: &str,
    role: RefereeRole,
) -> Result<()> {
    let Some(ctx) = db::load_match_context(conn, match_id)? else {
        debug!(match_id, referee_id, %role, "assignment delete sync skipped: match not found");
        return Ok(());
    };
    apply_deleted(conn, &ctx, referee_id, role)
}

/// Retracts the old (referee, role) and applies the new one, in that order.
pub fn on_assignment_updated(
    conn: &Connection,
    match_id: &str,
    old_referee_id: &str,
    old_role: RefereeRole,
    new_referee_id: &str,
    new_role: RefereeRole,
) -> Result<()> {
    on_assignment_deleted(conn, match_id, old_referee_id, old_role)?;
    on_assignment_created(conn, match_id, new_referee_id, new_role)
}

pub(crate) fn apply_created(
    conn: &Connection,
    ctx: &MatchContext,
    referee_id: &str,
    role: RefereeRole,
) -> Result<()> {
    stats_store::increment_role_match_count(
        conn,
        referee_id,
        &ctx.season_id,
        &ctx.league_id,
        role,
    )?;
    for team_id in ctx.team_ids() {
        stats_store::increment_team_assignment(conn, referee_id, team_id, role)?;
    }
    Ok(())
}

fn apply_deleted(
    conn: &Connection,
    ctx: &MatchContext,
    referee_id: &str,
    role: RefereeRole,
) -> Result<()> {
    stats_store::decrement_role_match_count(
        conn,
        referee_id,
        &ctx.season_id,
        &ctx.league_id,
        role,
    )?;
    for team_id in ctx.team_ids() {
        stats_store::decrement_team_assignment(conn, referee_id, team_id, role)?;
    }
    Ok(())
}

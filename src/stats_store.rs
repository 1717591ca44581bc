//! Aggregate store: `referee_role_stats` and `referee_team_stats`.
//!
//! Only the sync engines write through this module. Every write is a single SQL statement
//! that increments or decrements in place (floored at zero with `MAX(.., 0)`), so two
//! writers never lose each other's update even without an enclosing transaction.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::db::now_rfc3339;
use crate::model::{RefereeRole, RefereeRoleStat, RefereeTeamStat, RoleCounts};

const TEAM_STAT_COLUMNS: &str = "referee_id, team_id, total_assignments, \
     role_main, role_assistant, role_var, role_waiting, \
     total_yellow_cards, total_red_cards, fan_average_rating, fan_rating_count";

const ROLE_STAT_COLUMNS: &str = "referee_id, season_id, league_id, role, match_count";

fn team_stat_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefereeTeamStat> {
    Ok(RefereeTeamStat {
        referee_id: row.get(0)?,
        team_id: row.get(1)?,
        total_assignments: row.get(2)?,
        role_counts: RoleCounts::from_columns(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
        total_yellow_cards: row.get(7)?,
        total_red_cards: row.get(8)?,
        fan_average_rating: row.get(9)?,
        fan_rating_count: row.get(10)?,
    })
}

fn role_stat_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefereeRoleStat> {
    Ok(RefereeRoleStat {
        referee_id: row.get(0)?,
        season_id: row.get(1)?,
        league_id: row.get(2)?,
        role: row.get(3)?,
        match_count: row.get(4)?,
    })
}

pub fn role_stat(
    conn: &Connection,
    referee_id: &str,
    season_id: &str,
    league_id: &str,
    role: RefereeRole,
) -> Result<Option<RefereeRoleStat>> {
    conn.query_row(
        &format!(
            "SELECT {ROLE_STAT_COLUMNS} FROM referee_role_stats
             WHERE referee_id = ?1 AND season_id = ?2 AND league_id = ?3 AND role = ?4"
        ),
        params![referee_id, season_id, league_id, role],
        role_stat_from_row,
    )
    .optional()
    .context("load referee role stat")
}

pub fn role_stats_for_referee(conn: &Connection, referee_id: &str) -> Result<Vec<RefereeRoleStat>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {ROLE_STAT_COLUMNS} FROM referee_role_stats
             WHERE referee_id = ?1 ORDER BY season_id, league_id, role"
        ),
        params![referee_id],
        role_stat_from_row,
    )
}

pub fn all_role_stats(conn: &Connection) -> Result<Vec<RefereeRoleStat>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {ROLE_STAT_COLUMNS} FROM referee_role_stats
             ORDER BY referee_id, season_id, league_id, role"
        ),
        [],
        role_stat_from_row,
    )
}

pub fn team_stat(
    conn: &Connection,
    referee_id: &str,
    team_id: &str,
) -> Result<Option<RefereeTeamStat>> {
    conn.query_row(
        &format!(
            "SELECT {TEAM_STAT_COLUMNS} FROM referee_team_stats
             WHERE referee_id = ?1 AND team_id = ?2"
        ),
        params![referee_id, team_id],
        team_stat_from_row,
    )
    .optional()
    .context("load referee team stat")
}

pub fn team_stats_for_referee(conn: &Connection, referee_id: &str) -> Result<Vec<RefereeTeamStat>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {TEAM_STAT_COLUMNS} FROM referee_team_stats
             WHERE referee_id = ?1 ORDER BY total_assignments DESC, team_id"
        ),
        params![referee_id],
        team_stat_from_row,
    )
}

pub fn all_team_stats(conn: &Connection) -> Result<Vec<RefereeTeamStat>> {
    collect_rows(
        conn,
        &format!("SELECT {TEAM_STAT_COLUMNS} FROM referee_team_stats ORDER BY referee_id, team_id"),
        [],
        team_stat_from_row,
    )
}

fn collect_rows<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<T>>
where
    P: rusqlite::Params,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).context("prepare stats query")?;
    let rows = stmt.query_map(params, map).context("query stats")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode stats row")?);
    }
    Ok(out)
}

pub(crate) fn increment_role_match_count(
    conn: &Connection,
    referee_id: &str,
    season_id: &str,
    league_id: &str,
    role: RefereeRole,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO referee_role_stats (
            referee_id, season_id, league_id, role, match_count, updated_at
        ) VALUES (?1, ?2, ?3, ?4, 1, ?5)
        ON CONFLICT(referee_id, season_id, league_id, role) DO UPDATE SET
            match_count = match_count + 1,
            updated_at = excluded.updated_at
        "#,
        params![referee_id, season_id, league_id, role, now_rfc3339()],
    )
    .context("increment role match count")?;
    Ok(())
}

/// Missing rows stay missing; existing rows never drop below zero and are never deleted.
pub(crate) fn decrement_role_match_count(
    conn: &Connection,
    referee_id: &str,
    season_id: &str,
    league_id: &str,
    role: RefereeRole,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE referee_role_stats
        SET match_count = MAX(match_count - 1, 0), updated_at = ?5
        WHERE referee_id = ?1 AND season_id = ?2 AND league_id = ?3 AND role = ?4
        "#,
        params![referee_id, season_id, league_id, role, now_rfc3339()],
    )
    .context("decrement role match count")?;
    Ok(())
}

/// Adds one assignment in `role`; a fresh row (or one holding the "no assignments"
/// marker) starts every role at zero first.
pub(crate) fn increment_team_assignment(
    conn: &Connection,
    referee_id: &str,
    team_id: &str,
    role: RefereeRole,
) -> Result<()> {
    let set_roles = RefereeRole::ALL
        .iter()
        .map(|r| {
            let col = r.count_column();
            if *r == role {
                format!("{col} = COALESCE({col}, 0) + 1")
            } else {
                format!("{col} = COALESCE({col}, 0)")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let seed = |r: RefereeRole| i64::from(r == role);

    conn.execute(
        &format!(
            r#"
            INSERT INTO referee_team_stats (
                referee_id, team_id, total_assignments,
                role_main, role_assistant, role_var, role_waiting, updated_at
            ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(referee_id, team_id) DO UPDATE SET
                total_assignments = total_assignments + 1,
                {set_roles},
                updated_at = excluded.updated_at
            "#
        ),
        params![
            referee_id,
            team_id,
            seed(RefereeRole::Main),
            seed(RefereeRole::Assistant),
            seed(RefereeRole::Var),
            seed(RefereeRole::Waiting),
            now_rfc3339(),
        ],
    )
    .context("increment team assignment")?;
    Ok(())
}

/// Removes one assignment in `role`; when every role reaches zero the counts are
/// cleared to NULL.
pub(crate) fn decrement_team_assignment(
    conn: &Connection,
    referee_id: &str,
    team_id: &str,
    role: RefereeRole,
) -> Result<()> {
    let col = role.count_column();
    let now = now_rfc3339();
    conn.execute(
        &format!(
            r#"
            UPDATE referee_team_stats
            SET total_assignments = MAX(total_assignments - 1, 0),
                {col} = MAX(COALESCE({col}, 0) - 1, 0),
                updated_at = ?3
            WHERE referee_id = ?1 AND team_id = ?2
            "#
        ),
        params![referee_id, team_id, now],
    )
    .context("decrement team assignment")?;
    clear_empty_role_counts(conn, referee_id, team_id, &now)
}

fn clear_empty_role_counts(
    conn: &Connection,
    referee_id: &str,
    team_id: &str,
    now: &str,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE referee_team_stats
        SET role_main = NULL, role_assistant = NULL, role_var = NULL, role_waiting = NULL,
            updated_at = ?3
        WHERE referee_id = ?1 AND team_id = ?2
          AND COALESCE(role_main, 0) = 0
          AND COALESCE(role_assistant, 0) = 0
          AND COALESCE(role_var, 0) = 0
          AND COALESCE(role_waiting, 0) = 0
        "#,
        params![referee_id, team_id, now],
    )
    .context("clear empty role counts")?;
    Ok(())
}

/// Adds card deltas onto an existing row, or creates the row seeded with `seed_*`.
pub(crate) fn apply_team_cards(
    conn: &Connection,
    referee_id: &str,
    team_id: &str,
    seed_yellow: u32,
    seed_red: u32,
    delta_yellow: i64,
    delta_red: i64,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO referee_team_stats (
            referee_id, team_id, total_yellow_cards, total_red_cards, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?7)
        ON CONFLICT(referee_id, team_id) DO UPDATE SET
            total_yellow_cards = MAX(total_yellow_cards + ?5, 0),
            total_red_cards = MAX(total_red_cards + ?6, 0),
            updated_at = excluded.updated_at
        "#,
        params![
            referee_id,
            team_id,
            seed_yellow,
            seed_red,
            delta_yellow,
            delta_red,
            now_rfc3339()
        ],
    )
    .context("apply team cards")?;
    Ok(())
}

pub(crate) fn set_team_rating(
    conn: &Connection,
    referee_id: &str,
    team_id: &str,
    average: f64,
    count: u32,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO referee_team_stats (
            referee_id, team_id, fan_average_rating, fan_rating_count, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(referee_id, team_id) DO UPDATE SET
            fan_average_rating = excluded.fan_average_rating,
            fan_rating_count = excluded.fan_rating_count,
            updated_at = excluded.updated_at
        "#,
        params![referee_id, team_id, average, count, now_rfc3339()],
    )
    .context("set team rating")?;
    Ok(())
}

pub(crate) fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch("DELETE FROM referee_role_stats; DELETE FROM referee_team_stats;")
        .context("clear aggregate tables")?;
    Ok(())
}

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::model::{Assignment, CardCounts, MatchContext, MatchStatus, RefereeRole};

const ID_LEN: usize = 20;
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")
        .context("enable wal journal")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS seasons (
            id TEXT PRIMARY KEY,
            year INTEGER NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS leagues (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            short_name TEXT NULL,
            slug TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS rounds (
            id TEXT PRIMARY KEY,
            season_id TEXT NOT NULL REFERENCES seasons(id),
            league_id TEXT NOT NULL REFERENCES leagues(id),
            number INTEGER NOT NULL,
            UNIQUE (season_id, league_id, number)
        );
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            season_id TEXT NOT NULL REFERENCES seasons(id),
            league_id TEXT NOT NULL REFERENCES leagues(id),
            round_id TEXT NULL REFERENCES rounds(id),
            round_order INTEGER NULL,
            home_team_id TEXT NOT NULL REFERENCES teams(id),
            away_team_id TEXT NOT NULL REFERENCES teams(id),
            kickoff_at TEXT NULL,
            status TEXT NOT NULL DEFAULT 'SCHEDULED',
            score_home INTEGER NULL,
            score_away INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_round ON matches(round_id, round_order);

        CREATE TABLE IF NOT EXISTS referees (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            link TEXT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS match_referees (
            id TEXT PRIMARY KEY,
            match_id TEXT NOT NULL REFERENCES matches(id),
            referee_id TEXT NOT NULL REFERENCES referees(id),
            role TEXT NOT NULL,
            home_yellow_cards INTEGER NOT NULL DEFAULT 0,
            home_red_cards INTEGER NOT NULL DEFAULT 0,
            away_yellow_cards INTEGER NOT NULL DEFAULT 0,
            away_red_cards INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (match_id, referee_id, role)
        );
        CREATE TABLE IF NOT EXISTS fan_reviews (
            id TEXT PRIMARY KEY,
            match_id TEXT NOT NULL REFERENCES matches(id),
            referee_id TEXT NOT NULL REFERENCES referees(id),
            user_id TEXT NOT NULL,
            fan_team_id TEXT NULL REFERENCES teams(id),
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment TEXT NULL,
            status TEXT NOT NULL DEFAULT 'VISIBLE',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (match_id, referee_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_fan_reviews_pair
            ON fan_reviews(referee_id, fan_team_id, status);

        CREATE TABLE IF NOT EXISTS referee_role_stats (
            referee_id TEXT NOT NULL,
            season_id TEXT NOT NULL,
            league_id TEXT NOT NULL,
            role TEXT NOT NULL,
            match_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (referee_id, season_id, league_id, role)
        );
        CREATE TABLE IF NOT EXISTS referee_team_stats (
            referee_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            total_assignments INTEGER NOT NULL DEFAULT 0,
            role_main INTEGER NULL,
            role_assistant INTEGER NULL,
            role_var INTEGER NULL,
            role_waiting INTEGER NULL,
            total_yellow_cards INTEGER NOT NULL DEFAULT 0,
            total_red_cards INTEGER NOT NULL DEFAULT 0,
            fan_average_rating REAL NOT NULL DEFAULT 0,
            fan_rating_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (referee_id, team_id)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn new_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// True when the error is a UNIQUE / PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

pub fn insert_season(conn: &Connection, year: i32) -> Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO seasons (id, year, created_at) VALUES (?1, ?2, ?3)",
        params![id, year, now_rfc3339()],
    )
    .with_context(|| format!("insert season {year}"))?;
    Ok(id)
}

pub fn insert_league(conn: &Connection, slug: &str, name: &str) -> Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO leagues (id, slug, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, slug, name, now_rfc3339()],
    )
    .with_context(|| format!("insert league {slug}"))?;
    Ok(id)
}

pub fn insert_team(
    conn: &Connection,
    name: &str,
    short_name: Option<&str>,
    slug: &str,
) -> Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO teams (id, name, short_name, slug, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, short_name, slug, now_rfc3339()],
    )
    .with_context(|| format!("insert team {slug}"))?;
    Ok(id)
}

pub fn insert_round(
    conn: &Connection,
    season_id: &str,
    league_id: &str,
    number: i64,
) -> Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO rounds (id, season_id, league_id, number) VALUES (?1, ?2, ?3, ?4)",
        params![id, season_id, league_id, number],
    )
    .with_context(|| format!("insert round {number}"))?;
    Ok(id)
}

#[derive(Debug, Clone, Copy)]
pub struct NewMatch<'a> {
    pub season_id: &'a str,
    pub league_id: &'a str,
    pub round_id: Option<&'a str>,
    pub round_order: Option<i64>,
    pub home_team_id: &'a str,
    pub away_team_id: &'a str,
    pub kickoff_at: Option<&'a str>,
}

pub fn insert_match(conn: &Connection, m: &NewMatch<'_>) -> Result<String> {
    let id = new_id();
    conn.execute(
        r#"
        INSERT INTO matches (
            id, season_id, league_id, round_id, round_order,
            home_team_id, away_team_id, kickoff_at, status, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            id,
            m.season_id,
            m.league_id,
            m.round_id,
            m.round_order,
            m.home_team_id,
            m.away_team_id,
            m.kickoff_at,
            MatchStatus::Scheduled,
            now_rfc3339(),
        ],
    )
    .context("insert match")?;
    Ok(id)
}

pub fn insert_referee(
    conn: &Connection,
    name: &str,
    slug: &str,
    link: Option<&str>,
) -> Result<String> {
    try_insert_referee(conn, name, slug, link)?
        .with_context(|| format!("referee slug {slug} already exists"))
}

/// Inserts a referee, returning `None` when the slug is already taken.
pub fn try_insert_referee(
    conn: &Connection,
    name: &str,
    slug: &str,
    link: Option<&str>,
) -> Result<Option<String>> {
    let id = new_id();
    match conn.execute(
        "INSERT INTO referees (id, name, slug, link, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, slug, link, now_rfc3339()],
    ) {
        Ok(_) => Ok(Some(id)),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("insert referee {slug}")),
    }
}

pub fn referee_id_by_slug(conn: &Connection, slug: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM referees WHERE slug = ?1",
        params![slug.trim()],
        |row| row.get(0),
    )
    .optional()
    .context("query referee by slug")
}

pub fn referee_exists(conn: &Connection, referee_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM referees WHERE id = ?1)",
        params![referee_id],
        |row| row.get(0),
    )
    .context("query referee exists")
}

pub fn match_exists(conn: &Connection, match_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM matches WHERE id = ?1)",
        params![match_id],
        |row| row.get(0),
    )
    .context("query match exists")
}

pub fn load_match_context(conn: &Connection, match_id: &str) -> Result<Option<MatchContext>> {
    conn.query_row(
        "SELECT id, season_id, league_id, home_team_id, away_team_id FROM matches WHERE id = ?1",
        params![match_id],
        |row| {
            Ok(MatchContext {
                match_id: row.get(0)?,
                season_id: row.get(1)?,
                league_id: row.get(2)?,
                home_team_id: row.get(3)?,
                away_team_id: row.get(4)?,
            })
        },
    )
    .optional()
    .context("load match context")
}

/// Applies a partial result update; `None` fields keep their stored value.
pub fn update_match_result(
    conn: &Connection,
    match_id: &str,
    status: Option<MatchStatus>,
    score_home: Option<i64>,
    score_away: Option<i64>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE matches
        SET status = COALESCE(?2, status),
            score_home = COALESCE(?3, score_home),
            score_away = COALESCE(?4, score_away),
            updated_at = ?5
        WHERE id = ?1
        "#,
        params![match_id, status, score_home, score_away, now_rfc3339()],
    )
    .context("update match result")?;
    Ok(())
}

const ASSIGNMENT_COLUMNS: &str = "id, match_id, referee_id, role, \
     home_yellow_cards, home_red_cards, away_yellow_cards, away_red_cards";

fn assignment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        match_id: row.get(1)?,
        referee_id: row.get(2)?,
        role: row.get(3)?,
        cards: CardCounts {
            home_yellow_cards: row.get(4)?,
            home_red_cards: row.get(5)?,
            away_yellow_cards: row.get(6)?,
            away_red_cards: row.get(7)?,
        },
    })
}

/// Inserts an assignment, returning `None` when (match, referee, role) already exists.
pub fn try_insert_assignment(
    conn: &Connection,
    match_id: &str,
    referee_id: &str,
    role: RefereeRole,
) -> Result<Option<String>> {
    let id = new_id();
    match conn.execute(
        "INSERT INTO match_referees (id, match_id, referee_id, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, match_id, referee_id, role, now_rfc3339()],
    ) {
        Ok(_) => Ok(Some(id)),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("insert assignment"),
    }
}

pub fn load_assignment(conn: &Connection, assignment_id: &str) -> Result<Option<Assignment>> {
    conn.query_row(
        &format!("SELECT {ASSIGNMENT_COLUMNS} FROM match_referees WHERE id = ?1"),
        params![assignment_id],
        assignment_from_row,
    )
    .optional()
    .context("load assignment")
}

pub fn find_assignment(
    conn: &Connection,
    match_id: &str,
    referee_id: &str,
    role: RefereeRole,
) -> Result<Option<Assignment>> {
    conn.query_row(
        &format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM match_referees
             WHERE match_id = ?1 AND referee_id = ?2 AND role = ?3"
        ),
        params![match_id, referee_id, role],
        assignment_from_row,
    )
    .optional()
    .context("find assignment")
}

pub fn load_all_assignments(conn: &Connection) -> Result<Vec<Assignment>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM match_referees ORDER BY created_at ASC, id ASC"
        ))
        .context("prepare load assignments query")?;
    let rows = stmt
        .query_map([], assignment_from_row)
        .context("query load assignments")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode assignment row")?);
    }
    Ok(out)
}

/// Returns false when the new (referee, role) collides with an existing assignment.
pub fn try_reassign(
    conn: &Connection,
    assignment_id: &str,
    referee_id: &str,
    role: RefereeRole,
) -> Result<bool> {
    match conn.execute(
        "UPDATE match_referees SET referee_id = ?2, role = ?3 WHERE id = ?1",
        params![assignment_id, referee_id, role],
    ) {
        Ok(_) => Ok(true),
        Err(err) if is_unique_violation(&err) => Ok(false),
        Err(err) => Err(err).context("update assignment"),
    }
}

pub fn delete_assignment_row(conn: &Connection, assignment_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM match_referees WHERE id = ?1",
        params![assignment_id],
    )
    .context("delete assignment")?;
    Ok(())
}

pub fn store_assignment_cards(
    conn: &Connection,
    assignment_id: &str,
    cards: &CardCounts,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE match_referees
        SET home_yellow_cards = ?2, home_red_cards = ?3,
            away_yellow_cards = ?4, away_red_cards = ?5
        WHERE id = ?1
        "#,
        params![
            assignment_id,
            cards.home_yellow_cards,
            cards.home_red_cards,
            cards.away_yellow_cards,
            cards.away_red_cards,
        ],
    )
    .context("store assignment cards")?;
    Ok(())
}

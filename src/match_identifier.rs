use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

/// Human-readable match descriptor used by bulk imports instead of an internal key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchIdentifier {
    pub year: i32,
    pub league_slug: String,
    pub round_number: i64,
    #[serde(default)]
    pub round_order: Option<i64>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
}

impl MatchIdentifier {
    /// Either a round order or both team names must be present.
    pub fn is_complete(&self) -> bool {
        self.round_order.is_some() || (non_blank(&self.home_team) && non_blank(&self.away_team))
    }
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}년 시즌을 찾을 수 없습니다.")]
    SeasonNotFound(i32),
    #[error("리그 '{0}'을(를) 찾을 수 없습니다.")]
    LeagueNotFound(String),
    #[error("{0}라운드를 찾을 수 없습니다.")]
    RoundNotFound(i64),
    #[error("팀 '{0}'을(를) 찾을 수 없습니다.")]
    TeamNotFound(String),
    #[error("팀 '{0}'에 해당하는 팀이 여러 개입니다.")]
    AmbiguousTeam(String),
    #[error("조건에 맞는 경기를 찾을 수 없습니다.")]
    MatchNotFound,
    #[error("조건에 맞는 경기가 여러 개입니다.")]
    AmbiguousMatch,
    #[error("roundOrder 또는 homeTeam/awayTeam 정보가 필요합니다.")]
    Incomplete,
    #[error("경기 ID '{0}'을(를) 찾을 수 없습니다.")]
    UnknownMatchId(String),
    #[error("저장소 조회에 실패했습니다: {0}")]
    Store(#[from] rusqlite::Error),
}

pub fn resolve(conn: &Connection, ident: &MatchIdentifier) -> Result<String, ResolveError> {
    let season_id: String = conn
        .query_row(
            "SELECT id FROM seasons WHERE year = ?1",
            params![ident.year],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(ResolveError::SeasonNotFound(ident.year))?;

    let league_slug = ident.league_slug.trim();
    let league_id: String = conn
        .query_row(
            "SELECT id FROM leagues WHERE slug = ?1",
            params![league_slug],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| ResolveError::LeagueNotFound(league_slug.to_string()))?;

    let round_id: String = conn
        .query_row(
            "SELECT id FROM rounds WHERE season_id = ?1 AND league_id = ?2 AND number = ?3",
            params![season_id, league_id, ident.round_number],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(ResolveError::RoundNotFound(ident.round_number))?;

    if let Some(order) = ident.round_order {
        let ids = query_ids(
            conn,
            "SELECT id FROM matches WHERE round_id = ?1 AND round_order = ?2 LIMIT 2",
            params![round_id, order],
        )?;
        return single_match(ids);
    }

    let (Some(home), Some(away)) = (ident.home_team.as_deref(), ident.away_team.as_deref()) else {
        return Err(ResolveError::Incomplete);
    };
    let home_id = resolve_team(conn, home)?;
    let away_id = resolve_team(conn, away)?;
    let ids = query_ids(
        conn,
        "SELECT id FROM matches
         WHERE round_id = ?1 AND home_team_id = ?2 AND away_team_id = ?3 LIMIT 2",
        params![round_id, home_id, away_id],
    )?;
    single_match(ids)
}

/// Checks that a directly supplied match key exists.
pub fn resolve_match_id(conn: &Connection, match_id: &str) -> Result<String, ResolveError> {
    let match_id = match_id.trim();
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM matches WHERE id = ?1)",
        params![match_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(match_id.to_string())
    } else {
        Err(ResolveError::UnknownMatchId(match_id.to_string()))
    }
}

/// Team names match the full name, short name or slug.
fn resolve_team(conn: &Connection, name: &str) -> Result<String, ResolveError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ResolveError::Incomplete);
    }
    let ids = query_ids(
        conn,
        "SELECT id FROM teams WHERE name = ?1 OR short_name = ?1 OR slug = ?1 LIMIT 2",
        params![name],
    )?;
    match ids.as_slice() {
        [id] => Ok(id.clone()),
        [] => Err(ResolveError::TeamNotFound(name.to_string())),
        _ => Err(ResolveError::AmbiguousTeam(name.to_string())),
    }
}

fn single_match(mut ids: Vec<String>) -> Result<String, ResolveError> {
    match ids.len() {
        0 => Err(ResolveError::MatchNotFound),
        1 => Ok(ids.remove(0)),
        _ => Err(ResolveError::AmbiguousMatch),
    }
}

fn query_ids<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<String>, ResolveError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

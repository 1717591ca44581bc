#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;
use seevar::admin;
use seevar::db::{self, NewMatch};
use seevar::model::{RefereeRole, RoleCounts};

pub struct League {
    pub conn: Connection,
    pub season_id: String,
    pub league_id: String,
    pub ulsan: String,
    pub jeonbuk: String,
    pub pohang: String,
    /// Round 1, order 1: 울산 (home) vs 전북 (away).
    pub m1: String,
    /// Round 1, order 2: 포항 (home) vs 울산 (away).
    pub m2: String,
    pub go: String,
    pub kim: String,
}

pub fn seeded() -> League {
    let conn = db::open_in_memory().expect("open in-memory db");
    let season_id = db::insert_season(&conn, 2026).unwrap();
    let league_id = db::insert_league(&conn, "kleague1", "K리그1").unwrap();
    let round = db::insert_round(&conn, &season_id, &league_id, 1).unwrap();
    let ulsan = db::insert_team(&conn, "울산 HD", Some("울산"), "ulsan").unwrap();
    let jeonbuk = db::insert_team(&conn, "전북 현대", Some("전북"), "jeonbuk").unwrap();
    let pohang = db::insert_team(&conn, "포항 스틸러스", Some("포항"), "pohang").unwrap();
    let m1 = db::insert_match(
        &conn,
        &NewMatch {
            season_id: &season_id,
            league_id: &league_id,
            round_id: Some(&round),
            round_order: Some(1),
            home_team_id: &ulsan,
            away_team_id: &jeonbuk,
            kickoff_at: Some("2026-03-01T14:00:00+09:00"),
        },
    )
    .unwrap();
    let m2 = db::insert_match(
        &conn,
        &NewMatch {
            season_id: &season_id,
            league_id: &league_id,
            round_id: Some(&round),
            round_order: Some(2),
            home_team_id: &pohang,
            away_team_id: &ulsan,
            kickoff_at: Some("2026-03-02T16:30:00+09:00"),
        },
    )
    .unwrap();
    let go = db::insert_referee(&conn, "고형진", "go-hyeongjin", None).unwrap();
    let kim = db::insert_referee(&conn, "김종혁", "kim-jonghyeok", None).unwrap();

    League {
        conn,
        season_id,
        league_id,
        ulsan,
        jeonbuk,
        pohang,
        m1,
        m2,
        go,
        kim,
    }
}

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub type TeamRow = (String, String, u32, Option<RoleCounts>, u32, u32);
pub type RoleRow = (String, String, u32);

/// Team aggregates keyed by slugs, so separately seeded databases compare equal.
pub fn team_snapshot(conn: &Connection) -> Vec<TeamRow> {
    let mut stmt = conn
        .prepare(
            "SELECT r.slug, t.slug, st.total_assignments,
                    st.role_main, st.role_assistant, st.role_var, st.role_waiting,
                    st.total_yellow_cards, st.total_red_cards
             FROM referee_team_stats st
             JOIN referees r ON r.id = st.referee_id
             JOIN teams t ON t.id = st.team_id
             ORDER BY r.slug, t.slug",
        )
        .unwrap();
    stmt.query_map([], |row| {
        let main: Option<u32> = row.get(3)?;
        let assistant: Option<u32> = row.get(4)?;
        let var: Option<u32> = row.get(5)?;
        let waiting: Option<u32> = row.get(6)?;
        let counts = if main.is_none() && assistant.is_none() && var.is_none() && waiting.is_none()
        {
            None
        } else {
            Some(RoleCounts {
                main: main.unwrap_or(0),
                assistant: assistant.unwrap_or(0),
                var: var.unwrap_or(0),
                waiting: waiting.unwrap_or(0),
            })
        };
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            counts,
            row.get(7)?,
            row.get(8)?,
        ))
    })
    .unwrap()
    .map(|r| r.unwrap())
    .collect()
}

pub fn role_snapshot(conn: &Connection) -> Vec<RoleRow> {
    let mut stmt = conn
        .prepare(
            "SELECT r.slug, st.role, st.match_count
             FROM referee_role_stats st
             JOIN referees r ON r.id = st.referee_id
             ORDER BY r.slug, st.role",
        )
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

/// Creates an assignment through the admin path and returns its id.
pub fn assign(
    conn: &mut Connection,
    match_id: &str,
    referee_id: &str,
    role: RefereeRole,
) -> String {
    admin::create_assignment(conn, match_id, referee_id, role)
        .expect("create assignment")
        .assignment_id
}

mod common;

use rusqlite::Connection;
use seevar::admin::{self, ReviewInput};
use seevar::model::{CardCounts, RefereeRole, ReviewStatus};
use seevar::stats_export::{ExportReport, export_referee_stats};
use seevar::stats_rebuild::rebuild_all_stats;
use seevar::stats_store;

use common::{League, TeamRow, assign, role_snapshot, seeded, team_snapshot};

/// Rows that carry information; zero rows left behind by retractions are not replayed.
fn live_team_rows(conn: &Connection) -> Vec<TeamRow> {
    team_snapshot(conn)
        .into_iter()
        .filter(|(_, _, total, counts, yellow, red)| {
            *total > 0 || counts.is_some() || *yellow > 0 || *red > 0
        })
        .collect()
}

fn live_ratings(conn: &Connection) -> Vec<(String, String, u32, String)> {
    stats_store::all_team_stats(conn)
        .unwrap()
        .into_iter()
        .filter(|stat| stat.fan_rating_count > 0)
        .map(|stat| {
            (
                stat.referee_id,
                stat.team_id,
                stat.fan_rating_count,
                format!("{:.4}", stat.fan_average_rating),
            )
        })
        .collect()
}

fn busy_round(l: &mut League) {
    let (m1, m2, go, kim) = (l.m1.clone(), l.m2.clone(), l.go.clone(), l.kim.clone());
    let (ulsan, pohang) = (l.ulsan.clone(), l.pohang.clone());
    let conn = &mut l.conn;

    let a1 = assign(conn, &m1, &go, RefereeRole::Main);
    let a2 = assign(conn, &m1, &kim, RefereeRole::Var);
    let a3 = assign(conn, &m2, &go, RefereeRole::Assistant);
    let a4 = assign(conn, &m2, &kim, RefereeRole::Main);
    admin::update_assignment_cards(conn, &a1, &CardCounts::new(3, 0, 2, 1)).unwrap();
    admin::update_assignment_cards(conn, &a4, &CardCounts::new(1, 1, 4, 0)).unwrap();
    admin::update_assignment_cards(conn, &a1, &CardCounts::new(2, 0, 2, 0)).unwrap();
    admin::update_assignment(conn, &a2, &kim, RefereeRole::Waiting).unwrap();
    admin::update_assignment(conn, &a4, &go, RefereeRole::Main).unwrap();
    admin::delete_assignment(conn, &a3).unwrap();

    let mut input = ReviewInput {
        match_id: m1.clone(),
        referee_id: go.clone(),
        user_id: "fan-a".to_string(),
        fan_team_id: Some(ulsan.clone()),
        rating: 5,
        comment: Some("깔끔한 판정".to_string()),
    };
    admin::submit_review(conn, &input).unwrap();
    input.user_id = "fan-b".to_string();
    input.rating = 2;
    let hidden = admin::submit_review(conn, &input).unwrap();
    admin::set_review_status(conn, &hidden.review_id, ReviewStatus::Hidden).unwrap();
    input.user_id = "fan-c".to_string();
    input.match_id = m2;
    input.fan_team_id = Some(pohang);
    input.rating = 3;
    admin::submit_review(conn, &input).unwrap();
}

#[test]
fn rebuild_reproduces_incremental_state() {
    let mut l = seeded();
    busy_round(&mut l);
    let teams = live_team_rows(&l.conn);
    let roles: Vec<_> = role_snapshot(&l.conn)
        .into_iter()
        .filter(|(_, _, count)| *count > 0)
        .collect();
    let ratings = live_ratings(&l.conn);
    assert!(!teams.is_empty());
    assert_eq!(ratings.len(), 2);

    let report = rebuild_all_stats(&mut l.conn).unwrap();
    assert_eq!(report.assignments, 3);
    assert_eq!(report.assignments_with_cards, 2);
    assert_eq!(report.rating_pairs, 2);

    assert_eq!(live_team_rows(&l.conn), teams);
    assert_eq!(role_snapshot(&l.conn), roles);
    assert_eq!(live_ratings(&l.conn), ratings);
    for stat in stats_store::all_team_stats(&l.conn).unwrap() {
        assert!(stat.is_consistent(), "{stat:?}");
    }
}

#[test]
fn rebuild_repairs_drifted_counters() {
    let mut l = seeded();
    busy_round(&mut l);
    let expected = live_team_rows(&l.conn);
    l.conn
        .execute_batch(
            "UPDATE referee_team_stats SET total_assignments = 40, total_yellow_cards = 0;
             UPDATE referee_role_stats SET match_count = 7;",
        )
        .unwrap();

    rebuild_all_stats(&mut l.conn).unwrap();
    assert_eq!(live_team_rows(&l.conn), expected);
}

#[test]
fn export_writes_both_sheets() {
    let mut l = seeded();
    busy_round(&mut l);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("referee_stats.xlsx");

    let report = export_referee_stats(&l.conn, &path).unwrap();
    assert_eq!(
        report,
        ExportReport {
            role_rows: stats_store::all_role_stats(&l.conn).unwrap().len(),
            team_rows: stats_store::all_team_stats(&l.conn).unwrap().len(),
        }
    );
    assert!(report.team_rows > 0);

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"PK"), "xlsx is a zip archive");
}

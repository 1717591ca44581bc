use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rusqlite::Connection;
use serde_json::json;
use std::hint::black_box;

use seevar::bulk_assignments::import_assignments;
use seevar::db::{self, NewMatch};
use seevar::stats_rebuild::rebuild_all_stats;

const MATCHES: i64 = 6;
const REFEREES: usize = 12;

fn seeded_round() -> Connection {
    let conn = db::open_in_memory().unwrap();
    let season = db::insert_season(&conn, 2026).unwrap();
    let league = db::insert_league(&conn, "kleague1", "K리그1").unwrap();
    let round = db::insert_round(&conn, &season, &league, 1).unwrap();
    let teams: Vec<String> = (0..MATCHES * 2)
        .map(|idx| {
            let slug = format!("team-{idx}");
            db::insert_team(&conn, &format!("Team {idx}"), None, &slug).unwrap()
        })
        .collect();
    for order in 0..MATCHES {
        db::insert_match(
            &conn,
            &NewMatch {
                season_id: &season,
                league_id: &league,
                round_id: Some(&round),
                round_order: Some(order + 1),
                home_team_id: &teams[(order * 2) as usize],
                away_team_id: &teams[(order * 2 + 1) as usize],
                kickoff_at: None,
            },
        )
        .unwrap();
    }
    for idx in 0..REFEREES {
        db::insert_referee(&conn, &format!("Referee {idx}"), &format!("ref-{idx}"), None).unwrap();
    }
    conn
}

/// A full five-referee crew for every match of the round.
fn round_payload() -> String {
    let roles = ["MAIN", "ASSISTANT", "ASSISTANT", "VAR", "WAITING"];
    let mut rows = Vec::new();
    for order in 1..=MATCHES {
        for (slot, role) in roles.iter().enumerate() {
            let referee = (order as usize * 3 + slot) % REFEREES;
            rows.push(json!({
                "matchIdentifier": {
                    "year": 2026,
                    "leagueSlug": "kleague1",
                    "roundNumber": 1,
                    "roundOrder": order
                },
                "refereeSlug": format!("ref-{referee}"),
                "role": role,
            }));
        }
    }
    json!({ "assignments": rows }).to_string()
}

fn bench_assignment_import(c: &mut Criterion) {
    let payload = round_payload();
    c.bench_function("assignment_import_round", |b| {
        b.iter_batched(
            seeded_round,
            |mut conn| {
                let summary = import_assignments(&mut conn, black_box(&payload)).unwrap();
                black_box(summary.created);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_rebuild(c: &mut Criterion) {
    let payload = round_payload();
    c.bench_function("rebuild_all_stats", |b| {
        b.iter_batched(
            || {
                let mut conn = seeded_round();
                import_assignments(&mut conn, &payload).unwrap();
                conn
            },
            |mut conn| {
                let report = rebuild_all_stats(&mut conn).unwrap();
                black_box(report.assignments);
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_assignment_import, bench_rebuild);
criterion_main!(benches);

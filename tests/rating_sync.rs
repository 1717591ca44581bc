mod common;

use rusqlite::params;
use seevar::admin::{self, AdminError, ReviewInput, ReviewOutcome};
use seevar::model::ReviewStatus;
use seevar::rating_sync::{TeamRating, recompute_for_review, recompute_team_rating};
use seevar::stats_store;

use common::{League, seeded};

fn review(l: &League, user: &str, fan_team: Option<&str>, rating: u8) -> ReviewInput {
    ReviewInput {
        match_id: l.m1.clone(),
        referee_id: l.go.clone(),
        user_id: user.to_string(),
        fan_team_id: fan_team.map(str::to_string),
        rating,
        comment: None,
    }
}

fn submit(
    l: &mut League,
    user: &str,
    fan_team: Option<&str>,
    rating: u8,
) -> Result<ReviewOutcome, AdminError> {
    let input = review(l, user, fan_team, rating);
    admin::submit_review(&mut l.conn, &input)
}

fn stored_rating(l: &League, team: &str) -> (f64, u32) {
    let stat = stats_store::team_stat(&l.conn, &l.go, team)
        .unwrap()
        .expect("team stat row");
    (stat.fan_average_rating, stat.fan_rating_count)
}

#[test]
fn hiding_a_review_drops_it_from_the_average() {
    let mut l = seeded();
    let ulsan = l.ulsan.clone();
    submit(&mut l, "fan-a", Some(&ulsan), 4).unwrap();
    let low = submit(&mut l, "fan-b", Some(&ulsan), 2).unwrap();
    assert_eq!(
        low.team_rating,
        Some(TeamRating {
            average: 3.0,
            count: 2
        })
    );

    let after =
        admin::set_review_status(&mut l.conn, &low.review_id, ReviewStatus::Hidden).unwrap();
    assert_eq!(after.status, ReviewStatus::Hidden);
    assert_eq!(
        after.team_rating,
        Some(TeamRating {
            average: 4.0,
            count: 1
        })
    );
    assert_eq!(stored_rating(&l, &ulsan), (4.0, 1));

    admin::set_review_status(&mut l.conn, &low.review_id, ReviewStatus::Visible).unwrap();
    assert_eq!(stored_rating(&l, &ulsan), (3.0, 2));
}

#[test]
fn recompute_is_idempotent() {
    let mut l = seeded();
    let ulsan = l.ulsan.clone();
    submit(&mut l, "fan-a", Some(&ulsan), 5).unwrap();
    submit(&mut l, "fan-b", Some(&ulsan), 4).unwrap();

    let first = recompute_team_rating(&l.conn, &l.go, &ulsan).unwrap();
    let second = recompute_team_rating(&l.conn, &l.go, &ulsan).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.count, 2);
    assert!((first.average - 4.5).abs() < f64::EPSILON);
}

#[test]
fn no_visible_reviews_yields_zero() {
    let mut l = seeded();
    let ulsan = l.ulsan.clone();
    let only = submit(&mut l, "fan-a", Some(&ulsan), 3).unwrap();
    admin::set_review_status(&mut l.conn, &only.review_id, ReviewStatus::Hidden).unwrap();
    assert_eq!(stored_rating(&l, &ulsan), (0.0, 0));

    let fresh = recompute_team_rating(&l.conn, &l.kim, &l.pohang).unwrap();
    assert_eq!(
        fresh,
        TeamRating {
            average: 0.0,
            count: 0
        }
    );
}

#[test]
fn rating_recompute_leaves_assignment_counters_alone() {
    let mut l = seeded();
    let (m1, go, ulsan) = (l.m1.clone(), l.go.clone(), l.ulsan.clone());
    admin::create_assignment(&mut l.conn, &m1, &go, seevar::model::RefereeRole::Main).unwrap();
    submit(&mut l, "fan-a", Some(&ulsan), 5).unwrap();

    let stat = stats_store::team_stat(&l.conn, &go, &ulsan).unwrap().unwrap();
    assert_eq!(stat.total_assignments, 1);
    assert_eq!(stat.fan_rating_count, 1);
}

#[test]
fn resubmission_overwrites_and_moves_between_fan_teams() {
    let mut l = seeded();
    let (ulsan, jeonbuk) = (l.ulsan.clone(), l.jeonbuk.clone());
    let first = submit(&mut l, "fan-a", Some(&ulsan), 1).unwrap();
    let second = submit(&mut l, "fan-a", Some(&ulsan), 5).unwrap();
    assert_eq!(first.review_id, second.review_id);
    assert_eq!(stored_rating(&l, &ulsan), (5.0, 1));

    submit(&mut l, "fan-a", Some(&jeonbuk), 5).unwrap();
    assert_eq!(stored_rating(&l, &ulsan), (0.0, 0));
    assert_eq!(stored_rating(&l, &jeonbuk), (5.0, 1));
}

#[test]
fn reviews_without_fan_team_feed_no_aggregate() {
    let mut l = seeded();
    let outcome = submit(&mut l, "neutral", None, 4).unwrap();
    assert_eq!(outcome.team_rating, None);
    assert_eq!(recompute_for_review(&l.conn, &outcome.review_id).unwrap(), None);
    assert_eq!(recompute_for_review(&l.conn, "missing").unwrap(), None);
    assert!(stats_store::all_team_stats(&l.conn).unwrap().is_empty());
}

#[test]
fn invalid_reviews_are_rejected() {
    let mut l = seeded();
    let ulsan = l.ulsan.clone();
    for rating in [0, 6] {
        let err = submit(&mut l, "fan-a", Some(&ulsan), rating).unwrap_err();
        assert!(matches!(err, AdminError::InvalidRating));
    }

    let mut bad_match = review(&l, "fan-a", Some(&ulsan), 3);
    bad_match.match_id = "missing".to_string();
    assert!(matches!(
        admin::submit_review(&mut l.conn, &bad_match),
        Err(AdminError::MatchNotFound)
    ));

    let err = admin::set_review_status(&mut l.conn, "missing", ReviewStatus::Hidden).unwrap_err();
    assert!(matches!(err, AdminError::ReviewNotFound));

    let count: u32 = l
        .conn
        .query_row(
            "SELECT COUNT(*) FROM fan_reviews WHERE referee_id = ?1",
            params![l.go],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 0);
}

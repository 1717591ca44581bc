//! Single-item admin and review actions. Each action is one transaction: the row change
//! and its aggregate sync commit together or not at all.

use std::fmt::Display;

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::Serialize;
use tracing::info;

use crate::assignment_sync;
use crate::card_sync::{self, CardSyncOutcome};
use crate::db;
use crate::model::{CardCounts, RefereeRole, ReviewStatus};
use crate::rating_sync::{self, TeamRating};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("경기를 찾을 수 없습니다.")]
    MatchNotFound,
    #[error("심판을 찾을 수 없습니다.")]
    RefereeNotFound,
    #[error("배정 정보를 찾을 수 없습니다.")]
    AssignmentNotFound,
    #[error("이미 같은 역할로 배정된 심판입니다.")]
    DuplicateAssignment,
    #[error("평점은 1점부터 5점까지 입력할 수 있습니다.")]
    InvalidRating,
    #[error("리뷰를 찾을 수 없습니다.")]
    ReviewNotFound,
    #[error("처리 중 오류가 발생했습니다.")]
    Internal(#[from] anyhow::Error),
}

/// `{ok: true, ...data}` or `{ok: false, error}` as shown to admins.
///
/// `data` is flattened, so every action returns a struct rather than a bare value.
#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

fn begin(conn: &mut Connection) -> Result<Transaction<'_>, AdminError> {
    Ok(conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("begin admin transaction")?)
}

fn commit(tx: Transaction<'_>) -> Result<(), AdminError> {
    tx.commit().context("commit admin transaction")?;
    Ok(())
}

/// The assignment an action created or touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentChange {
    pub assignment_id: String,
}

impl AssignmentChange {
    fn new(assignment_id: impl Into<String>) -> Self {
        Self {
            assignment_id: assignment_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsUpdate {
    pub assignment_id: String,
    pub outcome: CardSyncOutcome,
}

pub fn create_assignment(
    conn: &mut Connection,
    match_id: &str,
    referee_id: &str,
    role: RefereeRole,
) -> Result<AssignmentChange, AdminError> {
    let tx = begin(conn)?;
    if !db::match_exists(&tx, match_id)? {
        return Err(AdminError::MatchNotFound);
    }
    if !db::referee_exists(&tx, referee_id)? {
        return Err(AdminError::RefereeNotFound);
    }
    let Some(assignment_id) = db::try_insert_assignment(&tx, match_id, referee_id, role)? else {
        return Err(AdminError::DuplicateAssignment);
    };
    assignment_sync::on_assignment_created(&tx, match_id, referee_id, role)?;
    commit(tx)?;
    info!(%assignment_id, match_id, referee_id, %role, "assignment created");
    Ok(AssignmentChange::new(assignment_id))
}

/// Changes the referee and/or role of an assignment. Card totals follow the referee.
pub fn update_assignment(
    conn: &mut Connection,
    assignment_id: &str,
    new_referee_id: &str,
    new_role: RefereeRole,
) -> Result<AssignmentChange, AdminError> {
    let tx = begin(conn)?;
    let old = db::load_assignment(&tx, assignment_id)?.ok_or(AdminError::AssignmentNotFound)?;
    if old.referee_id == new_referee_id && old.role == new_role {
        return Ok(AssignmentChange::new(assignment_id));
    }
    if !db::referee_exists(&tx, new_referee_id)? {
        return Err(AdminError::RefereeNotFound);
    }
    if !db::try_reassign(&tx, assignment_id, new_referee_id, new_role)? {
        return Err(AdminError::DuplicateAssignment);
    }
    assignment_sync::on_assignment_updated(
        &tx,
        &old.match_id,
        &old.referee_id,
        old.role,
        new_referee_id,
        new_role,
    )?;
    if old.referee_id != new_referee_id
        && !old.cards.is_zero()
        && let Some(ctx) = db::load_match_context(&tx, &old.match_id)?
    {
        let none = CardCounts::default();
        card_sync::apply_card_change(&tx, &ctx, &old.referee_id, &old.cards, &none)?;
        card_sync::apply_card_change(&tx, &ctx, new_referee_id, &none, &old.cards)?;
    }
    commit(tx)?;
    info!(assignment_id, new_referee_id, %new_role, "assignment updated");
    Ok(AssignmentChange::new(assignment_id))
}

/// Deletes an assignment and retracts its role counts and recorded cards.
pub fn delete_assignment(
    conn: &mut Connection,
    assignment_id: &str,
) -> Result<AssignmentChange, AdminError> {
    let tx = begin(conn)?;
    let old = db::load_assignment(&tx, assignment_id)?.ok_or(AdminError::AssignmentNotFound)?;
    if !old.cards.is_zero() {
        card_sync::apply_card_delta(&tx, assignment_id, &CardCounts::default())?;
    }
    db::delete_assignment_row(&tx, assignment_id)?;
    assignment_sync::on_assignment_deleted(&tx, &old.match_id, &old.referee_id, old.role)?;
    commit(tx)?;
    info!(assignment_id, "assignment deleted");
    Ok(AssignmentChange::new(assignment_id))
}

/// Syncs the card delta first, then stores the new counts on the assignment.
pub fn update_assignment_cards(
    conn: &mut Connection,
    assignment_id: &str,
    cards: &CardCounts,
) -> Result<CardsUpdate, AdminError> {
    let tx = begin(conn)?;
    if db::load_assignment(&tx, assignment_id)?.is_none() {
        return Err(AdminError::AssignmentNotFound);
    }
    let outcome = card_sync::apply_card_delta(&tx, assignment_id, cards)?;
    db::store_assignment_cards(&tx, assignment_id, cards)?;
    commit(tx)?;
    Ok(CardsUpdate {
        assignment_id: assignment_id.to_string(),
        outcome,
    })
}

#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub match_id: String,
    pub referee_id: String,
    pub user_id: String,
    pub fan_team_id: Option<String>,
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub review_id: String,
    pub team_rating: Option<TeamRating>,
}

/// Creates or overwrites the user's review of a referee for a match.
pub fn submit_review(
    conn: &mut Connection,
    input: &ReviewInput,
) -> Result<ReviewOutcome, AdminError> {
    if !(1..=5).contains(&input.rating) {
        return Err(AdminError::InvalidRating);
    }
    let tx = begin(conn)?;
    if !db::match_exists(&tx, &input.match_id)? {
        return Err(AdminError::MatchNotFound);
    }
    if !db::referee_exists(&tx, &input.referee_id)? {
        return Err(AdminError::RefereeNotFound);
    }

    let previous_team: Option<Option<String>> = tx
        .query_row(
            "SELECT fan_team_id FROM fan_reviews
             WHERE match_id = ?1 AND referee_id = ?2 AND user_id = ?3",
            params![input.match_id, input.referee_id, input.user_id],
            |row| row.get(0),
        )
        .optional()
        .context("load previous review")?;

    let now = db::now_rfc3339();
    tx.execute(
        r#"
        INSERT INTO fan_reviews (
            id, match_id, referee_id, user_id, fan_team_id, rating, comment,
            status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        ON CONFLICT(match_id, referee_id, user_id) DO UPDATE SET
            fan_team_id = excluded.fan_team_id,
            rating = excluded.rating,
            comment = excluded.comment,
            updated_at = excluded.updated_at
        "#,
        params![
            db::new_id(),
            input.match_id,
            input.referee_id,
            input.user_id,
            input.fan_team_id,
            input.rating,
            input.comment,
            ReviewStatus::Visible,
            now,
        ],
    )
    .context("upsert fan review")?;

    let review_id: String = tx
        .query_row(
            "SELECT id FROM fan_reviews WHERE match_id = ?1 AND referee_id = ?2 AND user_id = ?3",
            params![input.match_id, input.referee_id, input.user_id],
            |row| row.get(0),
        )
        .context("load review id")?;

    // The reviewer's fan team changed: the old pair loses this review.
    if let Some(Some(old_team)) = previous_team
        && input.fan_team_id.as_deref() != Some(old_team.as_str())
    {
        rating_sync::recompute_team_rating(&tx, &input.referee_id, &old_team)?;
    }
    let team_rating = match input.fan_team_id.as_deref() {
        Some(team_id) => Some(rating_sync::recompute_team_rating(&tx, &input.referee_id, team_id)?),
        None => None,
    };
    commit(tx)?;
    Ok(ReviewOutcome {
        review_id,
        team_rating,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatusChange {
    pub review_id: String,
    pub status: ReviewStatus,
    pub team_rating: Option<TeamRating>,
}

/// Moderation hide/restore.
pub fn set_review_status(
    conn: &mut Connection,
    review_id: &str,
    status: ReviewStatus,
) -> Result<ReviewStatusChange, AdminError> {
    let tx = begin(conn)?;
    let changed = tx
        .execute(
            "UPDATE fan_reviews SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![review_id, status, db::now_rfc3339()],
        )
        .context("update review status")?;
    if changed == 0 {
        return Err(AdminError::ReviewNotFound);
    }
    let team_rating = rating_sync::recompute_for_review(&tx, review_id)?;
    commit(tx)?;
    info!(review_id, %status, "review status changed");
    Ok(ReviewStatusChange {
        review_id: review_id.to_string(),
        status,
        team_rating,
    })
}

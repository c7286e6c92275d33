use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthMember;
use crate::models::vote::*;
use crate::services::{membership, voting};
use crate::AppState;

/// Admin-only poll creation. Option rows depend on the kind: binary polls get
/// fixed Yes/No, multiple choice takes the caller's labels with blanks
/// dropped, percentage polls carry a threshold and no options.
pub async fn create_vote(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
    Json(body): Json<CreateVoteRequest>,
) -> AppResult<Json<Value>> {
    membership::require_admin(&state.db, member.id, chama_id).await?;

    if body.title.trim().is_empty() {
        return Err(AppError::Validation("Vote title required".into()));
    }

    let kind = VoteKind::parse(&body.kind).ok_or_else(|| {
        AppError::Validation(
            "Vote kind must be 'binary', 'multiple_choice' or 'percentage'".into(),
        )
    })?;

    let closes_at: Option<DateTime<Utc>> = match &body.closes_at {
        Some(raw) => Some(
            raw.parse::<DateTime<Utc>>()
                .map_err(|_| AppError::Validation("Invalid close time".into()))?,
        ),
        None => None,
    };

    let labels = match kind {
        VoteKind::Binary => vec!["Yes".to_string(), "No".to_string()],
        VoteKind::MultipleChoice => {
            let labels = voting::clean_option_labels(body.options.as_deref().unwrap_or(&[]));
            if labels.len() < 2 {
                return Err(AppError::Validation(
                    "Multiple-choice votes need at least two non-blank options".into(),
                ));
            }
            labels
        }
        VoteKind::Percentage => Vec::new(),
    };

    let approval_threshold = match kind {
        VoteKind::Percentage => {
            let threshold = body.approval_threshold.ok_or_else(|| {
                AppError::Validation("Approval threshold required for percentage votes".into())
            })?;
            if !voting::valid_percentage(threshold) {
                return Err(AppError::Validation(
                    "Approval threshold must be between 0 and 100".into(),
                ));
            }
            Some(threshold)
        }
        VoteKind::Binary | VoteKind::MultipleChoice => None,
    };

    let mut tx = state.db.begin().await?;

    let vote: Vote = sqlx::query_as(
        r#"INSERT INTO votes (id, chama_id, title, description, kind, closes_at, approval_threshold, created_by)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7)
        RETURNING *"#,
    )
    .bind(chama_id)
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(kind.as_str())
    .bind(closes_at)
    .bind(approval_threshold)
    .bind(member.id)
    .fetch_one(&mut *tx)
    .await?;

    let mut options = Vec::with_capacity(labels.len());
    for (position, label) in labels.iter().enumerate() {
        let option: VoteOption = sqlx::query_as(
            r#"INSERT INTO vote_options (id, vote_id, label, position)
            VALUES (gen_random_uuid(), $1, $2, $3)
            RETURNING *"#,
        )
        .bind(vote.id)
        .bind(label)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;
        options.push(option);
    }

    tx.commit().await?;

    tracing::info!(vote_id = %vote.id, kind = kind.as_str(), "vote created");
    Ok(Json(json!({ "vote": vote, "options": options })))
}

pub async fn list_votes(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    membership::require_member(&state.db, member.id, chama_id).await?;

    let votes: Vec<Vote> = sqlx::query_as(
        "SELECT * FROM votes WHERE chama_id = $1 AND is_active = true ORDER BY created_at DESC",
    )
    .bind(chama_id)
    .fetch_all(&state.db)
    .await?;

    let mut out = Vec::with_capacity(votes.len());
    for vote in votes {
        let options: Vec<VoteOption> = sqlx::query_as(
            "SELECT * FROM vote_options WHERE vote_id = $1 ORDER BY position",
        )
        .bind(vote.id)
        .fetch_all(&state.db)
        .await?;
        out.push(json!({ "vote": vote, "options": options }));
    }

    Ok(Json(json!({ "votes": out })))
}

async fn load_vote(state: &AppState, vote_id: Uuid) -> AppResult<Vote> {
    let vote: Option<Vote> = sqlx::query_as("SELECT * FROM votes WHERE id = $1")
        .bind(vote_id)
        .fetch_optional(&state.db)
        .await?;
    vote.ok_or_else(|| AppError::NotFound("Vote not found".into()))
}

pub async fn get_vote(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(vote_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let vote = load_vote(&state, vote_id).await?;
    membership::require_member(&state.db, member.id, vote.chama_id).await?;

    let options: Vec<VoteOption> =
        sqlx::query_as("SELECT * FROM vote_options WHERE vote_id = $1 ORDER BY position")
            .bind(vote_id)
            .fetch_all(&state.db)
            .await?;

    let already_voted: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM vote_responses WHERE vote_id = $1 AND member_id = $2)",
    )
    .bind(vote_id)
    .bind(member.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "vote": vote,
        "options": options,
        "hasVoted": already_voted,
    })))
}

/// One ballot per member per vote. Preconditions are checked in order
/// (membership, open, duplicate) so each refusal has a distinct reason; the
/// (vote_id, member_id) unique key is the atomic backstop for duplicates
/// racing through the pre-check.
pub async fn submit_ballot(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(vote_id): Path<Uuid>,
    Json(body): Json<BallotRequest>,
) -> AppResult<Json<Value>> {
    let vote = load_vote(&state, vote_id).await?;
    membership::require_member(&state.db, member.id, vote.chama_id).await?;

    if !vote.is_active || !voting::accepts_ballots_at(vote.closes_at, Utc::now()) {
        return Err(AppError::Conflict("This vote is closed".into()));
    }

    let already: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM vote_responses WHERE vote_id = $1 AND member_id = $2)",
    )
    .bind(vote_id)
    .bind(member.id)
    .fetch_one(&state.db)
    .await?;
    if already {
        return Err(AppError::Conflict("You have already voted".into()));
    }

    let kind = vote
        .kind()
        .ok_or_else(|| AppError::Internal(format!("Unknown vote kind '{}'", vote.kind)))?;

    let (option_id, percentage_value) = match kind {
        VoteKind::Binary | VoteKind::MultipleChoice => {
            let option_id = body
                .option_id
                .ok_or_else(|| AppError::Validation("optionId required".into()))?;
            let belongs: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM vote_options WHERE id = $1 AND vote_id = $2)",
            )
            .bind(option_id)
            .bind(vote_id)
            .fetch_one(&state.db)
            .await?;
            if !belongs {
                return Err(AppError::Validation(
                    "Option does not belong to this vote".into(),
                ));
            }
            (Some(option_id), None)
        }
        VoteKind::Percentage => {
            let value = body
                .percentage
                .ok_or_else(|| AppError::Validation("percentage required".into()))?;
            if !voting::valid_percentage(value) {
                return Err(AppError::Validation(
                    "Percentage must be between 0 and 100".into(),
                ));
            }
            (None, Some(value))
        }
    };

    let inserted = sqlx::query(
        r#"INSERT INTO vote_responses (id, vote_id, member_id, option_id, percentage_value)
        VALUES (gen_random_uuid(), $1, $2, $3, $4)
        ON CONFLICT (vote_id, member_id) DO NOTHING"#,
    )
    .bind(vote_id)
    .bind(member.id)
    .bind(option_id)
    .bind(percentage_value)
    .execute(&state.db)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::Conflict("You have already voted".into()));
    }

    Ok(Json(json!({"success": true})))
}

/// Pure read-side tally; never mutates.
pub async fn vote_results(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(vote_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let vote = load_vote(&state, vote_id).await?;
    membership::require_member(&state.db, member.id, vote.chama_id).await?;

    let responses: Vec<VoteResponse> =
        sqlx::query_as("SELECT * FROM vote_responses WHERE vote_id = $1")
            .bind(vote_id)
            .fetch_all(&state.db)
            .await?;

    let kind = vote
        .kind()
        .ok_or_else(|| AppError::Internal(format!("Unknown vote kind '{}'", vote.kind)))?;

    let results = match kind {
        VoteKind::Binary | VoteKind::MultipleChoice => {
            let options: Vec<VoteOption> =
                sqlx::query_as("SELECT * FROM vote_options WHERE vote_id = $1 ORDER BY position")
                    .bind(vote_id)
                    .fetch_all(&state.db)
                    .await?;
            json!({ "tally": voting::tally_options(&options, &responses) })
        }
        VoteKind::Percentage => {
            let total = membership::active_member_count(&state.db, vote.chama_id).await?;
            json!({ "tally": voting::tally_percentage(total, &responses) })
        }
    };

    Ok(Json(json!({
        "vote": vote,
        "totalResponses": responses.len(),
        "results": results,
    })))
}

/// Closing an already-closed vote is a reported no-op.
pub async fn close_vote(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(vote_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let vote = load_vote(&state, vote_id).await?;
    membership::require_admin(&state.db, member.id, vote.chama_id).await?;

    if !vote.is_active {
        return Ok(Json(json!({"success": true, "changed": false})));
    }

    sqlx::query("UPDATE votes SET is_active = false WHERE id = $1")
        .bind(vote_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({"success": true, "changed": true})))
}

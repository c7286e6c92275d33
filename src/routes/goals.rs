use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthMember;
use crate::models::finance::*;
use crate::services::membership;
use crate::AppState;

pub async fn create_goal(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
    Json(body): Json<CreateGoalRequest>,
) -> AppResult<Json<Value>> {
    membership::require_admin(&state.db, member.id, chama_id).await?;

    if body.title.trim().is_empty() {
        return Err(AppError::Validation("Goal title required".into()));
    }
    if body.target_amount <= 0.0 {
        return Err(AppError::Validation("Target amount must be positive".into()));
    }

    let target_date = match &body.target_date {
        Some(raw) => Some(
            raw.parse::<chrono::NaiveDate>()
                .map_err(|_| AppError::Validation("Invalid target date".into()))?,
        ),
        None => None,
    };

    let goal: Goal = sqlx::query_as(
        r#"INSERT INTO goals (id, chama_id, title, description, target_amount, target_date)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5)
        RETURNING *"#,
    )
    .bind(chama_id)
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(body.target_amount)
    .bind(target_date)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "goal": goal })))
}

#[derive(Debug, Deserialize)]
pub struct GoalListQuery {
    pub active: Option<bool>,
}

pub async fn list_goals(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
    Query(query): Query<GoalListQuery>,
) -> AppResult<Json<Value>> {
    membership::require_member(&state.db, member.id, chama_id).await?;

    let goals: Vec<Goal> = if query.active.unwrap_or(false) {
        sqlx::query_as(
            "SELECT * FROM goals WHERE chama_id = $1 AND is_achieved = false ORDER BY created_at",
        )
        .bind(chama_id)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as("SELECT * FROM goals WHERE chama_id = $1 ORDER BY created_at")
            .bind(chama_id)
            .fetch_all(&state.db)
            .await?
    };

    Ok(Json(json!({ "goals": goals })))
}

/// Progress is maintained by admins by hand; confirmed contributions never
/// move it automatically.
pub async fn update_progress(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path((chama_id, goal_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<GoalProgressRequest>,
) -> AppResult<Json<Value>> {
    membership::require_admin(&state.db, member.id, chama_id).await?;

    if body.current_amount < 0.0 {
        return Err(AppError::Validation(
            "Current amount cannot be negative".into(),
        ));
    }

    let goal: Goal = sqlx::query_as(
        r#"UPDATE goals SET current_amount = $1
        WHERE id = $2 AND chama_id = $3
        RETURNING *"#,
    )
    .bind(body.current_amount)
    .bind(goal_id)
    .bind(chama_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Goal not found".into()))?;

    Ok(Json(json!({ "goal": goal })))
}

pub async fn achieve_goal(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path((chama_id, goal_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    membership::require_admin(&state.db, member.id, chama_id).await?;

    let goal: Goal = sqlx::query_as(
        r#"UPDATE goals SET is_achieved = true
        WHERE id = $1 AND chama_id = $2
        RETURNING *"#,
    )
    .bind(goal_id)
    .bind(chama_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Goal not found".into()))?;

    Ok(Json(json!({ "goal": goal })))
}

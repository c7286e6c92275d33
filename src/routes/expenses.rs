use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthMember;
use crate::models::finance::*;
use crate::services::membership;
use crate::AppState;

pub async fn create_expense(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
    Json(body): Json<CreateExpenseRequest>,
) -> AppResult<Json<Value>> {
    membership::require_admin(&state.db, member.id, chama_id).await?;

    if body.title.trim().is_empty() {
        return Err(AppError::Validation("Expense title required".into()));
    }
    if body.amount <= 0.0 {
        return Err(AppError::Validation("Amount must be positive".into()));
    }

    let expense: Expense = sqlx::query_as(
        r#"INSERT INTO expenses (id, chama_id, title, description, category, amount, approved_by)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6)
        RETURNING *"#,
    )
    .bind(chama_id)
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(&body.category)
    .bind(body.amount)
    .bind(member.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "expense": expense })))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    membership::require_member(&state.db, member.id, chama_id).await?;

    let expenses: Vec<Expense> =
        sqlx::query_as("SELECT * FROM expenses WHERE chama_id = $1 ORDER BY created_at DESC")
            .bind(chama_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(json!({ "expenses": expenses })))
}

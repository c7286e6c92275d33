use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthMember;
use crate::models::chama::*;
use crate::services::{join_codes, membership, sms};
use crate::AppState;

pub async fn create_chama(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Json(body): Json<CreateChamaRequest>,
) -> AppResult<Json<Value>> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Chama name required".into()));
    }
    if body.contribution_amount <= 0.0 {
        return Err(AppError::Validation(
            "Contribution amount must be positive".into(),
        ));
    }
    if body.contribution_frequency != FREQUENCY_WEEKLY
        && body.contribution_frequency != FREQUENCY_MONTHLY
    {
        return Err(AppError::Validation(
            "Contribution frequency must be 'weekly' or 'monthly'".into(),
        ));
    }

    let join_code = join_codes::generate_unique_join_code(&state.db).await?;

    let mut tx = state.db.begin().await?;

    let chama: Chama = sqlx::query_as(
        r#"INSERT INTO chamas (id, name, description, join_code, contribution_amount, contribution_frequency, created_by)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6)
        RETURNING *"#,
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(&join_code)
    .bind(body.contribution_amount)
    .bind(&body.contribution_frequency)
    .bind(member.id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO memberships (id, member_id, chama_id, role) VALUES (gen_random_uuid(), $1, $2, 'admin')",
    )
    .bind(member.id)
    .bind(chama.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(chama_id = %chama.id, "chama created");
    Ok(Json(json!({ "chama": chama, "role": ROLE_ADMIN })))
}

pub async fn join_chama(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Json(body): Json<JoinChamaRequest>,
) -> AppResult<Json<Value>> {
    let code = body.join_code.trim().to_uppercase();

    let chama: Chama =
        sqlx::query_as("SELECT * FROM chamas WHERE join_code = $1 AND is_active = true")
            .bind(&code)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid join code".into()))?;

    // The (member_id, chama_id) unique key makes this atomic; the racing
    // duplicate join loses at the constraint, not at a pre-read.
    let inserted = sqlx::query(
        r#"INSERT INTO memberships (id, member_id, chama_id, role)
        VALUES (gen_random_uuid(), $1, $2, 'member')
        ON CONFLICT (member_id, chama_id) DO NOTHING"#,
    )
    .bind(member.id)
    .bind(chama.id)
    .execute(&state.db)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "You are already a member of this chama".into(),
        ));
    }

    if let Some(sms_client) = &state.sms {
        let name: String = sqlx::query_scalar("SELECT name FROM members WHERE id = $1")
            .bind(member.id)
            .fetch_one(&state.db)
            .await?;
        let message = sms::welcome_message(
            &name,
            &chama.name,
            chama.contribution_amount,
            &chama.contribution_frequency,
        );
        if let Err(e) = sms_client.send(&member.phone_number, &message).await {
            tracing::warn!(chama_id = %chama.id, "welcome SMS failed: {e}");
        }
    }

    Ok(Json(json!({ "chama": chama, "role": ROLE_MEMBER })))
}

pub async fn list_chamas(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
) -> AppResult<Json<Value>> {
    let rows: Vec<(Uuid, String, Option<String>, f64, String, String, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as(
            r#"SELECT c.id, c.name, c.description, c.contribution_amount, c.contribution_frequency, m.role, m.joined_at
            FROM chamas c
            JOIN memberships m ON m.chama_id = c.id
            WHERE m.member_id = $1 AND m.is_active = true AND c.is_active = true
            ORDER BY m.joined_at"#,
        )
        .bind(member.id)
        .fetch_all(&state.db)
        .await?;

    let chamas: Vec<Value> = rows
        .iter()
        .map(|(id, name, description, amount, frequency, role, joined)| {
            json!({
                "id": id, "name": name, "description": description,
                "contributionAmount": amount, "contributionFrequency": frequency,
                "role": role, "joinedAt": joined,
            })
        })
        .collect();

    Ok(Json(json!({ "chamas": chamas })))
}

pub async fn get_chama(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let caller = membership::require_member(&state.db, member.id, id).await?;

    let chama: Chama = sqlx::query_as("SELECT * FROM chamas WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Chama not found".into()))?;

    let total_members = membership::active_member_count(&state.db, id).await?;

    let total_contributions: Option<f64> = sqlx::query_scalar(
        "SELECT SUM(amount) FROM contributions WHERE chama_id = $1 AND status = 'confirmed'",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    let total_expenses: Option<f64> =
        sqlx::query_scalar("SELECT SUM(amount) FROM expenses WHERE chama_id = $1")
            .bind(id)
            .fetch_one(&state.db)
            .await?;

    let recent: Vec<crate::models::contribution::Contribution> = sqlx::query_as(
        "SELECT * FROM contributions WHERE chama_id = $1 ORDER BY contributed_at DESC LIMIT 10",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let active_goals: Vec<crate::models::finance::Goal> = sqlx::query_as(
        "SELECT * FROM goals WHERE chama_id = $1 AND is_achieved = false ORDER BY created_at",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let active_votes: Vec<crate::models::vote::Vote> = sqlx::query_as(
        "SELECT * FROM votes WHERE chama_id = $1 AND is_active = true ORDER BY created_at DESC",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({
        "chama": chama,
        "role": caller.role,
        "totalMembers": total_members,
        "totalContributions": total_contributions.unwrap_or(0.0),
        "totalExpenses": total_expenses.unwrap_or(0.0),
        "recentContributions": recent,
        "activeGoals": active_goals,
        "activeVotes": active_votes,
    })))
}

/// Monthly confirmed-contribution series for charts. Cached briefly; the
/// cache key is invalidated when a contribution is confirmed.
pub async fn chama_stats(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    membership::require_member(&state.db, member.id, id).await?;

    let cache_key = format!("stats:{id}");
    if let Some(cached) = state.cache.get_json::<Value>(&cache_key).await {
        return Ok(Json(cached));
    }

    let rows: Vec<(chrono::DateTime<chrono::Utc>, f64)> = sqlx::query_as(
        r#"SELECT date_trunc('month', contributed_at) AS month, SUM(amount) AS total
        FROM contributions
        WHERE chama_id = $1 AND status = 'confirmed'
        GROUP BY month
        ORDER BY month"#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let series: Vec<Value> = rows
        .iter()
        .map(|(month, total)| json!({"month": month, "total": total}))
        .collect();
    let body = json!({ "monthlyContributions": series });

    state
        .cache
        .set_json(&cache_key, &body, state.config.stats.cache_seconds as u64)
        .await;

    Ok(Json(body))
}

pub async fn list_members(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    membership::require_member(&state.db, member.id, id).await?;

    let rows: Vec<(Uuid, String, String, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        r#"SELECT u.id, u.name, u.phone_number, m.role, m.joined_at
        FROM members u
        JOIN memberships m ON m.member_id = u.id
        WHERE m.chama_id = $1 AND m.is_active = true
        ORDER BY m.joined_at"#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let members: Vec<Value> = rows
        .iter()
        .map(|(mid, name, phone, role, joined)| {
            json!({
                "memberId": mid, "name": name, "phoneNumber": phone,
                "role": role, "joinedAt": joined,
            })
        })
        .collect();

    Ok(Json(json!({ "members": members })))
}

/// Admin action: contribution-reminder SMS to every active member. Gateway
/// failures are counted and logged, never surfaced as a request failure.
pub async fn send_reminders(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    membership::require_admin(&state.db, member.id, id).await?;

    let chama: Chama = sqlx::query_as("SELECT * FROM chamas WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Chama not found".into()))?;

    let sms_client = state
        .sms
        .as_ref()
        .ok_or_else(|| AppError::Validation("SMS gateway not configured".into()))?;

    let recipients: Vec<(String, String)> = sqlx::query_as(
        r#"SELECT u.name, u.phone_number
        FROM members u
        JOIN memberships m ON m.member_id = u.id
        WHERE m.chama_id = $1 AND m.is_active = true"#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let mut sent = 0u32;
    let mut failed = 0u32;
    for (name, phone) in &recipients {
        let message = sms::reminder_message(
            name,
            &chama.name,
            chama.contribution_amount,
            &chama.contribution_frequency,
        );
        match sms_client.send(phone, &message).await {
            Ok(()) => sent += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(chama_id = %id, "reminder SMS failed: {e}");
            }
        }
    }

    Ok(Json(json!({ "sent": sent, "failed": failed })))
}

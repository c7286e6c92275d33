use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{generate_tokens, verify_token, AuthMember};
use crate::models::member::*;
use crate::services::sms::validate_kenyan_phone;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<Value>> {
    if !validate_kenyan_phone(&body.phone_number) {
        return Err(AppError::Validation(
            "A valid Kenyan phone number is required".into(),
        ));
    }
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if body.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE phone_number = $1)")
            .bind(&body.phone_number)
            .fetch_one(&state.db)
            .await?;
    if exists {
        return Err(AppError::Conflict("Phone number already registered".into()));
    }

    let password_hash =
        bcrypt::hash(&body.password, 12).map_err(|e| AppError::Internal(e.to_string()))?;

    let member: Member = sqlx::query_as(
        r#"INSERT INTO members (id, phone_number, name, password_hash)
        VALUES (gen_random_uuid(), $1, $2, $3)
        RETURNING *"#,
    )
    .bind(&body.phone_number)
    .bind(body.name.trim())
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await?;

    let (token, refresh_token) = generate_tokens(
        member.id,
        &member.phone_number,
        &state.config.jwt.secret,
        state.config.jwt.access_expiry_secs,
        state.config.jwt.refresh_expiry_secs,
    )?;

    Ok(Json(json!({
        "token": token,
        "refreshToken": refresh_token,
        "member": MemberPublic::from(&member),
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    let member: Member = sqlx::query_as("SELECT * FROM members WHERE phone_number = $1")
        .bind(&body.phone_number)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid phone number or password".into()))?;

    let valid = bcrypt::verify(&body.password, &member.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        return Err(AppError::Unauthorized(
            "Invalid phone number or password".into(),
        ));
    }

    sqlx::query("UPDATE members SET last_login_at = NOW() WHERE id = $1")
        .bind(member.id)
        .execute(&state.db)
        .await?;

    let (token, refresh_token) = generate_tokens(
        member.id,
        &member.phone_number,
        &state.config.jwt.secret,
        state.config.jwt.access_expiry_secs,
        state.config.jwt.refresh_expiry_secs,
    )?;

    Ok(Json(json!({
        "token": token,
        "refreshToken": refresh_token,
        "member": MemberPublic::from(&member),
    })))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let token = body["refreshToken"]
        .as_str()
        .ok_or_else(|| AppError::Validation("refreshToken required".into()))?;

    let claims = verify_token(token, &state.config.jwt.secret)?;
    if claims.token_type.as_deref() != Some("refresh") {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    let member_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    let (new_token, new_refresh) = generate_tokens(
        member_id,
        &claims.phone,
        &state.config.jwt.secret,
        state.config.jwt.access_expiry_secs,
        state.config.jwt.refresh_expiry_secs,
    )?;

    Ok(Json(json!({
        "token": new_token,
        "refreshToken": new_refresh,
    })))
}

/// Statements that erase or de-attribute every row referencing a member, run
/// in order before the member row itself is deleted. Chamas and votes the
/// member created outlive the account, so their creator reference is nulled
/// rather than the rows removed; same for confirmations performed for others.
const MEMBER_ERASURE_SQL: &[&str] = &[
    "DELETE FROM vote_responses WHERE member_id = $1",
    "DELETE FROM memberships WHERE member_id = $1",
    "UPDATE contributions SET confirmed_by = NULL WHERE confirmed_by = $1",
    "DELETE FROM contributions WHERE member_id = $1",
    "UPDATE chamas SET created_by = NULL WHERE created_by = $1",
    "UPDATE votes SET created_by = NULL WHERE created_by = $1",
];

/// Cascading account deletion in one transaction.
pub async fn delete_account(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
) -> AppResult<Json<Value>> {
    let mut tx = state.db.begin().await?;

    for sql in MEMBER_ERASURE_SQL {
        sqlx::query(sql).bind(member.id).execute(&mut *tx).await?;
    }

    let deleted = sqlx::query("DELETE FROM members WHERE id = $1")
        .bind(member.id)
        .execute(&mut *tx)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("Account not found".into()));
    }

    tx.commit().await?;

    tracing::info!(member_id = %member.id, "account deleted");
    Ok(Json(json!({"success": true})))
}

pub async fn dashboard(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
) -> AppResult<Json<Value>> {
    let chamas: Vec<(uuid::Uuid, String, f64, String, String)> = sqlx::query_as(
        r#"SELECT c.id, c.name, c.contribution_amount, c.contribution_frequency, m.role
        FROM chamas c
        JOIN memberships m ON m.chama_id = c.id
        WHERE m.member_id = $1 AND m.is_active = true AND c.is_active = true
        ORDER BY m.joined_at"#,
    )
    .bind(member.id)
    .fetch_all(&state.db)
    .await?;

    let recent: Vec<crate::models::contribution::Contribution> = sqlx::query_as(
        "SELECT * FROM contributions WHERE member_id = $1 ORDER BY contributed_at DESC LIMIT 5",
    )
    .bind(member.id)
    .fetch_all(&state.db)
    .await?;

    // Only confirmed money counts toward the total; pending rows are visible
    // in the recent list but contribute nothing here.
    let confirmed_total: Option<f64> = sqlx::query_scalar(
        "SELECT SUM(amount) FROM contributions WHERE member_id = $1 AND status = 'confirmed'",
    )
    .bind(member.id)
    .fetch_one(&state.db)
    .await?;

    let this_month: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*)::bigint FROM contributions
        WHERE member_id = $1 AND contributed_at >= date_trunc('month', NOW())"#,
    )
    .bind(member.id)
    .fetch_one(&state.db)
    .await?;

    let chamas: Vec<Value> = chamas
        .iter()
        .map(|(id, name, amount, frequency, role)| {
            json!({
                "id": id, "name": name, "contributionAmount": amount,
                "contributionFrequency": frequency, "role": role,
            })
        })
        .collect();

    Ok(Json(json!({
        "chamas": chamas,
        "recentContributions": recent,
        "confirmedTotal": confirmed_total.unwrap_or(0.0),
        "thisMonthCount": this_month,
    })))
}

#[cfg(test)]
mod tests {
    use super::MEMBER_ERASURE_SQL;

    // Every foreign key into members must be erased or de-attributed before
    // the member row can go, or the final DELETE violates a constraint and
    // the whole transaction rolls back. Group founders hold the created_by
    // references, so they are the first accounts to hit a missing entry.
    #[test]
    fn erasure_covers_every_member_reference() {
        let covered = |table: &str, column: &str| {
            MEMBER_ERASURE_SQL
                .iter()
                .any(|sql| sql.contains(table) && sql.contains(column))
        };

        assert!(covered("vote_responses", "member_id"));
        assert!(covered("memberships", "member_id"));
        assert!(covered("contributions", "member_id"));
        assert!(covered("contributions", "confirmed_by"));
        assert!(covered("chamas", "created_by"));
        assert!(covered("votes", "created_by"));
    }

    #[test]
    fn erasure_statements_bind_only_the_member() {
        for sql in MEMBER_ERASURE_SQL {
            assert!(sql.contains("$1"), "statement must scope to one member: {sql}");
            assert!(!sql.contains("$2"));
        }
    }
}

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthMember;
use crate::models::chama::Chama;
use crate::models::contribution::*;
use crate::services::{membership, sms};
use crate::AppState;

/// Records a contribution in `pending` state. The M-Pesa push and any SMS are
/// strictly best-effort: the row persists whatever the gateways do, and a
/// later confirmation step moves it to `confirmed`.
pub async fn contribute(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
    Json(body): Json<ContributeRequest>,
) -> AppResult<Json<Value>> {
    membership::require_member(&state.db, member.id, chama_id).await?;

    if body.amount <= 0.0 {
        return Err(AppError::Validation("Amount must be positive".into()));
    }
    if body.payment_method.trim().is_empty() {
        return Err(AppError::Validation("Payment method required".into()));
    }

    let chama: Chama = sqlx::query_as("SELECT * FROM chamas WHERE id = $1")
        .bind(chama_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Chama not found".into()))?;

    let contribution: Contribution = sqlx::query_as(
        r#"INSERT INTO contributions (id, member_id, chama_id, amount, payment_method, transaction_ref, status)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6)
        RETURNING *"#,
    )
    .bind(member.id)
    .bind(chama_id)
    .bind(body.amount)
    .bind(body.payment_method.trim())
    .bind(&body.transaction_ref)
    .bind(STATUS_PENDING)
    .fetch_one(&state.db)
    .await?;

    // Kick off the STK push when paying via M-Pesa. The ack's checkout id
    // becomes the transaction ref so the callback can find this row; a
    // gateway failure leaves the row pending for manual confirmation.
    let mut gateway = json!({"attempted": false});
    if body.payment_method.trim().eq_ignore_ascii_case("mpesa") {
        if let Some(mpesa) = &state.mpesa {
            let reference = format!("CHAMA-{}", &chama_id.to_string()[..8]);
            let description = format!("Contribution to {}", chama.name);
            match mpesa
                .initiate_stk_push(&member.phone_number, body.amount, &reference, &description)
                .await
            {
                Ok(ack) => {
                    sqlx::query("UPDATE contributions SET transaction_ref = $1 WHERE id = $2")
                        .bind(&ack.checkout_request_id)
                        .bind(contribution.id)
                        .execute(&state.db)
                        .await?;
                    gateway = json!({
                        "attempted": true,
                        "accepted": true,
                        "merchantRequestId": ack.merchant_request_id,
                        "checkoutRequestId": ack.checkout_request_id,
                    });
                }
                Err(e) => {
                    tracing::warn!(contribution_id = %contribution.id, "STK push failed: {e}");
                    gateway = json!({"attempted": true, "accepted": false});
                }
            }
        }
    }

    Ok(Json(json!({
        "contribution": contribution,
        "gateway": gateway,
        "message": "Contribution recorded, awaiting confirmation",
    })))
}

pub async fn list_contributions(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path(chama_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    membership::require_member(&state.db, member.id, chama_id).await?;

    let contributions: Vec<Contribution> = sqlx::query_as(
        "SELECT * FROM contributions WHERE chama_id = $1 ORDER BY contributed_at DESC",
    )
    .bind(chama_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "contributions": contributions })))
}

/// Admin confirmation of a pending contribution. Confirming twice is a
/// reported no-op rather than an error.
pub async fn confirm_contribution(
    State(state): State<AppState>,
    member: axum::Extension<AuthMember>,
    Path((chama_id, contribution_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    membership::require_admin(&state.db, member.id, chama_id).await?;

    let updated = sqlx::query(
        r#"UPDATE contributions SET status = 'confirmed', confirmed_by = $1
        WHERE id = $2 AND chama_id = $3 AND status = 'pending'"#,
    )
    .bind(member.id)
    .bind(contribution_id)
    .bind(chama_id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM contributions WHERE id = $1 AND chama_id = $2",
        )
        .bind(contribution_id)
        .bind(chama_id)
        .fetch_optional(&state.db)
        .await?;

        return match status.as_deref() {
            Some(STATUS_CONFIRMED) => Ok(Json(json!({"success": true, "changed": false}))),
            Some(other) => Err(AppError::Conflict(format!(
                "Contribution is {other}, not pending"
            ))),
            None => Err(AppError::NotFound("Contribution not found".into())),
        };
    }

    state.cache.del(&format!("stats:{chama_id}")).await;

    if let Some(sms_client) = &state.sms {
        let row: Option<(String, String, f64, String)> = sqlx::query_as(
            r#"SELECT u.name, u.phone_number, c.amount, ch.name
            FROM contributions c
            JOIN members u ON u.id = c.member_id
            JOIN chamas ch ON ch.id = c.chama_id
            WHERE c.id = $1"#,
        )
        .bind(contribution_id)
        .fetch_optional(&state.db)
        .await?;

        if let Some((name, phone, amount, chama_name)) = row {
            let message = sms::confirmation_message(&name, &chama_name, amount);
            if let Err(e) = sms_client.send(&phone, &message).await {
                tracing::warn!(contribution_id = %contribution_id, "confirmation SMS failed: {e}");
            }
        }
    }

    Ok(Json(json!({"success": true, "changed": true})))
}

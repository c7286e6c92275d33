use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;

use crate::models::contribution::{STATUS_CONFIRMED, STATUS_FAILED};
use crate::AppState;

/// M-Pesa STK callback. Result code 0 confirms the pending contribution that
/// carries the checkout id as its transaction ref; anything else marks it
/// failed. Unknown ids are acknowledged so the gateway stops retrying.
pub async fn mpesa_callback(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<StatusCode, StatusCode> {
    let callback = &body["Body"]["stkCallback"];
    let checkout_id = match callback["CheckoutRequestID"].as_str() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    let result_code = callback["ResultCode"].as_i64().unwrap_or(-1);

    let new_status = if result_code == 0 {
        STATUS_CONFIRMED
    } else {
        STATUS_FAILED
    };

    let updated = sqlx::query(
        "UPDATE contributions SET status = $1 WHERE transaction_ref = $2 AND status = 'pending'",
    )
    .bind(new_status)
    .bind(checkout_id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        tracing::error!("M-Pesa callback update failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if updated.rows_affected() == 0 {
        tracing::warn!(checkout_id, "M-Pesa callback matched no pending contribution");
    } else if result_code == 0 {
        let chama_id: Option<uuid::Uuid> =
            sqlx::query_scalar("SELECT chama_id FROM contributions WHERE transaction_ref = $1")
                .bind(checkout_id)
                .fetch_optional(&state.db)
                .await
                .ok()
                .flatten();
        if let Some(id) = chama_id {
            state.cache.del(&format!("stats:{id}")).await;
        }
    }

    Ok(StatusCode::OK)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contribution {
    pub id: Uuid,
    pub member_id: Uuid,
    pub chama_id: Uuid,
    pub amount: f64,
    pub payment_method: Option<String>,
    pub transaction_ref: Option<String>,
    pub status: String,
    pub confirmed_by: Option<Uuid>,
    pub contributed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ContributeRequest {
    pub amount: f64,
    #[serde(rename = "paymentMethod")]
    pub payment_method: String,
    #[serde(rename = "transactionRef")]
    pub transaction_ref: Option<String>,
}

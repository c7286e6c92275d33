use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub chama_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub chama_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: Option<NaiveDate>,
    pub is_achieved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "targetAmount")]
    pub target_amount: f64,
    /// ISO 8601 date, e.g. "2026-12-31".
    #[serde(rename = "targetDate")]
    pub target_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoalProgressRequest {
    #[serde(rename = "currentAmount")]
    pub current_amount: f64,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FREQUENCY_WEEKLY: &str = "weekly";
pub const FREQUENCY_MONTHLY: &str = "monthly";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chama {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub join_code: String,
    pub contribution_amount: f64,
    pub contribution_frequency: String,
    pub created_by: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub member_id: Uuid,
    pub chama_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateChamaRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "contributionAmount")]
    pub contribution_amount: f64,
    #[serde(rename = "contributionFrequency")]
    pub contribution_frequency: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinChamaRequest {
    #[serde(rename = "joinCode")]
    pub join_code: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub phone_number: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MemberPublic {
    #[serde(rename = "memberId")]
    pub member_id: Uuid,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub name: String,
    #[serde(rename = "joinedAt")]
    pub joined_at: DateTime<Utc>,
}

impl From<&Member> for MemberPublic {
    fn from(m: &Member) -> Self {
        Self {
            member_id: m.id,
            phone_number: m.phone_number.clone(),
            name: m.name.clone(),
            joined_at: m.created_at,
        }
    }
}

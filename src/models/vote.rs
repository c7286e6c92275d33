use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three poll kinds. Submitting and tallying both match exhaustively on
/// this enum; adding a kind means adding an arm to each, never touching
/// shared logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    Binary,
    MultipleChoice,
    Percentage,
}

impl VoteKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "binary" => Some(Self::Binary),
            "multiple_choice" => Some(Self::MultipleChoice),
            "percentage" => Some(Self::Percentage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::MultipleChoice => "multiple_choice",
            Self::Percentage => "percentage",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub chama_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub closes_at: Option<DateTime<Utc>>,
    pub approval_threshold: Option<i32>,
    pub created_by: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn kind(&self) -> Option<VoteKind> {
        VoteKind::parse(&self.kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoteOption {
    pub id: Uuid,
    pub vote_id: Uuid,
    pub label: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoteResponse {
    pub id: Uuid,
    pub vote_id: Uuid,
    pub member_id: Uuid,
    pub option_id: Option<Uuid>,
    pub percentage_value: Option<i32>,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVoteRequest {
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    /// RFC 3339 timestamp; exclusive upper bound on ballot acceptance.
    #[serde(rename = "closesAt")]
    pub closes_at: Option<String>,
    /// Required for percentage votes, in [0,100].
    #[serde(rename = "approvalThreshold")]
    pub approval_threshold: Option<i32>,
    /// Option labels for multiple_choice votes; blanks are discarded.
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct BallotRequest {
    #[serde(rename = "optionId")]
    pub option_id: Option<Uuid>,
    /// Integer in [0,100] for percentage votes.
    pub percentage: Option<i32>,
}

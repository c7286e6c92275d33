use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // member_id
    pub phone: String,
    #[serde(rename = "type")]
    pub token_type: Option<String>, // "access" or "refresh"
    pub exp: i64,
    pub iat: i64,
}

/// The authenticated caller, resolved once per request. Group-level
/// authorization (membership, role) is a separate lookup per operation.
#[derive(Debug, Clone)]
pub struct AuthMember {
    pub id: Uuid,
    pub phone_number: String,
}

pub fn generate_tokens(
    member_id: Uuid,
    phone_number: &str,
    secret: &str,
    access_expiry_secs: i64,
    refresh_expiry_secs: i64,
) -> AppResult<(String, String)> {
    let now = Utc::now().timestamp();

    let access_claims = Claims {
        sub: member_id.to_string(),
        phone: phone_number.to_string(),
        token_type: Some("access".to_string()),
        exp: now + access_expiry_secs,
        iat: now,
    };
    let access_token = encode(
        &Header::default(),
        &access_claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    let refresh_claims = Claims {
        sub: member_id.to_string(),
        phone: phone_number.to_string(),
        token_type: Some("refresh".to_string()),
        exp: now + refresh_expiry_secs,
        iat: now,
    };
    let refresh_token = encode(
        &Header::default(),
        &refresh_claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((access_token, refresh_token))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn extract_bearer(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

/// Middleware: requires valid JWT. Sets AuthMember in extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer(&req)
        .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;

    let claims = verify_token(&token, &state.config.jwt.secret)?;

    if claims.token_type.as_deref() == Some("refresh") {
        return Err(AppError::Unauthorized("Access token required".into()));
    }

    let member_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;

    req.extensions_mut().insert(AuthMember {
        id: member_id,
        phone_number: claims.phone,
    });

    Ok(next.run(req).await)
}

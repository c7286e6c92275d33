use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::chama::Membership;

/// Looks up the caller's *active* membership in a chama. At most one row can
/// match thanks to the (member_id, chama_id) unique key.
pub async fn active_membership(
    db: &PgPool,
    member_id: Uuid,
    chama_id: Uuid,
) -> AppResult<Option<Membership>> {
    let membership: Option<Membership> = sqlx::query_as(
        "SELECT * FROM memberships WHERE member_id = $1 AND chama_id = $2 AND is_active = true",
    )
    .bind(member_id)
    .bind(chama_id)
    .fetch_optional(db)
    .await?;
    Ok(membership)
}

/// Authorization gate for member-scoped operations.
pub async fn require_member(
    db: &PgPool,
    member_id: Uuid,
    chama_id: Uuid,
) -> AppResult<Membership> {
    active_membership(db, member_id, chama_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("You are not a member of this chama".into()))
}

/// Authorization gate for admin-scoped operations.
pub async fn require_admin(
    db: &PgPool,
    member_id: Uuid,
    chama_id: Uuid,
) -> AppResult<Membership> {
    let membership = require_member(db, member_id, chama_id).await?;
    if !membership.is_admin() {
        return Err(AppError::Forbidden("Admin role required".into()));
    }
    Ok(membership)
}

pub async fn active_member_count(db: &PgPool, chama_id: Uuid) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*)::bigint FROM memberships WHERE chama_id = $1 AND is_active = true",
    )
    .bind(chama_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::accounts;
use crate::error::{AppError, Result};
use crate::models::user::{BlockUser, UserSummary};
use crate::rbac::{self, require_staff_permission};
use crate::session::CurrentUser;

pub async fn list_users(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "usuarios", "ver").await?;

    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.is_staff, u.is_superuser,
               u.is_active, COALESCE(p.is_blocked, 0) AS is_blocked, p.block_reason, u.created_at
        FROM users u LEFT JOIN profiles p ON p.user_id = u.id
        ORDER BY u.username
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_user(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "usuarios", "ver").await?;
    let user = accounts::find_user(pool.get_ref(), path.into_inner()).await?;
    let profile = accounts::profile_for(pool.get_ref(), user.id).await?;
    let roles = rbac::active_roles(pool.get_ref(), user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user, "profile": profile, "roles": roles })))
}

pub async fn block_user(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<BlockUser>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "usuarios", "editar").await?;
    let target = accounts::find_user(pool.get_ref(), path.into_inner()).await?;
    if target.id == current.id() {
        return Err(AppError::Validation("You cannot block your own account".to_string()));
    }

    let mut profile = accounts::profile_for(pool.get_ref(), target.id).await?;
    profile.block(current.id(), body.reason.trim(), Utc::now().naive_utc());
    accounts::save_block_state(pool.get_ref(), &profile).await?;

    log::info!(
        "User {} blocked by {}: {}",
        target.username,
        current.user.username,
        profile.block_reason.as_deref().unwrap_or_default()
    );
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("User {} has been blocked", target.username),
        "profile": profile,
    })))
}

pub async fn unblock_user(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "usuarios", "editar").await?;
    let target = accounts::find_user(pool.get_ref(), path.into_inner()).await?;

    let mut profile = accounts::profile_for(pool.get_ref(), target.id).await?;
    profile.unblock();
    accounts::save_block_state(pool.get_ref(), &profile).await?;

    log::info!("User {} unblocked by {}", target.username, current.user.username);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("User {} has been unblocked", target.username),
        "profile": profile,
    })))
}

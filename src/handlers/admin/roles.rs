use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use super::conflict_on_duplicate;
use crate::accounts;
use crate::error::{AppError, Result};
use crate::models::rbac::{
    AssignRole, CreateRole, Permission, Role, RolePreview, RoleWithPermissions, SetRolePermissions,
};
use crate::rbac::{self, require_staff_permission, require_super_admin, SUPER_ADMIN};
use crate::session::CurrentUser;

async fn find_role(conn: &mut SqliteConnection, id: i64) -> Result<Role> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))
}

async fn role_permissions(conn: &mut SqliteConnection, role_id: i64) -> Result<Vec<Permission>> {
    let permissions = sqlx::query_as::<_, Permission>(
        r#"
        SELECT p.* FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = ?
        ORDER BY p.module, p.action
        "#,
    )
    .bind(role_id)
    .fetch_all(conn)
    .await?;
    Ok(permissions)
}

pub async fn list_roles(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "roles", "ver").await?;

    let mut conn = pool.acquire().await?;
    let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    let mut result = Vec::with_capacity(roles.len());
    for role in roles {
        let permissions = role_permissions(&mut conn, role.id).await?;
        result.push(RoleWithPermissions { role, permissions });
    }
    Ok(HttpResponse::Ok().json(result))
}

pub async fn list_permissions(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "roles", "ver").await?;
    let permissions = sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY module, action")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(permissions))
}

pub async fn create_role(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<CreateRole>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "roles", "crear").await?;
    body.validate()?;

    let role = sqlx::query_as::<_, Role>(
        "INSERT INTO roles (name, description, active, created_at) VALUES (?, ?, 1, ?) RETURNING *",
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(Utc::now().naive_utc())
    .fetch_one(pool.get_ref())
    .await
    .map_err(conflict_on_duplicate("Role"))?;

    log::info!("Role {} created by {}", role.name, current.user.username);
    Ok(HttpResponse::Created().json(role))
}

/// Replaces the role's permission set.
pub async fn set_role_permissions(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<SetRolePermissions>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "roles", "editar").await?;

    let mut tx = pool.begin().await?;
    let role = find_role(&mut tx, path.into_inner()).await?;
    if role.name == SUPER_ADMIN {
        require_super_admin(pool.get_ref(), &current).await?;
    }

    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role.id)
        .execute(&mut *tx)
        .await?;
    for permission_id in &body.permission_ids {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
            SELECT ?, id FROM permissions WHERE id = ?
            "#,
        )
        .bind(role.id)
        .bind(permission_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM permissions WHERE id = ?)")
                .bind(permission_id)
                .fetch_one(&mut *tx)
                .await?;
            if !exists {
                return Err(AppError::Validation(format!(
                    "Permission {} does not exist",
                    permission_id
                )));
            }
        }
    }
    let permissions = role_permissions(&mut tx, role.id).await?;
    tx.commit().await?;

    log::info!(
        "Role {} now has {} permissions (set by {})",
        role.name,
        permissions.len(),
        current.user.username
    );
    Ok(HttpResponse::Ok().json(RoleWithPermissions { role, permissions }))
}

pub async fn assign_role(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<AssignRole>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "roles", "asignar").await?;
    let user = accounts::find_user(pool.get_ref(), path.into_inner()).await?;

    let role = {
        let mut conn = pool.acquire().await?;
        find_role(&mut conn, body.role_id).await?
    };
    if !role.active {
        return Err(AppError::Validation(format!("Role {} is inactive", role.name)));
    }
    if role.name == SUPER_ADMIN {
        require_super_admin(pool.get_ref(), &current).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id, active, assigned_by, assigned_at)
        VALUES (?, ?, 1, ?, ?)
        ON CONFLICT (user_id, role_id) DO UPDATE SET
            active = 1, assigned_by = excluded.assigned_by, assigned_at = excluded.assigned_at
        "#,
    )
    .bind(user.id)
    .bind(role.id)
    .bind(current.id())
    .bind(Utc::now().naive_utc())
    .execute(pool.get_ref())
    .await?;
    // A backend role is only usable by staff accounts.
    sqlx::query("UPDATE users SET is_staff = 1 WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    log::info!(
        "Role {} assigned to {} by {}",
        role.name,
        user.username,
        current.user.username
    );
    let roles = rbac::active_roles(pool.get_ref(), user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user_id": user.id, "roles": roles })))
}

pub async fn revoke_role(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "roles", "asignar").await?;
    let (user_id, role_id) = path.into_inner();

    let role = {
        let mut conn = pool.acquire().await?;
        find_role(&mut conn, role_id).await?
    };
    if role.name == SUPER_ADMIN {
        require_super_admin(pool.get_ref(), &current).await?;
    }

    let deleted = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
        .bind(user_id)
        .bind(role_id)
        .execute(pool.get_ref())
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Role assignment"));
    }
    sqlx::query(
        r#"
        UPDATE users SET is_staff = 0
        WHERE id = ? AND is_superuser = 0
          AND NOT EXISTS (SELECT 1 FROM user_roles WHERE user_id = ? AND active = 1)
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    log::info!(
        "Role {} revoked from user {} by {}",
        role.name,
        user_id,
        current.user.username
    );
    Ok(HttpResponse::NoContent().finish())
}

/// Lets a super admin see the backend through another role's permissions.
pub async fn start_preview(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<RolePreview>,
) -> Result<HttpResponse> {
    require_super_admin(pool.get_ref(), &current).await?;
    let role = {
        let mut conn = pool.acquire().await?;
        find_role(&mut conn, body.role_id).await?
    };
    if !role.active {
        return Err(AppError::Validation(format!("Role {} is inactive", role.name)));
    }

    current.session.data_mut().role_preview_id = Some(role.id);
    current.session.save(pool.get_ref()).await?;

    let permissions = rbac::permissions_for_role(pool.get_ref(), &role).await?;
    log::info!("{} is previewing role {}", current.user.username, role.name);
    Ok(HttpResponse::Ok().json(json!({ "role": role, "permissions": permissions })))
}

pub async fn stop_preview(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_super_admin(pool.get_ref(), &current).await?;
    current.session.data_mut().role_preview_id = None;
    current.session.save(pool.get_ref()).await?;
    Ok(HttpResponse::NoContent().finish())
}

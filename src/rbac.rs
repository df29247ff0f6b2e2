//! Role based access control over the `roles`/`permissions` matrix.

use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::rbac::{PermissionMap, Role};
use crate::models::user::User;
use crate::session::CurrentUser;

pub const SUPER_ADMIN: &str = "super_admin";

pub async fn active_roles(pool: &SqlitePool, user_id: i64) -> Result<Vec<Role>> {
    let roles = sqlx::query_as::<_, Role>(
        r#"
        SELECT r.* FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = ? AND ur.active = 1 AND r.active = 1
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(roles)
}

pub async fn is_super_admin(pool: &SqlitePool, user: &User) -> Result<bool> {
    if user.is_superuser {
        return Ok(true);
    }
    let found: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ? AND ur.active = 1 AND r.active = 1 AND r.name = ?
        )
        "#,
    )
    .bind(user.id)
    .bind(SUPER_ADMIN)
    .fetch_one(pool)
    .await?;
    Ok(found)
}

async fn role_grants(pool: &SqlitePool, role: &Role, module: &str, action: &str) -> Result<bool> {
    if role.name == SUPER_ADMIN {
        return Ok(true);
    }
    let found: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = ? AND p.module = ? AND p.action = ?
        )
        "#,
    )
    .bind(role.id)
    .bind(module)
    .bind(action)
    .fetch_one(pool)
    .await?;
    Ok(found)
}

pub async fn has_permission(pool: &SqlitePool, user: &User, module: &str, action: &str) -> Result<bool> {
    if !user.is_active {
        return Ok(false);
    }
    if user.is_superuser {
        return Ok(true);
    }
    if module == "dashboard" && action == "ver" && user.is_staff {
        return Ok(true);
    }

    for role in active_roles(pool, user.id).await? {
        if role_grants(pool, &role, module, action).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn all_permissions(pool: &SqlitePool, into: &mut PermissionMap) -> Result<()> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT module, action FROM permissions")
        .fetch_all(pool)
        .await?;
    for (module, action) in rows {
        into.entry(module).or_default().insert(action);
    }
    Ok(())
}

pub async fn permissions_for_role(pool: &SqlitePool, role: &Role) -> Result<PermissionMap> {
    let mut map = PermissionMap::new();
    if role.name == SUPER_ADMIN {
        all_permissions(pool, &mut map).await?;
        return Ok(map);
    }

    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT p.module, p.action FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = ?
        "#,
    )
    .bind(role.id)
    .fetch_all(pool)
    .await?;
    for (module, action) in rows {
        map.entry(module).or_default().insert(action);
    }
    Ok(map)
}

pub async fn permissions_for_user(pool: &SqlitePool, user: &User) -> Result<PermissionMap> {
    let mut map = PermissionMap::new();
    if user.is_superuser {
        all_permissions(pool, &mut map).await?;
    } else {
        for role in active_roles(pool, user.id).await? {
            for (module, actions) in permissions_for_role(pool, &role).await? {
                map.entry(module).or_default().extend(actions);
            }
        }
    }

    if user.is_staff {
        map.entry("dashboard".to_string())
            .or_default()
            .insert("ver".to_string());
    }
    Ok(map)
}

async fn active_role(pool: &SqlitePool, role_id: i64) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = ? AND active = 1")
        .bind(role_id)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}

/// Role currently previewed by a super admin, clearing a stale preview from the session.
pub async fn preview_role(pool: &SqlitePool, current: &mut CurrentUser) -> Result<Option<Role>> {
    let Some(role_id) = current.session.data().role_preview_id else {
        return Ok(None);
    };

    if is_super_admin(pool, &current.user).await? {
        if let Some(role) = active_role(pool, role_id).await? {
            return Ok(Some(role));
        }
    }

    log::info!(
        "Dropping role preview {} for user {}",
        role_id,
        current.user.username
    );
    current.session.data_mut().role_preview_id = None;
    current.session.save(pool).await?;
    Ok(None)
}

/// Permission check honouring an active role preview.
pub async fn effective_permission(
    pool: &SqlitePool,
    current: &mut CurrentUser,
    module: &str,
    action: &str,
) -> Result<bool> {
    match preview_role(pool, current).await? {
        Some(role) => role_grants(pool, &role, module, action).await,
        None => has_permission(pool, &current.user, module, action).await,
    }
}

pub async fn effective_permissions(pool: &SqlitePool, current: &mut CurrentUser) -> Result<PermissionMap> {
    match preview_role(pool, current).await? {
        Some(role) => permissions_for_role(pool, &role).await,
        None => permissions_for_user(pool, &current.user).await,
    }
}

/// Gate for the administration backend: staff (or super admin) holding `module`/`action`.
pub async fn require_staff_permission(
    pool: &SqlitePool,
    current: &mut CurrentUser,
    module: &str,
    action: &str,
) -> Result<()> {
    if !current.user.is_staff && !is_super_admin(pool, &current.user).await? {
        return Err(AppError::Forbidden("Access denied. Staff permissions are required.".to_string()));
    }

    if !effective_permission(pool, current, module, action).await? {
        return Err(AppError::Forbidden(format!(
            "You do not have permission to {} in the {} module.",
            action, module
        )));
    }
    Ok(())
}

pub async fn require_super_admin(pool: &SqlitePool, current: &CurrentUser) -> Result<()> {
    if is_super_admin(pool, &current.user).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only a super administrator can do this.".to_string()))
    }
}

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Permission {
    pub id: i64,
    pub module: String,
    pub action: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct UserRole {
    pub id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub active: bool,
    pub assigned_by: Option<i64>,
    pub assigned_at: NaiveDateTime,
}

/// module -> actions granted
pub type PermissionMap = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRole {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRolePermissions {
    pub permission_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRole {
    pub role_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RolePreview {
    pub role_id: i64,
}

use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor};

use crate::error::{AppError, Result};
use crate::models::user::{Profile, User};
use crate::security;

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

/// Inserts a user and its profile. Usernames are unique; a clash is a conflict.
pub async fn create_user(conn: &mut SqliteConnection, new: NewUser<'_>) -> Result<User> {
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(new.username)
        .fetch_one(&mut *conn)
        .await?;
    if taken {
        return Err(AppError::Conflict(format!(
            "Username '{}' is already taken",
            new.username
        )));
    }

    let password_hash = security::hash_password(new.password)?;
    let now = Utc::now().naive_utc();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, first_name, is_staff, is_superuser, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new.username)
    .bind(new.email)
    .bind(password_hash)
    .bind(new.first_name)
    .bind(new.is_staff)
    .bind(new.is_superuser)
    .bind(new.is_active)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("INSERT INTO profiles (user_id, created_at) VALUES (?, ?)")
        .bind(user.id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(user)
}

pub async fn find_user<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn find_by_username<'e, E: SqliteExecutor<'e>>(
    executor: E,
    username: &str,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(executor)
        .await?;
    Ok(user)
}

/// Every user gets a profile on creation; one missing is repaired here.
pub async fn profile_for<'e, E: SqliteExecutor<'e> + Copy>(
    executor: E,
    user_id: i64,
) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    if let Some(profile) = profile {
        return Ok(profile);
    }

    log::warn!("User {} had no profile, creating one", user_id);
    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (user_id, created_at) VALUES (?, ?) RETURNING *",
    )
    .bind(user_id)
    .bind(Utc::now().naive_utc())
    .fetch_one(executor)
    .await?;
    Ok(profile)
}

pub async fn save_block_state<'e, E: SqliteExecutor<'e>>(
    executor: E,
    profile: &Profile,
) -> Result<()> {
    sqlx::query(
        "UPDATE profiles SET is_blocked = ?, blocked_at = ?, blocked_by = ?, block_reason = ? WHERE user_id = ?",
    )
    .bind(profile.is_blocked)
    .bind(profile.blocked_at)
    .bind(profile.blocked_by)
    .bind(&profile.block_reason)
    .bind(profile.user_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn set_password<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: i64,
    password: &str,
) -> Result<()> {
    let hash = security::hash_password(password)?;
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(hash)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::accounts::{self, NewUser};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::mail;
use crate::models::user::{
    ChangePassword, LoginRequest, PasswordResetConfirm, PasswordResetRequest, Preferences,
    RegisterUser, TwoFactorCode, UpdateProfile, User,
};
use crate::rbac;
use crate::security;
use crate::session::{CurrentUser, Session, SessionData};

const TWO_FACTOR_CODE_LEN: usize = 6;
const TWO_FACTOR_VALID_MINUTES: i64 = 10;
/// Wrong codes a pending login may send before it is thrown away.
const TWO_FACTOR_MAX_FAILURES: u32 = 5;
const PASSWORD_RESET_VALID_HOURS: i64 = 24;

pub async fn register(
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
    body: web::Json<RegisterUser>,
) -> Result<HttpResponse> {
    body.validate()?;

    let mut tx = pool.begin().await?;
    let user = accounts::create_user(
        &mut tx,
        NewUser {
            username: body.username.trim(),
            email: body.email.trim(),
            password: &body.password,
            first_name: "",
            is_staff: false,
            is_superuser: false,
            is_active: true,
        },
    )
    .await?;
    tx.commit().await?;

    let session = Session::create(
        pool.get_ref(),
        Some(user.id),
        SessionData::default(),
        config.session_ttl_hours,
    )
    .await?;

    log::info!("Registered user {} ({})", user.username, user.id);
    Ok(HttpResponse::Created().json(json!({
        "token": session.token,
        "user": user,
    })))
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| addr.to_string())
}

pub async fn login(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let user = accounts::find_by_username(pool.get_ref(), body.username.trim())
        .await?
        .filter(|u| u.is_active && security::verify_password(&body.password, &u.password_hash))
        .ok_or(AppError::InvalidCredentials)?;

    let profile = accounts::profile_for(pool.get_ref(), user.id).await?;
    sqlx::query("UPDATE profiles SET last_login_ip = ? WHERE user_id = ?")
        .bind(client_ip(&req))
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    if profile.two_factor_enabled {
        let code = security::numeric_code(TWO_FACTOR_CODE_LEN);
        sqlx::query(
            "UPDATE profiles SET two_factor_pending_code = ?, two_factor_last_sent_at = ? WHERE user_id = ?",
        )
        .bind(&code)
        .bind(Utc::now().naive_utc())
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;
        mail::queue(
            pool.get_ref(),
            &user.email,
            "Your verification code",
            &format!(
                "Your login code is {}. It expires in {} minutes.",
                code, TWO_FACTOR_VALID_MINUTES
            ),
        )
        .await?;

        let data = SessionData {
            two_factor_pending: true,
            ..Default::default()
        };
        let session = Session::create(pool.get_ref(), Some(user.id), data, config.session_ttl_hours).await?;
        log::info!("User {} passed the password step, awaiting 2FA", user.username);
        return Ok(HttpResponse::Ok().json(json!({
            "token": session.token,
            "two_factor_required": true,
        })));
    }

    let session = Session::create(
        pool.get_ref(),
        Some(user.id),
        SessionData::default(),
        config.session_ttl_hours,
    )
    .await?;
    log::info!("User {} logged in", user.username);
    Ok(HttpResponse::Ok().json(json!({
        "token": session.token,
        "two_factor_required": false,
        "user": user,
    })))
}

pub async fn verify_two_factor(
    pool: web::Data<SqlitePool>,
    mut session: Session,
    body: web::Json<TwoFactorCode>,
) -> Result<HttpResponse> {
    let user_id = session.user_id.ok_or(AppError::Unauthorized)?;
    if !session.data().two_factor_pending {
        return Err(AppError::Validation("No verification is pending".to_string()));
    }

    let profile = accounts::profile_for(pool.get_ref(), user_id).await?;
    let fresh = profile
        .two_factor_last_sent_at
        .is_some_and(|sent| Utc::now().naive_utc() - sent <= Duration::minutes(TWO_FACTOR_VALID_MINUTES));
    let matches = profile
        .two_factor_pending_code
        .as_deref()
        .is_some_and(|code| code == body.code.trim());
    if !fresh || !matches {
        session.data_mut().two_factor_failures += 1;
        if session.data().two_factor_failures >= TWO_FACTOR_MAX_FAILURES {
            sqlx::query("UPDATE profiles SET two_factor_pending_code = NULL WHERE user_id = ?")
                .bind(user_id)
                .execute(pool.get_ref())
                .await?;
            session.destroy(pool.get_ref()).await?;
            log::warn!(
                "Too many wrong verification codes for user {}; login discarded",
                user_id
            );
        } else {
            session.save(pool.get_ref()).await?;
        }
        return Err(AppError::InvalidCredentials);
    }

    sqlx::query("UPDATE profiles SET two_factor_pending_code = NULL WHERE user_id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;
    session.data_mut().two_factor_pending = false;
    session.data_mut().two_factor_failures = 0;
    session.save(pool.get_ref()).await?;

    let user = accounts::find_user(pool.get_ref(), user_id).await?;
    log::info!("User {} completed 2FA", user.username);
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

async fn set_two_factor(pool: &SqlitePool, current: &CurrentUser, enabled: bool) -> Result<HttpResponse> {
    sqlx::query(
        "UPDATE profiles SET two_factor_enabled = ?, two_factor_pending_code = NULL WHERE user_id = ?",
    )
    .bind(enabled)
    .bind(current.id())
    .execute(pool)
    .await?;
    log::info!(
        "Two-factor authentication {} for {}",
        if enabled { "enabled" } else { "disabled" },
        current.user.username
    );
    Ok(HttpResponse::Ok().json(json!({ "two_factor_enabled": enabled })))
}

pub async fn enable_two_factor(pool: web::Data<SqlitePool>, current: CurrentUser) -> Result<HttpResponse> {
    set_two_factor(pool.get_ref(), &current, true).await
}

pub async fn disable_two_factor(pool: web::Data<SqlitePool>, current: CurrentUser) -> Result<HttpResponse> {
    set_two_factor(pool.get_ref(), &current, false).await
}

pub async fn logout(pool: web::Data<SqlitePool>, session: Session) -> Result<HttpResponse> {
    session.destroy(pool.get_ref()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_profile(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    let roles = rbac::active_roles(pool.get_ref(), current.id()).await?;
    let permissions = rbac::effective_permissions(pool.get_ref(), &mut current).await?;
    let is_super_admin = rbac::is_super_admin(pool.get_ref(), &current.user).await?;

    Ok(HttpResponse::Ok().json(json!({
        "user": current.user,
        "profile": current.profile,
        "roles": roles,
        "permissions": permissions,
        "is_super_admin": is_super_admin,
        "role_preview_id": current.session.data().role_preview_id,
    })))
}

pub async fn update_profile(
    pool: web::Data<SqlitePool>,
    current: CurrentUser,
    body: web::Json<UpdateProfile>,
) -> Result<HttpResponse> {
    body.validate()?;

    let mut tx = pool.begin().await?;
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            email = COALESCE(?, email)
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&body.first_name)
    .bind(&body.last_name)
    .bind(&body.email)
    .bind(current.id())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE profiles SET
            phone = COALESCE(?, phone),
            address = COALESCE(?, address),
            city = COALESCE(?, city),
            country = COALESCE(?, country)
        WHERE user_id = ?
        "#,
    )
    .bind(&body.phone)
    .bind(&body.address)
    .bind(&body.city)
    .bind(&body.country)
    .bind(current.id())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    let profile = accounts::profile_for(pool.get_ref(), user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user, "profile": profile })))
}

async fn save_preferences(pool: &SqlitePool, user_id: i64, preferences: &Preferences) -> Result<()> {
    sqlx::query("UPDATE profiles SET preferences = ? WHERE user_id = ?")
        .bind(Json(preferences))
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_preferences(
    pool: web::Data<SqlitePool>,
    current: CurrentUser,
    body: web::Json<Preferences>,
) -> Result<HttpResponse> {
    let preferences = body.into_inner();
    save_preferences(pool.get_ref(), current.id(), &preferences).await?;
    Ok(HttpResponse::Ok().json(preferences))
}

pub async fn toggle_notifications(pool: web::Data<SqlitePool>, current: CurrentUser) -> Result<HttpResponse> {
    let mut preferences = current.profile.preferences.0.clone();
    preferences.email_notifications = !preferences.email_notifications;
    save_preferences(pool.get_ref(), current.id(), &preferences).await?;
    Ok(HttpResponse::Ok().json(json!({
        "email_notifications": preferences.email_notifications,
    })))
}

pub async fn change_password(
    pool: web::Data<SqlitePool>,
    current: CurrentUser,
    body: web::Json<ChangePassword>,
) -> Result<HttpResponse> {
    body.validate()?;
    if !security::verify_password(&body.current_password, &current.user.password_hash) {
        return Err(AppError::Validation("Current password is incorrect".to_string()));
    }
    accounts::set_password(pool.get_ref(), current.id(), &body.new_password).await?;
    log::info!("User {} changed their password", current.user.username);
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}

pub async fn request_password_reset(
    pool: web::Data<SqlitePool>,
    body: web::Json<PasswordResetRequest>,
) -> Result<HttpResponse> {
    body.validate()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = ? COLLATE NOCASE AND is_active = 1 ORDER BY id LIMIT 1",
    )
    .bind(body.email.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    // Same answer either way so the endpoint does not reveal which emails exist.
    if let Some(user) = user {
        let token = security::random_token();
        let mut tx = pool.begin().await?;
        sqlx::query("INSERT INTO password_resets (token, user_id, created_at, used) VALUES (?, ?, ?, 0)")
            .bind(&token)
            .bind(user.id)
            .bind(Utc::now().naive_utc())
            .execute(&mut *tx)
            .await?;
        mail::queue(
            &mut *tx,
            &user.email,
            "Reset your password",
            &format!(
                "Use this token to choose a new password within {} hours: {}",
                PASSWORD_RESET_VALID_HOURS, token
            ),
        )
        .await?;
        tx.commit().await?;
    }

    Ok(HttpResponse::Accepted().json(json!({
        "message": "If the address is registered, a reset link has been sent",
    })))
}

pub async fn confirm_password_reset(
    pool: web::Data<SqlitePool>,
    body: web::Json<PasswordResetConfirm>,
) -> Result<HttpResponse> {
    body.validate()?;

    let cutoff = Utc::now().naive_utc() - Duration::hours(PASSWORD_RESET_VALID_HOURS);
    let mut tx = pool.begin().await?;
    let user_id: i64 = sqlx::query_scalar(
        r#"
        UPDATE password_resets SET used = 1
        WHERE token = ? AND used = 0 AND created_at >= ?
        RETURNING user_id
        "#,
    )
    .bind(body.token.trim())
    .bind(cutoff)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Validation("The reset token is invalid or has expired".to_string()))?;

    accounts::set_password(&mut *tx, user_id, &body.new_password).await?;
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!("Password reset for user {}", user_id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}

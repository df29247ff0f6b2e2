//! Server-side sessions addressed by a bearer token.
//!
//! The session row carries a JSON document with per-visitor workflow state
//! (booking draft, chatbot conversation, role preview), so every multi-step
//! flow survives between requests without trusting the client with it.

use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::chatbot::ChatState;
use crate::error::{AppError, Result};
use crate::models::user::{Profile, User};
use crate::security;
use crate::wizard::BookingDraft;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatbot: Option<ChatState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_preview_id: Option<i64>,
    #[serde(default)]
    pub two_factor_pending: bool,
    #[serde(default)]
    pub two_factor_failures: u32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: Option<i64>,
    pub data: Json<SessionData>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub async fn create(
        pool: &SqlitePool,
        user_id: Option<i64>,
        data: SessionData,
        ttl_hours: i64,
    ) -> Result<Session> {
        let now = Utc::now().naive_utc();
        let session = Session {
            token: security::random_token(),
            user_id,
            data: Json(data),
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, data, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(&session.data)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(pool)
        .await?;

        Ok(session)
    }

    /// Loads a live session; expired ones are deleted and reported as absent.
    pub async fn load(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?;

        match session {
            Some(s) if s.expires_at <= Utc::now().naive_utc() => {
                s.destroy(pool).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn save<'e, E: SqliteExecutor<'e>>(&self, executor: E) -> Result<()> {
        sqlx::query("UPDATE sessions SET user_id = ?, data = ? WHERE token = ?")
            .bind(self.user_id)
            .bind(&self.data)
            .bind(&self.token)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn destroy<'e, E: SqliteExecutor<'e>>(&self, executor: E) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(&self.token)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub fn data(&self) -> &SessionData {
        &self.data.0
    }

    pub fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data.0
    }

    /// Bound to a user who has finished any second factor.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some() && !self.data.0.two_factor_pending
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn pool_from(req: &HttpRequest) -> Result<web::Data<SqlitePool>> {
    req.app_data::<web::Data<SqlitePool>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("database pool is not configured".to_string()))
}

impl FromRequest for Session {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let pool = pool_from(req);
        let token = bearer_token(req);

        Box::pin(async move {
            let pool = pool?;
            let token = token.ok_or(AppError::Unauthorized)?;
            Session::load(&pool, &token).await?.ok_or(AppError::Unauthorized)
        })
    }
}

/// An authenticated, active user together with their session and profile.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session: Session,
    pub user: User,
    pub profile: Profile,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn ensure_can_reserve(&self) -> Result<()> {
        if self.profile.is_blocked {
            return Err(AppError::Forbidden(self.profile.block_message()));
        }
        if !self.profile.can_make_reservations(&self.user) {
            return Err(AppError::Forbidden(
                "You cannot make reservations right now. Contact the administrator.".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self>>>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let pool = pool_from(req);
        let session = Session::from_request(req, payload);

        Box::pin(async move {
            let pool = pool?;
            let session = session.await?;
            if !session.is_authenticated() {
                return Err(AppError::Unauthorized);
            }
            let user_id = session.user_id.ok_or(AppError::Unauthorized)?;

            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(pool.get_ref())
                .await?
                .filter(|u| u.is_active)
                .ok_or(AppError::Unauthorized)?;

            let profile = crate::accounts::profile_for(pool.get_ref(), user.id).await?;

            Ok(CurrentUser {
                session,
                user,
                profile,
            })
        })
    }
}

use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::error::Result;
use crate::session::{Session, SessionData};

/// Anonymous session for visitors who browse or chat before signing in.
pub async fn create_session(
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse> {
    let session = Session::create(
        pool.get_ref(),
        None,
        SessionData::default(),
        config.session_ttl_hours,
    )
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "token": session.token,
        "expires_at": session.expires_at,
    })))
}

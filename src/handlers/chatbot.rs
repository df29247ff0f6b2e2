use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::chatbot::{self, ChatContext, IntentExtractor};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::session::{Session, SessionData};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub user_id: Option<i64>,
}

/// Works for anonymous visitors too: without a session one is opened and its token returned.
pub async fn chat(
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
    extractor: web::Data<IntentExtractor>,
    session: Option<Session>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("Mensaje vacío".to_string()));
    }

    let (mut session, is_new) = match session {
        Some(session) => (session, false),
        None => {
            let session = Session::create(
                pool.get_ref(),
                None,
                SessionData::default(),
                config.session_ttl_hours,
            )
            .await?;
            (session, true)
        }
    };

    let service_names: Vec<String> = sqlx::query_scalar("SELECT name FROM services ORDER BY name")
        .fetch_all(pool.get_ref())
        .await?;
    let user_id = if session.is_authenticated() {
        session.user_id
    } else {
        if let Some(named) = body.user_id {
            log::warn!("Unauthenticated chatbot request acts for user {}", named);
        }
        body.user_id
    };
    let ctx = ChatContext {
        user_id,
        service_names,
    };

    let mut state = session.data().chatbot.clone().unwrap_or_default();
    let mut reply = chatbot::respond(pool.get_ref(), extractor.get_ref(), &mut state, &body.message, &ctx).await?;

    session.data_mut().chatbot = if state.is_fresh() { None } else { Some(state) };
    session.save(pool.get_ref()).await?;

    if is_new {
        reply.session_token = Some(session.token);
    }
    Ok(HttpResponse::Ok().json(reply))
}

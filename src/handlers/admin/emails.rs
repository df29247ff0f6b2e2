use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::error::Result;
use crate::mail::{self, BulkEmail, OutboxEmail};
use crate::rbac::require_staff_permission;
use crate::session::CurrentUser;

/// Queues one message per selected user; users without an address are skipped.
pub async fn send_bulk_email(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<BulkEmail>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "usuarios", "editar").await?;
    body.validate()?;

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, email FROM users WHERE id IN (");
    let mut ids = query.separated(", ");
    for id in &body.user_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(")");
    let recipients: Vec<(i64, String)> = query.build_query_as().fetch_all(pool.get_ref()).await?;

    let mut tx = pool.begin().await?;
    let mut sent = Vec::new();
    for (id, email) in &recipients {
        if email.trim().is_empty() {
            continue;
        }
        mail::queue(&mut *tx, email, &body.subject, &body.body).await?;
        sent.push(*id);
    }
    tx.commit().await?;

    let skipped: Vec<i64> = body
        .user_ids
        .iter()
        .copied()
        .filter(|id| !sent.contains(id))
        .collect();
    log::info!(
        "{} queued '{}' for {} user(s)",
        current.user.username,
        body.subject,
        sent.len()
    );
    Ok(HttpResponse::Accepted().json(json!({
        "sent": sent.len(),
        "sent_ids": sent,
        "skipped_ids": skipped,
    })))
}

pub async fn list_outbox(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "usuarios", "ver").await?;
    let emails = sqlx::query_as::<_, OutboxEmail>("SELECT * FROM email_outbox ORDER BY id DESC")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(emails))
}

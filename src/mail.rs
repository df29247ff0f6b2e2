//! Outgoing mail. Messages are persisted to `email_outbox`; a relay process
//! or an operator picks them up from there.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite};
use validator::Validate;

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct OutboxEmail {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkEmail {
    #[validate(length(min = 1))]
    pub user_ids: Vec<i64>,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub body: String,
}

pub async fn queue<'e, E>(executor: E, recipient: &str, subject: &str, body: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO email_outbox (recipient, subject, body, created_at) VALUES (?, ?, ?, ?)")
        .bind(recipient)
        .bind(subject)
        .bind(body)
        .bind(Utc::now().naive_utc())
        .execute(executor)
        .await?;

    log::info!("Queued email '{}' for {}", subject, recipient);
    Ok(())
}

pub async fn latest_for<'e, E>(executor: E, recipient: &str) -> Result<Option<OutboxEmail>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let email = sqlx::query_as::<_, OutboxEmail>(
        "SELECT * FROM email_outbox WHERE recipient = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(recipient)
    .fetch_optional(executor)
    .await?;
    Ok(email)
}

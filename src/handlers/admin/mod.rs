//! Staff backend. Every handler checks a module/action permission first.

pub mod catalog;
pub mod dashboard;
pub mod emails;
pub mod front_desk;
pub mod roles;
pub mod users;

use crate::error::AppError;

/// Maps a unique-constraint failure to 409, anything else to a database error.
pub(crate) fn conflict_on_duplicate(what: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("{} already exists", what))
        }
        _ => AppError::Database(err),
    }
}

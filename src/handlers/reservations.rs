use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::reservation::{ConfirmReservation, Reservation};
use crate::reservations;
use crate::session::CurrentUser;

pub async fn list_mine(pool: web::Data<SqlitePool>, current: CurrentUser) -> Result<HttpResponse> {
    let list = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(current.id())
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(list))
}

pub async fn get_mine(
    pool: web::Data<SqlitePool>,
    current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let mut conn = pool.acquire().await?;
    let reservation = reservations::find(&mut conn, id).await?;
    if reservation.user_id != current.id() {
        return Err(AppError::not_found("Reservation"));
    }
    let service_ids = reservations::service_ids(&mut conn, id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "reservation": reservation,
        "nights": reservation.nights(),
        "service_ids": service_ids,
    })))
}

/// The token from the confirmation email is the only credential needed here.
pub async fn confirm(
    pool: web::Data<SqlitePool>,
    body: web::Json<ConfirmReservation>,
) -> Result<HttpResponse> {
    let reservation = reservations::confirm_by_token(pool.get_ref(), &body.token).await?;
    Ok(HttpResponse::Ok().json(json!({
        "reservation": reservation,
        "message": "Reservation confirmed. Your check-in code has been emailed.",
    })))
}

pub async fn cancel(
    pool: web::Data<SqlitePool>,
    current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let reservation = reservations::cancel(pool.get_ref(), path.into_inner(), Some(current.id())).await?;
    Ok(HttpResponse::Ok().json(reservation))
}

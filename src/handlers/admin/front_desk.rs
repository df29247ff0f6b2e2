//! Reservation handling at the front desk: bulk actions, check-in, check-out.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::guest::{ActiveGuestView, CheckInRequest, Guest, GuestSearch};
use crate::models::reservation::{
    BulkAction, BulkReservationAction, Reservation, ReservationFilter, ReservationStatus,
};
use crate::rbac::require_staff_permission;
use crate::reservations;
use crate::session::CurrentUser;

pub async fn list_reservations(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    params: web::Query<ReservationFilter>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "reservas", "ver").await?;

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM reservations");
    if let Some(status) = params.status {
        query.push(" WHERE status = ").push_bind(status);
    }
    query.push(" ORDER BY created_at DESC, id DESC");

    let list = query
        .build_query_as::<Reservation>()
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(list))
}

/// Applies the action to every eligible reservation; the rest are skipped.
pub async fn bulk_action(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<BulkReservationAction>,
) -> Result<HttpResponse> {
    let permission = match body.action {
        BulkAction::Confirm => "confirmar",
        BulkAction::Cancel => "cancelar",
    };
    require_staff_permission(pool.get_ref(), &mut current, "reservas", permission).await?;
    body.validate()?;

    let mut processed = Vec::new();
    let mut skipped = Vec::new();
    for &id in &body.ids {
        // 1. Load it; unknown ids are skipped
        let mut tx = pool.begin().await?;
        let reservation = match reservations::find(&mut tx, id).await {
            Ok(r) => r,
            Err(AppError::NotFound(_)) => {
                skipped.push(id);
                continue;
            }
            Err(e) => return Err(e),
        };

        // 2. Only pending (confirm) or pending/confirmed (cancel) ones qualify
        let eligible = match body.action {
            BulkAction::Confirm => reservation.status == ReservationStatus::Pending,
            BulkAction::Cancel => matches!(
                reservation.status,
                ReservationStatus::Pending | ReservationStatus::Confirmed
            ),
        };
        if !eligible {
            skipped.push(id);
            continue;
        }

        // 3. Apply and commit each one on its own
        match body.action {
            BulkAction::Confirm => reservations::confirm(&mut tx, &reservation).await?,
            BulkAction::Cancel => {
                reservations::transition(&mut tx, &reservation, ReservationStatus::Cancelled).await?
            }
        };
        tx.commit().await?;
        processed.push(id);
    }

    log::info!(
        "{} applied bulk {} to {} reservation(s), skipped {}",
        current.user.username,
        permission,
        processed.len(),
        skipped.len()
    );
    Ok(HttpResponse::Ok().json(json!({
        "processed": processed.len(),
        "processed_ids": processed,
        "skipped_ids": skipped,
    })))
}

pub async fn check_in(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<CheckInRequest>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "reservas", "editar").await?;
    body.validate()?;

    let reservation = reservations::check_in(
        pool.get_ref(),
        path.into_inner(),
        &body.code,
        &body.guests,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(reservation))
}

pub async fn check_out(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "reservas", "editar").await?;
    let reservation = reservations::check_out(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reservation))
}

pub async fn delete_reservation(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "reservas", "eliminar").await?;
    reservations::delete(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn list_guests(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    params: web::Query<GuestSearch>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "huespedes", "ver").await?;

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM guests");
    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        query
            .push(" WHERE first_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR document LIKE ")
            .push_bind(pattern);
    }
    query.push(" ORDER BY last_name, first_name");

    let guests = query.build_query_as::<Guest>().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(guests))
}

pub async fn list_active_guests(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "huespedes", "ver").await?;

    let guests = sqlx::query_as::<_, ActiveGuestView>(
        r#"
        SELECT ag.id, ag.reservation_id, g.first_name, g.last_name, g.document,
               r.number AS room_number, ag.checked_in_at, res.check_out
        FROM active_guests ag
        JOIN guests g ON g.id = ag.guest_id
        JOIN reservations res ON res.id = ag.reservation_id
        LEFT JOIN rooms r ON r.id = ag.room_id
        WHERE ag.active = 1
        ORDER BY res.check_out, g.last_name
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(guests))
}

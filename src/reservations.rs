//! Reservation lifecycle and room-type stock accounting.
//!
//! Stock is taken when a reservation is created and given back exactly once,
//! when the reservation leaves the stock-holding states (cancelled, completed)
//! or is deleted while still holding it. All stock updates are conditional
//! single statements so `0 <= stock_available <= stock_total` holds under
//! concurrent requests.

use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::{AppError, Result};
use crate::mail;
use crate::models::catalog::{Plan, Promotion, Service};
use crate::models::guest::GuestInput;
use crate::models::reservation::{NewReservation, Reservation, ReservationStatus};
use crate::models::room::RoomOffer;
use crate::models::room_type::RoomType;
use crate::pricing::{self, PromotionTerms, Quote, QuoteInput};
use crate::security;

pub const CHECKIN_CODE_LEN: usize = 6;

pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Reservation> {
    sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Reservation"))
}

pub async fn reserve_stock(conn: &mut SqliteConnection, room_type_id: i64, quantity: i64) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE room_types SET stock_available = stock_available - ?
        WHERE id = ? AND active = 1 AND stock_available >= ?
        "#,
    )
    .bind(quantity)
    .bind(room_type_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "Not enough rooms available: {} requested",
            quantity
        )));
    }
    Ok(())
}

pub async fn release_stock(conn: &mut SqliteConnection, room_type_id: i64, quantity: i64) -> Result<()> {
    sqlx::query(
        "UPDATE room_types SET stock_available = MIN(stock_total, stock_available + ?) WHERE id = ?",
    )
    .bind(quantity)
    .bind(room_type_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn room_type(conn: &mut SqliteConnection, id: i64) -> Result<RoomType> {
    sqlx::query_as::<_, RoomType>("SELECT * FROM room_types WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Room type"))
}

pub async fn active_plan(conn: &mut SqliteConnection, id: i64) -> Result<Plan> {
    sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ? AND active = 1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Plan"))
}

pub async fn valid_promotion_by_code(
    conn: &mut SqliteConnection,
    code: &str,
    today: NaiveDate,
) -> Result<Promotion> {
    sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE code = ? COLLATE NOCASE")
        .bind(code.trim())
        .fetch_optional(conn)
        .await?
        .filter(|p| p.is_valid_on(today))
        .ok_or_else(|| AppError::Validation(format!("Promotion code '{}' is not valid", code)))
}

async fn valid_promotion(conn: &mut SqliteConnection, id: i64, today: NaiveDate) -> Result<Promotion> {
    sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .filter(|p| p.is_valid_on(today))
        .ok_or_else(|| AppError::Validation("The promotion is no longer valid".to_string()))
}

/// Loads the requested services, failing on unknown or unavailable ones.
pub async fn available_services(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<Service>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM services WHERE available = 1 AND id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let services = query.build_query_as::<Service>().fetch_all(conn).await?;
    if services.len() != ids.len() {
        return Err(AppError::Validation(
            "One or more selected services are unavailable".to_string(),
        ));
    }
    Ok(services)
}

/// Prices a reservation against the current catalog.
pub async fn quote_for(conn: &mut SqliteConnection, new: &NewReservation, today: NaiveDate) -> Result<Quote> {
    if new.plan_id.is_some() && new.promotion_id.is_some() {
        return Err(AppError::Validation(
            "A plan and a promotion cannot be combined".to_string(),
        ));
    }
    let room_type = room_type(&mut *conn, new.room_type_id).await?;

    let plan_price = match new.plan_id {
        Some(id) => Some(active_plan(&mut *conn, id).await?.price),
        None => None,
    };
    let promotion = match new.promotion_id {
        Some(id) => {
            let p = valid_promotion(&mut *conn, id, today).await?;
            Some(PromotionTerms {
                kind: p.kind,
                value: p.value,
            })
        }
        None => None,
    };
    let service_prices: Vec<f64> = available_services(&mut *conn, &new.service_ids)
        .await?
        .iter()
        .map(|s| s.price)
        .collect();

    Ok(pricing::quote(&QuoteInput {
        nightly_price: room_type.price,
        nights: (new.check_out - new.check_in).num_days(),
        quantity: new.quantity,
        plan_price,
        service_prices: &service_prices,
        promotion,
    }))
}

/// Inserts a reservation, taking its stock. Run inside a transaction.
pub async fn create(conn: &mut SqliteConnection, new: &NewReservation) -> Result<Reservation> {
    if new.check_out <= new.check_in {
        return Err(AppError::Validation("Check-out must be after check-in".to_string()));
    }
    if !new.status.holds_stock() {
        return Err(AppError::Validation(format!(
            "A reservation cannot start as {}",
            new.status
        )));
    }

    let today = Utc::now().date_naive();
    let room_type = room_type(&mut *conn, new.room_type_id).await?;
    if !room_type.fits(new.guests, new.quantity) {
        return Err(AppError::Validation(format!(
            "{} x {} cannot sleep {} guests",
            new.quantity, room_type.name, new.guests
        )));
    }

    let quote = quote_for(&mut *conn, new, today).await?;
    reserve_stock(&mut *conn, new.room_type_id, new.quantity).await?;

    let checkin_code = (new.status == ReservationStatus::Confirmed)
        .then(|| security::checkin_code(CHECKIN_CODE_LEN));
    let now = Utc::now().naive_utc();

    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        INSERT INTO reservations (
            user_id, room_type_id, quantity, assigned_room_id, guests, check_in, check_out,
            status, payment_method, plan_id, promotion_id, amount, token, checkin_code,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new.user_id)
    .bind(new.room_type_id)
    .bind(new.quantity)
    .bind(new.assigned_room_id)
    .bind(new.guests)
    .bind(new.check_in)
    .bind(new.check_out)
    .bind(new.status)
    .bind(new.payment_method)
    .bind(new.plan_id)
    .bind(new.promotion_id)
    .bind(quote.total)
    .bind(security::random_token())
    .bind(checkin_code)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    for service_id in &new.service_ids {
        sqlx::query("INSERT INTO reservation_services (reservation_id, service_id) VALUES (?, ?)")
            .bind(reservation.id)
            .bind(service_id)
            .execute(&mut *conn)
            .await?;
    }

    log::info!(
        "Reservation {} created for user {}: {} x room type {} ({} - {}), {} total",
        reservation.id,
        reservation.user_id,
        reservation.quantity,
        reservation.room_type_id,
        reservation.check_in,
        reservation.check_out,
        reservation.amount
    );
    Ok(reservation)
}

pub async fn service_ids(conn: &mut SqliteConnection, reservation_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT service_id FROM reservation_services WHERE reservation_id = ? ORDER BY service_id",
    )
    .bind(reservation_id)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}

/// Moves a reservation along its lifecycle, giving stock back when it ends.
pub async fn transition(
    conn: &mut SqliteConnection,
    reservation: &Reservation,
    next: ReservationStatus,
) -> Result<Reservation> {
    if !reservation.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Reservation {} cannot go from {} to {}",
            reservation.id, reservation.status, next
        )));
    }

    let updated = sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET status = ?, updated_at = ? WHERE id = ? AND status = ? RETURNING *",
    )
    .bind(next)
    .bind(Utc::now().naive_utc())
    .bind(reservation.id)
    .bind(reservation.status)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::Conflict(format!("Reservation {} was modified concurrently", reservation.id))
    })?;

    if reservation.status.holds_stock() && !next.holds_stock() {
        release_stock(&mut *conn, reservation.room_type_id, reservation.quantity).await?;
    }

    log::info!(
        "Reservation {}: {} -> {}",
        reservation.id,
        reservation.status,
        next
    );
    Ok(updated)
}

async fn user_email(conn: &mut SqliteConnection, user_id: i64) -> Result<String> {
    let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(email.unwrap_or_default())
}

pub async fn send_confirmation_request(conn: &mut SqliteConnection, reservation: &Reservation) -> Result<()> {
    let email = user_email(&mut *conn, reservation.user_id).await?;
    if email.is_empty() {
        return Ok(());
    }
    let body = format!(
        "Thank you for your reservation #{} ({} to {}, total {:.2}).\n\
         Confirm it with this token: {}",
        reservation.id, reservation.check_in, reservation.check_out, reservation.amount, reservation.token
    );
    mail::queue(&mut *conn, &email, "Confirm your reservation", &body).await
}

pub async fn send_checkin_code(conn: &mut SqliteConnection, reservation: &Reservation, code: &str) -> Result<()> {
    let email = user_email(&mut *conn, reservation.user_id).await?;
    if email.is_empty() {
        return Ok(());
    }
    let body = format!(
        "Reservation #{} is confirmed ({} to {}).\n\
         Show this code at the front desk to check in: {}",
        reservation.id, reservation.check_in, reservation.check_out, code
    );
    mail::queue(&mut *conn, &email, "Your check-in code", &body).await
}

/// pending -> confirmed, issuing and mailing the check-in code.
pub async fn confirm(conn: &mut SqliteConnection, reservation: &Reservation) -> Result<Reservation> {
    let confirmed = transition(&mut *conn, reservation, ReservationStatus::Confirmed).await?;
    let code = security::checkin_code(CHECKIN_CODE_LEN);

    let confirmed = sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET checkin_code = ? WHERE id = ? RETURNING *",
    )
    .bind(&code)
    .bind(confirmed.id)
    .fetch_one(&mut *conn)
    .await?;

    send_checkin_code(&mut *conn, &confirmed, &code).await?;
    Ok(confirmed)
}

pub async fn confirm_by_token(pool: &SqlitePool, token: &str) -> Result<Reservation> {
    let mut tx = pool.begin().await?;
    let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE token = ?")
        .bind(token.trim())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Reservation"))?;

    let confirmed = confirm(&mut tx, &reservation).await?;
    tx.commit().await?;
    Ok(confirmed)
}

pub async fn cancel(pool: &SqlitePool, id: i64, owner: Option<i64>) -> Result<Reservation> {
    let mut tx = pool.begin().await?;
    let reservation = find(&mut tx, id).await?;
    if owner.is_some_and(|user_id| user_id != reservation.user_id) {
        return Err(AppError::not_found("Reservation"));
    }
    let cancelled = transition(&mut tx, &reservation, ReservationStatus::Cancelled).await?;
    tx.commit().await?;
    Ok(cancelled)
}

/// First room of the type that is free now and not promised to another overlapping stay.
async fn free_room(conn: &mut SqliteConnection, reservation: &Reservation) -> Result<Option<i64>> {
    let id = sqlx::query_scalar(
        r#"
        SELECT id FROM rooms
        WHERE room_type_id = ? AND available = 1 AND under_maintenance = 0
          AND id NOT IN (
            SELECT assigned_room_id FROM reservations
            WHERE assigned_room_id IS NOT NULL AND id != ?
              AND status IN ('confirmed', 'active')
              AND check_in < ? AND check_out > ?
          )
        ORDER BY number LIMIT 1
        "#,
    )
    .bind(reservation.room_type_id)
    .bind(reservation.id)
    .bind(reservation.check_out)
    .bind(reservation.check_in)
    .fetch_optional(conn)
    .await?;
    Ok(id)
}

async fn room_is_occupied(conn: &mut SqliteConnection, room_id: i64, reservation_id: i64) -> Result<bool> {
    let occupied: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM rooms WHERE id = ? AND available = 0)
            OR EXISTS(
                SELECT 1 FROM reservations
                WHERE assigned_room_id = ? AND id != ? AND status = 'active'
            )
        "#,
    )
    .bind(room_id)
    .bind(room_id)
    .bind(reservation_id)
    .fetch_one(conn)
    .await?;
    Ok(occupied)
}

/// confirmed -> active: registers the guests and hands over a room.
pub async fn check_in(
    pool: &SqlitePool,
    id: i64,
    code: &str,
    guests: &[GuestInput],
    today: NaiveDate,
) -> Result<Reservation> {
    // 1. The reservation, its code and the stay window
    let mut tx = pool.begin().await?;
    let reservation = find(&mut tx, id).await?;

    if reservation.status != ReservationStatus::Confirmed {
        return Err(AppError::Conflict(format!(
            "Only confirmed reservations can check in; this one is {}",
            reservation.status
        )));
    }
    let expected = reservation.checkin_code.as_deref().unwrap_or_default();
    if expected.is_empty() || !expected.eq_ignore_ascii_case(code.trim()) {
        return Err(AppError::Forbidden("Invalid check-in code".to_string()));
    }
    if today < reservation.check_in || today >= reservation.check_out {
        return Err(AppError::Validation(format!(
            "Check-in is possible from {} until {}",
            reservation.check_in, reservation.check_out
        )));
    }
    if guests.is_empty() || guests.len() as i64 > reservation.guests {
        return Err(AppError::Validation(format!(
            "Register between 1 and {} guests",
            reservation.guests
        )));
    }

    // 2. Hand over the promised room, or the first one nobody else holds
    let room_id = match reservation.assigned_room_id {
        Some(room_id) => {
            if room_is_occupied(&mut tx, room_id, reservation.id).await? {
                return Err(AppError::Conflict(format!(
                    "Room {} is still occupied",
                    room_id
                )));
            }
            Some(room_id)
        }
        None => free_room(&mut tx, &reservation).await?,
    };
    match room_id {
        Some(room_id) => {
            sqlx::query("UPDATE rooms SET available = 0 WHERE id = ?")
                .bind(room_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE reservations SET assigned_room_id = ? WHERE id = ?")
                .bind(room_id)
                .bind(reservation.id)
                .execute(&mut *tx)
                .await?;
        }
        None => log::warn!(
            "No free room of type {} for reservation {}; checking in without a room",
            reservation.room_type_id,
            reservation.id
        ),
    }

    // 3. Register who is staying
    let now = Utc::now().naive_utc();
    for guest in guests {
        let guest_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO guests (reservation_id, first_name, last_name, document, birth_date, email)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(reservation.id)
        .bind(&guest.first_name)
        .bind(&guest.last_name)
        .bind(&guest.document)
        .bind(guest.birth_date)
        .bind(&guest.email)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO active_guests (guest_id, reservation_id, room_id, checked_in_at, active) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(guest_id)
        .bind(reservation.id)
        .bind(room_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let reservation = find(&mut tx, id).await?;
    let active = transition(&mut tx, &reservation, ReservationStatus::Active).await?;
    tx.commit().await?;
    Ok(active)
}

/// active -> completed: frees the room, closes the stay, returns the stock.
pub async fn check_out(pool: &SqlitePool, id: i64) -> Result<Reservation> {
    let mut tx = pool.begin().await?;
    let reservation = find(&mut tx, id).await?;
    let completed = transition(&mut tx, &reservation, ReservationStatus::Completed).await?;

    if let Some(room_id) = reservation.assigned_room_id {
        sqlx::query("UPDATE rooms SET available = 1 WHERE id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query(
        "UPDATE active_guests SET active = 0, checked_out_at = ? WHERE reservation_id = ? AND active = 1",
    )
    .bind(Utc::now().naive_utc())
    .bind(reservation.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(completed)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let reservation = find(&mut tx, id).await?;

    if reservation.status.holds_stock() {
        release_stock(&mut tx, reservation.room_type_id, reservation.quantity).await?;
    }
    if reservation.status == ReservationStatus::Active {
        if let Some(room_id) = reservation.assigned_room_id {
            sqlx::query("UPDATE rooms SET available = 1 WHERE id = ?")
                .bind(room_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    sqlx::query("DELETE FROM reservations WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    log::info!("Reservation {} deleted ({})", id, reservation.status);
    Ok(())
}

/// Free rooms of the requested kinds for a date range, cheapest first.
///
/// `kinds` are matched as case-insensitive substrings of the room type name
/// ("doble" matches "Habitación Doble").
pub async fn find_available_rooms(
    pool: &SqlitePool,
    kinds: &[String],
    min_capacity: i64,
    check_in: NaiveDate,
    check_out: NaiveDate,
    limit: i64,
) -> Result<Vec<RoomOffer>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT r.id, r.number, r.room_type_id, t.name AS room_type_name, t.price, t.capacity
        FROM rooms r JOIN room_types t ON t.id = r.room_type_id
        WHERE r.available = 1 AND r.under_maintenance = 0
          AND t.active = 1 AND t.stock_available >= 1 AND t.capacity >= "#,
    );
    query.push_bind(min_capacity);

    if !kinds.is_empty() {
        query.push(" AND (");
        for (i, kind) in kinds.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            query.push("LOWER(t.name) LIKE ");
            query.push_bind(format!("%{}%", kind.to_lowercase()));
        }
        query.push(")");
    }

    query.push(
        r#"
          AND r.id NOT IN (
            SELECT assigned_room_id FROM reservations
            WHERE assigned_room_id IS NOT NULL
              AND status IN ('confirmed', 'active')
              AND check_in < "#,
    );
    query.push_bind(check_out);
    query.push(" AND check_out > ");
    query.push_bind(check_in);
    query.push(") ORDER BY t.price, r.number LIMIT ");
    query.push_bind(limit);

    let rooms = query.build_query_as::<RoomOffer>().fetch_all(pool).await?;
    Ok(rooms)
}

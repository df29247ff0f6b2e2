//! The booking wizard. The draft lives in the caller's session between steps.

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::reservation::{NewReservation, PaymentMethod, ReservationStatus};
use crate::models::room_type::RoomType;
use crate::reservations;
use crate::session::CurrentUser;
use crate::wizard::{BookingDraft, CompleteDraft};

#[derive(Debug, Deserialize, Validate)]
pub struct GuestsStep {
    #[validate(range(min = 1, max = 20))]
    pub guests: i64,
}

#[derive(Debug, Deserialize)]
pub struct DatesStep {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoomsStep {
    pub room_type_id: i64,
    #[validate(range(min = 1, max = 20))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ExtrasStep {
    #[serde(default)]
    pub service_ids: Vec<i64>,
    pub plan_id: Option<i64>,
    pub promotion_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutStep {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
struct RoomOption {
    #[serde(flatten)]
    room_type: RoomType,
    rooms_needed: i64,
    in_stock: bool,
}

fn draft(current: &CurrentUser) -> BookingDraft {
    current.session.data().booking.clone().unwrap_or_default()
}

async fn store(pool: &SqlitePool, current: &mut CurrentUser, draft: BookingDraft) -> Result<HttpResponse> {
    let next_step = draft.next_step();
    current.session.data_mut().booking = Some(draft.clone());
    current.session.save(pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "draft": draft, "next_step": next_step })))
}

fn new_reservation(user_id: i64, complete: &CompleteDraft, payment_method: Option<PaymentMethod>) -> NewReservation {
    NewReservation {
        user_id,
        room_type_id: complete.room_type_id,
        quantity: complete.quantity,
        assigned_room_id: None,
        guests: complete.guests,
        check_in: complete.check_in,
        check_out: complete.check_out,
        status: ReservationStatus::Pending,
        payment_method,
        plan_id: complete.plan_id,
        promotion_id: complete.promotion_id,
        service_ids: complete.service_ids.clone(),
    }
}

pub async fn get_draft(pool: web::Data<SqlitePool>, current: CurrentUser) -> Result<HttpResponse> {
    current.ensure_can_reserve()?;
    let draft = draft(&current);

    let quote = match draft.complete(Utc::now().date_naive()) {
        Ok(complete) => {
            let mut conn = pool.acquire().await?;
            let new = new_reservation(current.id(), &complete, None);
            Some(reservations::quote_for(&mut conn, &new, Utc::now().date_naive()).await?)
        }
        Err(_) => None,
    };

    Ok(HttpResponse::Ok().json(json!({
        "next_step": draft.next_step(),
        "nights": draft.nights(),
        "draft": draft,
        "quote": quote,
    })))
}

pub async fn set_guests(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<GuestsStep>,
) -> Result<HttpResponse> {
    current.ensure_can_reserve()?;
    body.validate()?;

    let mut draft = draft(&current);
    draft.set_guests(body.guests)?;
    store(pool.get_ref(), &mut current, draft).await
}

pub async fn set_dates(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<DatesStep>,
) -> Result<HttpResponse> {
    current.ensure_can_reserve()?;

    let mut draft = draft(&current);
    draft.set_dates(body.check_in, body.check_out, Utc::now().date_naive())?;
    store(pool.get_ref(), &mut current, draft).await
}

pub async fn room_options(pool: web::Data<SqlitePool>, current: CurrentUser) -> Result<HttpResponse> {
    current.ensure_can_reserve()?;
    let draft = draft(&current);
    let guests = draft
        .guests
        .ok_or_else(|| AppError::Validation("Complete the guests step first".to_string()))?;

    let room_types = sqlx::query_as::<_, RoomType>(
        "SELECT * FROM room_types WHERE active = 1 AND stock_available > 0 ORDER BY price, name",
    )
    .fetch_all(pool.get_ref())
    .await?;

    let options: Vec<RoomOption> = room_types
        .into_iter()
        .map(|room_type| {
            let rooms_needed = room_type.rooms_needed(guests);
            RoomOption {
                in_stock: room_type.stock_available >= rooms_needed,
                rooms_needed,
                room_type,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "guests": guests, "options": options })))
}

pub async fn set_rooms(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<RoomsStep>,
) -> Result<HttpResponse> {
    current.ensure_can_reserve()?;
    body.validate()?;

    let room_type = {
        let mut conn = pool.acquire().await?;
        reservations::room_type(&mut conn, body.room_type_id).await?
    };
    let mut draft = draft(&current);
    draft.set_rooms(&room_type, body.quantity)?;
    store(pool.get_ref(), &mut current, draft).await
}

pub async fn set_extras(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<ExtrasStep>,
) -> Result<HttpResponse> {
    current.ensure_can_reserve()?;
    let body = body.into_inner();
    let promotion_code = body.promotion_code.filter(|code| !code.trim().is_empty());
    if body.plan_id.is_some() && promotion_code.is_some() {
        return Err(AppError::Validation(
            "A plan and a promotion cannot be combined".to_string(),
        ));
    }

    let (plan_id, promotion_id) = {
        let mut conn = pool.acquire().await?;
        reservations::available_services(&mut conn, &dedup(&body.service_ids)).await?;
        let plan_id = match body.plan_id {
            Some(id) => Some(reservations::active_plan(&mut conn, id).await?.id),
            None => None,
        };
        let promotion_id = match promotion_code {
            Some(code) => Some(
                reservations::valid_promotion_by_code(&mut conn, &code, Utc::now().date_naive())
                    .await?
                    .id,
            ),
            None => None,
        };
        (plan_id, promotion_id)
    };

    let mut draft = draft(&current);
    draft.set_extras(body.service_ids, plan_id, promotion_id)?;
    store(pool.get_ref(), &mut current, draft).await
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub async fn checkout(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<CheckoutStep>,
) -> Result<HttpResponse> {
    // 1. Every step done and the dates still ahead of us
    current.ensure_can_reserve()?;
    let today = Utc::now().date_naive();
    let complete = draft(&current).complete(today)?;
    let new = new_reservation(current.id(), &complete, Some(body.payment_method));

    // 2. Price, take the stock and queue the confirmation in one transaction
    let mut tx = pool.begin().await?;
    let quote = reservations::quote_for(&mut tx, &new, today).await?;
    let reservation = reservations::create(&mut tx, &new).await?;
    reservations::send_confirmation_request(&mut tx, &reservation).await?;
    tx.commit().await?;

    // 3. The draft is spent
    current.session.data_mut().booking = None;
    current.session.save(pool.get_ref()).await?;

    Ok(HttpResponse::Created().json(json!({
        "reservation": reservation,
        "quote": quote,
        "message": "Reservation created. Check your email to confirm it.",
    })))
}

pub async fn discard(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    current.session.data_mut().booking = None;
    current.session.save(pool.get_ref()).await?;
    Ok(HttpResponse::NoContent().finish())
}

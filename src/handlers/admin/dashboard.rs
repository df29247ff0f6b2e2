use std::collections::BTreeMap;

use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::reservation::ReservationStatus;
use crate::models::room_type::RoomType;
use crate::rbac::require_staff_permission;
use crate::session::CurrentUser;

#[derive(Debug, Serialize)]
struct RoomTypeOccupancy {
    id: i64,
    name: String,
    stock_total: i64,
    stock_available: i64,
    occupancy_percentage: i64,
}

#[derive(Debug, Serialize)]
struct Dashboard {
    reservations: BTreeMap<&'static str, i64>,
    revenue: f64,
    active_guests: i64,
    users: i64,
    blocked_users: i64,
    room_types: Vec<RoomTypeOccupancy>,
}

pub async fn get_dashboard(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "dashboard", "ver").await?;
    let pool = pool.get_ref();

    let mut reservations: BTreeMap<&'static str, i64> = ReservationStatus::ALL
        .iter()
        .map(|status| (status.as_str(), 0))
        .collect();
    let counts: Vec<(ReservationStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM reservations GROUP BY status")
            .fetch_all(pool)
            .await?;
    reservations.extend(counts.into_iter().map(|(status, n)| (status.as_str(), n)));

    let revenue: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0.0) FROM reservations WHERE status IN ('confirmed', 'active', 'completed')",
    )
    .fetch_one(pool)
    .await?;

    let active_guests: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM active_guests WHERE active = 1")
        .fetch_one(pool)
        .await?;
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    let blocked_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE is_blocked = 1")
        .fetch_one(pool)
        .await?;

    let room_types = sqlx::query_as::<_, RoomType>("SELECT * FROM room_types ORDER BY name")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|rt| RoomTypeOccupancy {
            occupancy_percentage: rt.occupancy_percentage(),
            id: rt.id,
            name: rt.name,
            stock_total: rt.stock_total,
            stock_available: rt.stock_available,
        })
        .collect();

    Ok(HttpResponse::Ok().json(Dashboard {
        reservations,
        revenue: (revenue * 100.0).round() / 100.0,
        active_guests,
        users,
        blocked_users,
        room_types,
    }))
}

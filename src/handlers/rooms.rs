use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{AppError, Result};
use crate::models::catalog::{Plan, Promotion, Service};
use crate::models::room_type::{RoomType, RoomTypeDetail, RoomTypeSearch};

pub async fn list_room_types(
    pool: web::Data<SqlitePool>,
    params: web::Query<RoomTypeSearch>,
) -> Result<HttpResponse> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM room_types WHERE active = 1");

    if let Some(guests) = params.guests {
        let quantity = params.quantity.unwrap_or(1).max(1);
        query
            .push(" AND capacity * ")
            .push_bind(quantity)
            .push(" >= ")
            .push_bind(guests)
            .push(" AND stock_available >= ")
            .push_bind(quantity);
    }
    query.push(" ORDER BY price, name");

    let room_types = query
        .build_query_as::<RoomType>()
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(room_types))
}

pub async fn get_room_type(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> Result<HttpResponse> {
    let id = path.into_inner();

    let room_type = sqlx::query_as::<_, RoomType>("SELECT * FROM room_types WHERE id = ? AND active = 1")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Room type"))?;

    let rooms: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE room_type_id = ?")
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(RoomTypeDetail {
        occupancy_percentage: room_type.occupancy_percentage(),
        room_type,
        rooms,
    }))
}

pub async fn list_services(pool: web::Data<SqlitePool>) -> Result<HttpResponse> {
    let services = sqlx::query_as::<_, Service>(
        "SELECT * FROM services WHERE available = 1 ORDER BY category, name",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(services))
}

pub async fn list_plans(pool: web::Data<SqlitePool>) -> Result<HttpResponse> {
    let plans = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE active = 1 ORDER BY price")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(plans))
}

pub async fn list_promotions(pool: web::Data<SqlitePool>) -> Result<HttpResponse> {
    let today = Utc::now().date_naive();
    let promotions = sqlx::query_as::<_, Promotion>(
        "SELECT * FROM promotions WHERE active = 1 AND start_date <= ? AND end_date >= ? ORDER BY end_date",
    )
    .bind(today)
    .bind(today)
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(promotions))
}

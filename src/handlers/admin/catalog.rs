//! Catalog maintenance: room types, rooms, plans, promotions and services.

use actix_web::{web, HttpResponse};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use super::conflict_on_duplicate;
use crate::error::{AppError, Result};
use crate::models::catalog::{Plan, PlanInput, Promotion, PromotionInput, Service, ServiceInput};
use crate::models::room::{CreateRoom, Room, RoomFilter, UpdateRoom};
use crate::models::room_type::{CreateRoomType, RoomType, UpdateRoomType};
use crate::rbac::require_staff_permission;
use crate::session::CurrentUser;

// Room types

pub async fn list_room_types(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "ver").await?;
    let room_types = sqlx::query_as::<_, RoomType>("SELECT * FROM room_types ORDER BY price, name")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(room_types))
}

pub async fn create_room_type(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<CreateRoomType>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "crear").await?;
    body.validate()?;

    let available = body.stock_available.unwrap_or(body.stock_total);
    if available > body.stock_total {
        return Err(AppError::Validation(
            "Available stock cannot exceed total stock".to_string(),
        ));
    }

    let room_type = sqlx::query_as::<_, RoomType>(
        r#"
        INSERT INTO room_types (name, description, price, capacity, stock_total, stock_available, active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.price)
    .bind(body.capacity)
    .bind(body.stock_total)
    .bind(available)
    .bind(body.active)
    .fetch_one(pool.get_ref())
    .await
    .map_err(conflict_on_duplicate("Room type"))?;

    log::info!("Room type {} created by {}", room_type.name, current.user.username);
    Ok(HttpResponse::Created().json(room_type))
}

/// Changing `stock_total` moves `stock_available` by the same amount, so units
/// held by live reservations stay held.
pub async fn update_room_type(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<UpdateRoomType>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "editar").await?;
    body.validate()?;
    let id = path.into_inner();

    let existing = sqlx::query_as::<_, RoomType>("SELECT * FROM room_types WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Room type"))?;
    let stock_total = body.stock_total.unwrap_or(existing.stock_total);
    let delta = stock_total - existing.stock_total;

    let updated = sqlx::query_as::<_, RoomType>(
        r#"
        UPDATE room_types SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            price = COALESCE(?, price),
            capacity = COALESCE(?, capacity),
            active = COALESCE(?, active),
            stock_total = stock_total + ?,
            stock_available = stock_available + ?
        WHERE id = ? AND stock_available + ? >= 0
        RETURNING *
        "#,
    )
    .bind(body.name.as_deref().map(str::trim))
    .bind(&body.description)
    .bind(body.price)
    .bind(body.capacity)
    .bind(body.active)
    .bind(delta)
    .bind(delta)
    .bind(id)
    .bind(delta)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(conflict_on_duplicate("Room type"))?
    .ok_or_else(|| {
        AppError::Conflict(format!(
            "Cannot reduce stock of {} by {}: units are held by reservations",
            existing.name, -delta
        ))
    })?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_room_type(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "eliminar").await?;
    let id = path.into_inner();

    let referenced: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reservations WHERE room_type_id = ?)")
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
    if referenced {
        return Err(AppError::Conflict(
            "Room type has reservations; deactivate it instead".to_string(),
        ));
    }

    let deleted = sqlx::query("DELETE FROM room_types WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Room type"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// Rooms

pub async fn list_rooms(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    params: web::Query<RoomFilter>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "ver").await?;

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM rooms");
    if let Some(room_type_id) = params.room_type_id {
        query.push(" WHERE room_type_id = ").push_bind(room_type_id);
    }
    query.push(" ORDER BY number");

    let rooms = query.build_query_as::<Room>().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(rooms))
}

async fn ensure_room_type(pool: &SqlitePool, id: i64) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM room_types WHERE id = ?)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::not_found("Room type"))
    }
}

pub async fn create_room(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<CreateRoom>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "crear").await?;
    body.validate()?;
    ensure_room_type(pool.get_ref(), body.room_type_id).await?;

    let room = sqlx::query_as::<_, Room>(
        r#"
        INSERT INTO rooms (number, room_type_id, available, under_maintenance, notes)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(body.number.trim())
    .bind(body.room_type_id)
    .bind(body.available)
    .bind(body.under_maintenance)
    .bind(&body.notes)
    .fetch_one(pool.get_ref())
    .await
    .map_err(conflict_on_duplicate("Room number"))?;

    Ok(HttpResponse::Created().json(room))
}

pub async fn update_room(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<UpdateRoom>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "editar").await?;
    body.validate()?;
    if let Some(room_type_id) = body.room_type_id {
        ensure_room_type(pool.get_ref(), room_type_id).await?;
    }

    let room = sqlx::query_as::<_, Room>(
        r#"
        UPDATE rooms SET
            number = COALESCE(?, number),
            room_type_id = COALESCE(?, room_type_id),
            available = COALESCE(?, available),
            under_maintenance = COALESCE(?, under_maintenance),
            notes = COALESCE(?, notes)
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(body.number.as_deref().map(str::trim))
    .bind(body.room_type_id)
    .bind(body.available)
    .bind(body.under_maintenance)
    .bind(&body.notes)
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(conflict_on_duplicate("Room number"))?
    .ok_or_else(|| AppError::not_found("Room"))?;

    Ok(HttpResponse::Ok().json(room))
}

pub async fn delete_room(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "habitaciones", "eliminar").await?;
    let deleted = sqlx::query("DELETE FROM rooms WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Room"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// Plans

pub async fn list_plans(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "planes", "ver").await?;
    let plans = sqlx::query_as::<_, Plan>("SELECT * FROM plans ORDER BY name")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(plans))
}

pub async fn create_plan(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<PlanInput>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "planes", "crear").await?;
    body.validate()?;

    let plan = sqlx::query_as::<_, Plan>(
        r#"
        INSERT INTO plans (name, description, price, includes_breakfast, includes_wifi, includes_parking, active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.price)
    .bind(body.includes_breakfast)
    .bind(body.includes_wifi)
    .bind(body.includes_parking)
    .bind(body.active)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(plan))
}

pub async fn update_plan(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<PlanInput>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "planes", "editar").await?;
    body.validate()?;

    let plan = sqlx::query_as::<_, Plan>(
        r#"
        UPDATE plans SET name = ?, description = ?, price = ?, includes_breakfast = ?,
            includes_wifi = ?, includes_parking = ?, active = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.price)
    .bind(body.includes_breakfast)
    .bind(body.includes_wifi)
    .bind(body.includes_parking)
    .bind(body.active)
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("Plan"))?;

    Ok(HttpResponse::Ok().json(plan))
}

pub async fn delete_plan(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "planes", "eliminar").await?;
    let deleted = sqlx::query("DELETE FROM plans WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Plan"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// Promotions

pub async fn list_promotions(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "promociones", "ver").await?;
    let promotions = sqlx::query_as::<_, Promotion>("SELECT * FROM promotions ORDER BY start_date DESC, name")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(promotions))
}

fn normalized_code(code: &Option<String>) -> Option<String> {
    code.as_deref()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
}

pub async fn create_promotion(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<PromotionInput>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "promociones", "crear").await?;
    body.validate()?;

    let promotion = sqlx::query_as::<_, Promotion>(
        r#"
        INSERT INTO promotions (name, description, kind, value, start_date, end_date, code, active)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.kind)
    .bind(body.value)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(normalized_code(&body.code))
    .bind(body.active)
    .fetch_one(pool.get_ref())
    .await
    .map_err(conflict_on_duplicate("Promotion code"))?;

    log::info!("Promotion {} created by {}", promotion.name, current.user.username);
    Ok(HttpResponse::Created().json(promotion))
}

pub async fn update_promotion(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<PromotionInput>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "promociones", "editar").await?;
    body.validate()?;

    let promotion = sqlx::query_as::<_, Promotion>(
        r#"
        UPDATE promotions SET name = ?, description = ?, kind = ?, value = ?,
            start_date = ?, end_date = ?, code = ?, active = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.kind)
    .bind(body.value)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(normalized_code(&body.code))
    .bind(body.active)
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(conflict_on_duplicate("Promotion code"))?
    .ok_or_else(|| AppError::not_found("Promotion"))?;

    Ok(HttpResponse::Ok().json(promotion))
}

pub async fn delete_promotion(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "promociones", "eliminar").await?;
    let deleted = sqlx::query("DELETE FROM promotions WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Promotion"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// Services

pub async fn list_services(pool: web::Data<SqlitePool>, mut current: CurrentUser) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "servicios", "ver").await?;
    let services = sqlx::query_as::<_, Service>("SELECT * FROM services ORDER BY category, name")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(services))
}

pub async fn create_service(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    body: web::Json<ServiceInput>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "servicios", "crear").await?;
    body.validate()?;

    let service = sqlx::query_as::<_, Service>(
        r#"
        INSERT INTO services (name, category, description, price, available, opens_at, closes_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.category)
    .bind(&body.description)
    .bind(body.price)
    .bind(body.available)
    .bind(body.opens_at)
    .bind(body.closes_at)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(service))
}

pub async fn update_service(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<ServiceInput>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "servicios", "editar").await?;
    body.validate()?;

    let service = sqlx::query_as::<_, Service>(
        r#"
        UPDATE services SET name = ?, category = ?, description = ?, price = ?,
            available = ?, opens_at = ?, closes_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.category)
    .bind(&body.description)
    .bind(body.price)
    .bind(body.available)
    .bind(body.opens_at)
    .bind(body.closes_at)
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("Service"))?;

    Ok(HttpResponse::Ok().json(service))
}

pub async fn toggle_service(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "servicios", "editar").await?;

    let service = sqlx::query_as::<_, Service>(
        "UPDATE services SET available = NOT available WHERE id = ? RETURNING *",
    )
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("Service"))?;

    log::info!(
        "Service {} is now {}",
        service.name,
        if service.available { "available" } else { "unavailable" }
    );
    Ok(HttpResponse::Ok().json(service))
}

pub async fn delete_service(
    pool: web::Data<SqlitePool>,
    mut current: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff_permission(pool.get_ref(), &mut current, "servicios", "eliminar").await?;
    let deleted = sqlx::query("DELETE FROM services WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Service"));
    }
    Ok(HttpResponse::NoContent().finish())
}

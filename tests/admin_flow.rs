#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use common::bearer;
use hotel_reservas::models::reservation::{NewReservation, PaymentMethod, ReservationStatus};
use hotel_reservas::reservations;

async fn pending_reservation(pool: &SqlitePool, user_id: i64, room_type_id: i64) -> i64 {
    let today = Utc::now().date_naive();
    let mut conn = pool.acquire().await.unwrap();
    let reservation = reservations::create(
        &mut *conn,
        &NewReservation {
            user_id,
            room_type_id,
            quantity: 1,
            assigned_room_id: None,
            guests: 2,
            check_in: today + Duration::days(5),
            check_out: today + Duration::days(7),
            status: ReservationStatus::Pending,
            payment_method: Some(PaymentMethod::Cash),
            plan_id: None,
            promotion_id: None,
            service_ids: vec![],
        },
    )
    .await
    .unwrap();
    reservation.id
}

/// A confirmed stay from today for two nights, optionally promised a room; answers id and check-in code.
async fn confirmed_reservation(
    pool: &SqlitePool,
    user_id: i64,
    room_type_id: i64,
    room_id: Option<i64>,
) -> (i64, String) {
    let today = Utc::now().date_naive();
    let mut conn = pool.acquire().await.unwrap();
    let reservation = reservations::create(
        &mut *conn,
        &NewReservation {
            user_id,
            room_type_id,
            quantity: 1,
            assigned_room_id: room_id,
            guests: 2,
            check_in: today,
            check_out: today + Duration::days(2),
            status: ReservationStatus::Confirmed,
            payment_method: None,
            plan_id: None,
            promotion_id: None,
            service_ids: vec![],
        },
    )
    .await
    .unwrap();
    (reservation.id, reservation.checkin_code.unwrap())
}

async fn room_id(pool: &SqlitePool, number: &str) -> i64 {
    sqlx::query_scalar("SELECT id FROM rooms WHERE number = ?")
        .bind(number)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn find_by<'a>(list: &'a Value, key: &str, value: &str) -> &'a Value {
    list.as_array()
        .unwrap()
        .iter()
        .find(|item| item[key] == value)
        .unwrap()
}

macro_rules! role_id {
    ($app:expr, $token:expr, $name:expr) => {{
        let (_, roles) = call!($app, TestRequest::get().uri("/admin/roles").insert_header(bearer($token)));
        find_by(&roles, "name", $name)["id"].as_i64().unwrap()
    }};
}

#[actix_web::test]
async fn backend_requires_staff() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (token, _) = register!(app, "hugo");

    let (status, _) = call!(app, TestRequest::get().uri("/admin/dashboard"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = call!(app, TestRequest::get().uri("/admin/dashboard").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("Staff"));
}

#[actix_web::test]
async fn dashboard_and_bulk_actions() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);
    let doble = common::room_type_id(&pool, "Habitación Doble").await;
    let (_, guest) = register!(app, "irene");

    let first = pending_reservation(&pool, guest, doble).await;
    let second = pending_reservation(&pool, guest, doble).await;
    assert_eq!(common::stock_available(&pool, doble).await, 13);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/admin/reservations/bulk")
            .insert_header(bearer(&admin))
            .set_json(json!({ "action": "confirm", "ids": [first, second, 9999] }))
    );
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["processed"], 2);
    assert_eq!(body["skipped_ids"], json!([9999]));

    let (_, body) = call!(
        app,
        TestRequest::post()
            .uri("/admin/reservations/bulk")
            .insert_header(bearer(&admin))
            .set_json(json!({ "action": "cancel", "ids": [first] }))
    );
    assert_eq!(body["processed"], 1);
    assert_eq!(common::stock_available(&pool, doble).await, 14);

    let (_, body) = call!(
        app,
        TestRequest::post()
            .uri("/admin/reservations/bulk")
            .insert_header(bearer(&admin))
            .set_json(json!({ "action": "confirm", "ids": [first] }))
    );
    assert_eq!(body["processed"], 0);

    let (_, body) = call!(
        app,
        TestRequest::get()
            .uri("/admin/reservations?status=confirmed")
            .insert_header(bearer(&admin))
    );
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], second);

    let (status, body) = call!(app, TestRequest::get().uri("/admin/dashboard").insert_header(bearer(&admin)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservations"]["confirmed"], 1);
    assert_eq!(body["reservations"]["cancelled"], 1);
    assert_eq!(body["reservations"]["pending"], 0);
    assert_eq!(body["revenue"], 240.0);
    assert_eq!(body["users"], 2);
    assert_eq!(body["room_types"].as_array().unwrap().len(), 4);
    let doble_row = find_by(&body["room_types"], "name", "Habitación Doble");
    assert_eq!(doble_row["stock_available"], 14);
    assert_eq!(doble_row["occupancy_percentage"], 7);

    let (status, _) = call!(
        app,
        TestRequest::delete()
            .uri(&format!("/admin/reservations/{}", second))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(common::stock_available(&pool, doble).await, 15);
}

#[actix_web::test]
async fn room_type_stock_follows_total() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/room-types").insert_header(bearer(&admin)).set_json(json!({
            "name": "Loft", "price": 150.0, "capacity": 2, "stock_total": 2, "stock_available": 3,
        }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/admin/room-types").insert_header(bearer(&admin)).set_json(json!({
            "name": "Loft", "price": 150.0, "capacity": 2, "stock_total": 2,
        }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stock_available"], 2);
    let loft = body["id"].as_i64().unwrap();

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/room-types").insert_header(bearer(&admin)).set_json(json!({
            "name": "Loft", "price": 99.0, "capacity": 1, "stock_total": 1,
        }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, guest) = register!(app, "jorge");
    pending_reservation(&pool, guest, loft).await;
    assert_eq!(common::stock_available(&pool, loft).await, 1);

    let uri = format!("/admin/room-types/{}", loft);
    let (status, body) = call!(
        app,
        TestRequest::put().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "stock_total": 5 }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock_total"], 5);
    assert_eq!(body["stock_available"], 4);

    let (status, _) = call!(
        app,
        TestRequest::put().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "stock_total": 0 }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call!(app, TestRequest::delete().uri(&uri).insert_header(bearer(&admin)));
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call!(app, TestRequest::get().uri(&format!("/room-types/{}", loft)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occupancy_percentage"], 20);
}

#[actix_web::test]
async fn services_and_promotions() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/services").insert_header(bearer(&admin)).set_json(json!({
            "name": "Masaje", "category": "astrologia", "price": 40.0,
        }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/admin/services").insert_header(bearer(&admin)).set_json(json!({
            "name": "Masaje", "category": "spa", "price": 40.0,
        }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let service = body["id"].as_i64().unwrap();

    let (_, body) = call!(app, TestRequest::get().uri("/services"));
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/services/{}/toggle", service))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    let (_, body) = call!(app, TestRequest::get().uri("/services"));
    assert_eq!(body, json!([]));

    let today = Utc::now().date_naive();
    let promotion = json!({
        "name": "Finde", "kind": "two_for_one", "value": 0.0,
        "start_date": today, "end_date": today + Duration::days(10), "code": "FINDE",
    });
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/promotions").insert_header(bearer(&admin)).set_json(&promotion)
    );
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/promotions").insert_header(bearer(&admin)).set_json(&promotion)
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/promotions").insert_header(bearer(&admin)).set_json(json!({
            "name": "Al revés", "kind": "fixed", "value": 10.0,
            "start_date": today, "end_date": today - Duration::days(1),
        }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call!(app, TestRequest::get().uri("/promotions"));
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn roles_are_assigned_and_enforced() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);
    let (_, gestor_id) = register!(app, "gestor");
    let (_, clerk_id) = register!(app, "recepcion");

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/admin/roles")
            .insert_header(bearer(&admin))
            .set_json(json!({ "name": "gestor_de_roles", "description": "Asigna roles" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let gestor_role = body["id"].as_i64().unwrap();

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/admin/roles")
            .insert_header(bearer(&admin))
            .set_json(json!({ "name": "gestor_de_roles" }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, permissions) = call!(app, TestRequest::get().uri("/admin/permissions").insert_header(bearer(&admin)));
    let grants: Vec<i64> = permissions
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["module"] == "roles" && (p["action"] == "asignar" || p["action"] == "ver"))
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(grants.len(), 2);

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri(&format!("/admin/roles/{}/permissions", gestor_role))
            .insert_header(bearer(&admin))
            .set_json(json!({ "permission_ids": grants }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"].as_array().unwrap().len(), 2);

    let (status, _) = call!(
        app,
        TestRequest::put()
            .uri(&format!("/admin/roles/{}/permissions", gestor_role))
            .insert_header(bearer(&admin))
            .set_json(json!({ "permission_ids": [424242] }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/users/{}/roles", gestor_id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "role_id": gestor_role }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"][0]["name"], "gestor_de_roles");

    let gestor = login!(app, "gestor", "password123");
    let recepcionista = role_id!(app, &gestor, "recepcionista");
    let super_admin = role_id!(app, &gestor, "super_admin");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/users/{}/roles", clerk_id))
            .insert_header(bearer(&gestor))
            .set_json(json!({ "role_id": super_admin }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/users/{}/roles", clerk_id))
            .insert_header(bearer(&gestor))
            .set_json(json!({ "role_id": recepcionista }))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call!(app, TestRequest::get().uri("/admin/room-types").insert_header(bearer(&gestor)));
    assert_eq!(status, StatusCode::FORBIDDEN);

    let clerk = login!(app, "recepcion", "password123");
    let (status, _) = call!(app, TestRequest::get().uri("/admin/reservations").insert_header(bearer(&clerk)));
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call!(app, TestRequest::get().uri("/admin/dashboard").insert_header(bearer(&clerk)));
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call!(
        app,
        TestRequest::post().uri("/admin/room-types").insert_header(bearer(&clerk)).set_json(json!({
            "name": "Cabaña", "price": 90.0, "capacity": 2, "stock_total": 1,
        }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("habitaciones"));

    let (status, _) = call!(
        app,
        TestRequest::delete()
            .uri(&format!("/admin/users/{}/roles/{}", clerk_id, recepcionista))
            .insert_header(bearer(&gestor))
    );
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call!(app, TestRequest::get().uri("/admin/reservations").insert_header(bearer(&clerk)));
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn role_preview_narrows_permissions() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);
    let read_only = role_id!(app, &admin, "solo_lectura");
    let new_type = json!({ "name": "Bungalow", "price": 110.0, "capacity": 3, "stock_total": 2 });

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/admin/role-preview")
            .insert_header(bearer(&admin))
            .set_json(json!({ "role_id": read_only }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"]["name"], "solo_lectura");

    let (status, _) = call!(app, TestRequest::get().uri("/admin/room-types").insert_header(bearer(&admin)));
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/room-types").insert_header(bearer(&admin)).set_json(&new_type)
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, profile) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&admin)));
    assert_eq!(profile["role_preview_id"], read_only);
    assert!(profile["permissions"].get("usuarios").is_none());

    let (status, _) = call!(app, TestRequest::delete().uri("/admin/role-preview").insert_header(bearer(&admin)));
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/admin/room-types").insert_header(bearer(&admin)).set_json(&new_type)
    );
    assert_eq!(status, StatusCode::CREATED);

    let (token, _) = register!(app, "karla");
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/admin/role-preview")
            .insert_header(bearer(&token))
            .set_json(json!({ "role_id": read_only }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn users_blocking_and_bulk_email() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);
    let (_, leo) = register!(app, "leo");
    let (_, mia) = register!(app, "mia");
    let admin_id = {
        let (_, users) = call!(app, TestRequest::get().uri("/admin/users").insert_header(bearer(&admin)));
        assert_eq!(users.as_array().unwrap().len(), 3);
        find_by(&users, "username", common::ADMIN_USERNAME)["id"].as_i64().unwrap()
    };

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/users/{}/block", admin_id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "reason": "prueba" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/users/{}/block", leo))
            .insert_header(bearer(&admin))
            .set_json(json!({ "reason": "Daños en la habitación" }))
    );
    assert_eq!(status, StatusCode::OK);
    let (_, users) = call!(app, TestRequest::get().uri("/admin/users").insert_header(bearer(&admin)));
    let row = find_by(&users, "username", "leo");
    assert_eq!(row["is_blocked"], true);
    assert_eq!(row["block_reason"], "Daños en la habitación");

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/admin/emails").insert_header(bearer(&admin)).set_json(json!({
            "user_ids": [leo, mia, 777],
            "subject": "Novedades",
            "body": "Abrimos el spa",
        }))
    );
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["sent"], 2);
    assert_eq!(body["skipped_ids"], json!([777]));

    let (_, outbox) = call!(app, TestRequest::get().uri("/admin/emails").insert_header(bearer(&admin)));
    let newsletters = outbox
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["subject"] == "Novedades")
        .count();
    assert_eq!(newsletters, 2);
}

#[actix_web::test]
async fn check_in_respects_promised_rooms() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);
    let doble = common::room_type_id(&pool, "Habitación Doble").await;
    let (_, guest) = register!(app, "olga");
    let dob001 = room_id(&pool, "DOB001").await;
    let dob002 = room_id(&pool, "DOB002").await;

    let (promised, promised_code) = confirmed_reservation(&pool, guest, doble, Some(dob001)).await;
    let (walk_in, walk_in_code) = confirmed_reservation(&pool, guest, doble, None).await;
    let guests = json!([{ "first_name": "Olga", "last_name": "Ruiz", "document": "Y1111111" }]);

    // DOB001 is held for the other stay, so the walk-in gets the next room.
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/reservations/{}/check-in", walk_in))
            .insert_header(bearer(&admin))
            .set_json(json!({ "code": walk_in_code, "guests": guests }))
    );
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["assigned_room_id"], dob002);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/reservations/{}/check-in", promised))
            .insert_header(bearer(&admin))
            .set_json(json!({ "code": promised_code, "guests": guests }))
    );
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["assigned_room_id"], dob001);

    // A stay promised a room someone is already in cannot check in.
    let (late, late_code) = confirmed_reservation(&pool, guest, doble, Some(dob002)).await;
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/reservations/{}/check-in", late))
            .insert_header(bearer(&admin))
            .set_json(json!({ "code": late_code, "guests": guests }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = call!(app, TestRequest::get().uri("/admin/active-guests").insert_header(bearer(&admin)));
    let rooms: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["room_number"].as_str().unwrap())
        .collect();
    assert_eq!(rooms.len(), 2);
    assert!(rooms.contains(&"DOB001") && rooms.contains(&"DOB002"));
}

#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use common::bearer;

fn stay(nights: i64) -> Value {
    let today = Utc::now().date_naive();
    json!({ "check_in": today, "check_out": today + Duration::days(nights) })
}

#[actix_web::test]
async fn wizard_to_checkout_and_back_out() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let doble = common::room_type_id(&pool, "Habitación Doble").await;
    let (token, user_id) = register!(app, "ana");

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/booking/guests").insert_header(bearer(&token)).set_json(json!({ "guests": 2 }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next_step"], "dates");

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/booking/dates").insert_header(bearer(&token)).set_json(stay(2))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call!(app, TestRequest::get().uri("/booking/room-options").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);
    let options = body["options"].as_array().unwrap();
    let simple = options.iter().find(|o| o["name"] == "Habitación Simple").unwrap();
    assert_eq!(simple["rooms_needed"], 2);
    let suite = options.iter().find(|o| o["name"] == "Suite Familiar").unwrap();
    assert_eq!(suite["rooms_needed"], 1);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/rooms")
            .insert_header(bearer(&token))
            .set_json(json!({ "room_type_id": doble, "quantity": 1 }))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/booking/extras").insert_header(bearer(&token)).set_json(json!({}))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next_step"], "payment");

    let (_, body) = call!(app, TestRequest::get().uri("/booking").insert_header(bearer(&token)));
    assert_eq!(body["quote"]["total"], 240.0);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/booking/checkout")
            .insert_header(bearer(&token))
            .set_json(json!({ "payment_method": "card" }))
    );
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["reservation"]["status"], "pending");
    assert_eq!(body["reservation"]["amount"], 240.0);
    assert!(body["reservation"].get("token").is_none());
    let reservation_id = body["reservation"]["id"].as_i64().unwrap();
    assert_eq!(common::stock_available(&pool, doble).await, 14);

    // The draft is gone after checkout.
    let (_, body) = call!(app, TestRequest::get().uri("/booking").insert_header(bearer(&token)));
    assert_eq!(body["next_step"], "guests");

    let (status, body) = call!(app, TestRequest::get().uri("/reservations").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["user_id"], user_id);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/reservations/{}/cancel", reservation_id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(common::stock_available(&pool, doble).await, 15);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/reservations/{}/cancel", reservation_id))
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn confirm_check_in_and_check_out() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let suite = common::room_type_id(&pool, "Suite Familiar").await;
    let (token, _) = register!(app, "bruno");

    for (uri, payload) in [
        ("/booking/guests", json!({ "guests": 3 })),
        ("/booking/dates", stay(1)),
        ("/booking/rooms", json!({ "room_type_id": suite, "quantity": 1 })),
        ("/booking/extras", json!({})),
    ] {
        let (status, body) = call!(
            app,
            TestRequest::post().uri(uri).insert_header(bearer(&token)).set_json(payload)
        );
        assert_eq!(status, StatusCode::OK, "{}: {}", uri, body);
    }
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/booking/checkout")
            .insert_header(bearer(&token))
            .set_json(json!({ "payment_method": "cash" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let id = body["reservation"]["id"].as_i64().unwrap();
    assert_eq!(common::stock_available(&pool, suite).await, 4);

    let confirmation = common::last_word_of_latest_email(&pool, "bruno@mail.test").await;
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/reservations/confirm")
            .set_json(json!({ "token": "not-a-token" }))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/reservations/confirm")
            .set_json(json!({ "token": confirmation }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["status"], "confirmed");

    let code = common::last_word_of_latest_email(&pool, "bruno@mail.test").await;
    assert_eq!(code.len(), 6);

    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);
    let guests = json!([
        { "first_name": "Bruno", "last_name": "Díaz", "document": "X1234567" },
        { "first_name": "Inés", "last_name": "Díaz", "document": "X7654321" },
    ]);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/reservations/{}/check-in", id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "code": "ZZZZZZ", "guests": guests }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/reservations/{}/check-in", id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "code": code, "guests": guests }))
    );
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "active");
    assert!(body["assigned_room_id"].is_i64());

    let (_, body) = call!(app, TestRequest::get().uri("/admin/active-guests").insert_header(bearer(&admin)));
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["room_number"], "FAM001");

    let (_, body) = call!(app, TestRequest::get().uri("/admin/guests?q=In").insert_header(bearer(&admin)));
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/reservations/{}/check-out", id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(common::stock_available(&pool, suite).await, 5);

    let (_, body) = call!(app, TestRequest::get().uri("/admin/active-guests").insert_header(bearer(&admin)));
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn steps_are_validated_in_order() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let simple = common::room_type_id(&pool, "Habitación Simple").await;
    let presidencial = common::room_type_id(&pool, "Suite Presidencial").await;
    let (token, _) = register!(app, "carla");

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/booking/dates").insert_header(bearer(&token)).set_json(stay(2))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/booking/guests").insert_header(bearer(&token)).set_json(json!({ "guests": 21 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/booking/guests").insert_header(bearer(&token)).set_json(json!({ "guests": 3 }))
    );
    assert_eq!(status, StatusCode::OK);

    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/dates")
            .insert_header(bearer(&token))
            .set_json(json!({ "check_in": yesterday, "check_out": yesterday + Duration::days(2) }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/booking/dates").insert_header(bearer(&token)).set_json(stay(31))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/booking/dates").insert_header(bearer(&token)).set_json(stay(3))
    );
    assert_eq!(status, StatusCode::OK);

    // Three simple rooms hold three guests; two do not.
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/rooms")
            .insert_header(bearer(&token))
            .set_json(json!({ "room_type_id": simple, "quantity": 2 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/rooms")
            .insert_header(bearer(&token))
            .set_json(json!({ "room_type_id": presidencial, "quantity": 3 }))
    );
    assert_eq!(status, StatusCode::CONFLICT);
    for quantity in [json!(21), json!(i64::MAX)] {
        let (status, _) = call!(
            app,
            TestRequest::post()
                .uri("/booking/rooms")
                .insert_header(bearer(&token))
                .set_json(json!({ "room_type_id": simple, "quantity": quantity }))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/checkout")
            .insert_header(bearer(&token))
            .set_json(json!({ "payment_method": "transfer" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rooms chosen but extras skipped.
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/booking/rooms")
            .insert_header(bearer(&token))
            .set_json(json!({ "room_type_id": simple, "quantity": 3 }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next_step"], "extras");
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/booking/checkout")
            .insert_header(bearer(&token))
            .set_json(json!({ "payment_method": "transfer" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("extras"));
    assert_eq!(common::stock_available(&pool, simple).await, 10);

    let (status, _) = call!(app, TestRequest::delete().uri("/booking").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = call!(app, TestRequest::get().uri("/booking").insert_header(bearer(&token)));
    assert_eq!(body["next_step"], "guests");
}

#[actix_web::test]
async fn promotion_code_discounts_the_stay() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let doble = common::room_type_id(&pool, "Habitación Doble").await;
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);
    let today = Utc::now().date_naive();

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/admin/promotions").insert_header(bearer(&admin)).set_json(json!({
            "name": "Diez por ciento",
            "kind": "percentage",
            "value": 10.0,
            "start_date": today - Duration::days(1),
            "end_date": today + Duration::days(30),
            "code": " verano10 ",
        }))
    );
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["code"], "VERANO10");

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/admin/plans").insert_header(bearer(&admin)).set_json(json!({
            "name": "Desayuno incluido",
            "price": 15.0,
            "includes_breakfast": true,
        }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let plan_id = body["id"].as_i64().unwrap();

    let (token, _) = register!(app, "diana");
    for (uri, payload) in [
        ("/booking/guests", json!({ "guests": 2 })),
        ("/booking/dates", stay(2)),
        ("/booking/rooms", json!({ "room_type_id": doble, "quantity": 1 })),
    ] {
        let (status, _) = call!(
            app,
            TestRequest::post().uri(uri).insert_header(bearer(&token)).set_json(payload)
        );
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/extras")
            .insert_header(bearer(&token))
            .set_json(json!({ "plan_id": plan_id, "promotion_code": "verano10" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/extras")
            .insert_header(bearer(&token))
            .set_json(json!({ "promotion_code": "NOEXISTE" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/booking/extras")
            .insert_header(bearer(&token))
            .set_json(json!({ "promotion_code": "verano10" }))
    );
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call!(app, TestRequest::get().uri("/booking").insert_header(bearer(&token)));
    assert_eq!(body["quote"]["rooms"], 240.0);
    assert_eq!(body["quote"]["discount"], 24.0);
    assert_eq!(body["quote"]["total"], 216.0);
}

#[actix_web::test]
async fn blocked_users_cannot_book() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (token, user_id) = register!(app, "eva");
    let admin = login!(app, common::ADMIN_USERNAME, common::ADMIN_PASSWORD);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/users/{}/block", user_id))
            .insert_header(bearer(&admin))
            .set_json(json!({ "reason": "Impago" }))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call!(
        app,
        TestRequest::post().uri("/booking/guests").insert_header(bearer(&token)).set_json(json!({ "guests": 1 }))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("Impago"));

    // Logging in still works.
    login!(app, "eva", "password123");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri(&format!("/admin/users/{}/unblock", user_id))
            .insert_header(bearer(&admin))
    );
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call!(
        app,
        TestRequest::post().uri("/booking/guests").insert_header(bearer(&token)).set_json(json!({ "guests": 1 }))
    );
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn reservations_are_private() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let simple = common::room_type_id(&pool, "Habitación Simple").await;
    let (owner, _) = register!(app, "franco");
    let (other, _) = register!(app, "gala");

    for (uri, payload) in [
        ("/booking/guests", json!({ "guests": 1 })),
        ("/booking/dates", stay(1)),
        ("/booking/rooms", json!({ "room_type_id": simple, "quantity": 1 })),
        ("/booking/extras", json!({})),
    ] {
        call!(app, TestRequest::post().uri(uri).insert_header(bearer(&owner)).set_json(payload));
    }
    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/booking/checkout")
            .insert_header(bearer(&owner))
            .set_json(json!({ "payment_method": "card" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let id = body["reservation"]["id"].as_i64().unwrap();

    let uri = format!("/reservations/{}", id);
    let (status, _) = call!(app, TestRequest::get().uri(&uri).insert_header(bearer(&owner)));
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call!(app, TestRequest::get().uri(&uri).insert_header(bearer(&other)));
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call!(
        app,
        TestRequest::post().uri(&format!("{}/cancel", uri)).insert_header(bearer(&other))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn stale_draft_is_not_booked() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let doble = common::room_type_id(&pool, "Habitación Doble").await;
    let (token, _) = register!(app, "hector");

    for (uri, payload) in [
        ("/booking/guests", json!({ "guests": 2 })),
        ("/booking/dates", stay(2)),
        ("/booking/rooms", json!({ "room_type_id": doble, "quantity": 1 })),
        ("/booking/extras", json!({})),
    ] {
        let (status, body) = call!(
            app,
            TestRequest::post().uri(uri).insert_header(bearer(&token)).set_json(payload)
        );
        assert_eq!(status, StatusCode::OK, "{}: {}", uri, body);
    }

    // The draft was saved days ago.
    let today = Utc::now().date_naive();
    sqlx::query(
        "UPDATE sessions SET data = json_set(data, '$.booking.check_in', ?, '$.booking.check_out', ?) WHERE token = ?",
    )
    .bind((today - Duration::days(5)).to_string())
    .bind((today - Duration::days(3)).to_string())
    .bind(&token)
    .execute(&pool)
    .await
    .unwrap();

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/booking/checkout")
            .insert_header(bearer(&token))
            .set_json(json!({ "payment_method": "card" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(body["error"].as_str().unwrap().contains("past"));
    assert_eq!(common::stock_available(&pool, doble).await, 15);

    let (_, list) = call!(app, TestRequest::get().uri("/reservations").insert_header(bearer(&token)));
    assert_eq!(list, json!([]));
}

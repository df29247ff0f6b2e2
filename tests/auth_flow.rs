#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use serde_json::json;

use common::bearer;

#[actix_web::test]
async fn register_then_read_profile() {
    let pool = common::setup().await;
    let app = test_app!(pool);

    let (token, user_id) = register!(app, "lucia");

    let (status, body) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["user"]["username"], "lucia");
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["is_super_admin"], false);
    assert_eq!(body["roles"], json!([]));
}

#[actix_web::test]
async fn registration_is_validated() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    register!(app, "mateo");

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/auth/register").set_json(json!({
            "username": "mateo",
            "email": "other@mail.test",
            "password": "password123",
            "password_confirm": "password123",
        }))
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/auth/register").set_json(json!({
            "username": "valentina",
            "email": "valentina@mail.test",
            "password": "password123",
            "password_confirm": "password124",
        }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/auth/register").set_json(json!({
            "username": "valentina",
            "email": "not-an-email",
            "password": "password123",
            "password_confirm": "password123",
        }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    register!(app, "sofia");

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "sofia", "password": "nope-nope" }))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let token = login!(app, "sofia", "password123");
    let (status, _) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn anonymous_session_is_not_a_login() {
    let pool = common::setup().await;
    let app = test_app!(pool);

    let (status, body) = call!(app, TestRequest::post().uri("/sessions"));
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().unwrap();

    let (status, _) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(token)));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call!(app, TestRequest::get().uri("/auth/profile"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn logout_invalidates_the_token() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (token, _) = register!(app, "diego");

    let (status, _) = call!(app, TestRequest::post().uri("/auth/logout").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn two_factor_login_needs_the_mailed_code() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (token, _) = register!(app, "martina");

    let (status, _) = call!(app, TestRequest::post().uri("/auth/2fa/enable").insert_header(bearer(&token)));
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "martina", "password": "password123" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["two_factor_required"], true);
    let pending = body["token"].as_str().unwrap().to_string();

    let (status, _) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&pending)));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let code = common::two_factor_code(&pool, "martina@mail.test").await;
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/2fa/verify")
            .insert_header(bearer(&pending))
            .set_json(json!({ "code": wrong }))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/2fa/verify")
            .insert_header(bearer(&pending))
            .set_json(json!({ "code": code }))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&pending)));
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn password_reset_round() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (old_token, _) = register!(app, "camila");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/password-reset")
            .set_json(json!({ "email": "nobody@mail.test" }))
    );
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/password-reset")
            .set_json(json!({ "email": "camila@mail.test" }))
    );
    assert_eq!(status, StatusCode::ACCEPTED);
    let reset = common::last_word_of_latest_email(&pool, "camila@mail.test").await;

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/password-reset/confirm")
            .set_json(json!({ "token": reset, "new_password": "brand-new-pass" }))
    );
    assert_eq!(status, StatusCode::OK);

    // Existing sessions are dropped with the old password.
    let (status, _) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&old_token)));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login!(app, "camila", "brand-new-pass");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/password-reset/confirm")
            .set_json(json!({ "token": reset, "new_password": "another-pass" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn change_password_checks_the_current_one() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (token, _) = register!(app, "tomas");

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/password")
            .insert_header(bearer(&token))
            .set_json(json!({ "current_password": "wrong-one", "new_password": "password456" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/password")
            .insert_header(bearer(&token))
            .set_json(json!({ "current_password": "password123", "new_password": "password456" }))
    );
    assert_eq!(status, StatusCode::OK);
    login!(app, "tomas", "password456");
}

#[actix_web::test]
async fn profile_and_preferences_update() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (token, _) = register!(app, "elena");

    let (status, _) = call!(
        app,
        TestRequest::put()
            .uri("/auth/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "first_name": "Elena", "city": "Sevilla" }))
    );
    assert_eq!(status, StatusCode::OK);

    let (_, before) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&token)));
    let was_enabled = before["profile"]["preferences"]["email_notifications"].as_bool().unwrap();

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/auth/notifications/toggle")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_notifications"], !was_enabled);

    let (_, body) = call!(app, TestRequest::get().uri("/auth/profile").insert_header(bearer(&token)));
    assert_eq!(body["user"]["first_name"], "Elena");
    assert_eq!(body["profile"]["city"], "Sevilla");
    assert_eq!(body["profile"]["preferences"]["email_notifications"], !was_enabled);
}

#[actix_web::test]
async fn two_factor_attempts_are_limited() {
    let pool = common::setup().await;
    let app = test_app!(pool);
    let (token, _) = register!(app, "rocio");
    call!(app, TestRequest::post().uri("/auth/2fa/enable").insert_header(bearer(&token)));

    let (_, body) = call!(
        app,
        TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "rocio", "password": "password123" }))
    );
    let pending = body["token"].as_str().unwrap().to_string();
    let code = common::two_factor_code(&pool, "rocio@mail.test").await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 0..5 {
        let (status, _) = call!(
            app,
            TestRequest::post()
                .uri("/auth/2fa/verify")
                .insert_header(bearer(&pending))
                .set_json(json!({ "code": wrong }))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The pending login is gone, right code or not.
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/2fa/verify")
            .insert_header(bearer(&pending))
            .set_json(json!({ "code": code }))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let pending_code: Option<String> =
        sqlx::query_scalar("SELECT p.two_factor_pending_code FROM profiles p JOIN users u ON u.id = p.user_id WHERE u.username = 'rocio'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(pending_code.is_none());

    // Starting over works.
    let (_, body) = call!(
        app,
        TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "rocio", "password": "password123" }))
    );
    let pending = body["token"].as_str().unwrap().to_string();
    let code = common::two_factor_code(&pool, "rocio@mail.test").await;
    let (status, _) = call!(
        app,
        TestRequest::post()
            .uri("/auth/2fa/verify")
            .insert_header(bearer(&pending))
            .set_json(json!({ "code": code }))
    );
    assert_eq!(status, StatusCode::OK);
}

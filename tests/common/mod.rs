#![allow(dead_code, unused_macros)]

use serde_json::Value;
use sqlx::SqlitePool;

use hotel_reservas::config::AdminBootstrap;
use hotel_reservas::db::{self, seed};
use hotel_reservas::mail;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const ADMIN_EMAIL: &str = "admin@hotel.test";

/// Fresh in-memory database: migrated, roles seeded, an admin and the sample catalog.
pub async fn setup() -> SqlitePool {
    let pool = db::get_db_pool("sqlite::memory:", 1).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    seed::init_roles(&pool).await.unwrap();
    seed::bootstrap_admin(
        &pool,
        &AdminBootstrap {
            username: ADMIN_USERNAME.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            email: ADMIN_EMAIL.to_string(),
        },
    )
    .await
    .unwrap();
    seed::populate_catalog(&pool).await.unwrap();
    pool
}

pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Last word of the most recent email sent to `recipient`; tokens and codes close every message.
pub async fn last_word_of_latest_email(pool: &SqlitePool, recipient: &str) -> String {
    let email = mail::latest_for(pool, recipient)
        .await
        .unwrap()
        .expect("an email was queued");
    email.body.split_whitespace().last().unwrap().to_string()
}

pub async fn two_factor_code(pool: &SqlitePool, recipient: &str) -> String {
    let email = mail::latest_for(pool, recipient)
        .await
        .unwrap()
        .expect("a verification email was queued");
    email
        .body
        .split_whitespace()
        .map(|w| w.trim_end_matches('.'))
        .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
        .unwrap()
        .to_string()
}

pub async fn room_type_id(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("SELECT id FROM room_types WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn stock_available(pool: &SqlitePool, room_type_id: i64) -> i64 {
    sqlx::query_scalar("SELECT stock_available FROM room_types WHERE id = ?")
        .bind(room_type_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Builds the full application around `pool` with the keyword-only chatbot.
macro_rules! test_app {
    ($pool:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($pool.clone()))
                .app_data(actix_web::web::Data::new(
                    hotel_reservas::config::Config::for_database("sqlite::memory:"),
                ))
                .app_data(actix_web::web::Data::new(
                    hotel_reservas::chatbot::IntentExtractor::parser_only(),
                ))
                .configure(hotel_reservas::handlers::configure),
        )
        .await
    };
}

/// Sends the request and answers `(status, json body)`.
macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = actix_web::test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let bytes = actix_web::test::read_body(resp).await;
        (status, common::parse_body(&bytes))
    }};
}

/// Registers `username` (email `<username>@mail.test`) and answers its session token.
macro_rules! register {
    ($app:expr, $username:expr) => {{
        let username: &str = $username;
        let (status, body) = call!(
            $app,
            actix_web::test::TestRequest::post()
                .uri("/auth/register")
                .set_json(serde_json::json!({
                    "username": username,
                    "email": format!("{}@mail.test", username),
                    "password": "password123",
                    "password_confirm": "password123",
                }))
        );
        assert_eq!(status, actix_web::http::StatusCode::CREATED, "{}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }};
}

macro_rules! login {
    ($app:expr, $username:expr, $password:expr) => {{
        let (status, body) = call!(
            $app,
            actix_web::test::TestRequest::post()
                .uri("/auth/login")
                .set_json(serde_json::json!({ "username": $username, "password": $password }))
        );
        assert_eq!(status, actix_web::http::StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }};
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Guest {
    pub id: i64,
    pub reservation_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birth_date: Option<NaiveDate>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct ActiveGuest {
    pub id: i64,
    pub guest_id: i64,
    pub reservation_id: i64,
    pub room_id: Option<i64>,
    pub checked_in_at: NaiveDateTime,
    pub checked_out_at: Option<NaiveDateTime>,
    pub active: bool,
}

/// Front-desk view of someone currently staying at the hotel.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ActiveGuestView {
    pub id: i64,
    pub reservation_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub room_number: Option<String>,
    pub checked_in_at: NaiveDateTime,
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct GuestInput {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 20))]
    pub document: String,
    pub birth_date: Option<NaiveDate>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckInRequest {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1), nested)]
    pub guests: Vec<GuestInput>,
}

#[derive(Debug, Deserialize)]
pub struct GuestSearch {
    pub q: Option<String>,
}

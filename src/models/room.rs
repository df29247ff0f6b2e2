use serde::{Deserialize, Serialize};
use validator::Validate;

use super::room_type::default_true;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Room {
    pub id: i64,
    pub number: String,
    pub room_type_id: i64,
    pub available: bool,
    pub under_maintenance: bool,
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoom {
    #[validate(length(min = 1, max = 10))]
    pub number: String,
    pub room_type_id: i64,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub under_maintenance: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoom {
    #[validate(length(min = 1, max = 10))]
    pub number: Option<String>,
    pub room_type_id: Option<i64>,
    pub available: Option<bool>,
    pub under_maintenance: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoomFilter {
    pub room_type_id: Option<i64>,
}

/// A free room offered by the chatbot, joined with its type.
#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
pub struct RoomOffer {
    pub id: i64,
    pub number: String,
    pub room_type_id: i64,
    pub room_type_name: String,
    pub price: f64,
    pub capacity: i64,
}

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A sellable kind of room. `stock_available` counts units not held by a live reservation.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct RoomType {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub capacity: i64,
    pub stock_total: i64,
    pub stock_available: i64,
    pub active: bool,
}

impl RoomType {
    pub fn occupancy_percentage(&self) -> i64 {
        if self.stock_total <= 0 {
            return 0;
        }
        let occupied = (self.stock_total - self.stock_available) as f64;
        (occupied / self.stock_total as f64 * 100.0).round() as i64
    }

    /// Can `quantity` rooms of this type sleep `guests` people?
    pub fn fits(&self, guests: i64, quantity: i64) -> bool {
        self.capacity
            .checked_mul(quantity)
            .is_some_and(|beds| beds >= guests)
    }

    /// Fewest rooms of this type that sleep `guests` people.
    pub fn rooms_needed(&self, guests: i64) -> i64 {
        if self.capacity <= 0 {
            return i64::MAX;
        }
        ((guests + self.capacity - 1) / self.capacity).max(1)
    }
}

#[derive(Debug, Serialize)]
pub struct RoomTypeDetail {
    #[serde(flatten)]
    pub room_type: RoomType,
    pub occupancy_percentage: i64,
    pub rooms: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomType {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 1))]
    pub capacity: i64,
    #[validate(range(min = 0))]
    pub stock_total: i64,
    #[validate(range(min = 0))]
    pub stock_available: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoomType {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 1))]
    pub capacity: Option<i64>,
    #[validate(range(min = 0))]
    pub stock_total: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RoomTypeSearch {
    pub guests: Option<i64>,
    pub quantity: Option<i64>,
}

pub(crate) fn default_true() -> bool {
    true
}

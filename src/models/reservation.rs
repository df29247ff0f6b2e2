use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 5] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Active,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Active => "active",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a reservation in this state keeps its rooms out of the available stock.
    pub fn holds_stock(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Confirmed | ReservationStatus::Active
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.holds_stock()
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Active)
                | (Confirmed, Cancelled)
                | (Active, Completed)
        )
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Transfer,
    Cash,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub room_type_id: i64,
    pub quantity: i64,
    pub assigned_room_id: Option<i64>,
    pub guests: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: ReservationStatus,
    pub payment_method: Option<PaymentMethod>,
    pub plan_id: Option<i64>,
    pub promotion_id: Option<i64>,
    pub amount: f64,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(skip_serializing)]
    pub checkin_code: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Reservation {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// Everything needed to insert a reservation; the amount is computed on the way in.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: i64,
    pub room_type_id: i64,
    pub quantity: i64,
    pub assigned_room_id: Option<i64>,
    pub guests: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: ReservationStatus,
    pub payment_method: Option<PaymentMethod>,
    pub plan_id: Option<i64>,
    pub promotion_id: Option<i64>,
    pub service_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmReservation {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Confirm,
    Cancel,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkReservationAction {
    pub action: BulkAction,
    #[validate(length(min = 1))]
    pub ids: Vec<i64>,
}

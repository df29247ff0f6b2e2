use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::room_type::default_true;

/// Board plan charged per room and night on top of the room price.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub includes_breakfast: bool,
    pub includes_wifi: bool,
    pub includes_parking: bool,
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlanInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default)]
    pub includes_breakfast: bool,
    #[serde(default = "default_true")]
    pub includes_wifi: bool,
    #[serde(default)]
    pub includes_parking: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PromotionKind {
    /// `value` percent off the lodging subtotal.
    Percentage,
    /// `value` currency units off the lodging subtotal.
    Fixed,
    /// Every second night is free.
    TwoForOne,
    /// Free upgrade handled at the front desk; no price change.
    Upgrade,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Promotion {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub kind: PromotionKind,
    pub value: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub code: Option<String>,
    pub active: bool,
}

impl Promotion {
    pub fn is_valid_on(&self, day: NaiveDate) -> bool {
        self.active && self.start_date <= day && day <= self.end_date
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_promotion_window"))]
pub struct PromotionInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: PromotionKind,
    #[validate(range(min = 0.0))]
    pub value: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn validate_promotion_window(input: &PromotionInput) -> Result<(), ValidationError> {
    if input.end_date < input.start_date {
        return Err(ValidationError::new("end_date_before_start_date"));
    }
    if input.kind == PromotionKind::Percentage && input.value > 100.0 {
        return Err(ValidationError::new("percentage_above_100"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    pub available: bool,
    pub opens_at: Option<NaiveTime>,
    pub closes_at: Option<NaiveTime>,
}

pub const SERVICE_CATEGORIES: &[&str] = &[
    "spa",
    "restaurante",
    "transporte",
    "entretenimiento",
    "lavanderia",
    "otros",
];

#[derive(Debug, Deserialize, Validate)]
pub struct ServiceInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom(function = "validate_category"))]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default = "default_true")]
    pub available: bool,
    pub opens_at: Option<NaiveTime>,
    pub closes_at: Option<NaiveTime>,
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    if SERVICE_CATEGORIES.contains(&category) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_category"))
    }
}

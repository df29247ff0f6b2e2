use serde::Serialize;

use crate::models::catalog::PromotionKind;

#[derive(Debug, Clone, Copy)]
pub struct PromotionTerms {
    pub kind: PromotionKind,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct QuoteInput<'a> {
    pub nightly_price: f64,
    pub nights: i64,
    pub quantity: i64,
    pub plan_price: Option<f64>,
    pub service_prices: &'a [f64],
    pub promotion: Option<PromotionTerms>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Quote {
    pub nights: i64,
    pub rooms: f64,
    pub plan: f64,
    pub services: f64,
    pub discount: f64,
    pub total: f64,
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn quote(input: &QuoteInput<'_>) -> Quote {
    let nights = input.nights.max(0);
    let quantity = input.quantity.max(0);
    let room_nights = (nights * quantity) as f64;

    let rooms = input.nightly_price * room_nights;
    let plan = input.plan_price.unwrap_or(0.0) * room_nights;
    let services: f64 = input.service_prices.iter().sum();
    let lodging = rooms + plan;

    let discount = match input.promotion {
        Some(PromotionTerms { kind: PromotionKind::Percentage, value }) => {
            lodging * value.clamp(0.0, 100.0) / 100.0
        }
        Some(PromotionTerms { kind: PromotionKind::Fixed, value }) => value.max(0.0).min(lodging),
        Some(PromotionTerms { kind: PromotionKind::TwoForOne, .. }) => {
            let charged = (nights + 1) / 2;
            input.nightly_price * ((nights - charged) * quantity) as f64
        }
        Some(PromotionTerms { kind: PromotionKind::Upgrade, .. }) | None => 0.0,
    };

    let total = (lodging + services - discount).max(0.0);

    Quote {
        nights,
        rooms: round_cents(rooms),
        plan: round_cents(plan),
        services: round_cents(services),
        discount: round_cents(discount),
        total: round_cents(total),
    }
}

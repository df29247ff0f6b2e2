//! The booking draft a guest fills in step by step before paying.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::room_type::RoomType;

pub const MAX_GUESTS: i64 = 20;
pub const MAX_NIGHTS: i64 = 30;
pub const MAX_ROOMS: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Guests,
    Dates,
    Rooms,
    Extras,
    Payment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub guests: Option<i64>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub room_type_id: Option<i64>,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub service_ids: Vec<i64>,
    pub plan_id: Option<i64>,
    pub promotion_id: Option<i64>,
    #[serde(default)]
    pub extras_chosen: bool,
}

/// A draft with every mandatory step filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteDraft {
    pub guests: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_type_id: i64,
    pub quantity: i64,
    pub service_ids: Vec<i64>,
    pub plan_id: Option<i64>,
    pub promotion_id: Option<i64>,
}

fn missing(step: &str) -> AppError {
    AppError::Validation(format!("Complete the {} step first", step))
}

fn check_stay(check_in: NaiveDate, check_out: NaiveDate, today: NaiveDate) -> Result<()> {
    if check_in < today {
        return Err(AppError::Validation("Check-in cannot be in the past".to_string()));
    }
    if check_out <= check_in {
        return Err(AppError::Validation("Check-out must be after check-in".to_string()));
    }
    let nights = (check_out - check_in).num_days();
    if nights > MAX_NIGHTS {
        return Err(AppError::Validation(format!(
            "Stays are limited to {} nights",
            MAX_NIGHTS
        )));
    }
    Ok(())
}

impl BookingDraft {
    pub fn next_step(&self) -> Step {
        if self.guests.is_none() {
            Step::Guests
        } else if self.check_in.is_none() || self.check_out.is_none() {
            Step::Dates
        } else if self.room_type_id.is_none() || self.quantity.is_none() {
            Step::Rooms
        } else if !self.extras_chosen {
            Step::Extras
        } else {
            Step::Payment
        }
    }

    pub fn nights(&self) -> Option<i64> {
        match (self.check_in, self.check_out) {
            (Some(ci), Some(co)) => Some((co - ci).num_days()),
            _ => None,
        }
    }

    /// A different head count invalidates the room selection.
    pub fn set_guests(&mut self, guests: i64) -> Result<()> {
        if !(1..=MAX_GUESTS).contains(&guests) {
            return Err(AppError::Validation(format!(
                "Guests must be between 1 and {}",
                MAX_GUESTS
            )));
        }
        if self.guests != Some(guests) {
            self.room_type_id = None;
            self.quantity = None;
        }
        self.guests = Some(guests);
        Ok(())
    }

    pub fn set_dates(&mut self, check_in: NaiveDate, check_out: NaiveDate, today: NaiveDate) -> Result<()> {
        if self.guests.is_none() {
            return Err(missing("guests"));
        }
        check_stay(check_in, check_out, today)?;
        self.check_in = Some(check_in);
        self.check_out = Some(check_out);
        Ok(())
    }

    pub fn set_rooms(&mut self, room_type: &RoomType, quantity: i64) -> Result<()> {
        let guests = self.guests.ok_or_else(|| missing("guests"))?;
        if self.nights().is_none() {
            return Err(missing("dates"));
        }
        if !(1..=MAX_ROOMS).contains(&quantity) {
            return Err(AppError::Validation(format!(
                "Quantity must be between 1 and {}",
                MAX_ROOMS
            )));
        }
        if !room_type.active {
            return Err(AppError::Validation(format!(
                "{} is not available for booking",
                room_type.name
            )));
        }
        if !room_type.fits(guests, quantity) {
            return Err(AppError::Validation(format!(
                "{} x {} sleeps {} guests at most, {} requested",
                quantity,
                room_type.name,
                room_type.capacity.saturating_mul(quantity),
                guests
            )));
        }
        if room_type.stock_available < quantity {
            return Err(AppError::Conflict(format!(
                "Only {} {} left, {} requested",
                room_type.stock_available, room_type.name, quantity
            )));
        }
        self.room_type_id = Some(room_type.id);
        self.quantity = Some(quantity);
        Ok(())
    }

    pub fn set_extras(
        &mut self,
        service_ids: Vec<i64>,
        plan_id: Option<i64>,
        promotion_id: Option<i64>,
    ) -> Result<()> {
        if self.room_type_id.is_none() {
            return Err(missing("rooms"));
        }
        if plan_id.is_some() && promotion_id.is_some() {
            return Err(AppError::Validation(
                "A plan and a promotion cannot be combined".to_string(),
            ));
        }
        let mut service_ids = service_ids;
        service_ids.sort_unstable();
        service_ids.dedup();

        self.service_ids = service_ids;
        self.plan_id = plan_id;
        self.promotion_id = promotion_id;
        self.extras_chosen = true;
        Ok(())
    }

    /// The draft ready to book on `today`; a draft left over from an earlier day may have gone stale.
    pub fn complete(&self, today: NaiveDate) -> Result<CompleteDraft> {
        let guests = self.guests.ok_or_else(|| missing("guests"))?;
        let (check_in, check_out) = match (self.check_in, self.check_out) {
            (Some(ci), Some(co)) => (ci, co),
            _ => return Err(missing("dates")),
        };
        let (room_type_id, quantity) = match (self.room_type_id, self.quantity) {
            (Some(id), Some(q)) => (id, q),
            _ => return Err(missing("rooms")),
        };
        if !self.extras_chosen {
            return Err(missing("extras"));
        }
        check_stay(check_in, check_out, today)?;
        Ok(CompleteDraft {
            guests,
            check_in,
            check_out,
            room_type_id,
            quantity,
            service_ids: self.service_ids.clone(),
            plan_id: self.plan_id,
            promotion_id: self.promotion_id,
        })
    }
}

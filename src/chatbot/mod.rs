//! Reservation assistant: FAQ answers and a guided booking conversation.

pub mod faq;
pub mod flow;
pub mod llm;
pub mod parse;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use flow::{respond, ChatContext};
pub use llm::IntentExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Reservar,
    Consulta,
    #[serde(other)]
    Otro,
}

/// What one message says about a booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub intent: Intent,
    pub name: Option<String>,
    pub room_types: Vec<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<i64>,
    pub source: &'static str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStage {
    #[default]
    Collecting,
    Options,
    Confirm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatData {
    #[serde(default)]
    pub room_types: Vec<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<i64>,
    /// Room numbers offered in the last `confirm` prompt.
    #[serde(default)]
    pub options: Vec<String>,
    pub choice: Option<String>,
}

impl ChatData {
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.check_in.is_none() || self.check_out.is_none() {
            missing.push("fechas (check-in y check-out)");
        }
        if self.room_types.is_empty() {
            missing.push("tipo(s) de habitación (simple, doble, suite, presidencial)");
        }
        if self.guests.is_none() {
            missing.push("cantidad de huéspedes");
        }
        missing
    }

    /// Folds what a message said into the conversation so far.
    pub fn merge(&mut self, extraction: &Extraction) {
        for kind in &extraction.room_types {
            if !self.room_types.contains(kind) {
                self.room_types.push(kind.clone());
            }
        }
        if let (Some(ci), Some(co)) = (extraction.check_in, extraction.check_out) {
            self.check_in = Some(ci);
            self.check_out = Some(co);
        }
        if let Some(guests) = extraction.guests {
            self.guests = Some(guests);
        }
    }
}

/// Conversation state kept in the visitor's session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    #[serde(default)]
    pub stage: ChatStage,
    #[serde(default)]
    pub data: ChatData,
}

impl ChatState {
    pub fn is_fresh(&self) -> bool {
        *self == ChatState::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReservation {
    pub id: i64,
    pub room: String,
    pub room_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub stage: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ChatData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Extraction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<ChatReservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl ChatReply {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        ChatReply {
            success: true,
            stage,
            message: message.into(),
            options: None,
            data: None,
            entities: None,
            reservation: None,
            session_token: None,
        }
    }

    pub fn with_data(mut self, data: &ChatData) -> Self {
        self.data = Some(data.clone());
        self
    }
}

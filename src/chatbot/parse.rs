//! Keyword parsing for free-text booking requests.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::{Extraction, Intent};

pub const ROOM_KINDS: [&str; 4] = ["simple", "doble", "suite", "presidencial"];

const GREETINGS: [&str; 8] = [
    "hola",
    "buenas",
    "buen día",
    "buen dia",
    "buenas tardes",
    "buenas noches",
    "hey",
    "holi",
];

const RESERVATION_KEYWORDS: [&str; 2] = ["reserv", "book"];

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").expect("valid regex"));

fn date_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .filter(|t| t.contains('-') && t.len() >= 8)
        .map(|t| t.trim_matches(|c: char| matches!(c, '.' | ',' | ';')))
}

/// The two earliest `YYYY-MM-DD` dates in the text, in order.
pub fn parse_dates(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates: Vec<NaiveDate> = date_tokens(text)
        .filter_map(|t| NaiveDate::parse_from_str(t, "%Y-%m-%d").ok())
        .collect();
    if dates.len() < 2 {
        return None;
    }
    dates.sort();
    Some((dates[0], dates[1]))
}

fn words(lower: &str) -> impl Iterator<Item = &str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// Head count: a standalone number from 1 to 10 (dates ignored), or a Spanish number word.
pub fn parse_guests(text: &str) -> Option<i64> {
    let without_dates = text
        .split_whitespace()
        .filter(|t| !(t.contains('-') && t.len() >= 8))
        .collect::<Vec<_>>()
        .join(" ");

    for m in INTEGER.find_iter(&without_dates) {
        if let Ok(n) = m.as_str().parse::<i64>() {
            if (1..=10).contains(&n) {
                return Some(n);
            }
        }
    }

    let lower = text.to_lowercase();
    for word in words(&lower) {
        match word {
            "una" | "uno" => return Some(1),
            "dos" => return Some(2),
            "tres" => return Some(3),
            "cuatro" => return Some(4),
            _ => {}
        }
    }
    None
}

/// Room kinds mentioned, in the order they appear, without duplicates.
pub fn parse_room_types(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut found: Vec<(usize, &str)> = ROOM_KINDS
        .iter()
        .filter_map(|kind| lower.find(kind).map(|pos| (pos, *kind)))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, kind)| kind.to_string()).collect()
}

/// Which of the offered room numbers the guest picked.
pub fn parse_room_choice(text: &str, options: &[String]) -> Option<String> {
    let lower = text.to_lowercase();
    let mentioned: Vec<&str> = words(&lower).collect();

    if let Some(option) = options
        .iter()
        .find(|o| mentioned.contains(&o.to_lowercase().as_str()))
    {
        return Some(option.clone());
    }

    // "la 2", "opción 2": position in the list
    INTEGER
        .find_iter(&lower)
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .find(|n| (1..=options.len()).contains(n))
        .map(|n| options[n - 1].clone())
}

pub fn has_reservation_keyword(lower: &str) -> bool {
    RESERVATION_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub fn is_greeting(lower: &str) -> bool {
    let lower = lower.trim().trim_start_matches(['¡', '¿']);
    GREETINGS.iter().any(|g| match lower.strip_prefix(g) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    })
}

/// "tengo una duda", "pregunta", ... without saying about what.
pub fn is_generic_question(lower: &str) -> bool {
    const PHRASES: [&str; 3] = ["tengo una consulta", "tengo una pregunta", "tengo una duda"];
    const WORDS: [&str; 3] = ["consulta", "pregunta", "duda"];

    PHRASES.iter().any(|p| lower.contains(p)) || words(lower).any(|w| WORDS.contains(&w))
}

/// Parser-only intent and entity extraction.
pub fn extract(message: &str) -> Extraction {
    let lower = message.to_lowercase();
    let dates = parse_dates(message);
    let room_types = parse_room_types(message);
    let guests = parse_guests(message);

    let complete_request = dates.is_some() && (!room_types.is_empty() || guests.is_some());
    let intent = if complete_request || has_reservation_keyword(&lower) {
        Intent::Reservar
    } else {
        Intent::Consulta
    };

    Extraction {
        intent,
        name: None,
        room_types,
        check_in: dates.map(|(ci, _)| ci),
        check_out: dates.map(|(_, co)| co),
        guests,
        source: "parser",
    }
}

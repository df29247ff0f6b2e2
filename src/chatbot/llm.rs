//! Optional intent extraction through an OpenAI-compatible chat completions API.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{parse, Extraction, Intent};
use crate::config::Config;
use crate::error::{AppError, Result};

const SYSTEM_PROMPT: &str =
    "Eres un asistente que extrae intención y entidades para reservas de hotel.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Default, Deserialize)]
struct Dates {
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
}

/// The JSON document the model is asked to answer with.
#[derive(Debug, Deserialize)]
struct ModelAnswer {
    intent: Intent,
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    tipo_habitacion: Option<String>,
    #[serde(default)]
    fechas: Option<Dates>,
    #[serde(default)]
    cantidad_huespedes: Option<i64>,
}

fn prompt(message: &str) -> String {
    format!(
        "Eres un asistente para un hotel. Analiza el mensaje de usuario y devuelve un JSON compacto con:\n\
         - intent: uno de [reservar, consulta, otro]\n\
         - nombre: nombre del cliente si lo menciona, si no null\n\
         - tipo_habitacion: uno de [simple, doble, suite, presidencial] si lo menciona, si no null\n\
         - fechas: objeto con check_in y check_out en formato YYYY-MM-DD si las menciona, si no null\n\
         - cantidad_huespedes: entero si lo menciona, si no null\n\n\
         Mensaje: \"{}\"\n\
         Responde SOLO el JSON sin texto extra.",
        message
    )
}

/// Models like to wrap JSON in markdown fences even when told not to.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Turns the model's answer into an extraction, filling gaps from the keyword parser.
fn interpret(content: &str, message: &str) -> Result<Extraction> {
    let answer: ModelAnswer = serde_json::from_str(strip_fences(content))
        .map_err(|e| AppError::Llm(format!("unparseable answer: {}", e)))?;
    let parsed = parse::extract(message);

    let mut room_types: Vec<String> = answer
        .tipo_habitacion
        .map(|t| t.trim().to_lowercase())
        .filter(|t| parse::ROOM_KINDS.contains(&t.as_str()))
        .into_iter()
        .collect();
    for kind in parsed.room_types {
        if !room_types.contains(&kind) {
            room_types.push(kind);
        }
    }

    let dates = answer.fechas.unwrap_or_default();
    let (check_in, check_out) = match (dates.check_in, dates.check_out) {
        (Some(ci), Some(co)) => (Some(ci), Some(co)),
        _ => (parsed.check_in, parsed.check_out),
    };

    Ok(Extraction {
        intent: answer.intent,
        name: answer.nombre.filter(|n| !n.trim().is_empty()),
        room_types,
        check_in,
        check_out,
        guests: answer.cantidad_huespedes.filter(|g| *g > 0).or(parsed.guests),
        source: "llm",
    })
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Llm(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn complete(&self, user_prompt: String) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Llm(format!("status {}", response.status())));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("invalid response: {}", e)))?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm("empty response".to_string()))
    }

    pub async fn extract(&self, message: &str) -> Result<Extraction> {
        let content = self.complete(prompt(message)).await?;
        interpret(&content, message)
    }
}

/// Extracts intent and entities, preferring the language model when one is configured.
pub struct IntentExtractor {
    client: Option<LlmClient>,
}

impl IntentExtractor {
    pub fn parser_only() -> Self {
        Self { client: None }
    }

    pub fn from_config(config: &Config) -> Self {
        let Some(api_key) = config.openai_api_key.clone() else {
            log::info!("OPENAI_API_KEY not set, chatbot uses the keyword parser");
            return Self::parser_only();
        };

        match LlmClient::new(api_key, config.openai_base_url.clone(), config.openai_model.clone()) {
            Ok(client) => {
                log::info!("Chatbot intent extraction via {}", config.openai_model);
                Self {
                    client: Some(client),
                }
            }
            Err(e) => {
                log::warn!("Language model client unavailable ({}), using the keyword parser", e);
                Self::parser_only()
            }
        }
    }

    pub async fn extract(&self, message: &str) -> Extraction {
        let Some(client) = &self.client else {
            return parse::extract(message);
        };
        match client.extract(message).await {
            Ok(extraction) => extraction,
            Err(e) => {
                log::warn!("{}; falling back to the keyword parser", e);
                parse::extract(message)
            }
        }
    }
}

//! One turn of the booking conversation.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use super::{faq, parse, ChatReply, ChatReservation, ChatStage, ChatState, IntentExtractor, Intent};
use crate::accounts::{self, NewUser};
use crate::error::{AppError, Result};
use crate::models::reservation::{NewReservation, ReservationStatus};
use crate::models::room::RoomOffer;
use crate::reservations;
use crate::security;

pub const GUEST_ACCOUNT: &str = "chatbot_user";
const MAX_OPTIONS: i64 = 3;

const GREETING: &str = "¡Hola! ¿Qué te gustaría saber del hotel? Puedo responder preguntas sobre \
    servicios, horarios de check-in/out, ubicación/contacto, desayuno y estacionamiento, o ayudarte \
    a reservar.";
const ASK_TOPIC: &str = "Claro, ¿sobre qué te gustaría saber del hotel? Por ejemplo: horarios de \
    check-in/out, servicios, ubicación/contacto, desayuno o estacionamiento.";
const NOT_UNDERSTOOD: &str = "No estoy seguro de haber entendido. ¿Podrías especificar tu consulta? \
    Por ejemplo: horarios de check-in/out, servicios, ubicación/contacto, desayuno o \
    estacionamiento. Para reservar, indícame fechas (YYYY-MM-DD), tipo(s) de habitación y \
    cantidad de huéspedes.";
const INVALID_DATES: &str = "Las fechas no son válidas. Por favor, envíame check-in y check-out en \
    formato YYYY-MM-DD (ej: 2030-10-01 2030-10-05).";

/// Who is talking and what the hotel offers.
pub struct ChatContext {
    pub user_id: Option<i64>,
    pub service_names: Vec<String>,
}

fn options_reply(state: &ChatState, message: String) -> ChatReply {
    let mut reply = ChatReply::new("confirm", message).with_data(&state.data);
    reply.options = Some(state.data.options.clone());
    reply
}

/// Advances the conversation by one message, mutating `state` in place.
pub async fn respond(
    pool: &SqlitePool,
    extractor: &IntentExtractor,
    state: &mut ChatState,
    message: &str,
    ctx: &ChatContext,
) -> Result<ChatReply> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("Mensaje vacío".to_string()));
    }
    let lower = message.to_lowercase();

    if parse::is_greeting(&lower) && !parse::has_reservation_keyword(&lower) && parse::parse_dates(message).is_none() {
        return Ok(ChatReply::new("greeting", GREETING));
    }

    if state.stage == ChatStage::Confirm {
        return confirm_turn(pool, state, message, &lower, ctx).await;
    }

    let extraction = extractor.extract(message).await;
    if extraction.intent != Intent::Reservar {
        if let Some(answer) = faq::answer(message, &ctx.service_names) {
            return Ok(ChatReply::new("answer", answer));
        }
        if parse::is_generic_question(&lower) {
            return Ok(ChatReply::new("greeting", ASK_TOPIC));
        }
        if state.is_fresh() {
            return Ok(ChatReply::new("greeting", NOT_UNDERSTOOD));
        }
    }

    state.data.merge(&extraction);

    let missing = state.data.missing();
    if !missing.is_empty() {
        let mut reply = ChatReply::new(
            "collecting",
            format!("Para avanzar necesito: {}.", missing.join(", ")),
        )
        .with_data(&state.data);
        reply.entities = Some(extraction);
        return Ok(reply);
    }

    let (Some(check_in), Some(check_out), Some(guests)) =
        (state.data.check_in, state.data.check_out, state.data.guests)
    else {
        return Ok(ChatReply::new("collecting", NOT_UNDERSTOOD).with_data(&state.data));
    };
    if !stay_is_bookable(check_in, check_out) {
        return Ok(ChatReply::new("collecting", INVALID_DATES).with_data(&state.data));
    }

    let rooms = reservations::find_available_rooms(
        pool,
        &state.data.room_types,
        guests,
        check_in,
        check_out,
        MAX_OPTIONS,
    )
    .await?;

    if rooms.is_empty() {
        state.stage = ChatStage::Options;
        return Ok(ChatReply::new(
            "options",
            "No hay disponibilidad con esos criterios. Puedes ampliar los tipos (simple, doble, \
             suite, presidencial) o cambiar fechas/huéspedes. ¿Qué deseas ajustar?",
        )
        .with_data(&state.data));
    }

    state.data.options = rooms.into_iter().map(|r| r.number).collect();
    state.data.choice = None;
    state.stage = ChatStage::Confirm;
    let listed = state
        .data
        .options
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{}) Habitación {}", i + 1, n))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(options_reply(
        state,
        format!(
            "Tengo estas opciones disponibles: {}. Dime el número de habitación para continuar \
             o escribe 'otra' para cambiar criterios.",
            listed
        ),
    ))
}

async fn confirm_turn(
    pool: &SqlitePool,
    state: &mut ChatState,
    message: &str,
    lower: &str,
    ctx: &ChatContext,
) -> Result<ChatReply> {
    if lower.contains("otra") || lower.contains("cambiar") {
        state.stage = ChatStage::Collecting;
        state.data.options.clear();
        state.data.choice = None;
        return Ok(ChatReply::new(
            "collecting",
            "Perfecto, dime qué criterio deseas cambiar (fechas, tipo(s), huéspedes). Puedes \
             indicar varios tipos a la vez (ej: doble y suite).",
        )
        .with_data(&state.data));
    }

    state.data.choice = parse::parse_room_choice(message, &state.data.options);
    let Some(choice) = state.data.choice.clone() else {
        return Ok(options_reply(
            state,
            "No entendí tu elección. Por favor, indica el número de habitación de la lista o \
             escribe 'otra' para cambiar criterios."
                .to_string(),
        ));
    };

    let (Some(check_in), Some(check_out), Some(guests)) =
        (state.data.check_in, state.data.check_out, state.data.guests)
    else {
        state.stage = ChatStage::Collecting;
        return Ok(ChatReply::new("collecting", NOT_UNDERSTOOD).with_data(&state.data));
    };
    if !stay_is_bookable(check_in, check_out) {
        state.stage = ChatStage::Collecting;
        state.data.options.clear();
        state.data.choice = None;
        return Ok(ChatReply::new("collecting", INVALID_DATES).with_data(&state.data));
    }

    // The offer may have gone stale since it was shown.
    let still_free: Option<RoomOffer> = reservations::find_available_rooms(
        pool,
        &state.data.room_types,
        guests,
        check_in,
        check_out,
        i64::MAX,
    )
    .await?
    .into_iter()
    .find(|room| room.number == choice);

    let Some(room) = still_free else {
        state.stage = ChatStage::Collecting;
        state.data.options.clear();
        state.data.choice = None;
        return Ok(ChatReply::new(
            "collecting",
            "Esa opción ya no está disponible. Volvamos a intentar con otros criterios.",
        )
        .with_data(&state.data));
    };

    let user_id = booking_user(pool, ctx.user_id).await?;
    let profile = accounts::profile_for(pool, user_id).await?;
    if profile.is_blocked {
        return Err(AppError::Forbidden(profile.block_message()));
    }

    let mut tx = pool.begin().await?;
    let reservation = reservations::create(
        &mut tx,
        &NewReservation {
            user_id,
            room_type_id: room.room_type_id,
            quantity: 1,
            assigned_room_id: Some(room.id),
            guests,
            check_in,
            check_out,
            status: ReservationStatus::Confirmed,
            payment_method: None,
            plan_id: None,
            promotion_id: None,
            service_ids: Vec::new(),
        },
    )
    .await?;
    if let Some(code) = reservation.checkin_code.clone() {
        reservations::send_checkin_code(&mut tx, &reservation, &code).await?;
    }
    tx.commit().await?;

    log::info!(
        "Chatbot booked room {} as reservation {} for user {}",
        room.number,
        reservation.id,
        user_id
    );
    *state = ChatState::default();

    let mut reply = ChatReply::new(
        "done",
        format!(
            "Reserva confirmada para la habitación {} ({}) del {} al {}.",
            room.number, room.room_type_name, check_in, check_out
        ),
    );
    reply.reservation = Some(ChatReservation {
        id: reservation.id,
        room: room.number,
        room_type: room.room_type_name,
        check_in,
        check_out,
        guests,
        amount: reservation.amount,
    });
    Ok(reply)
}

fn stay_is_bookable(check_in: NaiveDate, check_out: NaiveDate) -> bool {
    check_out > check_in && check_in >= Utc::now().date_naive()
}

/// The signed-in or named user if active, else the shared guest account.
async fn booking_user(pool: &SqlitePool, user_id: Option<i64>) -> Result<i64> {
    if let Some(id) = user_id {
        match accounts::find_user(pool, id).await {
            Ok(user) if user.is_active => return Ok(user.id),
            Ok(user) => log::warn!(
                "Chatbot request named inactive user {}; booking as {}",
                user.username,
                GUEST_ACCOUNT
            ),
            Err(AppError::NotFound(_)) => {
                log::warn!("Chatbot request named unknown user {}", id)
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(user) = accounts::find_by_username(pool, GUEST_ACCOUNT).await? {
        return Ok(user.id);
    }

    let password = security::random_token();
    let mut conn = pool.acquire().await?;
    let user = accounts::create_user(
        &mut conn,
        NewUser {
            username: GUEST_ACCOUNT,
            email: "",
            password: &password,
            first_name: "Invitado",
            is_staff: false,
            is_superuser: false,
            is_active: true,
        },
    )
    .await?;
    log::info!("Created shared chatbot guest account {}", user.id);
    Ok(user.id)
}

//! Canned answers about the hotel, matched by keyword.

pub const CHECK_IN_TIME: &str = "15:00";
pub const CHECK_OUT_TIME: &str = "11:00";

const MAX_LISTED_SERVICES: usize = 15;

const PRICE: [&str; 5] = ["precio", "coste", "cuanto cuesta", "tarifa", "valor"];
const ARRIVAL: [&str; 5] = ["check-in", "check in", "entrada", "ingreso", "llegada"];
const DEPARTURE: [&str; 3] = ["check-out", "check out", "salida"];
const LOCATION: [&str; 11] = [
    "direccion",
    "dirección",
    "donde estan",
    "dónde están",
    "ubicacion",
    "ubicación",
    "como llegar",
    "cómo llegar",
    "telefono",
    "teléfono",
    "contacto",
];
const SERVICES: [&str; 5] = ["servicios", "amenidades", "amenities", "que ofrecen", "qué ofrecen"];
const WIFI: [&str; 3] = ["wifi", "wi-fi", "wi fi"];
const PARKING: [&str; 3] = ["estacionamiento", "parking", "aparcamiento"];
const POOL: [&str; 2] = ["piscina", "pileta"];
const SPA: [&str; 2] = ["spa", "masajes"];
const GYM: [&str; 3] = ["gimnasio", "gym", "fitness"];
const PETS: [&str; 4] = ["mascotas", "pet", "perros", "gatos"];
const CANCELLATION: [&str; 5] = ["cancel", "cancelar", "cancelación", "politica", "política"];
const SCHEDULE: [&str; 5] = ["horario", "a que hora", "a qué hora", "cuando abren", "cuándo abren"];
const CHILDREN: [&str; 5] = ["niños", "ninos", "cuna", "familia", "menores"];

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Answer to a frequently asked question, or `None` when nothing matches.
///
/// `services` are the names of the catalog services, used for the amenities answer.
pub fn answer(message: &str, services: &[String]) -> Option<String> {
    let text = message.to_lowercase();
    if text.trim().is_empty() {
        return None;
    }

    if mentions(&text, &PRICE) {
        return Some(
            "Los precios varían según fechas, tipo de habitación y disponibilidad. \
             Si quieres, te ayudo a consultarlo: dime tus fechas (YYYY-MM-DD a YYYY-MM-DD), \
             el tipo (simple/doble/suite/presidencial) y la cantidad de huéspedes."
                .to_string(),
        );
    }

    match (mentions(&text, &ARRIVAL), mentions(&text, &DEPARTURE)) {
        (true, true) => {
            return Some(format!(
                "El check-in es a partir de las {} y el check-out hasta las {}.",
                CHECK_IN_TIME, CHECK_OUT_TIME
            ))
        }
        (true, false) => return Some(format!("El check-in es a partir de las {}.", CHECK_IN_TIME)),
        (false, true) => return Some(format!("El check-out es hasta las {}.", CHECK_OUT_TIME)),
        (false, false) => {}
    }

    if mentions(&text, &LOCATION) {
        return Some(
            "Puedes encontrar nuestra dirección, mapa y datos de contacto en la página de Contacto. \
             Si deseas, puedo ayudarte con una reserva ahora mismo."
                .to_string(),
        );
    }

    if mentions(&text, &SERVICES) {
        if services.is_empty() {
            return Some(
                "Contamos con Wi-Fi gratuito, desayuno disponible, estacionamiento sujeto a \
                 disponibilidad y piscina. ¿Te ayudo a reservar?"
                    .to_string(),
            );
        }
        let mut listed = services
            .iter()
            .take(MAX_LISTED_SERVICES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if services.len() > MAX_LISTED_SERVICES {
            listed.push('…');
        }
        return Some(format!(
            "Ofrecemos: {}. ¿Te gustaría reservar o conocer disponibilidad?",
            listed
        ));
    }

    if mentions(&text, &WIFI) {
        return Some("Sí, ofrecemos Wi-Fi gratuito en todo el hotel.".to_string());
    }
    if text.contains("desayuno") {
        return Some(
            "El desayuno está disponible. En algunas tarifas puede estar incluido y en otras \
             tiene costo adicional."
                .to_string(),
        );
    }
    if mentions(&text, &PARKING) {
        let listed = services.iter().any(|s| {
            let s = s.to_lowercase();
            s.contains("estacion") || s.contains("parking")
        });
        return Some(if listed {
            "Disponemos de estacionamiento (sujeto a disponibilidad).".to_string()
        } else {
            "Contamos con estacionamiento sujeto a disponibilidad.".to_string()
        });
    }
    if mentions(&text, &POOL) {
        return Some("Sí, contamos con piscina. Los horarios pueden variar según la temporada.".to_string());
    }
    if mentions(&text, &SPA) {
        return Some(
            "Disponemos de spa con servicios bajo reserva. ¿Te gustaría agendar durante tu estadía?"
                .to_string(),
        );
    }
    if mentions(&text, &GYM) {
        return Some("Tenemos gimnasio disponible para huéspedes.".to_string());
    }
    if mentions(&text, &PETS) {
        return Some(
            "La admisión de mascotas está sujeta a disponibilidad y condiciones. \
             Consulta con recepción para más detalles."
                .to_string(),
        );
    }
    if mentions(&text, &CANCELLATION) {
        return Some(
            "Manejamos políticas flexibles según la tarifa. Si reservas aquí, te indicaremos \
             las condiciones antes de confirmar."
                .to_string(),
        );
    }
    if mentions(&text, &SCHEDULE) {
        return Some(
            "Nuestros horarios varían según el servicio. ¿Sobre qué servicio te gustaría saber \
             el horario? (recepción, piscina, spa, restaurante)"
                .to_string(),
        );
    }
    if mentions(&text, &CHILDREN) {
        return Some(
            "Recibimos familias y contamos con opciones para niños según disponibilidad. \
             Podemos preparar cunas bajo solicitud."
                .to_string(),
        );
    }

    None
}

//! The conversational state machine.
//!
//! Rules run in priority order against the trimmed, lower-cased input:
//! reset command, interests prompt, interests capture, pending-event
//! confirmation/cancellation, recommendation, then LLM fallback. Every
//! branch that mutates state persists it before the reply is returned, and
//! no collaborator failure ever aborts the turn.

use std::sync::Arc;

use chrono::DateTime;

use crate::completion::COMPLETION_FALLBACK;
use crate::services::{CalendarBooking, CompletionModel, EventCatalog, StateStore};
use crate::types::{ConversationPhase, Event, EventRef, UserState};

pub const INTERESTS_PROMPT: &str = "¡Hola! Para recomendarte eventos, dime tus temas de interés separados por comas (por ejemplo: ia, cloud, marketing).";
pub const INTERESTS_CLARIFY: &str = "No he reconocido ningún tema. Escribe tus intereses separados por comas, por ejemplo: ia, cloud, marketing.";
pub const NO_MATCHING_EVENTS: &str = "No he encontrado eventos que coincidan con tus intereses.";
pub const NOT_BOOKED: &str = "De acuerdo, no lo agendo.";
pub const COULD_NOT_BOOK: &str = "No he podido agendar el evento en tu calendario.";
pub const COULD_NOT_RETRIEVE: &str =
    "No he podido recuperar el evento recomendado. Pídeme otra recomendación.";

const AFFIRMATIVE_TOKENS: [&str; 5] = ["sí", "si", "yes", "claro", "por supuesto"];
const NEGATIVE_TOKENS: [&str; 3] = ["no", "nop", "nope"];
const RECOMMEND_TRIGGERS: [&str; 2] = ["recomiend", "recommend"];
const RESET_TOKENS: [&str; 2] = ["reset", "reiniciar"];

fn is_affirmative(input: &str) -> bool {
    AFFIRMATIVE_TOKENS.contains(&input)
}

fn is_negative(input: &str) -> bool {
    NEGATIVE_TOKENS.contains(&input)
}

fn wants_recommendation(input: &str) -> bool {
    RECOMMEND_TRIGGERS
        .iter()
        .any(|trigger| input.contains(trigger))
}

fn is_reset(input: &str) -> bool {
    RESET_TOKENS.contains(&input)
}

/// Comma-separated interest tags: trimmed, empties dropped, order-preserving
/// dedupe.
pub fn parse_interests(input: &str) -> Vec<String> {
    let mut interests = Vec::new();
    for token in input.split(',') {
        let tag = token.trim();
        if tag.is_empty() {
            continue;
        }
        if !interests.iter().any(|existing: &String| existing == tag) {
            interests.push(tag.to_string());
        }
    }
    interests
}

fn display_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%d/%m a las %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn interests_confirmed(interests: &[String]) -> String {
    format!(
        "¡Perfecto! He registrado tus intereses: {}. Cuando quieras, pídeme que te recomiende un evento.",
        interests.join(", ")
    )
}

fn recommendation_reply(event: &Event) -> String {
    format!(
        "Te recomiendo \"{}\" en la sala {} el {}. ¿Quieres que lo agende? (sí/no)",
        event.name,
        event.room,
        display_time(&event.time)
    )
}

fn booked_reply(event: &Event) -> String {
    format!("¡Listo! He agendado \"{}\" en tu calendario.", event.name)
}

fn registered_reply(event: &Event) -> String {
    format!(
        "He apuntado tu asistencia a \"{}\" (sin integración de calendario).",
        event.name
    )
}

pub struct ConversationEngine {
    store: Arc<dyn StateStore>,
    catalog: Option<Arc<dyn EventCatalog>>,
    calendar: Option<Arc<dyn CalendarBooking>>,
    completion: Option<Arc<dyn CompletionModel>>,
}

impl ConversationEngine {
    pub fn new(
        store: Arc<dyn StateStore>,
        catalog: Option<Arc<dyn EventCatalog>>,
        calendar: Option<Arc<dyn CalendarBooking>>,
        completion: Option<Arc<dyn CompletionModel>>,
    ) -> Self {
        Self {
            store,
            catalog,
            calendar,
            completion,
        }
    }

    /// One conversational turn: reads the stored state, applies the
    /// transition rules, persists any mutation, returns the reply text.
    pub async fn handle_message(&self, user_key: &str, text: &str) -> String {
        let state = self.store.get(user_key).await;
        let input = text.trim().to_lowercase();

        if is_reset(&input) {
            self.persist(user_key, UserState::awaiting_interests()).await;
            return INTERESTS_PROMPT.to_string();
        }

        match state.phase {
            ConversationPhase::New => {
                self.persist(user_key, UserState::awaiting_interests()).await;
                INTERESTS_PROMPT.to_string()
            }
            ConversationPhase::AwaitingInterests => {
                let interests = parse_interests(&input);
                if interests.is_empty() {
                    // State untouched so the next message is parsed again.
                    return INTERESTS_CLARIFY.to_string();
                }
                let reply = interests_confirmed(&interests);
                self.persist(user_key, UserState::ready(interests, None)).await;
                reply
            }
            ConversationPhase::Ready {
                interests,
                pending_event,
            } => {
                if let Some(reference) = pending_event.clone() {
                    if is_affirmative(&input) {
                        return self.confirm_booking(user_key, interests, &reference).await;
                    }
                    if is_negative(&input) {
                        self.persist(user_key, UserState::ready(interests, None)).await;
                        return NOT_BOOKED.to_string();
                    }
                }
                if wants_recommendation(&input) {
                    return self.recommend(user_key, interests).await;
                }
                self.free_form_reply(text.trim()).await
            }
        }
    }

    async fn recommend(&self, user_key: &str, interests: Vec<String>) -> String {
        let matches = match &self.catalog {
            Some(catalog) => catalog.find_by_interests(&interests).await,
            None => {
                tracing::warn!("recommendation requested but no catalog is configured");
                vec![]
            }
        };
        let Some(top) = matches.first() else {
            return NO_MATCHING_EVENTS.to_string();
        };
        let reply = recommendation_reply(top);
        self.persist(user_key, UserState::ready(interests, Some(top.reference())))
            .await;
        reply
    }

    async fn confirm_booking(
        &self,
        user_key: &str,
        interests: Vec<String>,
        reference: &EventRef,
    ) -> String {
        let fetched = match &self.catalog {
            Some(catalog) => catalog.fetch(reference).await,
            None => None,
        };

        let reply = match fetched {
            Some(event) => match &self.calendar {
                Some(calendar) => {
                    if calendar.create_event(&event).await {
                        booked_reply(&event)
                    } else {
                        COULD_NOT_BOOK.to_string()
                    }
                }
                None => registered_reply(&event),
            },
            None => COULD_NOT_RETRIEVE.to_string(),
        };

        // The pending reference is cleared whatever the booking outcome.
        self.persist(user_key, UserState::ready(interests, None)).await;
        reply
    }

    async fn free_form_reply(&self, text: &str) -> String {
        match &self.completion {
            Some(completion) => completion.complete(text).await,
            None => COMPLETION_FALLBACK.to_string(),
        }
    }

    async fn persist(&self, user_key: &str, state: UserState) {
        self.store.put(user_key, &state).await;
    }
}

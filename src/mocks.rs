//! In-memory collaborator implementations for tests.
//!
//! [`crate::store::MemoryStateStore`] covers the state store; this module
//! provides the remaining seams.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use crate::catalog::{rank_events, topics_match};
use crate::services::{CalendarBooking, CompletionModel, EventCatalog};
use crate::types::{Event, EventRef};

/// Catalog over a fixed slice of events, ranked with the production policy.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    events: Vec<Event>,
}

impl StaticCatalog {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl EventCatalog for StaticCatalog {
    async fn find_by_interests(&self, interests: &[String]) -> Vec<Event> {
        let matches = self
            .events
            .iter()
            .filter(|event| topics_match(&event.topics, interests))
            .cloned()
            .collect();
        rank_events(matches)
    }

    async fn fetch(&self, reference: &EventRef) -> Option<Event> {
        self.events
            .iter()
            .find(|event| event.id == reference.event_id && event.room == reference.room)
            .cloned()
    }
}

/// Records every booking attempt; can be switched to reject them all.
#[derive(Clone)]
pub struct RecordingCalendar {
    accept: Arc<AtomicBool>,
    booked: Arc<Mutex<Vec<String>>>,
}

impl Default for RecordingCalendar {
    fn default() -> Self {
        Self {
            accept: Arc::new(AtomicBool::new(true)),
            booked: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RecordingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A calendar that fails every booking.
    pub fn rejecting() -> Self {
        let calendar = Self::default();
        calendar.accept.store(false, Ordering::SeqCst);
        calendar
    }

    pub fn booked_ids(&self) -> Vec<String> {
        self.booked.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarBooking for RecordingCalendar {
    async fn create_event(&self, event: &Event) -> bool {
        self.booked.lock().unwrap().push(event.id.clone());
        self.accept.load(Ordering::SeqCst)
    }
}

/// Completion model that always answers with the same text.
#[derive(Clone)]
pub struct CannedCompletion {
    reply: String,
}

impl CannedCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl CompletionModel for CannedCompletion {
    async fn complete(&self, _user_text: &str) -> String {
        self.reply.clone()
    }
}

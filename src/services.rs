//! Collaborator seams for the conversation engine.
//!
//! One trait per external service so tests can swap in the in-memory
//! implementations from [`crate::mocks`]. Every operation absorbs its own
//! failures: the engine never sees an error from a collaborator, only a
//! degraded value (empty state, empty result set, `false`, fallback text).

use async_trait::async_trait;

use crate::types::{Event, EventRef, UserState};

/// Per-user state blob persistence. Missing keys and backing-store errors
/// both degrade to the empty state; writes are best-effort.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, user_key: &str) -> UserState;

    /// Upserts the blob, stamping `lastUpdated`. A lost update is acceptable,
    /// a crashed turn is not.
    async fn put(&self, user_key: &str, state: &UserState);
}

/// Read-only event catalog lookups.
#[async_trait]
pub trait EventCatalog: Send + Sync {
    /// Events whose topics intersect the given interests (case-insensitive),
    /// ranked by descending popularity then ascending time, capped at the
    /// top 3. Catalog errors degrade to an empty result.
    async fn find_by_interests(&self, interests: &[String]) -> Vec<Event>;

    /// Looks up a single event by its stored reference. Not-found and
    /// backing-store errors both yield `None`.
    async fn fetch(&self, reference: &EventRef) -> Option<Event>;
}

/// Best-effort calendar entry creation.
#[async_trait]
pub trait CalendarBooking: Send + Sync {
    /// Returns whether the entry was created. Failures are logged by the
    /// implementation and reported to the user as "could not book".
    async fn create_event(&self, event: &Event) -> bool;
}

/// Hosted text-completion fallback for free-form messages.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Generated reply for the utterance, or the fixed fallback string on
    /// any failure. Never raises.
    async fn complete(&self, user_text: &str) -> String;
}

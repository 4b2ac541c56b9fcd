//! Event catalog lookups backed by the `events` table.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::services::EventCatalog;
use crate::types::{Event, EventRef};

/// How many ranked matches a recommendation turn may present.
pub const MAX_RECOMMENDATIONS: usize = 3;

/// Ranking policy: descending popularity, ties broken by ascending start
/// time, capped at [`MAX_RECOMMENDATIONS`]. Times are RFC 3339 strings, so
/// lexical comparison is chronological.
pub fn rank_events(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| {
        let pop_a = a.popularity.unwrap_or(0);
        let pop_b = b.popularity.unwrap_or(0);
        pop_b.cmp(&pop_a).then_with(|| a.time.cmp(&b.time))
    });
    events.truncate(MAX_RECOMMENDATIONS);
    events
}

/// Case-insensitive intersection between an event's topics and the user's
/// interest tags.
pub fn topics_match(topics: &[String], interests: &[String]) -> bool {
    topics.iter().any(|topic| {
        interests
            .iter()
            .any(|interest| topic.eq_ignore_ascii_case(interest))
    })
}

pub struct PgEventCatalog {
    pool: PgPool,
}

impl PgEventCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str =
    "id, room, name, starts_at, ends_at, topics, description, popularity";

fn event_from_row(row: &sqlx::postgres::PgRow) -> Event {
    let topics: serde_json::Value = row.get("topics");
    let topics = serde_json::from_value::<Vec<String>>(topics).unwrap_or_default();
    Event {
        id: row.get("id"),
        room: row.get("room"),
        name: row.get("name"),
        time: row.get("starts_at"),
        end_time: row.get("ends_at"),
        topics,
        description: row.get("description"),
        popularity: row.get("popularity"),
    }
}

#[async_trait]
impl EventCatalog for PgEventCatalog {
    async fn find_by_interests(&self, interests: &[String]) -> Vec<Event> {
        if interests.is_empty() {
            return vec![];
        }
        let lowered = interests
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .collect::<Vec<_>>();

        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE EXISTS (\
                 SELECT 1 FROM jsonb_array_elements_text(topics) AS topic \
                 WHERE lower(topic) = ANY($1)\
             )"
        ))
        .bind(&lowered)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => rank_events(rows.iter().map(event_from_row).collect()),
            Err(err) => {
                tracing::warn!(%err, "catalog query failed, reporting no events");
                vec![]
            }
        }
    }

    async fn fetch(&self, reference: &EventRef) -> Option<Event> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 AND room = $2"
        ))
        .bind(&reference.event_id)
        .bind(&reference.room)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some(row)) => Some(event_from_row(&row)),
            Ok(None) => {
                tracing::warn!(event_id = %reference.event_id, "referenced event no longer in catalog");
                None
            }
            Err(err) => {
                tracing::warn!(%err, event_id = %reference.event_id, "event fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, popularity: i64, time: &str) -> Event {
        Event {
            id: id.to_string(),
            room: "sala-1".to_string(),
            name: id.to_uppercase(),
            time: format!("2026-09-01T{time}:00Z"),
            end_time: None,
            topics: vec!["ia".to_string()],
            description: None,
            popularity: Some(popularity),
        }
    }

    #[test]
    fn ranks_by_popularity_then_earliest_start() {
        let ranked = rank_events(vec![
            event("a", 50, "10:00"),
            event("b", 90, "09:00"),
            event("c", 90, "08:00"),
        ]);
        let order = ranked.iter().map(|e| e.id.as_str()).collect::<Vec<_>>();
        assert_eq!(order, ["c", "b", "a"]);
    }

    #[test]
    fn caps_results_at_three() {
        let ranked = rank_events(vec![
            event("a", 1, "08:00"),
            event("b", 2, "08:00"),
            event("c", 3, "08:00"),
            event("d", 4, "08:00"),
        ]);
        assert_eq!(ranked.len(), MAX_RECOMMENDATIONS);
        assert_eq!(ranked[0].id, "d");
    }

    #[test]
    fn missing_popularity_sorts_last() {
        let mut unpopular = event("x", 0, "07:00");
        unpopular.popularity = None;
        let ranked = rank_events(vec![unpopular, event("y", 10, "09:00")]);
        assert_eq!(ranked[0].id, "y");
    }

    #[test]
    fn topic_intersection_ignores_case() {
        let topics = vec!["IA".to_string(), "Cloud".to_string()];
        assert!(topics_match(&topics, &["ia".to_string()]));
        assert!(!topics_match(&topics, &["marketing".to_string()]));
    }
}

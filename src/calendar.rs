//! Best-effort calendar entry creation over HTTP.

use async_trait::async_trait;
use serde_json::json;

use crate::services::CalendarBooking;
use crate::types::Event;

pub struct HttpCalendar {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCalendar {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn post_event(&self, event: &Event) -> Result<(), String> {
        let mut request = self
            .client
            .post(format!("{}/events", self.base_url))
            .json(&json!({
                "subject": event.name,
                "body": event.description,
                "location": event.room,
                "start": { "dateTime": event.time },
                "end": { "dateTime": event.end_time },
            }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| format!("calendar request failed: {err}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("calendar returned {status}: {body}"));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarBooking for HttpCalendar {
    async fn create_event(&self, event: &Event) -> bool {
        match self.post_event(event).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, event_id = %event.id, "calendar booking failed");
                false
            }
        }
    }
}

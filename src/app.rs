//! HTTP surface: the inbound activity webhook, the health probe, and
//! process startup. All integrations are optional — a missing credential
//! degrades that capability instead of failing startup.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::calendar::HttpCalendar;
use crate::catalog::PgEventCatalog;
use crate::completion::OpenAiCompletion;
use crate::engine::ConversationEngine;
use crate::services::{CalendarBooking, CompletionModel, EventCatalog, StateStore};
use crate::store::{MemoryStateStore, PgStateStore, RetryPolicy};
use crate::types::{Activity, ChannelAccount};

/// Sent when turn processing blows up past the engine. Matches the source
/// bot's on-error message.
pub const GENERIC_ERROR_REPLY: &str = "Lo siento, parece que algo salió mal.";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_chat_model: String,
    pub calendar_api_url: Option<String>,
    pub calendar_api_token: Option<String>,
    pub app_id: String,
    pub app_password: String,
    pub bot_name: String,
}

fn non_empty(value: Result<String, env::VarError>) -> Option<String> {
    value.ok().filter(|v| !v.trim().is_empty())
}

fn resolve_database_url() -> Option<String> {
    if let Some(url) = non_empty(env::var("DATABASE_URL")) {
        return Some(url);
    }
    // Compose from POSTGRES_* parts only when a host is actually set;
    // otherwise the service runs without persistence.
    let host = non_empty(env::var("POSTGRES_HOST").or_else(|_| env::var("PGHOST")))?;
    let port = env::var("POSTGRES_PORT")
        .or_else(|_| env::var("PGPORT"))
        .unwrap_or_else(|_| "5432".to_string());
    let user = env::var("POSTGRES_USER")
        .or_else(|_| env::var("PGUSER"))
        .unwrap_or_else(|_| "postgres".to_string());
    let password = env::var("POSTGRES_PASSWORD")
        .or_else(|_| env::var("PGPASSWORD"))
        .unwrap_or_default();
    let db = env::var("POSTGRES_DB")
        .or_else(|_| env::var("PGDATABASE"))
        .unwrap_or_else(|_| "eventbot".to_string());
    Some(format!("postgres://{user}:{password}@{host}:{port}/{db}"))
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3978);
        Self {
            port,
            database_url: resolve_database_url(),
            openai_api_key: non_empty(env::var("OPENAI_API_KEY")),
            openai_chat_model: env::var("OPENAI_CHAT_MODEL")
                .unwrap_or_else(|_| "gpt-4.1".to_string()),
            calendar_api_url: non_empty(env::var("CALENDAR_API_URL")),
            calendar_api_token: non_empty(env::var("CALENDAR_API_TOKEN")),
            app_id: env::var("MicrosoftAppId")
                .or_else(|_| env::var("MICROSOFT_APP_ID"))
                .unwrap_or_else(|_| "eventbot".to_string()),
            app_password: env::var("MicrosoftAppPassword")
                .or_else(|_| env::var("MICROSOFT_APP_PASSWORD"))
                .unwrap_or_default(),
            bot_name: env::var("BOT_NAME").unwrap_or_else(|_| "Evi".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub app_id: String,
    pub name: String,
}

pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub bot: BotIdentity,
    pub database_available: bool,
    pub calendar_available: bool,
    pub completion_available: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/messages", post(receive_activity))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn availability(configured: bool) -> &'static str {
    if configured {
        "available"
    } else {
        "unavailable"
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "database": availability(state.database_available),
        "calendar": availability(state.calendar_available),
        "completion": availability(state.completion_available),
    }))
}

fn reply_activity(bot: &BotIdentity, inbound: &Activity, text: String) -> Activity {
    Activity {
        activity_type: "message".to_string(),
        id: Some(Uuid::new_v4().to_string()),
        timestamp: Some(Utc::now().to_rfc3339()),
        text: Some(text),
        from: Some(ChannelAccount {
            id: bot.app_id.clone(),
            name: bot.name.clone(),
        }),
        recipient: inbound.from.clone(),
        conversation: inbound.conversation.clone(),
        reply_to_id: inbound.id.clone(),
        service_url: inbound.service_url.clone(),
    }
}

/// Inbound adapter. Rejects non-JSON bodies and malformed envelopes early;
/// everything after that is acknowledged with 200, even when the turn itself
/// fails, so the channel does not retry-storm the service.
async fn receive_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(json!({ "error": "content type must be application/json" })),
        )
            .into_response();
    }

    let activity = match serde_json::from_slice::<Activity>(&body) {
        Ok(activity) => activity,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid activity envelope: {err}") })),
            )
                .into_response();
        }
    };

    if activity.activity_type != "message" {
        tracing::debug!(activity_type = %activity.activity_type, "ignoring non-message activity");
        return (StatusCode::OK, Json(json!({}))).into_response();
    }

    // State is keyed by the channel's stable sender id alone, so a user's
    // interests survive across conversations.
    let user_key = activity
        .from
        .as_ref()
        .map(|from| from.id.trim().to_string())
        .filter(|id| !id.is_empty());
    let Some(user_key) = user_key else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "activity has no sender id" })),
        )
            .into_response();
    };

    let text = activity.text.clone().unwrap_or_default();
    let engine = state.engine.clone();
    let turn = tokio::spawn(async move { engine.handle_message(&user_key, &text).await });

    let reply_text = match turn.await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!(%err, "turn processing panicked, sending generic apology");
            GENERIC_ERROR_REPLY.to_string()
        }
    };

    (
        StatusCode::OK,
        Json(reply_activity(&state.bot, &activity, reply_text)),
    )
        .into_response()
}

async fn connect_pool(database_url: &str) -> Option<PgPool> {
    match PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
    {
        Ok(pool) => {
            if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
                tracing::warn!(%err, "migrations failed, continuing with existing schema");
            }
            Some(pool)
        }
        Err(err) => {
            tracing::warn!(%err, "database unavailable, state will not be persisted");
            None
        }
    }
}

pub async fn run() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventbot=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();

    let pool = match &config.database_url {
        Some(url) => connect_pool(url).await,
        None => {
            tracing::info!("no database configured, state kept in memory");
            None
        }
    };

    let store: Arc<dyn StateStore> = match &pool {
        Some(pool) => Arc::new(PgStateStore::new(pool.clone(), RetryPolicy::default())),
        None => Arc::new(MemoryStateStore::new()),
    };
    let catalog: Option<Arc<dyn EventCatalog>> = pool
        .clone()
        .map(|pool| Arc::new(PgEventCatalog::new(pool)) as Arc<dyn EventCatalog>);
    let calendar: Option<Arc<dyn CalendarBooking>> = config.calendar_api_url.clone().map(|url| {
        Arc::new(HttpCalendar::new(url, config.calendar_api_token.clone()))
            as Arc<dyn CalendarBooking>
    });
    let completion: Option<Arc<dyn CompletionModel>> = config.openai_api_key.clone().map(|key| {
        Arc::new(OpenAiCompletion::new(
            key,
            config.openai_chat_model.clone(),
            &config.bot_name,
        )) as Arc<dyn CompletionModel>
    });

    let state = Arc::new(AppState {
        engine: Arc::new(ConversationEngine::new(
            store,
            catalog,
            calendar.clone(),
            completion.clone(),
        )),
        bot: BotIdentity {
            app_id: config.app_id.clone(),
            name: config.bot_name.clone(),
        },
        database_available: pool.is_some(),
        calendar_available: calendar.is_some(),
        completion_available: completion.is_some(),
    });

    let app = router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind TCP listener");

    tracing::info!(%addr, "eventbot listening");
    axum::serve(listener, app)
        .await
        .expect("server runtime failure");
}

//! FinBuddy Webhook Server
//!
//! Axum-based webhook endpoint for WhatsApp (via whapi.cloud):
//! - GET /webhook handles the hub verification handshake
//! - POST /webhook receives inbound messages, dispatches each one through
//!   the intent pipeline, and sends the reply back out
//!
//! Gateways redeliver on slow responses, so inbound message ids are
//! deduplicated over a bounded window.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use finbuddy_core::{Database, Dispatcher, ModelBackend, ModelClient};

mod whatsapp;

pub use whatsapp::{MessageTransport, WhapiClient};

/// How many recently seen message ids are remembered for dedup
const DEDUP_WINDOW: usize = 100;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Token the gateway must echo in the verification handshake
    pub verify_token: String,
}

impl ServerConfig {
    /// Read configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let verify_token = std::env::var("WEBHOOK_VERIFY_TOKEN")
            .map_err(|_| anyhow::anyhow!("WEBHOOK_VERIFY_TOKEN is not set"))?;
        Ok(Self { verify_token })
    }
}

/// Bounded FIFO set of recently seen message ids
struct SeenMessages {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl SeenMessages {
    fn new() -> Self {
        Self {
            order: VecDeque::with_capacity(DEDUP_WINDOW),
            set: HashSet::with_capacity(DEDUP_WINDOW),
        }
    }

    /// Record an id; returns false when it was already present
    fn insert(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        self.order.push_back(id.to_string());
        self.set.insert(id.to_string());
        while self.order.len() > DEDUP_WINDOW {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        true
    }
}

/// Shared application state
pub struct AppState {
    pub dispatcher: Dispatcher<ModelClient>,
    pub transport: Arc<dyn MessageTransport>,
    pub config: ServerConfig,
    seen: Mutex<SeenMessages>,
}

/// Hub verification query parameters
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Inbound webhook payload (whapi.cloud shape)
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub from_me: bool,
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Create the application router
pub fn create_router(
    dispatcher: Dispatcher<ModelClient>,
    transport: Arc<dyn MessageTransport>,
    config: ServerConfig,
) -> Router {
    let state = Arc::new(AppState {
        dispatcher,
        transport,
        config,
        seen: Mutex::new(SeenMessages::new()),
    });

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "service": "finbuddy", "status": "running" }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // A pooled connection that answers SELECT 1 means the db is usable
    let db_ok = state
        .dispatcher
        .db()
        .conn()
        .and_then(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(Into::into)
        })
        .is_ok();

    if db_ok {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "degraded" })),
        )
    }
}

/// Hub verification handshake: echo the challenge when the token matches
async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let token_ok = params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(state.config.verify_token.as_str());

    if token_ok {
        if let Some(challenge) = params.challenge {
            info!("Webhook verification succeeded");
            return (StatusCode::OK, challenge).into_response();
        }
    }

    warn!("Webhook verification rejected");
    (StatusCode::FORBIDDEN, "verification failed").into_response()
}

/// Inbound message delivery.
///
/// Always acknowledges with 200 once the payload parses; a failed outbound
/// send is logged, not surfaced, so the gateway doesn't redeliver a message
/// we already processed.
async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    for message in payload.messages {
        if message.from_me {
            continue;
        }
        if message.kind != "text" {
            info!(kind = %message.kind, "Skipping non-text message");
            continue;
        }
        let Some(text) = message.text.as_ref().map(|t| t.body.as_str()) else {
            continue;
        };

        let fresh = {
            let mut seen = match state.seen.lock() {
                Ok(guard) => guard,
                Err(_) => continue,
            };
            seen.insert(&message.id)
        };
        if !fresh {
            info!(id = %message.id, "Skipping duplicate delivery");
            continue;
        }

        let reply = state.dispatcher.handle_message(&message.from, text).await;
        if let Err(e) = state.transport.send_text(&message.from, &reply).await {
            warn!(to = %message.from, "Failed to send reply: {}", e);
        }
    }

    (StatusCode::OK, Json(serde_json::json!({ "success": true })))
}

/// Start the webhook server
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    let model = ModelClient::from_env()
        .ok_or_else(|| anyhow::anyhow!("No model backend configured (set GEMINI_API_KEY or MODEL_BACKEND)"))?;

    if model.health_check().await {
        info!("Model backend connected: {} ({})", model.host(), model.model());
    } else {
        warn!(
            "Model backend configured but not responding: {} ({})",
            model.host(),
            model.model()
        );
    }

    let transport: Arc<dyn MessageTransport> = Arc::new(
        WhapiClient::from_env().ok_or_else(|| anyhow::anyhow!("WHAPI_TOKEN is not set"))?,
    );

    let dispatcher = Dispatcher::new(db, model);
    let app = create_router(dispatcher, transport, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting webhook server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! HTTP surface of the doorstate daemon.
//!
//! Four routes: the space status document at `/`, the door status summary
//! at `/door/`, claim submission via POST to the same path, and the period
//! history at `/door/all/`. Claims arrive as JSON or form-encoded bodies;
//! both spellings with and without the trailing slash are served.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::async_trait;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::{Form, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use doorstate_core::{ClaimValidator, DoorStatus, DoorstateError, OpeningPeriod};
use doorstate_protocol::{
    DoorClaim, FieldErrors, HistoryQuery, StatusReply, HISTORY_DEFAULT_LOOKBACK_DAYS,
};

use crate::db::Db;
use crate::door_store;
use crate::space::{self, SpaceConfig};

type ErrorReply = (StatusCode, Json<FieldErrors>);

pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

/// Shared handler state. The claim lock serializes the read-decide-write
/// sequence for claims; reads go straight to the store.
pub struct AppState {
    db: Db,
    validator: ClaimValidator,
    space: SpaceConfig,
    claim_lock: Mutex<()>,
}

impl AppState {
    pub fn new(db: Db, validator: ClaimValidator, space: SpaceConfig) -> Self {
        Self {
            db,
            validator,
            space,
            claim_lock: Mutex::new(()),
        }
    }
}

/// Binds the listener and serves in a background task.
///
/// Returns the bound address (port 0 works for tests) and a sender that
/// shuts the server down gracefully when dropped or fired.
pub async fn run(
    config: ServerConfig,
    state: Arc<AppState>,
) -> Result<(SocketAddr, oneshot::Sender<()>), String> {
    let app = router(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| format!("Failed to bind {}: {}", addr, err))?;
    let local_addr = listener
        .local_addr()
        .map_err(|err| format!("Failed to read local address: {}", err))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = serve.await {
            error!(error = %err, "HTTP server terminated");
        }
    });

    info!(address = %local_addr, "doorstate daemon listening");
    Ok((local_addr, shutdown_tx))
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(space_root))
        .route("/health", get(health))
        .route("/door", get(door_status).post(submit_claim))
        .route("/door/", get(door_status).post(submit_claim))
        .route("/door/all", get(door_history))
        .route("/door/all/", get(door_history))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn space_root(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ErrorReply> {
    let status =
        door_store::current_status(&state.db, Utc::now().timestamp()).map_err(internal_error)?;
    Ok(Json(space::space_document(&state.space, &status)))
}

async fn door_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusReply>, ErrorReply> {
    let status =
        door_store::current_status(&state.db, Utc::now().timestamp()).map_err(internal_error)?;
    Ok(Json(status_reply(&status)))
}

async fn submit_claim(
    State(state): State<Arc<AppState>>,
    JsonOrForm(claim): JsonOrForm<DoorClaim>,
) -> Result<Json<StatusReply>, ErrorReply> {
    let now = Utc::now().timestamp();
    let (time, door_state) = state
        .validator
        .validate(
            claim.time.as_deref(),
            claim.state.as_deref(),
            claim.hmac.as_deref(),
            now,
        )
        .map_err(claim_error)?;

    let _guard = state.claim_lock.lock().await;
    let outcome = door_store::handle_claim(&state.db, time, door_state).map_err(claim_error)?;

    info!(
        time,
        state = outcome.state.as_str(),
        changed = outcome.time,
        "Accepted door claim"
    );
    Ok(Json(StatusReply {
        time: outcome.time,
        state: outcome.state.as_str().to_string(),
        text: outcome.text,
    }))
}

async fn door_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<OpeningPeriod>>, ErrorReply> {
    let now = Utc::now().timestamp();
    let from = parse_bound(
        "from",
        query.from.as_deref(),
        now - HISTORY_DEFAULT_LOOKBACK_DAYS * 86_400,
    )?;
    let to = parse_bound("to", query.to.as_deref(), now)?;

    let periods = door_store::history(&state.db, from, to).map_err(internal_error)?;
    Ok(Json(periods))
}

fn status_reply(status: &DoorStatus) -> StatusReply {
    StatusReply {
        time: status.time,
        state: status.state.as_str().to_string(),
        text: status.text.clone(),
    }
}

fn parse_bound(field: &'static str, value: Option<&str>, default: i64) -> Result<i64, ErrorReply> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(FieldErrors::new(field, "Has to be an integer timestamp.")),
            )
        }),
    }
}

fn claim_error(err: DoorstateError) -> ErrorReply {
    match err.field() {
        Some(field) => {
            debug!(field, error = %err, "Rejected door claim");
            (
                StatusCode::BAD_REQUEST,
                Json(FieldErrors::new(field, err.to_string())),
            )
        }
        None => internal_error(err.to_string()),
    }
}

fn internal_error(err: String) -> ErrorReply {
    error!(error = %err, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FieldErrors::new("error", "Internal server error")),
    )
}

/// Claim extractor accepting a JSON body or a form-encoded one, chosen by
/// Content-Type, mirroring what door sensors in the field actually send.
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    Form<T>: FromRequest<S, Rejection = FormRejection>,
    T: 'static,
{
    type Rejection = ErrorReply;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            let Json(payload) = Json::<T>::from_request(req, state)
                .await
                .map_err(|err| body_error(err.to_string()))?;
            return Ok(JsonOrForm(payload));
        }

        let Form(payload) = Form::<T>::from_request(req, state)
            .await
            .map_err(|err| body_error(err.to_string()))?;
        Ok(JsonOrForm(payload))
    }
}

fn body_error(message: String) -> ErrorReply {
    (
        StatusCode::BAD_REQUEST,
        Json(FieldErrors::new("body", message)),
    )
}

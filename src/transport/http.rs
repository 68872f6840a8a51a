//! HTTP server: vendor proxy, page fetch and channel API

use crate::catalog::ProviderRegistry;
use crate::config::{Config, FetchConfig};
use crate::conversation::{Attachment, Channel};
use crate::dispatch::Dispatcher;
use crate::fetch::fetch_url_text;
use crate::llm::{AdapterError, AdapterRegistry, ReqwestTransport};
use crate::storage::WorkspaceStore;
use crate::workspace::{TranscriptStore, Workspace, WorkspaceError};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tower_http::cors::{Any, CorsLayer};

/// Shared application state
pub struct AppState {
    /// Sole writer of transcripts; sends are serialized through this lock
    dispatcher: Mutex<Dispatcher>,
    /// Latest workspace published by the dispatcher, for read-only routes
    workspace: watch::Receiver<Workspace>,
    registry: ProviderRegistry,
    adapters: Arc<AdapterRegistry>,
    fetch: FetchConfig,
}

impl AppState {
    pub fn new(mut dispatcher: Dispatcher, fetch: FetchConfig) -> Self {
        let adapters = dispatcher.adapters().clone();
        let registry = *dispatcher.registry();
        let workspace = dispatcher.subscribe();
        Self {
            dispatcher: Mutex::new(dispatcher),
            workspace,
            registry,
            adapters,
            fetch,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    commit: String,
    providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FetchUrlRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct FetchUrlResponse {
    content: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    provider: &'static str,
    provider_name: &'static str,
    id: &'static str,
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'static str>,
    mention: &'static str,
}

#[derive(Debug, Serialize)]
struct ChannelSummary {
    id: String,
    name: String,
    desc: String,
    message_count: usize,
    current: bool,
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachment: Option<Attachment>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Router over `state`; used by [`run_http_server`] and by tests
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/proxy/:provider", post(handle_proxy))
        .route("/api/fetch-url", post(handle_fetch_url))
        .route("/api/gpts/list", post(handle_gpts_list))
        .route("/api/models", get(list_models))
        .route("/api/channels", get(list_channels))
        .route("/api/channels/:id/messages", get(channel_messages))
        .route("/api/channels/:id/send", post(channel_send))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_http_server(config: Config, data_dir: PathBuf) -> Result<()> {
    let store = WorkspaceStore::new(&data_dir)?;
    let workspace = store.load()?;
    tracing::info!("Workspace: {}", store.path().display());

    let adapters = AdapterRegistry::with_defaults(&config, Arc::new(ReqwestTransport::new()));
    let dispatcher = Dispatcher::new(workspace, Arc::new(adapters), config.dispatch.clone())
        .with_store(store);
    let state = Arc::new(AppState::new(dispatcher, config.fetch.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: concat!(env!("CARGO_PKG_VERSION"), env!("TEAMHUB_VERSION_SUFFIX")).to_string(),
        commit: env!("TEAMHUB_GIT_HASH").to_string(),
        providers: state
            .adapters
            .provider_ids()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

async fn handle_proxy(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(key) = api_key(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "API Key required");
    };
    if !state.adapters.contains(&provider) {
        return error_response(StatusCode::BAD_REQUEST, "Unknown provider");
    }

    let mut request: Value = match serde_json::from_slice(&body) {
        Ok(request @ Value::Object(_)) => request,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid request body"),
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
        }
    };
    if let (Some(model), Some(fields)) = (
        headers
            .get("X-Model")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty()),
        request.as_object_mut(),
    ) {
        fields.insert("model".to_string(), Value::String(model.to_string()));
    }

    match state.adapters.forward(&provider, &key, &request).await {
        Ok(normalized) => (StatusCode::OK, Json(normalized)).into_response(),
        Err(AdapterError::UnknownProvider(_)) => {
            error_response(StatusCode::BAD_REQUEST, "Unknown provider")
        }
        Err(e @ AdapterError::InvalidRequest { .. }) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            tracing::warn!("Proxy to {} failed: {}", provider, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn handle_fetch_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FetchUrlRequest>,
) -> Response {
    let transport = state.adapters.transport().clone();
    match fetch_url_text(transport.as_ref(), &req.url, &state.fetch).await {
        Ok(content) => Json(FetchUrlResponse {
            content,
            url: req.url,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn handle_gpts_list(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(key) = api_key(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "API Key required");
    };
    match state.adapters.list_assistants(&key).await {
        Ok(listing) => Json(listing).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelInfo>> {
    let workspace = state.workspace.borrow();
    let models = state
        .registry
        .list_usable(&workspace.credentials)
        .into_iter()
        .map(|m| ModelInfo {
            provider: m.provider.id,
            provider_name: m.provider.name,
            id: m.model.id,
            name: m.model.name,
            tag: m.model.tag,
            mention: m.mention(),
        })
        .collect();
    Json(models)
}

async fn list_channels(State(state): State<Arc<AppState>>) -> Json<Vec<ChannelSummary>> {
    let workspace = state.workspace.borrow();
    let summaries = workspace
        .channels()
        .iter()
        .map(|c: &Channel| ChannelSummary {
            id: c.id.clone(),
            name: c.name.clone(),
            desc: c.desc.clone(),
            message_count: c.messages.len(),
            current: c.id == workspace.current_channel(),
        })
        .collect();
    Json(summaries)
}

async fn channel_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let workspace = state.workspace.borrow();
    if workspace.channel(&id).is_none() {
        return error_response(StatusCode::NOT_FOUND, format!("Channel not found: {}", id));
    }
    Json(workspace.read(&id)).into_response()
}

async fn channel_send(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>,
) -> Response {
    let mut dispatcher = state.dispatcher.lock().await;
    match dispatcher.send(&id, &req.text, req.attachment).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => match e.downcast_ref::<WorkspaceError>() {
            Some(WorkspaceError::ChannelNotFound(_)) => {
                error_response(StatusCode::NOT_FOUND, e.to_string())
            }
            Some(_) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
            None => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
    }
}

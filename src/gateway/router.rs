//! HTTP router and JSON-RPC dispatch
//!
//! One dispatch path for all four task operations: resolve the caller from
//! the current snapshot, consult the policy, resolve the target backend, and
//! forward through the protocol engine. Unary operations return a JSON-RPC
//! response body; `tasks/sendSubscribe` relays the backend's event stream as
//! SSE, preserving order and the exactly-once-final property.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, warn};

use super::auth;
use crate::client::A2aClient;
use crate::config::Config;
use crate::error::rpc_codes;
use crate::protocol::{
    AGENT_CARD_PATH, AgentCapabilities, AgentCard, AgentProvider, AgentSkill, JsonRpcRequest,
    JsonRpcResponse, RequestId, StreamEvent, TaskIdParams, TaskQueryParams, TaskSendParams,
    methods,
};
use crate::store::ConfigStore;
use crate::{Error, Result};

/// Relay deadline for synchronous `tasks/send` forwarding
const RELAY_SEND_DEADLINE: Duration = Duration::from_secs(300);

/// Shared application state
pub struct AppState {
    /// Configuration/authorization store
    pub store: Arc<ConfigStore>,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(AGENT_CARD_PATH, get(agent_card_handler))
        .route("/a2a/{slug}", post(dispatch_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /.well-known/agent.json - the gateway's own agent card
async fn agent_card_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.current();
    Json(build_agent_card(snapshot.config()))
}

/// Build the agent card from the live configuration.
///
/// Field defaults (name, version, modes) are already applied by the config
/// defaulting table, so the card can use them verbatim.
#[must_use]
pub fn build_agent_card(config: &Config) -> AgentCard {
    let a2a = &config.server.a2a;

    let provider = a2a.agent_provider_organization.as_ref().map(|org| AgentProvider {
        organization: org.clone(),
        url: a2a.agent_provider_url.clone(),
    });

    let mut skills: Vec<AgentSkill> = config
        .backends
        .keys()
        .map(|slug| AgentSkill {
            id: slug.clone(),
            name: slug.clone(),
            description: None,
            tags: None,
        })
        .collect();
    skills.sort_by(|a, b| a.id.cmp(&b.id));

    AgentCard {
        name: a2a.agent_name.clone(),
        description: a2a.agent_description.clone(),
        url: format!("http://{}/a2a", config.server.address),
        provider,
        version: a2a.agent_version.clone(),
        documentation_url: a2a.agent_documentation_url.clone(),
        capabilities: AgentCapabilities {
            streaming: true,
            push_notifications: false,
            state_transition_history: false,
        },
        default_input_modes: a2a.default_input_modes.clone(),
        default_output_modes: a2a.default_output_modes.clone(),
        skills,
    }
}

/// What a dispatched method produced.
enum DispatchOutcome {
    /// Unary result value
    Unary(Value),
    /// Live subscription to relay as SSE
    Stream(mpsc::Receiver<Result<StreamEvent>>),
}

/// POST /a2a/{slug} - JSON-RPC dispatch for one backend
async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let request_id = request.id.clone();
    let method = request.method.clone();

    match dispatch(&state, &slug, &headers, request).await {
        Ok(DispatchOutcome::Unary(result)) => {
            Json(JsonRpcResponse::success(request_id, result)).into_response()
        }
        Ok(DispatchOutcome::Stream(rx)) => sse_relay(request_id, rx).into_response(),
        Err(e) => {
            let code = e.to_rpc_code();
            debug!(backend = %slug, method = %method, code, error = %e, "Dispatch failed");
            let status = if code == rpc_codes::UNAUTHORIZED {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::OK
            };
            (
                status,
                Json(JsonRpcResponse::error(Some(request_id), code, e.to_string())),
            )
                .into_response()
        }
    }
}

/// Authorize the caller and forward the operation to the backend.
async fn dispatch(
    state: &AppState,
    slug: &str,
    headers: &HeaderMap,
    request: JsonRpcRequest,
) -> Result<DispatchOutcome> {
    let caller = auth::resolve_caller(&state.store, headers)?;
    auth::authorize(&state.store, &caller, &request.method, slug)?;

    let backend = state.store.resolve_backend(slug)?;
    let client = A2aClient::from_backend(&backend)?;
    let params = request.params.unwrap_or(Value::Null);

    debug!(
        backend = %slug,
        method = %request.method,
        user = caller.user_id().unwrap_or("-"),
        "Relaying task operation"
    );

    match request.method.as_str() {
        methods::TASKS_SEND => {
            let params: TaskSendParams = decode_params(params)?;
            let task = client.send_task(params, RELAY_SEND_DEADLINE).await?;
            Ok(DispatchOutcome::Unary(serde_json::to_value(task)?))
        }
        methods::TASKS_GET => {
            let params: TaskQueryParams = decode_params(params)?;
            let task = client.get_task(params).await?;
            Ok(DispatchOutcome::Unary(serde_json::to_value(task)?))
        }
        methods::TASKS_CANCEL => {
            let params: TaskIdParams = decode_params(params)?;
            let task = client.cancel_task(params).await?;
            Ok(DispatchOutcome::Unary(serde_json::to_value(task)?))
        }
        methods::TASKS_SEND_SUBSCRIBE => {
            let params: TaskSendParams = decode_params(params)?;
            let rx = client.send_task_subscribe(params).await?;
            Ok(DispatchOutcome::Stream(rx))
        }
        other => Err(Error::json_rpc(
            rpc_codes::METHOD_NOT_FOUND,
            format!("unknown method '{other}'"),
        )),
    }
}

/// Decode method params, mapping failures to `INVALID_PARAMS`.
fn decode_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params)
        .map_err(|e| Error::json_rpc(rpc_codes::INVALID_PARAMS, format!("invalid params: {e}")))
}

/// Relay a subscription as an SSE response.
///
/// Each event is wrapped in a JSON-RPC response envelope keyed by the
/// original request id. The stream ends right after the final status update
/// or a terminal error; dropping the response drops the receiver, which the
/// upstream producer observes as cancellation.
fn sse_relay(
    request_id: RequestId,
    mut rx: mpsc::Receiver<Result<StreamEvent>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = stream! {
        while let Some(item) = rx.recv().await {
            match item {
                Ok(event) => {
                    let is_final = event.is_final();
                    match serde_json::to_value(&event) {
                        Ok(value) => {
                            let response = JsonRpcResponse::success(request_id.clone(), value);
                            if let Some(sse_event) = encode_sse(&response) {
                                yield Ok(sse_event);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to encode stream event, dropping");
                        }
                    }
                    if is_final {
                        break;
                    }
                }
                Err(e) => {
                    let response = JsonRpcResponse::error(
                        Some(request_id.clone()),
                        e.to_rpc_code(),
                        e.to_string(),
                    );
                    if let Some(sse_event) = encode_sse(&response) {
                        yield Ok(sse_event);
                    }
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Serialize a JSON-RPC response into an SSE data frame.
fn encode_sse(response: &JsonRpcResponse) -> Option<Event> {
    match serde_json::to_string(response) {
        Ok(data) => Some(Event::default().data(data)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize SSE frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{A2aConfig, BackendConfig};

    #[test]
    fn agent_card_reflects_config() {
        let mut config = Config::from_yaml("server: {}\n").unwrap();
        config.server.address = "127.0.0.1:4000".to_string();
        config.server.a2a = A2aConfig {
            agent_name: "Relay".to_string(),
            agent_description: Some("test".to_string()),
            agent_version: "2.0.0".to_string(),
            agent_provider_organization: Some("Acme".to_string()),
            ..A2aConfig::default()
        };
        config.backends.insert(
            "coder".to_string(),
            BackendConfig {
                url: "http://localhost:1/a2a".to_string(),
                bearer: None,
            },
        );

        let card = build_agent_card(&config);
        assert_eq!(card.name, "Relay");
        assert_eq!(card.version, "2.0.0");
        assert_eq!(card.url, "http://127.0.0.1:4000/a2a");
        assert_eq!(card.provider.unwrap().organization, "Acme");
        assert!(card.capabilities.streaming);
        assert_eq!(card.skills.len(), 1);
        assert_eq!(card.skills[0].id, "coder");
    }

    #[test]
    fn agent_card_defaults_without_a2a_section() {
        let config = Config::from_yaml("server: {}\n").unwrap();
        let card = build_agent_card(&config);
        assert_eq!(card.name, "A2A Gateway Agent");
        assert_eq!(card.version, "1.0.0");
        assert_eq!(card.default_input_modes, vec!["text"]);
        assert!(card.provider.is_none());
    }
}

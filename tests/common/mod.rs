//! Shared in-process mock A2A agent for integration tests
//!
//! Speaks just enough of the task protocol for the client and gateway
//! suites: synchronous `tasks/send` completion with one code artifact,
//! task lookup, cancellation with terminal-state refusal, and a streaming
//! `tasks/sendSubscribe` that emits working → artifacts → final completed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;

use a2a_gateway::error::rpc_codes;
use a2a_gateway::protocol::{
    AGENT_CARD_PATH, Artifact, JsonRpcRequest, JsonRpcResponse, Message, Part, RequestId,
    StreamEvent, Task, TaskArtifactUpdateEvent, TaskIdParams, TaskQueryParams, TaskSendParams,
    TaskState, TaskStatus, TaskStatusUpdateEvent, methods,
};

/// Mutable agent state shared with the test body.
pub struct MockState {
    tasks: Mutex<HashMap<String, Task>>,
    bearer: Option<String>,
}

/// Handle to a running mock agent.
pub struct MockAgent {
    /// JSON-RPC endpoint URL
    pub url: String,
    state: Arc<MockState>,
}

impl MockAgent {
    /// Spawn a mock agent on an ephemeral port.
    pub async fn spawn() -> Self {
        Self::spawn_with_bearer(None).await
    }

    /// Spawn a mock agent that rejects requests without the given bearer.
    pub async fn spawn_with_bearer(bearer: Option<&str>) -> Self {
        let state = Arc::new(MockState {
            tasks: Mutex::new(HashMap::new()),
            bearer: bearer.map(String::from),
        });

        let app = Router::new()
            .route("/", post(rpc_handler))
            .route(AGENT_CARD_PATH, get(card_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/"),
            state,
        }
    }

    /// Pre-seed a task in `working` state so cancellation has something
    /// non-terminal to act on.
    pub fn seed_working_task(&self, id: &str) {
        let task = Task {
            id: id.to_string(),
            session_id: None,
            status: TaskStatus {
                state: TaskState::Working,
                message: None,
                timestamp: Some(Utc::now()),
            },
            artifacts: None,
            metadata: None,
        };
        self.state.tasks.lock().insert(id.to_string(), task);
    }

    /// Current stored state of a task, if any.
    pub fn task_state(&self, id: &str) -> Option<TaskState> {
        self.state.tasks.lock().get(id).map(|t| t.status.state)
    }
}

async fn card_handler() -> impl IntoResponse {
    Json(json!({
        "name": "Coder Agent",
        "url": "http://localhost/",
        "version": "0.0.1",
        "capabilities": {"streaming": true, "pushNotifications": false},
        "defaultInputModes": ["text"],
        "defaultOutputModes": ["text", "file"],
        "skills": [{"id": "code_generation", "name": "Code Generation"}]
    }))
}

async fn rpc_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    if let Some(ref expected) = state.bearer {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let id = request.id.clone();
    let params = request.params.unwrap_or(serde_json::Value::Null);

    match request.method.as_str() {
        methods::TASKS_SEND => {
            let params: TaskSendParams = serde_json::from_value(params).unwrap();
            handle_send(&state, id, params).await
        }
        methods::TASKS_GET => {
            let params: TaskQueryParams = serde_json::from_value(params).unwrap();
            handle_get(&state, id, &params)
        }
        methods::TASKS_CANCEL => {
            let params: TaskIdParams = serde_json::from_value(params).unwrap();
            handle_cancel(&state, id, &params)
        }
        methods::TASKS_SEND_SUBSCRIBE => {
            let params: TaskSendParams = serde_json::from_value(params).unwrap();
            handle_subscribe(&state, id, params)
        }
        other => Json(JsonRpcResponse::error(
            Some(id),
            rpc_codes::METHOD_NOT_FOUND,
            format!("unknown method '{other}'"),
        ))
        .into_response(),
    }
}

fn prompt_of(params: &TaskSendParams) -> String {
    params
        .message
        .parts
        .iter()
        .find_map(Part::as_text)
        .unwrap_or("")
        .to_string()
}

fn completed_task(params: &TaskSendParams) -> Task {
    Task {
        id: params.id.clone(),
        session_id: params.session_id.clone(),
        status: TaskStatus {
            state: TaskState::Completed,
            message: Some(Message {
                role: "agent".to_string(),
                parts: vec![Part::text("Generated 1 file")],
                metadata: None,
            }),
            timestamp: Some(Utc::now()),
        },
        artifacts: Some(vec![Artifact {
            name: Some("hello.py".to_string()),
            description: None,
            parts: vec![Part::text("print('hello world')")],
            index: 0,
            append: None,
            last_chunk: Some(true),
        }]),
        metadata: None,
    }
}

async fn handle_send(state: &Arc<MockState>, id: RequestId, params: TaskSendParams) -> Response {
    // "slow" prompts simulate a long-running task for deadline tests
    if prompt_of(&params).contains("slow") {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let task = completed_task(&params);
    state.tasks.lock().insert(task.id.clone(), task.clone());
    Json(JsonRpcResponse::success(
        id,
        serde_json::to_value(task).unwrap(),
    ))
    .into_response()
}

fn handle_get(state: &Arc<MockState>, id: RequestId, params: &TaskQueryParams) -> Response {
    let tasks = state.tasks.lock();
    match tasks.get(&params.id) {
        Some(task) => Json(JsonRpcResponse::success(
            id,
            serde_json::to_value(task).unwrap(),
        ))
        .into_response(),
        None => Json(JsonRpcResponse::error(
            Some(id),
            rpc_codes::TASK_NOT_FOUND,
            format!("task '{}' not found", params.id),
        ))
        .into_response(),
    }
}

fn handle_cancel(state: &Arc<MockState>, id: RequestId, params: &TaskIdParams) -> Response {
    let mut tasks = state.tasks.lock();
    match tasks.get_mut(&params.id) {
        Some(task) if task.status.state.is_terminal() => Json(JsonRpcResponse::error(
            Some(id),
            rpc_codes::TASK_NOT_CANCELABLE,
            format!("task '{}' is already terminal", params.id),
        ))
        .into_response(),
        Some(task) => {
            task.status = TaskStatus {
                state: TaskState::Canceled,
                message: None,
                timestamp: Some(Utc::now()),
            };
            Json(JsonRpcResponse::success(
                id,
                serde_json::to_value(&*task).unwrap(),
            ))
            .into_response()
        }
        None => Json(JsonRpcResponse::error(
            Some(id),
            rpc_codes::TASK_NOT_FOUND,
            format!("task '{}' not found", params.id),
        ))
        .into_response(),
    }
}

/// Stream: working status → two artifacts → final completed status.
fn handle_subscribe(state: &Arc<MockState>, id: RequestId, params: TaskSendParams) -> Response {
    let task_id = params.id.clone();

    let events: Vec<StreamEvent> = vec![
        StreamEvent::Status(TaskStatusUpdateEvent {
            id: task_id.clone(),
            status: TaskStatus {
                state: TaskState::Working,
                message: None,
                timestamp: Some(Utc::now()),
            },
            is_final: false,
            metadata: None,
        }),
        StreamEvent::Artifact(TaskArtifactUpdateEvent {
            id: task_id.clone(),
            artifact: Artifact {
                name: Some("index.html".to_string()),
                description: None,
                parts: vec![Part::text("<html></html>")],
                index: 0,
                append: None,
                last_chunk: Some(true),
            },
        }),
        StreamEvent::Artifact(TaskArtifactUpdateEvent {
            id: task_id.clone(),
            artifact: Artifact {
                name: Some("style.css".to_string()),
                description: None,
                parts: vec![Part::text("body { margin: 0 }")],
                index: 1,
                append: None,
                last_chunk: Some(true),
            },
        }),
        StreamEvent::Status(TaskStatusUpdateEvent {
            id: task_id.clone(),
            status: TaskStatus {
                state: TaskState::Completed,
                message: None,
                timestamp: Some(Utc::now()),
            },
            is_final: true,
            metadata: None,
        }),
    ];

    // The final task is observable through tasks/get afterwards.
    let mut final_task = completed_task(&params);
    final_task.artifacts = Some(vec![
        Artifact {
            name: Some("index.html".to_string()),
            description: None,
            parts: vec![Part::text("<html></html>")],
            index: 0,
            append: None,
            last_chunk: Some(true),
        },
        Artifact {
            name: Some("style.css".to_string()),
            description: None,
            parts: vec![Part::text("body { margin: 0 }")],
            index: 1,
            append: None,
            last_chunk: Some(true),
        },
    ]);
    state.tasks.lock().insert(task_id, final_task);

    let sse_stream = stream! {
        for event in events {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let frame = JsonRpcResponse::success(
                id.clone(),
                serde_json::to_value(&event).unwrap(),
            );
            yield Ok::<_, Infallible>(
                Event::default().data(serde_json::to_string(&frame).unwrap()),
            );
        }
    };

    Sse::new(sse_stream).into_response()
}

//! A2A task-protocol client
//!
//! Stateless engine for the four task operations against one backend
//! endpoint. Authoritative task state lives at the backend; everything this
//! client returns is a point-in-time reflection, valid only for the call
//! that fetched it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::config::BackendConfig;
use crate::error::rpc_codes;
use crate::protocol::{
    AGENT_CARD_PATH, AgentCard, JsonRpcRequest, JsonRpcResponse, RequestId, StreamEvent, Task,
    TaskIdParams, TaskQueryParams, TaskSendParams, methods,
};
use crate::{Error, Result};

/// Default timeout for unary `tasks/get` / `tasks/cancel` calls
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of a subscription's event channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A2A client bound to one backend endpoint
#[derive(Debug)]
pub struct A2aClient {
    /// HTTP client
    client: reqwest::Client,
    /// JSON-RPC endpoint URL
    endpoint: String,
    /// Bearer credential presented to the backend
    bearer: Option<String>,
    /// Timeout for unary query/cancel calls
    request_timeout: Duration,
    /// Request ID counter
    request_id: AtomicU64,
}

impl A2aClient {
    /// Create a client for the given endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(endpoint: &str) -> Result<Self> {
        Url::parse(endpoint)
            .map_err(|e| Error::Transport(format!("invalid endpoint '{endpoint}': {e}")))?;

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            bearer: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_id: AtomicU64::new(1),
        })
    }

    /// Create a client from a backend descriptor (URL + bearer credential).
    pub fn from_backend(backend: &BackendConfig) -> Result<Self> {
        let mut client = Self::new(&backend.url)?;
        client.bearer.clone_from(&backend.bearer);
        Ok(client)
    }

    /// Set the bearer credential presented to the backend.
    #[must_use]
    pub fn with_bearer(mut self, bearer: impl Into<String>) -> Self {
        self.bearer = Some(bearer.into());
        self
    }

    /// Override the timeout for unary query/cancel calls.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Submit a task and block until the backend reaches a terminal state or
    /// `deadline` expires.
    ///
    /// A deadline hit is a client-side give-up, not a remote cancellation:
    /// the task may still be running on the backend.
    ///
    /// # Errors
    ///
    /// [`Error::DeadlineExceeded`] when the deadline elapses first;
    /// [`Error::Transport`] / [`Error::JsonRpc`] on failures.
    pub async fn send_task(&self, params: TaskSendParams, deadline: Duration) -> Result<Task> {
        let result = self
            .call(methods::TASKS_SEND, serde_json::to_value(&params)?, deadline)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Point-in-time snapshot of a task's remote state. Never waits for a
    /// state change.
    pub async fn get_task(&self, params: TaskQueryParams) -> Result<Task> {
        let result = self
            .call(
                methods::TASKS_GET,
                serde_json::to_value(&params)?,
                self.request_timeout,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Request cancellation of a task.
    ///
    /// # Errors
    ///
    /// [`Error::NotCancelable`] when the backend reports the task already
    /// terminal or refuses cancellation - an expected outcome, not a system
    /// failure. Callers should re-fetch final state via [`Self::get_task`].
    pub async fn cancel_task(&self, params: TaskIdParams) -> Result<Task> {
        let result = self
            .call(
                methods::TASKS_CANCEL,
                serde_json::to_value(&params)?,
                self.request_timeout,
            )
            .await;
        match result {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(Error::JsonRpc { code, message, .. })
                if code == rpc_codes::TASK_NOT_CANCELABLE =>
            {
                Err(Error::NotCancelable(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Submit a task and stream status/artifact events as the backend
    /// produces them.
    ///
    /// The returned channel is single-pass and not restartable. It terminates
    /// exactly once: after the final status update (forwarded, then closed),
    /// after a transport error (surfaced as the last value, then closed), or
    /// when the receiver is dropped (the producer observes the closed channel
    /// and releases the connection). Events are forwarded in backend order.
    pub async fn send_task_subscribe(
        &self,
        params: TaskSendParams,
    ) -> Result<mpsc::Receiver<Result<StreamEvent>>> {
        let request = JsonRpcRequest::new(
            self.next_id(),
            methods::TASKS_SEND_SUBSCRIBE,
            Some(serde_json::to_value(&params)?),
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "text/event-stream")
            .json(&request);
        if let Some(ref bearer) = self.bearer {
            builder = builder.bearer_auth(bearer);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("subscribe failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "subscribe returned HTTP {status}"
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(pump_events(response, tx));
        Ok(rx)
    }

    /// Fetch the backend's agent card from its well-known path.
    pub async fn fetch_agent_card(&self) -> Result<AgentCard> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| Error::Transport(format!("invalid endpoint: {e}")))?;
        url.set_path(AGENT_CARD_PATH);
        url.set_query(None);

        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("agent card fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "agent card fetch returned HTTP {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("agent card parse failed: {e}")))
    }

    /// Send a unary JSON-RPC request and unwrap the result value.
    async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let request = JsonRpcRequest::new(self.next_id(), method, Some(params));

        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&request);
        if let Some(ref bearer) = self.bearer {
            builder = builder.bearer_auth(bearer);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::DeadlineExceeded(format!("{method} after {timeout:?}"))
            } else {
                Error::Transport(format!("{method} failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("{method} returned HTTP {status}")));
        }

        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("{method} response parse failed: {e}")))?;

        if let Some(err) = rpc.error {
            // Task-not-found is part of the recoverable taxonomy, not a
            // generic wire error.
            return Err(if err.code == rpc_codes::TASK_NOT_FOUND {
                Error::NotFound(err.message)
            } else {
                Error::JsonRpc {
                    code: err.code,
                    message: err.message,
                    data: err.data,
                }
            });
        }
        rpc.result
            .ok_or_else(|| Error::Transport(format!("{method} response missing result")))
    }

    /// Get next request ID
    #[allow(clippy::cast_possible_wrap)]
    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::Relaxed) as i64)
    }
}

/// Read the SSE body and forward decoded events until the stream terminates.
///
/// Holds the one streaming connection for this subscription; every return
/// path drops the response body, releasing it deterministically.
async fn pump_events(response: reqwest::Response, tx: mpsc::Sender<Result<StreamEvent>>) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut data_lines: Vec<String> = Vec::new();

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(Err(Error::Transport(format!("event stream failed: {e}"))))
                    .await;
                return;
            }
        };

        buffer.push_str(&String::from_utf8_lossy(&chunk));

        // Process complete lines; an SSE event is dispatched on a blank line.
        while let Some(newline_pos) = buffer.find('\n') {
            let line = buffer[..newline_pos].trim_end_matches('\r').to_string();
            buffer.drain(..=newline_pos);

            if line.is_empty() {
                if !data_lines.is_empty() {
                    let data = data_lines.join("\n");
                    data_lines.clear();
                    if dispatch_event(&data, &tx).await.is_break() {
                        return;
                    }
                }
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                data_lines.push(data.trim_start().to_string());
            }
            // event:/id:/retry: fields and comment lines are ignored
        }
    }

    // Flush a trailing event the server sent without a final blank line.
    if !data_lines.is_empty() {
        let data = data_lines.join("\n");
        if dispatch_event(&data, &tx).await.is_break() {
            return;
        }
    }

    debug!("Event stream closed without final status");
    let _ = tx
        .send(Err(Error::Transport(
            "event stream closed before final status".to_string(),
        )))
        .await;
}

/// Decode one SSE data payload and forward it. Returns `Break` when the
/// subscription is finished (final event, decode error, or receiver gone).
async fn dispatch_event(
    data: &str,
    tx: &mpsc::Sender<Result<StreamEvent>>,
) -> std::ops::ControlFlow<()> {
    use std::ops::ControlFlow;

    match parse_event(data) {
        Ok(event) => {
            let is_final = event.is_final();
            if tx.send(Ok(event)).await.is_err() {
                // Consumer dropped the receiver: that is the cancellation
                // signal; stop producing and release the connection.
                debug!("Subscription receiver dropped, closing stream");
                return ControlFlow::Break(());
            }
            if is_final {
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            ControlFlow::Break(())
        }
    }
}

/// Decode an SSE data payload into a [`StreamEvent`].
///
/// Backends may wrap events in a JSON-RPC response envelope or send them
/// bare; both forms are accepted.
fn parse_event(data: &str) -> Result<StreamEvent> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| Error::Transport(format!("bad event payload: {e}")))?;

    if let Ok(rpc) = serde_json::from_value::<JsonRpcResponse>(value.clone()) {
        if let Some(err) = rpc.error {
            return Err(Error::JsonRpc {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        if let Some(result) = rpc.result {
            return serde_json::from_value(result)
                .map_err(|e| Error::Transport(format!("bad stream event: {e}")));
        }
    }

    serde_json::from_value(value).map_err(|e| Error::Transport(format!("bad stream event: {e}")))
}

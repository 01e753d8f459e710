//! A2A task-protocol definitions
//!
//! Wire types for the task lifecycle (submit, query, cancel, subscribe) and
//! the JSON-RPC envelope they travel in.

pub mod messages;
pub mod types;

pub use messages::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use types::{
    AgentCapabilities, AgentCard, AgentProvider, AgentSkill, Artifact, FileContent, Message, Part,
    StreamEvent, Task, TaskArtifactUpdateEvent, TaskIdParams, TaskQueryParams, TaskSendParams,
    TaskState, TaskStatus, TaskStatusUpdateEvent,
};

/// Well-known path serving the agent card
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// A2A JSON-RPC method names
pub mod methods {
    /// Submit a task and block until it reaches a terminal state
    pub const TASKS_SEND: &str = "tasks/send";
    /// Point-in-time snapshot of a task
    pub const TASKS_GET: &str = "tasks/get";
    /// Request cancellation of a task
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    /// Submit a task and stream status/artifact events
    pub const TASKS_SEND_SUBSCRIBE: &str = "tasks/sendSubscribe";
}

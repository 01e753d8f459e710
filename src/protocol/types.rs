//! A2A protocol type definitions
//!
//! Task and session identifiers are opaque caller-assigned strings; they are
//! never generated or interpreted here and are echoed back verbatim.
//! Optional fields are `Option` throughout - absence is semantically
//! distinct from an empty value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Accepted by the backend, not yet processing
    Submitted,
    /// Backend is processing
    Working,
    /// Paused awaiting caller input (non-terminal)
    InputRequired,
    /// Finished successfully (terminal)
    Completed,
    /// Finished with an error (terminal)
    Failed,
    /// Cancellation took effect (terminal)
    Canceled,
}

impl TaskState {
    /// Returns `true` for states that accept no further transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// A message exchanged between caller and backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sender role (`user` or `agent`)
    pub role: String,
    /// Message content parts
    pub parts: Vec<Part>,
    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    /// Build a single-part text message from a user.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
            metadata: None,
        }
    }
}

/// One content part of a message or artifact, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    /// Plain text
    Text {
        /// The text content
        text: String,
        /// Optional metadata
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    /// Structured data
    Data {
        /// Arbitrary JSON payload
        data: Value,
        /// Optional metadata
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    /// File content (inline bytes or by reference)
    File {
        /// The file payload
        file: FileContent,
        /// Optional metadata
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
}

impl Part {
    /// Build a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            metadata: None,
        }
    }

    /// The text content, if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// File payload carried in a [`Part::File`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    /// File name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Base64-encoded inline content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
    /// Reference URI (alternative to inline bytes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A named output payload attached to a task, delivered incrementally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Artifact description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Content parts
    pub parts: Vec<Part>,
    /// Position in the task's artifact sequence
    #[serde(default)]
    pub index: u32,
    /// Whether this chunk appends to the artifact at `index`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
    /// Whether this is the artifact's last chunk
    #[serde(rename = "lastChunk", skip_serializing_if = "Option::is_none")]
    pub last_chunk: Option<bool>,
}

/// Task status: state plus an optional human-readable message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Lifecycle state
    pub state: TaskState,
    /// Status message from the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// When the backend recorded this status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// A bare status with no message.
    #[must_use]
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Some(Utc::now()),
        }
    }
}

/// The unit of work tracked by the protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Caller-assigned task id
    pub id: String,
    /// Caller-assigned session id
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Current status
    pub status: TaskStatus,
    /// Artifacts produced so far (append-only during execution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Parameters for `tasks/send` and `tasks/sendSubscribe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSendParams {
    /// Caller-assigned task id (unique per session scope)
    pub id: String,
    /// Caller-assigned session id
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// The message to process
    pub message: Message,
    /// How many history entries to return
    #[serde(rename = "historyLength", skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Parameters for `tasks/get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQueryParams {
    /// Task id to query
    pub id: String,
    /// How many history entries to return
    #[serde(rename = "historyLength", skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
}

/// Parameters for `tasks/cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdParams {
    /// Task id to cancel
    pub id: String,
    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Status-update event on a subscription stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusUpdateEvent {
    /// Task id
    pub id: String,
    /// New status
    pub status: TaskStatus,
    /// `true` marks the last event of the subscription
    #[serde(rename = "final", default)]
    pub is_final: bool,
    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Artifact-update event on a subscription stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskArtifactUpdateEvent {
    /// Task id
    pub id: String,
    /// The artifact chunk
    pub artifact: Artifact,
}

/// A tagged event on a subscription stream.
///
/// Status and artifact events may interleave in any order the backend
/// chooses; the final status update is always the logically last event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    /// Artifact chunk
    Artifact(TaskArtifactUpdateEvent),
    /// Status change
    Status(TaskStatusUpdateEvent),
}

impl StreamEvent {
    /// Returns `true` when this event closes the subscription.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Status(s) if s.is_final)
    }
}

/// Agent card served at [`crate::protocol::AGENT_CARD_PATH`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    /// Agent display name
    pub name: String,
    /// Agent description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Endpoint URL callers should use
    pub url: String,
    /// Provider information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,
    /// Agent version
    pub version: String,
    /// Documentation URL
    #[serde(rename = "documentationUrl", skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    /// Supported optional protocol features
    pub capabilities: AgentCapabilities,
    /// Default accepted input modes
    #[serde(rename = "defaultInputModes")]
    pub default_input_modes: Vec<String>,
    /// Default produced output modes
    #[serde(rename = "defaultOutputModes")]
    pub default_output_modes: Vec<String>,
    /// Advertised skills
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

/// Optional protocol features an agent supports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCapabilities {
    /// Supports `tasks/sendSubscribe`
    pub streaming: bool,
    /// Supports push notifications
    #[serde(rename = "pushNotifications")]
    pub push_notifications: bool,
    /// Reports state transition history
    #[serde(rename = "stateTransitionHistory")]
    pub state_transition_history: bool,
}

/// Agent provider identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProvider {
    /// Organization name
    pub organization: String,
    /// Organization URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One advertised skill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSkill {
    /// Stable skill id
    pub id: String,
    /// Display name
    pub name: String,
    /// Skill description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Search tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

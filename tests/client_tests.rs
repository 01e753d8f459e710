//! End-to-end task-protocol engine tests against an in-process mock agent

mod common;

use std::time::Duration;

use a2a_gateway::Error;
use a2a_gateway::client::A2aClient;
use a2a_gateway::protocol::{Message, StreamEvent, TaskIdParams, TaskQueryParams, TaskSendParams, TaskState};
use common::MockAgent;

const SEND_DEADLINE: Duration = Duration::from_secs(10);

fn send_params(task_id: &str, prompt: &str) -> TaskSendParams {
    TaskSendParams {
        id: task_id.to_string(),
        session_id: Some(format!("session-{task_id}")),
        message: Message::user_text(prompt),
        history_length: None,
        metadata: None,
    }
}

/// Submitting a task returns a completed task with a non-empty artifact.
#[tokio::test]
async fn send_task_completes_with_artifact() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let task = client
        .send_task(
            send_params("task-send-1", "Generate a simple hello world in Python"),
            SEND_DEADLINE,
        )
        .await
        .unwrap();

    assert_eq!(task.status.state, TaskState::Completed);
    // ids are echoed back verbatim
    assert_eq!(task.id, "task-send-1");
    assert_eq!(task.session_id.as_deref(), Some("session-task-send-1"));

    let artifacts = task.artifacts.unwrap();
    assert!(!artifacts.is_empty(), "expected at least one artifact");
    let text = artifacts[0].parts[0].as_text().unwrap();
    assert!(!text.is_empty(), "artifact text should be non-empty");
}

/// Once terminal, repeated queries keep reporting the same terminal state.
#[tokio::test]
async fn terminal_state_observation_is_idempotent() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let task = client
        .send_task(send_params("task-final-1", "hello"), SEND_DEADLINE)
        .await
        .unwrap();
    assert_eq!(task.status.state, TaskState::Completed);

    for _ in 0..5 {
        let observed = client
            .get_task(TaskQueryParams {
                id: "task-final-1".to_string(),
                history_length: None,
            })
            .await
            .unwrap();
        assert_eq!(observed.status.state, TaskState::Completed);
    }
}

#[tokio::test]
async fn get_unknown_task_is_not_found() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let err = client
        .get_task(TaskQueryParams {
            id: "ghost".to_string(),
            history_length: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
}

/// Canceling an already-completed task is the expected NotCancelable
/// outcome, never a silent success.
#[tokio::test]
async fn cancel_after_terminal_is_not_cancelable() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    client
        .send_task(send_params("task-cancel-1", "hello"), SEND_DEADLINE)
        .await
        .unwrap();

    let err = client
        .cancel_task(TaskIdParams {
            id: "task-cancel-1".to_string(),
            metadata: None,
        })
        .await
        .unwrap_err();
    assert!(err.is_not_cancelable(), "got {err:?}");

    // "nothing to do": re-fetching shows the unchanged terminal state
    let task = client
        .get_task(TaskQueryParams {
            id: "task-cancel-1".to_string(),
            history_length: None,
        })
        .await
        .unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
}

#[tokio::test]
async fn cancel_working_task_succeeds() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    agent.seed_working_task("task-cancel-2");

    let task = client
        .cancel_task(TaskIdParams {
            id: "task-cancel-2".to_string(),
            metadata: None,
        })
        .await
        .unwrap();
    assert_eq!(task.status.state, TaskState::Canceled);
    assert_eq!(agent.task_state("task-cancel-2"), Some(TaskState::Canceled));
}

/// A deadline hit is a client-side give-up surfaced as DeadlineExceeded.
#[tokio::test]
async fn send_task_deadline_is_exceeded() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let err = client
        .send_task(
            send_params("task-slow-1", "slow: write a long program"),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded(_)), "got {err:?}");
}

/// Subscription delivers working + artifact events and exactly one final
/// status, which is the last event before the channel closes.
#[tokio::test]
async fn subscribe_streams_events_with_single_final() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let mut rx = client
        .send_task_subscribe(send_params(
            "task-subscribe-1",
            "Create a small html file and a css file for styling",
        ))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(item) = rx.recv().await {
        events.push(item.unwrap());
    }

    let working = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Status(s) if s.status.state == TaskState::Working))
        .count();
    let artifacts = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Artifact(_)))
        .count();
    let finals = events.iter().filter(|e| e.is_final()).count();

    assert!(working >= 1, "expected at least one working status");
    assert!(artifacts >= 1, "expected at least one artifact event");
    assert_eq!(finals, 1, "expected exactly one final status");

    let last = events.last().unwrap();
    assert!(last.is_final(), "final status must be the last event");
    match last {
        StreamEvent::Status(s) => assert_eq!(s.status.state, TaskState::Completed),
        StreamEvent::Artifact(_) => panic!("last event was an artifact"),
    }
}

/// The task observed after a subscription finishes is terminal and carries
/// the streamed artifacts.
#[tokio::test]
async fn subscribe_then_get_reports_completed() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let mut rx = client
        .send_task_subscribe(send_params("task-subscribe-2", "two files please"))
        .await
        .unwrap();
    while rx.recv().await.is_some() {}

    let task = client
        .get_task(TaskQueryParams {
            id: "task-subscribe-2".to_string(),
            history_length: None,
        })
        .await
        .unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.artifacts.unwrap().len(), 2);
}

/// Dropping the receiver is the cancellation signal; the producer must cope
/// without panicking while the backend keeps emitting.
#[tokio::test]
async fn dropping_receiver_cancels_subscription() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let mut rx = client
        .send_task_subscribe(send_params("task-subscribe-3", "two files please"))
        .await
        .unwrap();

    // consume one event, then walk away
    let first = rx.recv().await.unwrap().unwrap();
    assert!(!first.is_final());
    drop(rx);

    // give the producer time to observe the closed channel
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn fetch_agent_card_discovers_backend() {
    let agent = MockAgent::spawn().await;
    let client = A2aClient::new(&agent.url).unwrap();

    let card = client.fetch_agent_card().await.unwrap();
    assert_eq!(card.name, "Coder Agent");
    assert_eq!(card.version, "0.0.1");
    assert!(card.capabilities.streaming);
    assert_eq!(card.skills[0].id, "code_generation");
}

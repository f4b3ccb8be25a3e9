mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockGate, MockService, Reply};
use hawkins_controllers::{ChatFailure, ChatSessionController, SendOutcome};
use hawkins_core::chat::{GREETING, SIGNAL_LOST};
use hawkins_core::{CapabilityMode, ChatEvent, ChatMessage, ChatPhase, Role};
use hawkins_llm::{LLMChunk, LLMError};
use tokio::sync::mpsc;

fn controller(service: &MockService, gate: Arc<MockGate>) -> ChatSessionController {
    ChatSessionController::new(Arc::new(service.clone()), gate, CapabilityMode::Fast)
}

fn lines(transcript: &[ChatMessage]) -> Vec<(Role, &str)> {
    transcript.iter().map(|m| (m.role, m.text.as_str())).collect()
}

#[tokio::test]
async fn hello_streams_into_one_model_message() {
    let service = MockService::new();
    service.reply(Reply::tokens(&["Hi", " there"]));
    let chat = controller(&service, MockGate::authorized());

    assert_eq!(chat.send("hello").await, SendOutcome::Completed);

    let transcript = chat.transcript().await;
    assert_eq!(
        lines(&transcript),
        vec![(Role::User, "hello"), (Role::Model, "Hi there")]
    );
    assert_eq!(chat.phase().await, ChatPhase::Idle);
    assert_eq!(service.sessions(), vec![CapabilityMode::Fast]);
    assert_eq!(service.sent(), vec![(CapabilityMode::Fast, "hello".to_string())]);
}

#[tokio::test]
async fn each_exchange_adds_two_messages_in_order() {
    let service = MockService::new();
    service
        .reply(Reply::tokens(&["one"]))
        .reply(Reply::tokens(&["t", "w", "o"]))
        .reply(Reply::tokens(&["three"]));
    let chat = ChatSessionController::with_transcript(
        Arc::new(service.clone()),
        MockGate::authorized(),
        CapabilityMode::Fast,
        vec![ChatMessage::model(GREETING)],
    );

    for (i, text) in ["a", "b", "c"].iter().enumerate() {
        chat.send(text).await;
        assert_eq!(chat.transcript().await.len(), 1 + 2 * (i + 1));
    }

    let transcript = chat.transcript().await;
    assert_eq!(
        lines(&transcript),
        vec![
            (Role::Model, GREETING),
            (Role::User, "a"),
            (Role::Model, "one"),
            (Role::User, "b"),
            (Role::Model, "two"),
            (Role::User, "c"),
            (Role::Model, "three"),
        ]
    );
}

#[tokio::test]
async fn blank_text_is_ignored() {
    let service = MockService::new();
    let chat = controller(&service, MockGate::authorized());

    assert_eq!(chat.send("").await, SendOutcome::Ignored);
    assert_eq!(chat.send("  \n\t").await, SendOutcome::Ignored);

    assert!(chat.transcript().await.is_empty());
    assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn send_while_streaming_is_ignored() {
    let service = MockService::new();
    let (tx, reply) = Reply::live();
    service.reply(reply);
    let chat = controller(&service, MockGate::authorized());

    let running = tokio::spawn({
        let chat = chat.clone();
        async move { chat.send("first").await }
    });
    while chat.phase().await == ChatPhase::Idle {
        tokio::task::yield_now().await;
    }

    assert_eq!(chat.send("second").await, SendOutcome::Ignored);

    tx.unbounded_send(Ok(LLMChunk::Token("ok".into()))).unwrap();
    drop(tx);
    assert_eq!(running.await.unwrap(), SendOutcome::Completed);

    assert_eq!(
        lines(&chat.transcript().await),
        vec![(Role::User, "first"), (Role::Model, "ok")]
    );
    assert_eq!(service.sent().len(), 1);
}

#[tokio::test]
async fn empty_stream_still_appends_model_message() {
    let service = MockService::new();
    service.reply(Reply::tokens(&[]));
    let chat = controller(&service, MockGate::authorized());

    assert_eq!(chat.send("anyone?").await, SendOutcome::Completed);
    assert_eq!(
        lines(&chat.transcript().await),
        vec![(Role::User, "anyone?"), (Role::Model, "")]
    );
}

#[tokio::test]
async fn failure_mid_stream_keeps_partial_and_appends_fallback() {
    let service = MockService::new();
    service.reply(Reply::Chunks(vec![
        Ok(LLMChunk::Token("Hi".into())),
        Err(LLMError::Stream("connection reset".into())),
        Ok(LLMChunk::Token(" never".into())),
    ]));
    let gate = MockGate::authorized();
    let chat = controller(&service, gate.clone());

    let outcome = chat.send("hello").await;
    assert!(matches!(
        outcome,
        SendOutcome::Failed(ChatFailure::StreamInterrupted(_))
    ));
    assert_eq!(
        lines(&chat.transcript().await),
        vec![
            (Role::User, "hello"),
            (Role::Model, "Hi"),
            (Role::Model, SIGNAL_LOST),
        ]
    );
    assert_eq!(chat.phase().await, ChatPhase::Idle);
    assert_eq!(gate.selections(), 0);
}

#[tokio::test]
async fn failure_before_stream_appends_fallback() {
    let service = MockService::new();
    service.reply(Reply::Reject(LLMError::Api("HTTP 503".into())));
    let chat = controller(&service, MockGate::authorized());

    let outcome = chat.send("hello").await;
    assert!(matches!(outcome, SendOutcome::Failed(ChatFailure::Transport(_))));
    assert_eq!(
        lines(&chat.transcript().await),
        vec![(Role::User, "hello"), (Role::Model, SIGNAL_LOST)]
    );

    // The controller recovers for the next exchange.
    service.reply(Reply::tokens(&["back"]));
    assert_eq!(chat.send("again").await, SendOutcome::Completed);
    assert_eq!(chat.transcript().await.len(), 4);
}

#[tokio::test]
async fn credential_failure_requests_reselection() {
    let service = MockService::new();
    service.reply(Reply::Reject(LLMError::Api(
        "Requested entity was not found.".into(),
    )));
    let gate = MockGate::authorized();
    let chat = controller(&service, gate.clone());

    let outcome = chat.send("hello").await;
    assert!(matches!(outcome, SendOutcome::Failed(ChatFailure::Credential(_))));
    assert_eq!(gate.selections(), 1);
    assert_eq!(chat.transcript().await.last().unwrap().text, SIGNAL_LOST);
}

#[tokio::test]
async fn missing_credential_prompts_selection_and_proceeds() {
    let service = MockService::new();
    service.reply(Reply::tokens(&["copy"]));
    let gate = MockGate::unselected();
    let chat = controller(&service, gate.clone());

    assert_eq!(chat.send("hello").await, SendOutcome::Completed);
    assert_eq!(gate.selections(), 1);
    assert_eq!(service.sent().len(), 1);
}

#[tokio::test]
async fn same_mode_keeps_session() {
    let service = MockService::new();
    let chat = controller(&service, MockGate::authorized());

    assert!(!chat.set_capability_mode(CapabilityMode::Fast).await);
    assert_eq!(chat.session_version().await, 0);
    assert_eq!(service.sessions(), vec![CapabilityMode::Fast]);
}

#[tokio::test]
async fn mode_switch_uses_new_session_for_next_send() {
    let service = MockService::new();
    service.reply(Reply::tokens(&["fast"])).reply(Reply::tokens(&["deep"]));
    let chat = controller(&service, MockGate::authorized());

    chat.send("one").await;
    assert!(chat.set_capability_mode(CapabilityMode::DeepThink).await);
    chat.send("two").await;

    assert_eq!(chat.mode().await, CapabilityMode::DeepThink);
    assert_eq!(chat.session_version().await, 1);
    assert_eq!(
        service.sessions(),
        vec![CapabilityMode::Fast, CapabilityMode::DeepThink]
    );
    assert_eq!(
        service.sent(),
        vec![
            (CapabilityMode::Fast, "one".to_string()),
            (CapabilityMode::DeepThink, "two".to_string()),
        ]
    );
    assert_eq!(chat.transcript().await.len(), 4);
}

#[tokio::test]
async fn mode_switch_mid_stream_discards_late_fragments() {
    let service = MockService::new();
    let (tx, reply) = Reply::live();
    service.reply(reply);
    let chat = controller(&service, MockGate::authorized());

    let running = tokio::spawn({
        let chat = chat.clone();
        async move { chat.send("hello").await }
    });

    tx.unbounded_send(Ok(LLMChunk::Token("Hi".into()))).unwrap();
    while chat.transcript().await.len() < 2 {
        tokio::task::yield_now().await;
    }

    assert!(chat.set_capability_mode(CapabilityMode::DeepThink).await);
    assert_eq!(chat.phase().await, ChatPhase::Idle);

    tx.unbounded_send(Ok(LLMChunk::Token(" from the old line".into())))
        .unwrap();
    drop(tx);

    assert_eq!(running.await.unwrap(), SendOutcome::Superseded);
    assert_eq!(
        lines(&chat.transcript().await),
        vec![(Role::User, "hello"), (Role::Model, "Hi")]
    );
    assert_eq!(chat.phase().await, ChatPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn dropped_send_does_not_leave_chat_busy() {
    let service = MockService::new();
    let (tx, reply) = Reply::live();
    service.reply(reply);
    let chat = controller(&service, MockGate::authorized());

    tx.unbounded_send(Ok(LLMChunk::Token("Hi".into()))).unwrap();
    let timed_out = tokio::time::timeout(Duration::from_millis(50), chat.send("first")).await;
    assert!(timed_out.is_err());

    assert_eq!(chat.phase().await, ChatPhase::Idle);

    service.reply(Reply::tokens(&["back"]));
    assert_eq!(chat.send("second").await, SendOutcome::Completed);
    assert_eq!(
        lines(&chat.transcript().await),
        vec![
            (Role::User, "first"),
            (Role::Model, "Hi"),
            (Role::User, "second"),
            (Role::Model, "back"),
        ]
    );
    drop(tx);
}

#[tokio::test]
async fn dropped_send_reports_idle_phase() {
    let service = MockService::new();
    let (_tx, reply) = Reply::live();
    service.reply(reply);
    let (events_tx, mut events) = mpsc::channel(64);
    let chat = controller(&service, MockGate::authorized()).with_events(events_tx);

    {
        let send = chat.send("first");
        tokio::pin!(send);
        // One poll gets the exchange to Sending and parks on the live stream.
        assert!(futures::poll!(send.as_mut()).is_pending());
    }
    drop(chat);

    let mut phases = Vec::new();
    while let Some(event) = events.recv().await {
        if let ChatEvent::PhaseChanged { phase } = event {
            phases.push(phase);
        }
    }
    assert_eq!(phases, vec![ChatPhase::Sending, ChatPhase::Idle]);
}

#[tokio::test]
async fn events_follow_the_exchange() {
    let service = MockService::new();
    service.reply(Reply::tokens(&["Hi", " there"]));
    let (tx, mut rx) = mpsc::channel(64);
    let chat = controller(&service, MockGate::authorized()).with_events(tx);

    chat.send("hello").await;
    drop(chat);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let reply_id = match &events[2] {
        ChatEvent::MessageAppended { message } => {
            assert_eq!(message.role, Role::Model);
            assert!(message.text.is_empty());
            message.id.clone()
        }
        other => panic!("expected model message, got {:?}", other),
    };

    assert!(matches!(
        &events[0],
        ChatEvent::MessageAppended { message } if message.role == Role::User && message.text == "hello"
    ));
    assert_eq!(
        events[1],
        ChatEvent::PhaseChanged {
            phase: ChatPhase::Sending
        }
    );
    assert_eq!(
        events[3..],
        [
            ChatEvent::PhaseChanged {
                phase: ChatPhase::Streaming
            },
            ChatEvent::Fragment {
                message_id: reply_id.clone(),
                text: "Hi".into()
            },
            ChatEvent::Fragment {
                message_id: reply_id,
                text: " there".into()
            },
            ChatEvent::PhaseChanged {
                phase: ChatPhase::Idle
            },
        ]
    );
}

#[tokio::test]
async fn failure_events_pass_through_error_phase() {
    let service = MockService::new();
    service.reply(Reply::Reject(LLMError::Api("HTTP 500".into())));
    let (tx, mut rx) = mpsc::channel(64);
    let chat = controller(&service, MockGate::authorized()).with_events(tx);

    chat.send("hello").await;
    drop(chat);

    let mut phases = Vec::new();
    while let Some(event) = rx.recv().await {
        if let ChatEvent::PhaseChanged { phase } = event {
            phases.push(phase);
        }
    }
    assert_eq!(
        phases,
        vec![ChatPhase::Sending, ChatPhase::Error, ChatPhase::Idle]
    );
}

//! Streaming chat controller.
//!
//! One exchange at a time: `Idle -> Sending -> Streaming -> Idle`, or
//! `Sending/Streaming -> Error -> Idle` when the service fails. Each session
//! carries a version; an exchange that outlives its session stops touching the
//! transcript.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, RwLock};

use hawkins_core::chat::SIGNAL_LOST;
use hawkins_core::{CapabilityMode, ChatEvent, ChatMessage, ChatPhase, Role};
use hawkins_llm::{
    ensure_credential, ChatSession, CredentialGate, GenerationService, LLMChunk, LLMError,
    LLMStream,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFailure {
    /// The stream broke after it started.
    StreamInterrupted(String),
    Transport(String),
    Credential(String),
}

impl ChatFailure {
    fn from_llm(err: &LLMError, streaming: bool) -> Self {
        if err.is_credential_failure() {
            ChatFailure::Credential(err.to_string())
        } else if streaming {
            ChatFailure::StreamInterrupted(err.to_string())
        } else {
            ChatFailure::Transport(err.to_string())
        }
    }
}

/// What happened to one `send` call. Failures are already in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank text or an exchange already in progress.
    Ignored,
    Completed,
    Failed(ChatFailure),
    /// The session was replaced mid-exchange; late fragments were discarded.
    Superseded,
}

struct ChatState {
    transcript: Vec<ChatMessage>,
    phase: ChatPhase,
    session: Arc<dyn ChatSession>,
    mode: CapabilityMode,
    version: u64,
    /// Bumped on every accepted send.
    exchange: u64,
}

impl ChatState {
    /// Return to `Idle` if `exchange` is still the one in progress.
    fn abandon(&mut self, exchange: u64, events: Option<&mpsc::Sender<ChatEvent>>) {
        if self.exchange != exchange || self.phase.is_idle() {
            return;
        }
        log::warn!(
            "[chat v{}] Exchange {} dropped before it finished, phase reset",
            self.version,
            exchange
        );
        self.phase = ChatPhase::Idle;
        if let Some(events) = events {
            let _ = events.try_send(ChatEvent::PhaseChanged {
                phase: ChatPhase::Idle,
            });
        }
    }
}

/// Unlocks the controller when a `send` future is dropped mid-exchange.
struct ExchangeGuard {
    state: Arc<RwLock<ChatState>>,
    events: Option<mpsc::Sender<ChatEvent>>,
    exchange: u64,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        let exchange = self.exchange;
        if let Ok(mut state) = self.state.try_write() {
            state.abandon(exchange, self.events.as_ref());
            return;
        }

        let state = Arc::clone(&self.state);
        let events = self.events.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    state.write().await.abandon(exchange, events.as_ref());
                });
            }
            Err(_) => log::error!(
                "Exchange {} dropped outside a runtime, phase not reset",
                exchange
            ),
        }
    }
}

#[derive(Clone)]
pub struct ChatSessionController {
    service: Arc<dyn GenerationService>,
    credentials: Arc<dyn CredentialGate>,
    state: Arc<RwLock<ChatState>>,
    events: Option<mpsc::Sender<ChatEvent>>,
}

impl ChatSessionController {
    pub fn new(
        service: Arc<dyn GenerationService>,
        credentials: Arc<dyn CredentialGate>,
        mode: CapabilityMode,
    ) -> Self {
        Self::with_transcript(service, credentials, mode, Vec::new())
    }

    /// Start from an existing transcript, e.g. a greeting line.
    pub fn with_transcript(
        service: Arc<dyn GenerationService>,
        credentials: Arc<dyn CredentialGate>,
        mode: CapabilityMode,
        transcript: Vec<ChatMessage>,
    ) -> Self {
        let session = service.create_session(mode);
        Self {
            service,
            credentials,
            state: Arc::new(RwLock::new(ChatState {
                transcript,
                phase: ChatPhase::Idle,
                session,
                mode,
                version: 0,
                exchange: 0,
            })),
            events: None,
        }
    }

    /// Publish transcript changes as they happen.
    pub fn with_events(mut self, events: mpsc::Sender<ChatEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.state.read().await.transcript.clone()
    }

    pub async fn phase(&self) -> ChatPhase {
        self.state.read().await.phase
    }

    pub async fn mode(&self) -> CapabilityMode {
        self.state.read().await.mode
    }

    pub async fn session_version(&self) -> u64 {
        self.state.read().await.version
    }

    /// Replace the session if `mode` differs from the current one.
    ///
    /// Returns whether a new session was created. An exchange still running on
    /// the old session keeps what it already appended and drops the rest.
    pub async fn set_capability_mode(&self, mode: CapabilityMode) -> bool {
        let (version, interrupted) = {
            let mut state = self.state.write().await;
            if state.mode == mode {
                return false;
            }
            state.session = self.service.create_session(mode);
            state.mode = mode;
            state.version += 1;
            let interrupted = !state.phase.is_idle();
            state.phase = ChatPhase::Idle;
            (state.version, interrupted)
        };

        log::info!("[chat v{}] Session replaced, mode={}", version, mode);
        if interrupted {
            log::debug!("[chat v{}] In-flight exchange abandoned", version);
        }
        self.emit(ChatEvent::SessionReplaced { mode, version }).await;
        if interrupted {
            self.emit(ChatEvent::PhaseChanged {
                phase: ChatPhase::Idle,
            })
            .await;
        }
        true
    }

    /// Send one user message and stream the reply into the transcript.
    pub async fn send(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        let (session, version, exchange, user_message) = {
            let mut state = self.state.write().await;
            if !state.phase.is_idle() {
                log::debug!("[chat v{}] Send ignored, phase={:?}", state.version, state.phase);
                return SendOutcome::Ignored;
            }
            let message = ChatMessage::user(text);
            state.transcript.push(message.clone());
            state.phase = ChatPhase::Sending;
            state.exchange += 1;
            (
                Arc::clone(&state.session),
                state.version,
                state.exchange,
                message,
            )
        };
        let _guard = ExchangeGuard {
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            exchange,
        };

        self.emit(ChatEvent::MessageAppended {
            message: user_message,
        })
        .await;
        self.emit(ChatEvent::PhaseChanged {
            phase: ChatPhase::Sending,
        })
        .await;

        ensure_credential(self.credentials.as_ref()).await;

        log::debug!("[chat v{}] Sending {} chars", version, text.len());
        match session.send_message_stream(text).await {
            Ok(stream) => self.consume(stream, version).await,
            Err(err) => self.fail(version, ChatFailure::from_llm(&err, false)).await,
        }
    }

    async fn consume(&self, mut stream: LLMStream, version: u64) -> SendOutcome {
        let mut reply_id: Option<String> = None;

        while let Some(item) = stream.next().await {
            match item {
                Ok(LLMChunk::Token(fragment)) => {
                    if !self.apply_fragment(version, &mut reply_id, fragment).await {
                        log::debug!("[chat v{}] Session superseded, dropping stream", version);
                        return SendOutcome::Superseded;
                    }
                }
                Ok(LLMChunk::Done) => {
                    log::debug!("[chat v{}] Stream completed", version);
                }
                Err(err) => {
                    return self.fail(version, ChatFailure::from_llm(&err, true)).await;
                }
            }
        }

        self.complete(version, reply_id).await
    }

    /// Append `fragment` to this exchange's model message, creating it on first use.
    ///
    /// Returns false when the exchange's session has been replaced.
    async fn apply_fragment(
        &self,
        version: u64,
        reply_id: &mut Option<String>,
        fragment: String,
    ) -> bool {
        let mut appended = None;
        let message_id = {
            let mut state = self.state.write().await;
            if state.version != version {
                return false;
            }

            let id = match reply_id {
                Some(id) => id.clone(),
                None => {
                    let message = ChatMessage::model("");
                    let id = message.id.clone();
                    state.transcript.push(message.clone());
                    state.phase = ChatPhase::Streaming;
                    *reply_id = Some(id.clone());
                    appended = Some(message);
                    id
                }
            };

            if let Some(message) = state
                .transcript
                .iter_mut()
                .rev()
                .find(|m| m.id == id && m.role == Role::Model)
            {
                message.text.push_str(&fragment);
            }
            id
        };

        if let Some(message) = appended {
            self.emit(ChatEvent::MessageAppended { message }).await;
            self.emit(ChatEvent::PhaseChanged {
                phase: ChatPhase::Streaming,
            })
            .await;
        }
        self.emit(ChatEvent::Fragment {
            message_id,
            text: fragment,
        })
        .await;
        true
    }

    async fn complete(&self, version: u64, reply_id: Option<String>) -> SendOutcome {
        let appended = {
            let mut state = self.state.write().await;
            if state.version != version {
                return SendOutcome::Superseded;
            }
            // A reply with no fragments still occupies its transcript slot.
            let appended = reply_id.is_none().then(|| {
                let message = ChatMessage::model("");
                state.transcript.push(message.clone());
                message
            });
            state.phase = ChatPhase::Idle;
            appended
        };

        if let Some(message) = appended {
            self.emit(ChatEvent::MessageAppended { message }).await;
        }
        self.emit(ChatEvent::PhaseChanged {
            phase: ChatPhase::Idle,
        })
        .await;
        SendOutcome::Completed
    }

    async fn fail(&self, version: u64, failure: ChatFailure) -> SendOutcome {
        let fallback = {
            let mut state = self.state.write().await;
            if state.version != version {
                return SendOutcome::Superseded;
            }
            state.phase = ChatPhase::Error;
            let message = ChatMessage::model(SIGNAL_LOST);
            state.transcript.push(message.clone());
            state.phase = ChatPhase::Idle;
            message
        };

        log::warn!("[chat v{}] Transmission error: {:?}", version, failure);
        if matches!(failure, ChatFailure::Credential(_)) {
            self.credentials.request_selection().await;
        }

        self.emit(ChatEvent::PhaseChanged {
            phase: ChatPhase::Error,
        })
        .await;
        self.emit(ChatEvent::MessageAppended { message: fallback })
            .await;
        self.emit(ChatEvent::PhaseChanged {
            phase: ChatPhase::Idle,
        })
        .await;
        SendOutcome::Failed(failure)
    }

    async fn emit(&self, event: ChatEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}

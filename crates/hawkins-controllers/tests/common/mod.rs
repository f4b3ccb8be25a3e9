#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use tokio::sync::Notify;
use tokio::time::Instant;

use hawkins_core::{Attachment, CapabilityMode, ImageArtifact};
use hawkins_llm::{
    ChatSession, CredentialGate, CredentialStatus, GenerationService, ImageRequest, LLMChunk,
    LLMError, LLMStream, Result, VideoOperation, VideoRequest,
};

/// How the next `send_message_stream` behaves.
pub enum Reply {
    Chunks(Vec<Result<LLMChunk>>),
    Reject(LLMError),
    /// Fragments are pushed by the test through the paired sender.
    Live(mpsc::UnboundedReceiver<Result<LLMChunk>>),
}

impl Reply {
    pub fn tokens(tokens: &[&str]) -> Self {
        let mut chunks: Vec<Result<LLMChunk>> = tokens
            .iter()
            .map(|t| Ok(LLMChunk::Token(t.to_string())))
            .collect();
        chunks.push(Ok(LLMChunk::Done));
        Reply::Chunks(chunks)
    }

    pub fn live() -> (mpsc::UnboundedSender<Result<LLMChunk>>, Self) {
        let (tx, rx) = mpsc::unbounded();
        (tx, Reply::Live(rx))
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    sent: Vec<(CapabilityMode, String)>,
    sessions: Vec<CapabilityMode>,
    images: VecDeque<Result<Option<ImageArtifact>>>,
    image_requests: Vec<ImageRequest>,
    video_requests: Vec<VideoRequest>,
    polls: VecDeque<bool>,
    poll_times: Vec<Instant>,
    fetched: Vec<String>,
    edits: VecDeque<Result<Option<ImageArtifact>>>,
    edit_prompts: Vec<String>,
    analyses: VecDeque<Result<String>>,
    analyze_calls: Vec<(String, String, bool)>,
    critiques: VecDeque<Result<String>>,
    critique_prompts: Vec<String>,
}

/// Scripted Generation Service. Unscripted calls fail with an API error.
#[derive(Clone, Default)]
pub struct MockService {
    script: Arc<Mutex<Script>>,
    /// When set, `generate_image` waits for one notification before answering.
    image_hold: Option<Arc<Notify>>,
}

fn unscripted(what: &str) -> LLMError {
    LLMError::Api(format!("unscripted {what}"))
}

pub fn image(tag: &str) -> ImageArtifact {
    ImageArtifact::from_base64("image/png", tag)
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding_images(hold: Arc<Notify>) -> Self {
        Self {
            image_hold: Some(hold),
            ..Self::default()
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.with(|s| s.replies.push_back(reply));
        self
    }

    pub fn image_result(&self, result: Result<Option<ImageArtifact>>) -> &Self {
        self.with(|s| s.images.push_back(result));
        self
    }

    pub fn edit_result(&self, result: Result<Option<ImageArtifact>>) -> &Self {
        self.with(|s| s.edits.push_back(result));
        self
    }

    pub fn analysis(&self, result: Result<String>) -> &Self {
        self.with(|s| s.analyses.push_back(result));
        self
    }

    pub fn critique(&self, result: Result<String>) -> &Self {
        self.with(|s| s.critiques.push_back(result));
        self
    }

    /// `done` flags returned by successive polls; once exhausted polls report not done.
    pub fn polls(&self, flags: &[bool]) -> &Self {
        self.with(|s| s.polls.extend(flags.iter().copied()));
        self
    }

    pub fn sent(&self) -> Vec<(CapabilityMode, String)> {
        self.with(|s| s.sent.clone())
    }

    pub fn sessions(&self) -> Vec<CapabilityMode> {
        self.with(|s| s.sessions.clone())
    }

    pub fn image_requests(&self) -> Vec<ImageRequest> {
        self.with(|s| s.image_requests.clone())
    }

    pub fn video_requests(&self) -> Vec<VideoRequest> {
        self.with(|s| s.video_requests.clone())
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.with(|s| s.poll_times.clone())
    }

    pub fn fetched(&self) -> Vec<String> {
        self.with(|s| s.fetched.clone())
    }

    pub fn edit_prompts(&self) -> Vec<String> {
        self.with(|s| s.edit_prompts.clone())
    }

    pub fn analyze_calls(&self) -> Vec<(String, String, bool)> {
        self.with(|s| s.analyze_calls.clone())
    }

    pub fn critique_prompts(&self) -> Vec<String> {
        self.with(|s| s.critique_prompts.clone())
    }

    /// Total number of calls that reached the service.
    pub fn call_count(&self) -> usize {
        self.with(|s| {
            s.sent.len()
                + s.image_requests.len()
                + s.video_requests.len()
                + s.poll_times.len()
                + s.fetched.len()
                + s.edit_prompts.len()
                + s.analyze_calls.len()
                + s.critique_prompts.len()
        })
    }
}

pub struct MockSession {
    mode: CapabilityMode,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl ChatSession for MockSession {
    fn mode(&self) -> CapabilityMode {
        self.mode
    }

    async fn send_message_stream(&self, text: &str) -> Result<LLMStream> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.sent.push((self.mode, text.to_string()));
            script.replies.pop_front()
        };
        match reply {
            Some(Reply::Chunks(chunks)) => Ok(Box::pin(futures::stream::iter(chunks))),
            Some(Reply::Live(rx)) => Ok(Box::pin(rx)),
            Some(Reply::Reject(err)) => Err(err),
            None => Err(unscripted("chat reply")),
        }
    }
}

#[async_trait]
impl GenerationService for MockService {
    fn create_session(&self, mode: CapabilityMode) -> Arc<dyn ChatSession> {
        self.with(|s| s.sessions.push(mode));
        Arc::new(MockSession {
            mode,
            script: Arc::clone(&self.script),
        })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImageArtifact>> {
        self.with(|s| s.image_requests.push(request.clone()));
        if let Some(hold) = &self.image_hold {
            hold.notified().await;
        }
        self.with(|s| s.images.pop_front())
            .unwrap_or_else(|| Err(unscripted("image")))
    }

    async fn generate_video_op(&self, request: &VideoRequest) -> Result<VideoOperation> {
        self.with(|s| s.video_requests.push(request.clone()));
        Ok(VideoOperation {
            name: "operations/rift-1".to_string(),
            done: false,
            result_uri: None,
        })
    }

    async fn poll_operation(&self, operation: &VideoOperation) -> Result<VideoOperation> {
        let done = self.with(|s| {
            s.poll_times.push(Instant::now());
            s.polls.pop_front().unwrap_or(false)
        });
        Ok(VideoOperation {
            name: operation.name.clone(),
            done,
            result_uri: done.then(|| "https://files.example/rift.mp4".to_string()),
        })
    }

    async fn fetch_video(&self, uri: &str) -> Result<Bytes> {
        self.with(|s| s.fetched.push(uri.to_string()));
        Ok(Bytes::from_static(b"mp4-bytes"))
    }

    async fn edit_image(&self, _image: &Attachment, prompt: &str) -> Result<Option<ImageArtifact>> {
        self.with(|s| {
            s.edit_prompts.push(prompt.to_string());
            s.edits.pop_front()
        })
        .unwrap_or_else(|| Err(unscripted("edit")))
    }

    async fn analyze_media(
        &self,
        media: &Attachment,
        prompt: &str,
        thinking_enabled: bool,
    ) -> Result<String> {
        self.with(|s| {
            s.analyze_calls
                .push((media.mime_type.clone(), prompt.to_string(), thinking_enabled));
            s.analyses.pop_front()
        })
        .unwrap_or_else(|| Err(unscripted("analysis")))
    }

    async fn critique_text(&self, prompt: &str) -> Result<String> {
        self.with(|s| {
            s.critique_prompts.push(prompt.to_string());
            s.critiques.pop_front()
        })
        .unwrap_or_else(|| Err(unscripted("critique")))
    }
}

pub struct MockGate {
    status: CredentialStatus,
    selections: AtomicUsize,
}

impl MockGate {
    pub fn authorized() -> Arc<Self> {
        Arc::new(Self {
            status: CredentialStatus::Authorized,
            selections: AtomicUsize::new(0),
        })
    }

    pub fn unselected() -> Arc<Self> {
        Arc::new(Self {
            status: CredentialStatus::NeedsSelection,
            selections: AtomicUsize::new(0),
        })
    }

    pub fn selections(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialGate for MockGate {
    async fn check(&self) -> CredentialStatus {
        self.status
    }

    async fn request_selection(&self) {
        self.selections.fetch_add(1, Ordering::SeqCst);
    }
}

/// Yield to spawned tasks until `done` holds.
pub async fn until(mut done: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

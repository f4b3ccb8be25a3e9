//! Media request controller: one request of one kind at a time, one result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use hawkins_core::{
    Attachment, ControllerError, MediaError, MediaInputs, MediaKind, MediaParams, MediaResult,
    VideoArtifact,
};
use hawkins_llm::prompts::DEFAULT_ANALYZE_PROMPT;
use hawkins_llm::{
    ensure_credential, CredentialGate, GenerationService, ImageRequest, LLMError, VideoRequest,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shown when the service answered without an artifact.
pub const VOID_RESISTED: &str = "The Void resisted your request.";

/// Status line displayed while a request of `kind` is running.
pub fn loading_message(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Generate => "Manifesting Psychic Image...",
        MediaKind::Video => "Opening Video Rift... This may take a few minutes.",
        MediaKind::Edit => "Manipulating Artifact...",
        MediaKind::Analyze => "Observing Artifact through Thinking Mode...",
    }
}

struct MediaState {
    kind: MediaKind,
    result: Option<MediaResult>,
    /// Bumped on every kind switch; results from older epochs are dropped.
    epoch: u64,
    cancel: CancellationToken,
}

/// Releases the in-flight gate however `execute` exits.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct MediaRequestController {
    service: Arc<dyn GenerationService>,
    credentials: Arc<dyn CredentialGate>,
    poll_interval: Duration,
    in_flight: Arc<AtomicBool>,
    state: Arc<RwLock<MediaState>>,
}

impl MediaRequestController {
    pub fn new(service: Arc<dyn GenerationService>, credentials: Arc<dyn CredentialGate>) -> Self {
        Self {
            service,
            credentials,
            poll_interval: DEFAULT_POLL_INTERVAL,
            in_flight: Arc::new(AtomicBool::new(false)),
            state: Arc::new(RwLock::new(MediaState {
                kind: MediaKind::default(),
                result: None,
                epoch: 0,
                cancel: CancellationToken::new(),
            })),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn kind(&self) -> MediaKind {
        self.state.read().await.kind
    }

    pub async fn result(&self) -> Option<MediaResult> {
        self.state.read().await.result.clone()
    }

    /// Switch tabs. Clears the result and detaches any in-flight request.
    pub async fn set_kind(&self, kind: MediaKind) {
        let mut state = self.state.write().await;
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.kind = kind;
        state.epoch += 1;
        state.result = None;
        log::debug!("[media {}] Active kind set, epoch={}", kind, state.epoch);
    }

    /// Drop the current result without switching kind (e.g. a new upload).
    pub async fn clear(&self) {
        self.state.write().await.result = None;
    }

    /// Run one request of the active kind.
    ///
    /// Returns an error only when the request is rejected before any call;
    /// service failures land in [`MediaRequestController::result`].
    pub async fn execute(&self, inputs: MediaInputs) -> Result<(), ControllerError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ControllerError::Busy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let (kind, epoch, cancel) = {
            let state = self.state.read().await;
            (state.kind, state.epoch, state.cancel.clone())
        };
        let params = validate(kind, &inputs)?;

        ensure_credential(self.credentials.as_ref()).await;

        log::info!("[media {}] {}", kind, loading_message(kind));
        let outcome = match self.run(params, &inputs, &cancel).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                log::info!("[media {}] Request abandoned", kind);
                return Ok(());
            }
            Err(err) => {
                log::error!("[media {}] Request failed: {}", kind, err);
                MediaResult::Error(err.to_media_error())
            }
        };

        let credential_failure = outcome.error().is_some_and(MediaError::is_credential);
        {
            let mut state = self.state.write().await;
            if state.epoch != epoch {
                log::info!("[media {}] Result detached, kind switched", kind);
                return Ok(());
            }
            state.result = Some(outcome);
        }

        if credential_failure {
            self.credentials.request_selection().await;
        }
        Ok(())
    }

    /// `Ok(None)` means the request was cancelled before it produced anything.
    async fn run(
        &self,
        params: MediaParams,
        inputs: &MediaInputs,
        cancel: &CancellationToken,
    ) -> hawkins_llm::Result<Option<MediaResult>> {
        let result = match params {
            MediaParams::Generate { size, aspect_ratio } => {
                let request = ImageRequest::new(inputs.prompt.as_str(), size, aspect_ratio);
                image_or_resisted(self.service.generate_image(&request).await?)
            }
            MediaParams::Video {
                resolution,
                aspect_ratio,
            } => {
                let request = VideoRequest::new(inputs.prompt.as_str(), aspect_ratio, resolution);
                match self.generate_video(&request, cancel).await? {
                    Some(video) => MediaResult::Video(video),
                    None => return Ok(None),
                }
            }
            MediaParams::Edit => {
                let image = required(&inputs.attachment)?;
                image_or_resisted(self.service.edit_image(image, &inputs.prompt).await?)
            }
            MediaParams::Analyze { thinking_enabled } => {
                let media = required(&inputs.attachment)?;
                let prompt = if inputs.prompt.trim().is_empty() {
                    DEFAULT_ANALYZE_PROMPT
                } else {
                    inputs.prompt.as_str()
                };
                MediaResult::Text(
                    self.service
                        .analyze_media(media, prompt, thinking_enabled)
                        .await?,
                )
            }
        };
        Ok(Some(result))
    }

    /// Start the operation and poll until it is done or `cancel` fires.
    async fn generate_video(
        &self,
        request: &VideoRequest,
        cancel: &CancellationToken,
    ) -> hawkins_llm::Result<Option<VideoArtifact>> {
        let mut operation = self.service.generate_video_op(request).await?;

        while !operation.done {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("Stopped polling {}", operation.name);
                    return Ok(None);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            operation = self.service.poll_operation(&operation).await?;
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }

        let uri = operation.result_uri.ok_or_else(|| {
            LLMError::Api(format!("Video operation {} finished without a video", operation.name))
        })?;
        let bytes = self.service.fetch_video(&uri).await?;
        Ok(Some(VideoArtifact { uri, bytes }))
    }
}

fn image_or_resisted(image: Option<hawkins_core::ImageArtifact>) -> MediaResult {
    match image {
        Some(image) => MediaResult::Image(image),
        None => MediaResult::Error(MediaError::Transport(VOID_RESISTED.to_string())),
    }
}

fn required(attachment: &Option<Attachment>) -> hawkins_llm::Result<&Attachment> {
    attachment
        .as_ref()
        .ok_or_else(|| LLMError::Protocol("attachment missing after validation".to_string()))
}

/// Check required inputs for `kind` and resolve its params.
fn validate(kind: MediaKind, inputs: &MediaInputs) -> Result<MediaParams, ControllerError> {
    let params = inputs
        .params
        .unwrap_or_else(|| MediaParams::defaults_for(kind));
    if params.kind() != kind {
        return Err(ControllerError::Validation(format!(
            "{} parameters do not apply to {}",
            params.kind(),
            kind
        )));
    }

    let has_prompt = !inputs.prompt.trim().is_empty();
    match kind {
        MediaKind::Generate | MediaKind::Video if !has_prompt => Err(ControllerError::Validation(
            "Describe the vision to manifest first.".to_string(),
        )),
        MediaKind::Edit => match &inputs.attachment {
            None => Err(ControllerError::Validation(
                "Need an artifact to manipulate. Upload a file.".to_string(),
            )),
            Some(a) if !a.is_image() => Err(ControllerError::Validation(format!(
                "Only images can be altered, got {}",
                a.mime_type
            ))),
            Some(_) if !has_prompt => Err(ControllerError::Validation(
                "Instruct the void how to alter the artifact.".to_string(),
            )),
            Some(_) => Ok(params),
        },
        MediaKind::Analyze => match &inputs.attachment {
            None => Err(ControllerError::Validation(
                "Need an artifact to observe. Upload a file.".to_string(),
            )),
            Some(a) if !a.is_image() && !a.is_video() => Err(ControllerError::Validation(
                format!("Cannot observe {} artifacts", a.mime_type),
            )),
            Some(_) => Ok(params),
        },
        _ => Ok(params),
    }
}

//! Google Gemini implementation of the Generation Service.

pub mod protocol;
mod stream;

pub use stream::parse_gemini_sse_event;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hawkins_core::{Attachment, CapabilityMode, Config, ImageArtifact, ModelConfig};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use self::protocol::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig,
    Operation, Part, PredictLongRunningRequest, ThinkingConfig, VideoInstance, VideoParameters,
};
use crate::error::{LLMError, Result};
use crate::prompts::EMPTY_ANALYSIS;
use crate::service::{ChatSession, GenerationService, ImageRequest, VideoOperation, VideoRequest};
use crate::sse::llm_stream_from_sse;
use crate::types::{LLMChunk, LLMStream};

/// Shared HTTP plumbing for the service and its chat sessions.
#[derive(Clone)]
struct GeminiTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiTransport {
    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, model, method, self.api_key
        )
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(url).json(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        log::debug!("Gemini generateContent on {}", model);
        self.post_json(&self.model_url(model, "generateContent"), request)
            .await
    }
}

/// Map non-success statuses to [`LLMError`], keeping the body for classification.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    if status == 401 || status == 403 {
        return Err(LLMError::Auth(format!(
            "Gemini authentication failed: {}. Please check your API key.",
            text
        )));
    }

    Err(LLMError::Api(format!(
        "Gemini API error: HTTP {}: {}",
        status, text
    )))
}

/// Append the API key to a download URI that may already carry a query.
fn with_key(uri: &str, api_key: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}key={api_key}")
}

/// Google Gemini API service.
pub struct GeminiService {
    transport: GeminiTransport,
    models: ModelConfig,
    system_instruction: String,
    temperature: f32,
    thinking_budget: u32,
}

impl GeminiService {
    pub fn new(config: &Config) -> Self {
        Self {
            transport: GeminiTransport {
                client: build_client(config),
                api_key: config.api_key.clone().unwrap_or_default(),
                base_url: config.api_base().trim_end_matches('/').to_string(),
            },
            models: config.models.clone(),
            system_instruction: config.system_instruction.clone(),
            temperature: config.temperature,
            thinking_budget: config.thinking_budget,
        }
    }

    /// Set a custom base URL (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.transport.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn thinking(&self, enabled: bool) -> Option<ThinkingConfig> {
        enabled.then_some(ThinkingConfig {
            thinking_budget: self.thinking_budget,
        })
    }
}

fn build_client(config: &Config) -> Client {
    if config.https_proxy.is_empty() {
        return Client::new();
    }

    match reqwest::Proxy::https(&config.https_proxy)
        .and_then(|proxy| Client::builder().proxy(proxy).build())
    {
        Ok(client) => client,
        Err(e) => {
            log::warn!("Ignoring HTTPS proxy {}: {}", config.https_proxy, e);
            Client::new()
        }
    }
}

#[async_trait]
impl GenerationService for GeminiService {
    fn create_session(&self, mode: CapabilityMode) -> Arc<dyn ChatSession> {
        let model = self.models.chat_model(mode).to_string();
        log::info!("Creating {} chat session on {}", mode, model);
        Arc::new(GeminiChatSession {
            transport: self.transport.clone(),
            mode,
            model,
            system_instruction: self.system_instruction.clone(),
            generation_config: GenerationConfig {
                temperature: Some(self.temperature),
                thinking_config: self.thinking(mode == CapabilityMode::DeepThink),
                image_config: None,
            },
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImageArtifact>> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::text(request.full_prompt())],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio: request.aspect_ratio.to_string(),
                    image_size: request.size.to_string(),
                }),
                ..GenerationConfig::default()
            }),
        };
        let response = self
            .transport
            .generate_content(&self.models.image, &body)
            .await?;
        Ok(response.first_inline_image())
    }

    async fn generate_video_op(&self, request: &VideoRequest) -> Result<VideoOperation> {
        let body = PredictLongRunningRequest {
            instances: vec![VideoInstance {
                prompt: request.full_prompt(),
            }],
            parameters: VideoParameters {
                number_of_videos: 1,
                resolution: request.resolution.to_string(),
                aspect_ratio: request.aspect_ratio.to_string(),
            },
        };
        let url = self
            .transport
            .model_url(&self.models.video, "predictLongRunning");
        let operation: Operation = self.transport.post_json(&url, &body).await?;
        log::info!("Started video operation {}", operation.name);
        operation.into_video_operation()
    }

    async fn poll_operation(&self, operation: &VideoOperation) -> Result<VideoOperation> {
        let url = format!(
            "{}/{}?key={}",
            self.transport.base_url, operation.name, self.transport.api_key
        );
        let response = self.transport.client.get(&url).send().await?;
        let polled: Operation = check_status(response).await?.json().await?;
        log::debug!("Polled {}: done={}", polled.name, polled.done);
        polled.into_video_operation()
    }

    async fn fetch_video(&self, uri: &str) -> Result<Bytes> {
        let response = self
            .transport
            .client
            .get(with_key(uri, &self.transport.api_key))
            .send()
            .await?;
        Ok(check_status(response).await?.bytes().await?)
    }

    async fn edit_image(&self, image: &Attachment, prompt: &str) -> Result<Option<ImageArtifact>> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::inline(image), Part::text(prompt)],
            }],
            ..GenerateContentRequest::default()
        };
        let response = self
            .transport
            .generate_content(&self.models.edit, &body)
            .await?;
        Ok(response.first_inline_image())
    }

    async fn analyze_media(
        &self,
        media: &Attachment,
        prompt: &str,
        thinking_enabled: bool,
    ) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::inline(media), Part::text(prompt)],
            }],
            system_instruction: None,
            generation_config: self.thinking(thinking_enabled).map(|thinking| GenerationConfig {
                thinking_config: Some(thinking),
                ..GenerationConfig::default()
            }),
        };
        let response = self
            .transport
            .generate_content(&self.models.analyze, &body)
            .await?;
        let text = response.text();
        if text.is_empty() {
            return Ok(EMPTY_ANALYSIS.to_string());
        }
        Ok(text)
    }

    async fn critique_text(&self, prompt: &str) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::text(prompt)],
            }],
            ..GenerateContentRequest::default()
        };
        let response = self
            .transport
            .generate_content(&self.models.critique, &body)
            .await?;
        Ok(response.text())
    }
}

/// A Gemini chat bound to one model configuration, holding its own history.
pub struct GeminiChatSession {
    transport: GeminiTransport,
    mode: CapabilityMode,
    model: String,
    system_instruction: String,
    generation_config: GenerationConfig,
    history: Arc<Mutex<Vec<Content>>>,
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    fn mode(&self) -> CapabilityMode {
        self.mode
    }

    async fn send_message_stream(&self, text: &str) -> Result<LLMStream> {
        let user_turn = Content::text("user", text);
        let mut contents = self.history.lock().await.clone();
        contents.push(user_turn.clone());

        let request = GenerateContentRequest {
            contents,
            system_instruction: Some(Content::system(self.system_instruction.as_str())),
            generation_config: Some(self.generation_config.clone()),
        };

        let url = format!(
            "{}&alt=sse",
            self.transport.model_url(&self.model, "streamGenerateContent")
        );
        let response = self
            .transport
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        log::debug!("Gemini stream started on {}", self.model);

        let mut inner = llm_stream_from_sse(response, parse_gemini_sse_event);
        let history = Arc::clone(&self.history);

        Ok(Box::pin(async_stream::stream! {
            let mut reply = String::new();
            let mut failed = false;
            while let Some(item) = inner.next().await {
                match item {
                    Ok(LLMChunk::Token(token)) => {
                        reply.push_str(&token);
                        yield Ok(LLMChunk::Token(token));
                    }
                    Ok(LLMChunk::Done) => break,
                    Err(e) => {
                        failed = true;
                        yield Err(e);
                        break;
                    }
                }
            }
            // Only completed exchanges enter the history.
            if !failed {
                let mut history = history.lock().await;
                history.push(user_turn);
                history.push(Content::text("model", reply));
            }
        }))
    }
}

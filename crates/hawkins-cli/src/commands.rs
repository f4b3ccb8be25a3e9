use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use hawkins_controllers::{
    loading_message, ChatFailure, ChatSessionController, IdeaCritic, MediaRequestController,
    SendOutcome,
};
use hawkins_core::chat::GREETING;
use hawkins_core::{
    Attachment, CapabilityMode, ChatEvent, ChatMessage, Config, ImageArtifact, ImageAspectRatio,
    ImageSize, MediaInputs, MediaKind, MediaParams, MediaResult, Role, VideoAspectRatio,
    VideoResolution,
};
use hawkins_llm::{CredentialGate, GenerationService};

pub struct Context {
    pub service: Arc<dyn GenerationService>,
    pub credentials: Arc<dyn CredentialGate>,
    pub config: Config,
}

impl Context {
    fn chat_controller(&self, mode: CapabilityMode) -> ChatSessionController {
        ChatSessionController::with_transcript(
            self.service.clone(),
            self.credentials.clone(),
            mode,
            vec![ChatMessage::model(GREETING)],
        )
    }

    fn media_controller(&self) -> MediaRequestController {
        MediaRequestController::new(self.service.clone(), self.credentials.clone())
            .with_poll_interval(Duration::from_secs(self.config.video_poll_secs.max(1)))
    }
}

fn render(event: ChatEvent) -> anyhow::Result<()> {
    match event {
        ChatEvent::MessageAppended { message } if message.role == Role::Model => {
            if message.text.is_empty() {
                print!("{} ", "Hawkins Radio:".red().bold());
            } else {
                println!();
                println!("{}", message.text.red());
            }
        }
        ChatEvent::Fragment { text, .. } => print!("{}", text.green()),
        ChatEvent::SessionReplaced { mode, version } => {
            println!(
                "{}",
                format!("📻 Switched frequency to {} (session {})", mode, version).dimmed()
            );
        }
        _ => {}
    }
    std::io::stdout().flush()?;
    Ok(())
}

/// Extra guidance printed under the fallback line.
fn failure_hint(failure: &ChatFailure) -> Option<&'static str> {
    match failure {
        ChatFailure::Credential(_) => Some(
            "🔑 The API key was rejected. Set GEMINI_API_KEY or update ~/.hawkins/config.json and retry.",
        ),
        _ => None,
    }
}

/// Run one exchange, rendering events while the reply streams in.
async fn exchange(
    chat: &ChatSessionController,
    events: &mut mpsc::Receiver<ChatEvent>,
    text: &str,
) -> anyhow::Result<SendOutcome> {
    let send = chat.send(text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            Some(event) = events.recv() => render(event)?,
        }
    };
    while let Ok(event) = events.try_recv() {
        render(event)?;
    }
    println!();
    Ok(outcome)
}

pub async fn chat(ctx: &Context, mode: CapabilityMode) -> anyhow::Result<()> {
    let (tx, mut events) = mpsc::channel(256);
    let chat = ctx.chat_controller(mode).with_events(tx);

    println!("{}", "📻 Hawkins Radio".red().bold());
    println!(
        "{}",
        "Type /deep or /fast to switch frequency, /quit to leave".dimmed()
    );
    println!();
    println!("{} {}", "Hawkins Radio:".red().bold(), GREETING.green());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", format!("You [{}]:", chat.mode().await).cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/deep" => {
                chat.set_capability_mode(CapabilityMode::DeepThink).await;
            }
            "/fast" => {
                chat.set_capability_mode(CapabilityMode::Fast).await;
            }
            _ => {
                if let SendOutcome::Failed(failure) = exchange(&chat, &mut events, input).await? {
                    tracing::debug!("Exchange failed: {:?}", failure);
                    if let Some(hint) = failure_hint(&failure) {
                        println!("{}", hint.dimmed());
                    }
                }
                println!();
                continue;
            }
        }
        while let Ok(event) = events.try_recv() {
            render(event)?;
        }
    }

    println!("{}", "👋 Over and out.".cyan());
    Ok(())
}

pub async fn send(ctx: &Context, mode: CapabilityMode, message: &str) -> anyhow::Result<()> {
    let (tx, mut events) = mpsc::channel(256);
    let chat = ctx.chat_controller(mode).with_events(tx);

    match exchange(&chat, &mut events, message).await? {
        SendOutcome::Completed => Ok(()),
        SendOutcome::Ignored => bail!("Nothing to transmit"),
        SendOutcome::Failed(failure) => match failure_hint(&failure) {
            Some(hint) => bail!("Transmission failed: {:?}\n{}", failure, hint),
            None => bail!("Transmission failed: {:?}", failure),
        },
        SendOutcome::Superseded => Ok(()),
    }
}

async fn run_media(
    media: &MediaRequestController,
    kind: MediaKind,
    inputs: MediaInputs,
) -> anyhow::Result<MediaResult> {
    media.set_kind(kind).await;
    println!("{}", format!("🌀 {}", loading_message(kind)).yellow());

    tokio::select! {
        result = media.execute(inputs) => result?,
        _ = tokio::signal::ctrl_c() => {
            media.set_kind(MediaKind::default()).await;
            bail!("Request abandoned");
        }
    }

    match media.result().await {
        Some(MediaResult::Error(err)) => bail!("{}", err),
        Some(result) => Ok(result),
        None => bail!("The rift closed without an answer"),
    }
}

async fn read_attachment(path: &Path) -> anyhow::Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Attachment::new(bytes, mime.essence_str()))
}

fn default_output(stem: &str, mime_type: &str) -> PathBuf {
    let ext = mime_guess::get_mime_extensions_str(mime_type)
        .and_then(|exts| exts.first())
        .copied()
        .unwrap_or("bin");
    PathBuf::from(format!("{stem}.{ext}"))
}

async fn save_image(image: &ImageArtifact, out: Option<PathBuf>, stem: &str) -> anyhow::Result<()> {
    let decoded = image.decode()?;
    let path = out.unwrap_or_else(|| default_output(stem, &decoded.mime_type));
    tokio::fs::write(&path, &decoded.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{}", format!("✅ Saved {}", path.display()).green());
    Ok(())
}

pub async fn image(
    ctx: &Context,
    prompt: String,
    size: ImageSize,
    aspect_ratio: ImageAspectRatio,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let inputs = MediaInputs::prompt(prompt).with_params(MediaParams::Generate { size, aspect_ratio });
    let result = run_media(&ctx.media_controller(), MediaKind::Generate, inputs).await?;
    match result.image() {
        Some(image) => save_image(image, out, "manifestation").await,
        None => bail!("Expected an image"),
    }
}

pub async fn video(
    ctx: &Context,
    prompt: String,
    resolution: VideoResolution,
    aspect_ratio: VideoAspectRatio,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let inputs = MediaInputs::prompt(prompt).with_params(MediaParams::Video {
        resolution,
        aspect_ratio,
    });
    let result = run_media(&ctx.media_controller(), MediaKind::Video, inputs).await?;
    let Some(video) = result.video() else {
        bail!("Expected a video");
    };

    let path = out.unwrap_or_else(|| PathBuf::from("rift.mp4"));
    tokio::fs::write(&path, &video.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{}", format!("✅ Saved {}", path.display()).green());
    Ok(())
}

pub async fn edit(
    ctx: &Context,
    file: &Path,
    prompt: String,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let inputs = MediaInputs::prompt(prompt).with_attachment(read_attachment(file).await?);
    let result = run_media(&ctx.media_controller(), MediaKind::Edit, inputs).await?;
    match result.image() {
        Some(image) => save_image(image, out, "altered").await,
        None => bail!("Expected an image"),
    }
}

pub async fn analyze(
    ctx: &Context,
    file: &Path,
    prompt: String,
    thinking_enabled: bool,
) -> anyhow::Result<()> {
    let inputs = MediaInputs::prompt(prompt)
        .with_attachment(read_attachment(file).await?)
        .with_params(MediaParams::Analyze { thinking_enabled });
    let result = run_media(&ctx.media_controller(), MediaKind::Analyze, inputs).await?;
    println!("{}", result.text().unwrap_or_default());
    Ok(())
}

pub async fn critique(ctx: &Context, idea: &str) -> anyhow::Result<()> {
    let critic = IdeaCritic::new(ctx.service.clone(), ctx.credentials.clone());
    match critic.critique(idea).await {
        Some(verdict) => println!("{}", format!("🧠 {}", verdict).magenta()),
        None => println!("{}", "Describe your idea first.".dimmed()),
    }
    Ok(())
}

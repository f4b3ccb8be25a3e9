mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hawkins_core::{
    CapabilityMode, Config, ImageAspectRatio, ImageSize, VideoAspectRatio, VideoResolution,
};
use hawkins_llm::{ConfigCredentialGate, CredentialGate, GeminiService, GenerationService};

#[derive(Parser)]
#[command(name = "hawkins")]
#[command(about = "Hawkins Radio chat and media lab for DevClash")]
#[command(version)]
struct Cli {
    /// Gemini API key (overrides config files)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini REST base URL
    #[arg(long, env = "GEMINI_API_BASE")]
    api_base: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat with Hawkins Radio
    Chat {
        /// Start in deep think mode
        #[arg(long)]
        deep: bool,
    },
    /// Send a single message
    Send {
        message: String,
        #[arg(long)]
        deep: bool,
    },
    /// Manifest an image from a prompt
    Image {
        prompt: String,
        #[arg(long, default_value_t = ImageSize::default())]
        size: ImageSize,
        #[arg(long, default_value_t = ImageAspectRatio::default())]
        aspect: ImageAspectRatio,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Open a video rift from a prompt
    Video {
        prompt: String,
        #[arg(long, default_value_t = VideoResolution::default())]
        resolution: VideoResolution,
        #[arg(long, default_value_t = VideoAspectRatio::default())]
        aspect: VideoAspectRatio,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Alter an existing image
    Edit {
        file: PathBuf,
        prompt: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Observe an image or video
    Analyze {
        file: PathBuf,
        prompt: Option<String>,
        /// Skip the extended thinking budget
        #[arg(long)]
        no_thinking: bool,
    },
    /// Ask the Mind Flayer what it thinks of a project idea
    Critique { idea: String },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(debug)
                .with_line_number(debug)
                .with_file(false),
        )
        .init();
}

fn load_config(cli: &Cli) -> Config {
    let mut config = Config::new();
    if let Some(key) = &cli.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(base) = &cli.api_base {
        config.api_base = Some(base.clone());
    }
    config
}

fn mode(deep: bool) -> CapabilityMode {
    if deep {
        CapabilityMode::DeepThink
    } else {
        CapabilityMode::Fast
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(&cli);
    if !config.has_api_key() {
        eprintln!(
            "{}",
            "⚠️  No API key configured. Set GEMINI_API_KEY or add api_key to ~/.hawkins/config.json"
                .yellow()
        );
    }
    tracing::debug!("Using Gemini endpoint {}", config.api_base());

    let service: Arc<dyn GenerationService> = Arc::new(GeminiService::new(&config));
    let credentials: Arc<dyn CredentialGate> = Arc::new(ConfigCredentialGate::new(&config));
    let ctx = commands::Context {
        service,
        credentials,
        config,
    };

    match cli.command {
        Commands::Chat { deep } => commands::chat(&ctx, mode(deep)).await,
        Commands::Send { message, deep } => commands::send(&ctx, mode(deep), &message).await,
        Commands::Image {
            prompt,
            size,
            aspect,
            out,
        } => commands::image(&ctx, prompt, size, aspect, out).await,
        Commands::Video {
            prompt,
            resolution,
            aspect,
            out,
        } => commands::video(&ctx, prompt, resolution, aspect, out).await,
        Commands::Edit { file, prompt, out } => commands::edit(&ctx, &file, prompt, out).await,
        Commands::Analyze {
            file,
            prompt,
            no_thinking,
        } => commands::analyze(&ctx, &file, prompt.unwrap_or_default(), !no_thinking).await,
        Commands::Critique { idea } => commands::critique(&ctx, &idea).await,
    }
}

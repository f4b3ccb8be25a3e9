use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chat::CapabilityMode;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const CHAT_SYSTEM_INSTRUCTION: &str = "\
You are Hawkins Radio, an AI assistant for the DevClash 2026 Hackathon at our college.
Your persona is mysterious, slightly retro (80s style), and helpful.
You make references to Stranger Things (e.g., The Upside Down, Demogorgons, Eggos, Hawkins, Mind Flayer).
You inform users that this is a 24-HOUR CHALLENGE organized by the DEVKRAFT CLUB.
If they ask about registration, tell them it's done directly on this website.
If you don't know something, say \"The signal is weak... I cannot find that information in the void.\"
Keep answers concise and thematic.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub https_proxy: String,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,
    #[serde(default = "default_video_poll_secs")]
    pub video_poll_secs: u64,
}

/// Model names per operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    pub chat_fast: String,
    pub chat_deep: String,
    pub image: String,
    pub video: String,
    pub edit: String,
    pub analyze: String,
    pub critique: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            chat_fast: "gemini-3-flash-preview".to_string(),
            chat_deep: "gemini-3-pro-preview".to_string(),
            image: "gemini-3-pro-image-preview".to_string(),
            video: "veo-3.1-fast-generate-preview".to_string(),
            edit: "gemini-2.5-flash-image".to_string(),
            analyze: "gemini-3-pro-preview".to_string(),
            critique: "gemini-3-flash-preview".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn chat_model(&self, mode: CapabilityMode) -> &str {
        match mode {
            CapabilityMode::Fast => &self.chat_fast,
            CapabilityMode::DeepThink => &self.chat_deep,
        }
    }
}

fn default_system_instruction() -> String {
    CHAT_SYSTEM_INSTRUCTION.to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_thinking_budget() -> u32 {
    32768
}

fn default_video_poll_secs() -> u64 {
    10
}

const CONFIG_FILE_PATH: &str = "hawkins.toml";

fn hawkins_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".hawkins")
}

fn hawkins_config_json_path() -> PathBuf {
    hawkins_dir().join("config.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            https_proxy: String::new(),
            models: ModelConfig::default(),
            system_instruction: default_system_instruction(),
            temperature: default_temperature(),
            thinking_budget: default_thinking_budget(),
            video_poll_secs: default_video_poll_secs(),
        }
    }
}

impl Config {
    /// Load `~/.hawkins/config.json`, else `./hawkins.toml`, then apply environment overrides.
    pub fn new() -> Self {
        let json_path = hawkins_config_json_path();
        let mut config = Self::from_json_file(&json_path)
            .or_else(|| Self::from_toml_file(Path::new(CONFIG_FILE_PATH)))
            .unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_json_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Config>(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring malformed config {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn from_toml_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Config>(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring malformed config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overlay values from the environment; `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(base) = lookup("GEMINI_API_BASE") {
            self.api_base = Some(base);
        }
        if let Some(proxy) = lookup("HTTPS_PROXY") {
            self.https_proxy = proxy;
        }
        if let Some(model) = lookup("HAWKINS_FAST_MODEL") {
            self.models.chat_fast = model;
        }
        if let Some(model) = lookup("HAWKINS_DEEP_MODEL") {
            self.models.chat_deep = model;
        }
        if let Some(secs) = lookup("HAWKINS_VIDEO_POLL_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.video_poll_secs = secs,
                _ => log::warn!("Ignoring invalid HAWKINS_VIDEO_POLL_SECS={}", secs),
            }
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

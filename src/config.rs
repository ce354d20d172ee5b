use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_messages_config")]
    pub messages: MessagesConfig,
    /// Input text (button label or command) -> message key
    #[serde(default)]
    pub triggers: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Empty means the bot answers everyone
    #[serde(default)]
    pub allowed_user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessagesConfig {
    #[serde(default = "default_messages_path")]
    pub path: PathBuf,
    /// Message sent when input matches no trigger or key
    #[serde(default)]
    pub fallback: Option<String>,
}

fn default_messages_path() -> PathBuf {
    PathBuf::from("messages.yaml")
}

fn default_messages_config() -> MessagesConfig {
    MessagesConfig {
        path: default_messages_path(),
        fallback: None,
    }
}

impl TelegramConfig {
    pub fn is_allowed(&self, user_id: u64) -> bool {
        self.allowed_user_ids.is_empty() || self.allowed_user_ids.contains(&user_id)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)?;

        // Relative messages path is resolved against the config file's directory
        if config.messages.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.messages.path = dir.join(&config.messages.path);
            }
        }

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn fallback_key(&self) -> Option<&str> {
        self.messages.fallback.as_deref().filter(|k| !k.is_empty())
    }
}

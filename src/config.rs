use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::roles::ContactDirectory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Target chat, matched against the thread's display name or chat
    /// identifier. Required; there is no sensible default.
    #[serde(default)]
    pub chat_name: String,

    /// The agent's display name; messages from this sender (or flagged
    /// `is_from_me`) count as the assistant's own.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    // LLM configuration (OpenAI-compatible: Ollama, LM Studio, vLLM, OpenAI, etc.)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    /// Cheaper model for the planning call; falls back to `llm_model`.
    #[serde(default)]
    pub planner_model: Option<String>,

    // Polling and memory bounds
    #[serde(default = "default_poll_interval", alias = "check_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,
    #[serde(default = "default_ack_suppress_probability")]
    pub ack_suppress_probability: f64,

    #[serde(default = "default_chat_db_path")]
    pub chat_db_path: String,

    #[serde(default)]
    pub contacts: ContactDirectory,
}

fn default_bot_name() -> String {
    "Meg".to_string()
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_poll_interval() -> u64 {
    20
}

fn default_max_history_size() -> usize {
    40
}

fn default_context_window() -> usize {
    10
}

fn default_summary_threshold() -> usize {
    20
}

fn default_ack_suppress_probability() -> f64 {
    0.5
}

fn default_chat_db_path() -> String {
    dirs::home_dir()
        .map(|home| {
            home.join("Library/Messages/chat.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "chat.db".to_string())
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            chat_name: String::new(),
            bot_name: default_bot_name(),
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            planner_model: None,
            poll_interval_secs: default_poll_interval(),
            max_history_size: default_max_history_size(),
            context_window: default_context_window(),
            summary_threshold: default_summary_threshold(),
            ack_suppress_probability: default_ack_suppress_probability(),
            chat_db_path: default_chat_db_path(),
            contacts: ContactDirectory::default(),
        }
    }
}

impl BotConfig {
    /// Directory containing the executable; the config file lives next to it.
    fn get_base_dir() -> PathBuf {
        match env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("agent_config.toml")
    }

    /// Load from `agent_config.toml` next to the executable, falling back to
    /// environment variables on top of defaults.
    pub fn load() -> Self {
        let path = Self::config_path();

        if let Ok(contents) = fs::read_to_string(&path) {
            match toml::from_str::<BotConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                }
            }
        }

        tracing::warn!("No config file found, using defaults + env vars");
        Self::from_env()
    }

    /// Environment-variable configuration for .env-style deployments.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = env::var("CHAT_NAME") {
            config.chat_name = name;
        }
        if let Ok(name) = env::var("BOT_NAME") {
            config.bot_name = name;
        }
        if let Ok(url) = env::var("LLM_API_URL") {
            config.llm_api_url = url;
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            config.llm_model = model;
        }
        if let Ok(key) = env::var("LLM_API_KEY") {
            config.llm_api_key = Some(key);
        }
        if let Ok(model) = env::var("PLANNER_MODEL") {
            config.planner_model = Some(model);
        }
        if let Ok(interval) = env::var("CHECK_INTERVAL") {
            if let Ok(seconds) = interval.parse() {
                config.poll_interval_secs = seconds;
            }
        }
        if let Ok(size) = env::var("MAX_HISTORY_SIZE") {
            if let Ok(size) = size.parse() {
                config.max_history_size = size;
            }
        }
        if let Ok(window) = env::var("CONTEXT_WINDOW") {
            if let Ok(window) = window.parse() {
                config.context_window = window;
            }
        }
        if let Ok(threshold) = env::var("SUMMARY_THRESHOLD") {
            if let Ok(threshold) = threshold.parse() {
                config.summary_threshold = threshold;
            }
        }
        if let Ok(path) = env::var("CHAT_DB_PATH") {
            if !path.trim().is_empty() {
                config.chat_db_path = path;
            }
        }

        config
    }

    /// Startup validation. A missing target chat is fatal; the process must
    /// not enter the loop without one.
    pub fn validate(&self) -> Result<()> {
        if self.chat_name.trim().is_empty() {
            bail!(
                "chat_name is not set; configure the target chat in {:?} or via CHAT_NAME",
                Self::config_path()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BotConfig::default();
        assert_eq!(config.poll_interval_secs, 20);
        assert_eq!(config.max_history_size, 40);
        assert_eq!(config.context_window, 10);
        assert_eq!(config.summary_threshold, 20);
        assert_eq!(config.ack_suppress_probability, 0.5);
    }

    #[test]
    fn missing_chat_name_fails_validation() {
        let config = BotConfig::default();
        assert!(config.validate().is_err());

        let config = BotConfig {
            chat_name: "Family".to_string(),
            ..BotConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: BotConfig =
            toml::from_str("chat_name = \"Family\"\ncheck_interval = 30").unwrap();
        assert_eq!(config.chat_name, "Family");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.max_history_size, 40);
        assert_eq!(config.bot_name, "Meg");
    }
}

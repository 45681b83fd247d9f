use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const BASE_URL_ENV: &str = "CHATWIDGET_BASE_URL";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat service root, e.g. `http://localhost:8000`
    pub base_url: String,

    /// API key sent as `X-API-Key`; prefer the environment variable below
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    pub api_key_env: String,

    /// Optional request timeout; requests wait indefinitely when unset
    pub request_timeout_secs: Option<u64>,

    /// First bot message of every conversation
    pub welcome_message: String,

    /// Chat widget home directory
    #[serde(skip)]
    pub home: PathBuf,

    /// Speech preferences
    pub speech: SpeechConfig,

    /// UI preferences
    pub ui: UiConfig,
}

/// Speech recognition/synthesis through external commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak bot messages aloud at startup
    pub enabled: bool,
    /// Program and leading arguments; the text to speak is appended
    pub synthesize_command: Vec<String>,
    /// Program and arguments whose stdout is the recognised transcript
    pub recognize_command: Vec<String>,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Start with the chat panel open
    pub start_open: bool,
    pub show_timestamps: bool,
    /// Oldest history entries are dropped past this count
    pub max_history: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            synthesize_command: vec!["espeak".to_string(), "-s".to_string(), "160".to_string()],
            recognize_command: Vec::new(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            start_open: false,
            show_timestamps: true,
            max_history: 200,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            base_url: "http://localhost:8000".to_string(),
            api_key: None,
            api_key_env: "CHATWIDGET_API_KEY".to_string(),
            request_timeout_secs: None,
            welcome_message:
                "Hello! I'm your Customer Support Assistant. How can I help you today?".to_string(),
            home: home.join(".chatwidget"),
            speech: SpeechConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".chatwidget").join("config.toml"))
    }

    /// Load configuration from the default location, creating it on first run
    pub fn load() -> Result<Self> {
        Self::load_or_init(&Self::default_path()?)
    }

    /// Load configuration from `path`, falling back to defaults when the file is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };

        if let Some(dir) = path.parent() {
            config.home = dir.to_path_buf();
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }

        Ok(config)
    }

    /// Load configuration from `path`, first writing a default file there if none exists
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut config = Config::default();
            if let Some(dir) = path.parent() {
                config.home = dir.to_path_buf();
            }
            config.save(path)?;
            tracing::info!(path = %path.display(), "wrote default config");
        }
        Self::load_from(path)
    }

    /// Save configuration to `path` as pretty TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Directory for rolling log files
    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Get API key from config or environment
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|key| !key.is_empty()))
    }
}

//! Configuration management for obs-director

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OBS WebSocket endpoint and credentials
    #[serde(default)]
    pub obs: ObsConfig,

    /// Control channel timeouts
    #[serde(default)]
    pub session: SessionConfig,

    /// Remote names of the Cut/Fade transitions
    #[serde(default)]
    pub transitions: TransitionsConfig,

    /// Projector discovery and polling
    #[serde(default)]
    pub projector: ProjectorConfig,

    /// Console output
    #[serde(default)]
    pub ui: UiConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsConfig {
    /// WebSocket host
    #[serde(default = "default_host")]
    pub host: String,

    /// WebSocket port
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket password (None when authentication is disabled)
    pub password: Option<String>,

    /// Connect as soon as the director starts
    #[serde(default = "default_true")]
    pub connect_on_launch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound for every request on the control channel (ms)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Upper bound for the connect handshake (ms)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionsConfig {
    /// Name of the cut transition in the OBS scene collection
    #[serde(default = "default_cut_name")]
    pub cut_name: String,

    /// Name of the fade transition in the OBS scene collection
    #[serde(default = "default_fade_name")]
    pub fade_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Interval between capture-source discovery polls (ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Window titles must contain one of these (case-insensitive) to be
    /// considered a projector
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Open Program, Preview and per-scene projectors after connecting
    #[serde(default)]
    pub open_on_connect: bool,

    /// Monitor for opened projectors; None opens windowed projectors
    pub monitor_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UiConfig {
    /// Print notifications as JSON lines instead of text
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4455
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_cut_name() -> String {
    "Cut".to_string()
}

fn default_fade_name() -> String {
    "Fade".to_string()
}

fn default_poll_interval() -> u64 {
    1500
}

fn default_keywords() -> Vec<String> {
    [
        "projector",
        "proiettore",
        "proyector",
        "projecteur",
        "projektor",
        "sorgente",
        "source:",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            connect_on_launch: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            cut_name: default_cut_name(),
            fade_name: default_fade_name(),
        }
    }
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            keywords: default_keywords(),
            open_on_connect: false,
            monitor_index: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            obs: ObsConfig::default(),
            session: SessionConfig::default(),
            transitions: TransitionsConfig::default(),
            projector: ProjectorConfig::default(),
            ui: UiConfig::default(),
            config_path: None,
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl ProjectorConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_millis(self.poll_interval_ms.max(100))
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            config.config_path = Some(config_path);
            Ok(config)
        } else {
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "obs-director", "director")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Apply command-line overrides (`--host`, `--port`, `--password`,
    /// `--no-connect`, `--json`). Unknown flags are left to the caller.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--host" => {
                    self.obs.host = iter.next().context("--host requires a value")?.clone();
                }
                "--port" => {
                    let value = iter.next().context("--port requires a value")?;
                    self.obs.port = value
                        .parse()
                        .with_context(|| format!("Invalid port: {}", value))?;
                }
                "--password" => {
                    self.obs.password =
                        Some(iter.next().context("--password requires a value")?.clone());
                }
                "--no-connect" => self.obs.connect_on_launch = false,
                "--json" => self.ui.json_output = true,
                _ => {}
            }
        }
        Ok(())
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::patterns::{
    DEFAULT_PREPROCESS_PATTERN, DEFAULT_SCHEDULER_COMPONENT, DEFAULT_STREAM_START_PATTERN,
};
use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub containers: ContainersConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub now_playing: NowPlayingConfig,
    #[serde(default)]
    pub scheduler_api: SchedulerApiConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Container names the `engine` / `scheduler` service aliases resolve to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainersConfig {
    #[serde(default = "default_engine_container")]
    pub engine: String,
    #[serde(default = "default_scheduler_container")]
    pub scheduler: String,
}

/// Tail sizes and reconstruction knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// `/logs` tail when `tail` is omitted.
    #[serde(default = "default_tail")]
    pub default_tail: usize,
    /// Upper bound for any requested tail.
    #[serde(default = "default_max_tail")]
    pub max_tail: usize,
    /// Lines read for preprocess titles and scheduler NEXT entries.
    #[serde(default = "default_titles_tail")]
    pub titles_tail: usize,
    #[serde(default = "default_stream_start_tail")]
    pub stream_start_tail: usize,
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,
    /// Fallback window is `n * fallback_factor` when the current title is missing.
    #[serde(default = "default_fallback_factor")]
    pub fallback_factor: usize,
    #[serde(default = "default_upcoming")]
    pub upcoming_default: usize,
    #[serde(default = "default_upcoming_max")]
    pub upcoming_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_binary")]
    pub binary: String,
    #[serde(default = "default_docker_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlayingConfig {
    #[serde(default = "default_icecast_status_url")]
    pub icecast_status_url: String,
    #[serde(default = "default_mount")]
    pub mount: String,
    #[serde(default = "default_now_playing_timeout_ms")]
    pub timeout_ms: u64,
}

/// The scheduler's own HTTP API, proxied read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerApiConfig {
    #[serde(default = "default_scheduler_base_url")]
    pub base_url: String,
    /// Path of a now-playing endpoint, if the scheduler has one.
    #[serde(default)]
    pub now_endpoint: Option<String>,
    #[serde(default = "default_scheduler_timeout_ms")]
    pub timeout_ms: u64,
}

/// Log line patterns. Every regex list is tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// Engine preprocess lines; each needs a `rest` group.
    #[serde(default = "default_preprocess_patterns")]
    pub preprocess: Vec<String>,
    /// Component tag of scheduler NEXT announcements.
    #[serde(default = "default_scheduler_component")]
    pub scheduler_component: String,
    /// Extra NEXT formats; each needs `ts`, `title` and `playlist` groups.
    #[serde(default)]
    pub scheduler_next_extra: Vec<String>,
    /// Stream-start markers; an optional `ts` group supplies the timestamp.
    #[serde(default = "default_stream_start_patterns")]
    pub stream_start: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            engine: default_engine_container(),
            scheduler: default_scheduler_container(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            default_tail: default_tail(),
            max_tail: default_max_tail(),
            titles_tail: default_titles_tail(),
            stream_start_tail: default_stream_start_tail(),
            recency_window_secs: default_recency_window_secs(),
            fallback_factor: default_fallback_factor(),
            upcoming_default: default_upcoming(),
            upcoming_max: default_upcoming_max(),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            timeout_ms: default_docker_timeout_ms(),
        }
    }
}

impl Default for NowPlayingConfig {
    fn default() -> Self {
        Self {
            icecast_status_url: default_icecast_status_url(),
            mount: default_mount(),
            timeout_ms: default_now_playing_timeout_ms(),
        }
    }
}

impl Default for SchedulerApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_scheduler_base_url(),
            now_endpoint: None,
            timeout_ms: default_scheduler_timeout_ms(),
        }
    }
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            preprocess: default_preprocess_patterns(),
            scheduler_component: default_scheduler_component(),
            scheduler_next_extra: Vec::new(),
            stream_start: default_stream_start_patterns(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_engine_container() -> String {
    "engine".to_string()
}

fn default_scheduler_container() -> String {
    "scheduler".to_string()
}

fn default_tail() -> usize {
    300
}

fn default_max_tail() -> usize {
    5000
}

fn default_titles_tail() -> usize {
    2500
}

fn default_stream_start_tail() -> usize {
    800
}

fn default_recency_window_secs() -> u64 {
    crate::stream_start::DEFAULT_RECENCY_WINDOW_SECS
}

fn default_fallback_factor() -> usize {
    crate::upcoming::DEFAULT_FALLBACK_FACTOR
}

fn default_upcoming() -> usize {
    10
}

fn default_upcoming_max() -> usize {
    50
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_docker_timeout_ms() -> u64 {
    5000
}

fn default_icecast_status_url() -> String {
    "http://127.0.0.1:8000/status-json.xsl".to_string()
}

fn default_mount() -> String {
    "/radio".to_string()
}

fn default_now_playing_timeout_ms() -> u64 {
    2000
}

fn default_scheduler_base_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_scheduler_timeout_ms() -> u64 {
    2500
}

fn default_preprocess_patterns() -> Vec<String> {
    vec![DEFAULT_PREPROCESS_PATTERN.to_string()]
}

fn default_scheduler_component() -> String {
    DEFAULT_SCHEDULER_COMPONENT.to_string()
}

fn default_stream_start_patterns() -> Vec<String> {
    vec![DEFAULT_STREAM_START_PATTERN.to_string()]
}

impl LogsConfig {
    /// Requested tail, defaulted and capped.
    pub fn tail_or(&self, requested: Option<usize>, default: usize) -> usize {
        requested.unwrap_or(default).clamp(1, self.max_tail.max(1))
    }

    /// Requested upcoming count, defaulted and clamped to `1..=upcoming_max`.
    pub fn upcoming_count(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.upcoming_default)
            .clamp(1, self.upcoming_max.max(1))
    }
}

impl Config {
    /// Load from [`Config::config_path`], writing defaults when the file is missing.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_file()
    }
}

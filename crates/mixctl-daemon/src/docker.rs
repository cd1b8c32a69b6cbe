//! Read-only docker access through the `docker` CLI.
//!
//! Every call is a short-lived subprocess bounded by `timeout`. Failures never
//! escape as panics or 500s: log tails degrade to a `[control] …` report and
//! inspection degrades to "not present".

use std::future::Future;
use std::process::Output;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use mixctl_core::config::DockerConfig;
use mixctl_core::tail::LogTail;
use mixctl_core::timestamp::{parse_log_timestamp, split_leading_timestamp};

// ── Collaborator contract ─────────────────────────────────────────────────────

/// Where log tails and container state come from.
pub trait LogSource: Send + Sync + 'static {
    /// Last `max_lines` lines of `container`, oldest first, docker timestamps kept.
    fn fetch_tail(&self, container: &str, max_lines: usize)
        -> impl Future<Output = LogTail> + Send;

    /// `Ok(None)` when the container does not exist.
    fn container_info(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ContainerInfo>, DockerError>> + Send;

    fn ping(&self) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("docker timed out after {0:?}")]
    Timeout(Duration),
    #[error("docker error: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("docker error: {0}")]
    Command(String),
    #[error("unexpected docker inspect output: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What `/status` shows for one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub id: String,
    pub image: String,
    pub status: String,
    pub health: Option<String>,
    pub created_at: Option<String>,
    pub started_at: Option<String>,
}

/// [`ContainerInfo`] plus ages relative to a reference instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub name: String,
    pub present: bool,
    #[serde(flatten)]
    pub info: Option<ContainerInfo>,
    pub age_s: Option<i64>,
    pub uptime_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContainerSummary {
    pub fn new(
        name: &str,
        info: Result<Option<ContainerInfo>, DockerError>,
        now: DateTime<Utc>,
    ) -> Self {
        let (info, error) = match info {
            Ok(info) => (info, None),
            Err(e) => (None, Some(e.to_string())),
        };
        let since = |ts: Option<&String>| {
            ts.and_then(|t| parse_log_timestamp(t))
                .map(|t| now.signed_duration_since(t).num_seconds())
        };
        let age_s = info.as_ref().and_then(|i| since(i.created_at.as_ref()));
        // StartedAt is kept by docker after a stop; only a running container has uptime.
        let uptime_s = info
            .as_ref()
            .filter(|i| i.status == "running")
            .and_then(|i| since(i.started_at.as_ref()));

        Self {
            name: name.to_string(),
            present: info.is_some(),
            info,
            age_s,
            uptime_s,
            error,
        }
    }
}

// ── docker CLI implementation ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(config: &DockerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: Duration::from_millis(config.timeout_ms.max(1)),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, DockerError> {
        debug!("[docker] {} {}", self.binary, args.join(" "));
        let child = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.timeout, child).await {
            Ok(out) => Ok(out?),
            Err(_) => Err(DockerError::Timeout(self.timeout)),
        }
    }
}

impl LogSource for DockerCli {
    async fn fetch_tail(&self, container: &str, max_lines: usize) -> LogTail {
        let tail = max_lines.max(1).to_string();
        let out = match self
            .run(&["logs", "--tail", &tail, "--timestamps", container])
            .await
        {
            Ok(out) => out,
            Err(e) => {
                warn!("[docker] logs {}: {}", container, e);
                return LogTail::unavailable(e);
            }
        };

        let stdout = String::from_utf8_lossy(&out.stdout);
        let stderr = String::from_utf8_lossy(&out.stderr);
        if !out.status.success() {
            warn!("[docker] logs {} failed: {}", container, stderr.trim());
            if is_missing_container(&stderr) {
                return LogTail::unavailable(format!("container not found: {}", container));
            }
            return LogTail::unavailable(DockerError::Command(stderr.trim().to_string()));
        }

        LogTail::from_raw(merge_streams(&stdout, &stderr, max_lines))
    }

    async fn container_info(&self, name: &str) -> Result<Option<ContainerInfo>, DockerError> {
        let out = self.run(&["inspect", "--type", "container", name]).await?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if is_missing_container(&stderr) {
                return Ok(None);
            }
            return Err(DockerError::Command(stderr.trim().to_string()));
        }
        parse_inspect(&out.stdout, name)
    }

    async fn ping(&self) -> bool {
        match self
            .run(&["version", "--format", "{{.Server.Version}}"])
            .await
        {
            Ok(out) => out.status.success(),
            Err(e) => {
                debug!("[docker] ping failed: {}", e);
                false
            }
        }
    }
}

fn is_missing_container(stderr: &str) -> bool {
    let s = stderr.to_ascii_lowercase();
    s.contains("no such container") || s.contains("no such object")
}

/// Interleave the stdout and stderr halves of `docker logs` back into
/// timestamp order and keep the last `max_lines`.
///
/// Lines without a docker stamp inherit the previous stamp of their stream;
/// equal stamps keep stdout first.
pub fn merge_streams(stdout: &str, stderr: &str, max_lines: usize) -> String {
    fn stamped(text: &str) -> Vec<(Option<DateTime<Utc>>, &str)> {
        let mut last = None;
        text.lines()
            .map(|line| {
                if let (Some(ts), _) = split_leading_timestamp(line.trim_end_matches('\r')) {
                    if let Some(parsed) = parse_log_timestamp(ts) {
                        last = Some(parsed);
                    }
                }
                (last, line)
            })
            .collect()
    }

    let mut lines = stamped(stdout);
    lines.extend(stamped(stderr));
    lines.sort_by_key(|(ts, _)| *ts);

    let skip = lines.len().saturating_sub(max_lines.max(1));
    let mut out = String::new();
    for (_, line) in &lines[skip..] {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Inspect {
    id: String,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    config: InspectConfig,
    #[serde(default)]
    state: InspectState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

fn parse_inspect(raw: &[u8], name: &str) -> Result<Option<ContainerInfo>, DockerError> {
    let items: Vec<Inspect> = serde_json::from_slice(raw)?;
    Ok(items.into_iter().next().map(|i| ContainerInfo {
        name: name.to_string(),
        id: i.id.chars().take(12).collect(),
        image: i.config.image,
        status: if i.state.status.is_empty() {
            "unknown".to_string()
        } else {
            i.state.status
        },
        health: i.state.health.map(|h| h.status),
        created_at: i.created,
        started_at: i.state.started_at,
    }))
}

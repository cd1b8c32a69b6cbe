//! Now-playing title from the Icecast `status-json.xsl` endpoint.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use mixctl_core::config::NowPlayingConfig;

/// Where the currently playing title comes from.
pub trait NowPlayingSource: Send + Sync + 'static {
    /// `Ok(None)` when the mount is up but has no title (or is not listed).
    fn current_title(&self) -> impl Future<Output = Result<Option<String>, NowPlayingError>> + Send;

    /// Short label for responses, e.g. `icecast:/radio`.
    fn describe(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum NowPlayingError {
    #[error("icecast request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct IcecastStatus {
    client: Client,
    status_url: String,
    mount: String,
}

impl IcecastStatus {
    pub fn new(config: &NowPlayingConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .expect("failed to build reqwest client for icecast");

        Self {
            client,
            status_url: config.icecast_status_url.clone(),
            mount: config.mount.clone(),
        }
    }
}

impl NowPlayingSource for IcecastStatus {
    async fn current_title(&self) -> Result<Option<String>, NowPlayingError> {
        let status: Value = self
            .client
            .get(&self.status_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let title = title_for_mount(&status, &self.mount);
        debug!("[icecast] {} -> {:?}", self.mount, title);
        Ok(title)
    }

    fn describe(&self) -> String {
        format!("icecast:{}", self.mount)
    }
}

/// Pick the source whose `listenurl` ends with `mount` and read its title.
///
/// `icestats.source` is an object for a single mount and an array otherwise.
/// When the source also carries `artist`, the result is `artist - title`.
pub fn title_for_mount(status: &Value, mount: &str) -> Option<String> {
    let raw = status.get("icestats")?.get("source")?;
    let sources: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![raw],
        _ => return None,
    };

    let source = sources.into_iter().find(|s| {
        s.get("listenurl")
            .and_then(Value::as_str)
            .is_some_and(|url| url.ends_with(mount))
    })?;

    let field = |key: &str| {
        source
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    match (field("artist"), field("title")) {
        (Some(artist), Some(title)) => Some(format!("{} - {}", artist, title)),
        (None, Some(title)) => Some(title.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_source_object() {
        let status = json!({
            "icestats": {
                "source": {
                    "listenurl": "http://stream.example:8000/radio",
                    "title": "Derrick Howard - Behold I Live"
                }
            }
        });
        assert_eq!(
            title_for_mount(&status, "/radio").as_deref(),
            Some("Derrick Howard - Behold I Live")
        );
    }

    #[test]
    fn test_picks_mount_from_array() {
        let status = json!({
            "icestats": {
                "source": [
                    {"listenurl": "http://s:8000/fallback", "title": "Jingle"},
                    {"listenurl": "http://s:8000/radio", "artist": "King Tubby", "title": "Dub Fire"}
                ]
            }
        });
        assert_eq!(
            title_for_mount(&status, "/radio").as_deref(),
            Some("King Tubby - Dub Fire")
        );
    }

    #[test]
    fn test_missing_mount_or_title() {
        let status = json!({
            "icestats": {
                "source": [
                    {"listenurl": "http://s:8000/radio", "title": "   "},
                    {"listenurl": "http://s:8000/other", "title": "x"}
                ]
            }
        });
        assert_eq!(title_for_mount(&status, "/radio"), None);
        assert_eq!(title_for_mount(&status, "/nope"), None);
        assert_eq!(title_for_mount(&json!({"icestats": {}}), "/radio"), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let source = IcecastStatus::new(&NowPlayingConfig {
            icecast_status_url: "http://127.0.0.1:9/status-json.xsl".to_string(),
            mount: "/radio".to_string(),
            timeout_ms: 500,
        });
        assert!(source.current_title().await.is_err());
        assert_eq!(source.describe(), "icecast:/radio");
    }
}

//! Proxy for the scheduler's own HTTP API.
//!
//! The scheduler exposes `/health` and some form of `/next`; a now-playing
//! endpoint only exists when configured. Nothing here is probed eagerly.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use mixctl_core::config::SchedulerApiConfig;

pub trait SchedulerApi: Send + Sync + 'static {
    fn health(&self) -> impl Future<Output = Result<Value, SchedulerApiError>> + Send;

    /// `source` is `None` when no now-playing endpoint is configured.
    fn now_playing(&self) -> impl Future<Output = Proxied> + Send;

    /// First upcoming endpoint that answers, tried as `/next?n=`, `/next{n}`, `/next1`.
    fn upcoming(&self, n: usize) -> impl Future<Output = Proxied> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerApiError {
    #[error("scheduler request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A scheduler answer plus the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proxied {
    pub source: Option<String>,
    pub data: Value,
}

impl Proxied {
    fn note(source: Option<String>, note: &str) -> Self {
        Self {
            source,
            data: json!({ "note": note }),
        }
    }
}

pub struct SchedulerClient {
    client: Client,
    base_url: String,
    now_endpoint: Option<String>,
}

impl SchedulerClient {
    pub fn new(config: &SchedulerApiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .expect("failed to build reqwest client for scheduler");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            now_endpoint: config
                .now_endpoint
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// `None` on any transport error or a 4xx/5xx answer.
    async fn try_get(&self, path: &str) -> Option<Value> {
        let resp = match self.client.get(self.url(path)).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("[scheduler-api] {} failed: {}", path, e);
                return None;
            }
        };
        if resp.status().is_client_error() || resp.status().is_server_error() {
            debug!("[scheduler-api] {} -> {}", path, resp.status());
            return None;
        }
        read_body(resp).await.ok()
    }
}

impl SchedulerApi for SchedulerClient {
    async fn health(&self) -> Result<Value, SchedulerApiError> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .await?
            .error_for_status()?;
        Ok(match read_body(resp).await? {
            obj @ Value::Object(_) => obj,
            other => json!({ "ok": true, "raw": other }),
        })
    }

    async fn now_playing(&self) -> Proxied {
        let Some(endpoint) = self.now_endpoint.clone() else {
            return Proxied::note(None, "scheduler now-playing endpoint not configured");
        };
        match self.try_get(&endpoint).await {
            Some(data) => Proxied {
                source: Some(endpoint),
                data,
            },
            None => Proxied::note(
                Some(endpoint),
                "configured scheduler now-playing endpoint returned an error",
            ),
        }
    }

    async fn upcoming(&self, n: usize) -> Proxied {
        for path in [format!("/next?n={n}"), format!("/next{n}"), "/next1".to_string()] {
            if let Some(data) = self.try_get(&path).await {
                return Proxied {
                    source: Some(path),
                    data,
                };
            }
        }
        Proxied::note(None, "no upcoming endpoint found on scheduler")
    }
}

/// JSON when the scheduler says so, otherwise `{"raw_text": …}`.
async fn read_body(resp: Response) -> Result<Value, reqwest::Error> {
    let is_json = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    let text = resp.text().await?;
    Ok(body_value(is_json, &text))
}

fn body_value(is_json: bool, text: &str) -> Value {
    if is_json {
        if let Ok(value) = serde_json::from_str(text) {
            return value;
        }
        return json!({ "raw_text": text });
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        json!({})
    } else {
        json!({ "raw_text": trimmed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: &str, now_endpoint: Option<&str>) -> SchedulerClient {
        SchedulerClient::new(&SchedulerApiConfig {
            base_url: format!("{}/", base_url),
            now_endpoint: now_endpoint.map(str::to_string),
            timeout_ms: 1000,
        })
    }

    #[test]
    fn test_body_value() {
        assert_eq!(body_value(true, r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(body_value(true, "not json"), json!({"raw_text": "not json"}));
        assert_eq!(body_value(false, "  ok \n"), json!({"raw_text": "ok"}));
        assert_eq!(body_value(false, "   "), json!({}));
    }

    #[tokio::test]
    async fn test_upcoming_falls_through_to_next1() {
        let base = serve(
            Router::new()
                .route("/health", get(|| async { "alive" }))
                .route("/next1", get(|| async { Json(json!({"title": "x.mp3"})) })),
        )
        .await;
        let sched = client(&base, None);

        let up = sched.upcoming(5).await;
        assert_eq!(up.source.as_deref(), Some("/next1"));
        assert_eq!(up.data["title"], "x.mp3");

        let health = sched.health().await.unwrap();
        assert_eq!(health, json!({"raw_text": "alive"}));
    }

    #[tokio::test]
    async fn test_upcoming_prefers_query_form() {
        let base = serve(Router::new().route(
            "/next",
            get(|| async { Json(json!(["a.mp3", "b.mp3"])) }),
        ))
        .await;
        let up = client(&base, None).upcoming(2).await;
        assert_eq!(up.source.as_deref(), Some("/next?n=2"));
        assert_eq!(up.data, json!(["a.mp3", "b.mp3"]));
    }

    #[tokio::test]
    async fn test_now_playing_needs_configuration() {
        let base = serve(Router::new().route("/now", get(|| async { Json(json!({"title": "y"})) }))).await;

        let up = client(&base, None).now_playing().await;
        assert_eq!(up.source, None);
        assert!(up.data["note"].is_string());

        let up = client(&base, Some("now")).now_playing().await;
        assert_eq!(up.source.as_deref(), Some("now"));
        assert_eq!(up.data["title"], "y");

        let up = client(&base, Some("/missing")).now_playing().await;
        assert_eq!(up.source.as_deref(), Some("/missing"));
        assert!(up.data["note"].is_string());
    }

    #[tokio::test]
    async fn test_unreachable_scheduler() {
        let sched = client("http://127.0.0.1:9", None);
        assert!(sched.health().await.is_err());
        let up = sched.upcoming(3).await;
        assert_eq!(up.source, None);
        assert_eq!(up.data["note"], "no upcoming endpoint found on scheduler");
    }
}

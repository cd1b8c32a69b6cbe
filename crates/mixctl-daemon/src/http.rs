//! Read-only HTTP API over the reconstructed timelines.
//!
//! Collaborator failures are never HTTP errors: every JSON route answers 200
//! with a report carrying `ok`, `error`, `origin` and `strategy`.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use mixctl_core::config::Config;
use mixctl_core::patterns::LogPatterns;
use mixctl_core::protocol::{
    NextEntry, PlaylistReport, StreamStartReport, TitlesReport, UpcomingReport,
};
use mixctl_core::{engine, scheduler, stream_start};

use crate::docker::{ContainerSummary, LogSource};
use crate::icecast::NowPlayingSource;
use crate::scheduler_api::{Proxied, SchedulerApi};

// ── Shared state ──────────────────────────────────────────────────────────────

pub struct HttpState<L, N, S> {
    pub logs: Arc<L>,
    pub now_playing: Arc<N>,
    pub scheduler_api: Arc<S>,
    pub patterns: Arc<LogPatterns>,
    pub config: Arc<Config>,
}

impl<L, N, S> Clone for HttpState<L, N, S> {
    fn clone(&self) -> Self {
        Self {
            logs: self.logs.clone(),
            now_playing: self.now_playing.clone(),
            scheduler_api: self.scheduler_api.clone(),
            patterns: self.patterns.clone(),
            config: self.config.clone(),
        }
    }
}

impl<L: LogSource, N: NowPlayingSource, S: SchedulerApi> HttpState<L, N, S> {
    pub fn new(
        logs: L,
        now_playing: N,
        scheduler_api: S,
        patterns: LogPatterns,
        config: Config,
    ) -> Self {
        Self {
            logs: Arc::new(logs),
            now_playing: Arc::new(now_playing),
            scheduler_api: Arc::new(scheduler_api),
            patterns: Arc::new(patterns),
            config: Arc::new(config),
        }
    }

    /// `engine` / `scheduler` are aliases; anything else is a container name.
    fn container<'a>(&'a self, service: &'a str) -> &'a str {
        match service {
            "engine" => &self.config.containers.engine,
            "scheduler" => &self.config.containers.scheduler,
            other => other,
        }
    }

    /// The caller's title if given, else whatever is on air.
    async fn current_title(&self, requested: Option<String>) -> Option<String> {
        if let Some(title) = requested.filter(|t| !t.trim().is_empty()) {
            return Some(title);
        }
        match self.now_playing.current_title().await {
            Ok(title) => title,
            Err(e) => {
                warn!("[http] now playing unavailable: {}", e);
                None
            }
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Health {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub ok: bool,
    pub now_utc: DateTime<Utc>,
    pub docker_ping: bool,
    pub engine: ContainerSummary,
    pub scheduler: ContainerSummary,
}

#[derive(Debug, Serialize)]
pub struct NowReport {
    pub ok: bool,
    pub title: Option<String>,
    pub source: String,
    pub error: Option<String>,
}

// ── Query parameters ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub service: String,
    /// 0 or absent means the configured default.
    #[serde(default)]
    pub tail: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TailQuery {
    #[serde(default)]
    pub tail: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingQuery {
    #[serde(default)]
    pub n: Option<usize>,
    #[serde(default)]
    pub current: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CurrentQuery {
    #[serde(default)]
    pub current: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamStartQuery {
    #[serde(default)]
    pub window: Option<u64>,
    #[serde(default)]
    pub tail: Option<usize>,
}

// ── Route handlers ────────────────────────────────────────────────────────────

async fn health() -> Json<Health> {
    Json(Health { ok: true })
}

async fn status<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
) -> Json<StatusReport> {
    let now = Utc::now();
    let names = &state.config.containers;
    let (docker_ping, engine, scheduler) = tokio::join!(
        state.logs.ping(),
        state.logs.container_info(&names.engine),
        state.logs.container_info(&names.scheduler),
    );

    Json(StatusReport {
        ok: true,
        now_utc: now,
        docker_ping,
        engine: ContainerSummary::new(&names.engine, engine, now),
        scheduler: ContainerSummary::new(&names.scheduler, scheduler, now),
    })
}

async fn logs<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
    Query(q): Query<LogsQuery>,
) -> String {
    let cfg = &state.config.logs;
    let tail = cfg.tail_or(q.tail.filter(|&t| t > 0), cfg.default_tail);
    let text = state.logs.fetch_tail(state.container(&q.service), tail).await;
    text.as_raw().to_string()
}

async fn now<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
) -> Json<NowReport> {
    let source = state.now_playing.describe();
    Json(match state.now_playing.current_title().await {
        Ok(title) => NowReport {
            ok: true,
            title,
            source,
            error: None,
        },
        Err(e) => NowReport {
            ok: false,
            title: None,
            source,
            error: Some(e.to_string()),
        },
    })
}

async fn engine_titles<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
    Query(q): Query<TailQuery>,
) -> Json<TitlesReport> {
    let cfg = &state.config.logs;
    let tail = cfg.tail_or(q.tail.filter(|&t| t > 0), cfg.titles_tail);
    let text = state
        .logs
        .fetch_tail(&state.config.containers.engine, tail)
        .await;
    Json(engine::extract_preprocess_titles(&text, &state.patterns))
}

async fn upcoming<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
    Query(q): Query<UpcomingQuery>,
) -> Json<UpcomingReport<String>> {
    let cfg = &state.config.logs;
    let n = cfg.upcoming_count(q.n);
    let (text, current) = tokio::join!(
        state
            .logs
            .fetch_tail(&state.config.containers.engine, cfg.titles_tail),
        state.current_title(q.current),
    );
    Json(engine::upcoming_from_engine(
        &text,
        &state.patterns,
        current.as_deref(),
        n,
        cfg.fallback_factor,
    ))
}

async fn scheduler_next<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
    Query(q): Query<UpcomingQuery>,
) -> Json<UpcomingReport<NextEntry>> {
    let cfg = &state.config.logs;
    let n = cfg.upcoming_count(q.n);
    let (text, current) = tokio::join!(
        state
            .logs
            .fetch_tail(&state.config.containers.scheduler, cfg.titles_tail),
        state.current_title(q.current),
    );
    Json(scheduler::upcoming_from_scheduler(
        &text,
        &state.patterns,
        current.as_deref(),
        n,
        cfg.fallback_factor,
    ))
}

async fn scheduler_playlist<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
    Query(q): Query<CurrentQuery>,
) -> Json<PlaylistReport> {
    let cfg = &state.config.logs;
    let (text, current) = tokio::join!(
        state
            .logs
            .fetch_tail(&state.config.containers.scheduler, cfg.titles_tail),
        state.current_title(q.current),
    );
    Json(scheduler::playlist_from_scheduler(
        &text,
        &state.patterns,
        current.as_deref(),
    ))
}

async fn engine_stream_start<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
    Query(q): Query<StreamStartQuery>,
) -> Json<StreamStartReport> {
    let cfg = &state.config.logs;
    let tail = cfg.tail_or(q.tail.filter(|&t| t > 0), cfg.stream_start_tail);
    let window = q.window.unwrap_or(cfg.recency_window_secs);
    let text = state
        .logs
        .fetch_tail(&state.config.containers.engine, tail)
        .await;
    Json(stream_start::detect_stream_start(
        &text,
        &state.patterns,
        window,
        Utc::now(),
    ))
}

async fn scheduler_api_health<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
) -> Json<Value> {
    Json(match state.scheduler_api.health().await {
        Ok(data) => data,
        Err(e) => {
            warn!("[http] scheduler health failed: {}", e);
            json!({ "ok": false, "error": e.to_string() })
        }
    })
}

async fn scheduler_api_now<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
) -> Json<Proxied> {
    Json(state.scheduler_api.now_playing().await)
}

async fn scheduler_api_upcoming<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    State(state): State<HttpState<L, N, S>>,
    Query(q): Query<UpcomingQuery>,
) -> Json<Proxied> {
    let n = state.config.logs.upcoming_count(q.n);
    Json(state.scheduler_api.upcoming(n).await)
}

// ── Server startup ────────────────────────────────────────────────────────────

pub fn router<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    state: HttpState<L, N, S>,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status::<L, N, S>))
        .route("/logs", get(logs::<L, N, S>))
        .route("/now", get(now::<L, N, S>))
        .route("/engine/titles", get(engine_titles::<L, N, S>))
        .route("/engine/stream_start", get(engine_stream_start::<L, N, S>))
        .route("/upcoming", get(upcoming::<L, N, S>))
        .route("/scheduler/next", get(scheduler_next::<L, N, S>))
        .route("/scheduler/playlist", get(scheduler_playlist::<L, N, S>))
        .route("/scheduler/health", get(scheduler_api_health::<L, N, S>))
        .route("/scheduler/now", get(scheduler_api_now::<L, N, S>))
        .route("/scheduler/upcoming", get(scheduler_api_upcoming::<L, N, S>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server<L: LogSource, N: NowPlayingSource, S: SchedulerApi>(
    bind_address: String,
    port: u16,
    state: HttpState<L, N, S>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let app = router(state);

    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding http listener on {}", addr))?;
        info!("[http] listening on http://{}", addr);
        axum::serve(listener, app).await.context("http server error")?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use tower::ServiceExt;

    use crate::docker::{ContainerInfo, DockerError};
    use crate::icecast::NowPlayingError;
    use crate::scheduler_api::SchedulerApiError;
    use mixctl_core::tail::LogTail;

    #[derive(Default)]
    struct FakeLogs {
        tails: HashMap<String, String>,
    }

    impl FakeLogs {
        fn with(mut self, container: &str, text: &str) -> Self {
            self.tails.insert(container.to_string(), text.to_string());
            self
        }
    }

    impl LogSource for FakeLogs {
        async fn fetch_tail(&self, container: &str, max_lines: usize) -> LogTail {
            match self.tails.get(container) {
                Some(text) => {
                    let lines: Vec<&str> = text.lines().collect();
                    let start = lines.len().saturating_sub(max_lines);
                    LogTail::from_raw(lines[start..].join("\n"))
                }
                None => LogTail::unavailable(format!("container not found: {}", container)),
            }
        }

        async fn container_info(&self, name: &str) -> Result<Option<ContainerInfo>, DockerError> {
            Ok(self.tails.contains_key(name).then(|| ContainerInfo {
                name: name.to_string(),
                id: "0123456789ab".to_string(),
                image: format!("radio/{}:latest", name),
                status: "running".to_string(),
                health: None,
                created_at: Some("2025-01-14T07:00:00Z".to_string()),
                started_at: Some("2025-01-14T07:00:05Z".to_string()),
            }))
        }

        async fn ping(&self) -> bool {
            true
        }
    }

    struct FakeNow(Option<String>);

    impl NowPlayingSource for FakeNow {
        async fn current_title(&self) -> Result<Option<String>, NowPlayingError> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "fake:/radio".to_string()
        }
    }

    /// Scheduler API that answers `/health` and `/next1` only.
    struct FakeSchedulerApi {
        up: bool,
    }

    impl SchedulerApi for FakeSchedulerApi {
        async fn health(&self) -> Result<Value, SchedulerApiError> {
            if self.up {
                Ok(json!({"status": "ok"}))
            } else {
                // reqwest errors cannot be built by hand; a refused connection stands in.
                let err = reqwest::Client::new()
                    .get("http://127.0.0.1:9/health")
                    .send()
                    .await
                    .unwrap_err();
                Err(SchedulerApiError::Http(err))
            }
        }

        async fn now_playing(&self) -> Proxied {
            Proxied {
                source: None,
                data: json!({"note": "not configured"}),
            }
        }

        async fn upcoming(&self, n: usize) -> Proxied {
            Proxied {
                source: Some("/next1".to_string()),
                data: json!({"requested": n}),
            }
        }
    }

    const ENGINE: &str = "\
2025-01-14T08:00:00.000000001Z [output:3] stream started: mount /radio
2025-01-14T08:00:01.000000001Z preprocess: 1. A.mp3 -> safe_aaaaaaaa.wav (LUFS=-14)
2025-01-14T08:03:01.000000001Z preprocess: 2. B.mp3 -> safe_bbbbbbbb.wav (LUFS=-13)
2025-01-14T08:06:01.000000001Z preprocess: 3. C.mp3 -> safe_cccccccc.wav (LUFS=-14)
2025-01-14T08:09:01.000000001Z preprocess: 4. A.mp3 -> safe_aaaaaaaa.wav (LUFS=-14)
2025-01-14T08:12:01.000000001Z preprocess: 5. D.mp3 -> safe_dddddddd.wav (LUFS=-12)
";

    const SCHEDULER: &str = "\
2025-01-14T08:00:00.000000001Z 2025-01-14 08:00:00,000 INFO [scheduler.announce] NEXT title=\"x.mp3\" playlist=\"morning\"
2025-01-14T08:04:00.000000001Z 2025-01-14 08:04:00,000 INFO [scheduler.announce] NEXT title=\"y.mp3\" playlist=\"morning\"
2025-01-14T08:08:00.000000001Z 2025-01-14 08:08:00,000 INFO [scheduler.announce] NEXT title=\"z.mp3\" playlist=\"evening\"
";

    fn app(now_playing: Option<&str>) -> Router {
        let logs = FakeLogs::default()
            .with("engine", ENGINE)
            .with("scheduler", SCHEDULER);
        router(HttpState::new(
            logs,
            FakeNow(now_playing.map(str::to_string)),
            FakeSchedulerApi { up: true },
            LogPatterns::builtin(),
            Config::default(),
        ))
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> Value {
        let (status, body) = get_body(app, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        serde_json::from_str(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(get_json(app(None), "/health").await["ok"], true);
    }

    #[tokio::test]
    async fn test_upcoming_after_explicit_current() {
        let v = get_json(app(None), "/upcoming?n=3&current=A").await;
        assert_eq!(v["ok"], true);
        assert_eq!(v["origin"], "engine_logs");
        assert_eq!(v["strategy"], "after_current");
        assert_eq!(v["current_title_found"], true);
        assert_eq!(v["upcoming"], serde_json::json!(["D"]));
    }

    #[tokio::test]
    async fn test_upcoming_uses_now_playing_when_current_missing() {
        let v = get_json(app(Some("B")), "/upcoming?n=5").await;
        assert_eq!(v["current_title"], "B");
        assert_eq!(v["upcoming"], serde_json::json!(["C", "A", "D"]));
    }

    #[tokio::test]
    async fn test_upcoming_fallback_without_any_current() {
        let v = get_json(app(None), "/upcoming?n=2").await;
        assert_eq!(v["ok"], true);
        assert_eq!(v["strategy"], "fallback_tail");
        assert_eq!(v["current_title_found"], false);
        // last 2 * 4 titles, deduped, first 2
        assert_eq!(v["upcoming"], serde_json::json!(["A", "B"]));
    }

    #[tokio::test]
    async fn test_engine_titles() {
        let v = get_json(app(None), "/engine/titles").await;
        assert_eq!(v["count"], 5);
        assert_eq!(v["titles"][4]["title"], "D");
    }

    #[tokio::test]
    async fn test_scheduler_next_and_playlist() {
        let v = get_json(app(None), "/scheduler/next?current=x").await;
        assert_eq!(v["origin"], "scheduler_logs");
        assert_eq!(v["upcoming"][0]["title_norm"], "y");
        assert_eq!(v["upcoming"][1]["playlist"], "evening");

        let v = get_json(app(Some("y.mp3")), "/scheduler/playlist").await;
        assert_eq!(v["ok"], true);
        assert_eq!(v["playlist"], "morning");
    }

    #[tokio::test]
    async fn test_missing_container_is_reported_not_failed() {
        let app = router(HttpState::new(
            FakeLogs::default(),
            FakeNow(None),
            FakeSchedulerApi { up: false },
            LogPatterns::builtin(),
            Config::default(),
        ));
        let v = get_json(app.clone(), "/scheduler/next?current=x").await;
        assert_eq!(v["ok"], false);
        assert_eq!(v["strategy"], "source_unavailable");
        assert_eq!(v["upcoming"], serde_json::json!([]));

        let v = get_json(app.clone(), "/status").await;
        assert_eq!(v["docker_ping"], true);
        assert_eq!(v["engine"]["present"], false);

        let v = get_json(app, "/scheduler/health").await;
        assert_eq!(v["ok"], false);
        assert!(v["error"].as_str().unwrap().starts_with("scheduler request failed"));
    }

    #[tokio::test]
    async fn test_scheduler_api_routes() {
        let v = get_json(app(None), "/scheduler/health").await;
        assert_eq!(v["status"], "ok");

        let v = get_json(app(None), "/scheduler/now").await;
        assert_eq!(v["source"], Value::Null);
        assert_eq!(v["data"]["note"], "not configured");

        let v = get_json(app(None), "/scheduler/upcoming?n=500").await;
        assert_eq!(v["source"], "/next1");
        assert_eq!(v["data"]["requested"], 50);

        let v = get_json(app(None), "/scheduler/upcoming").await;
        assert_eq!(v["data"]["requested"], 10);
    }

    #[tokio::test]
    async fn test_tail_limits_lines() {
        let v = get_json(app(None), "/engine/titles?tail=2").await;
        assert_eq!(v["count"], 2);
        assert_eq!(v["titles"][0]["title"], "A");
    }

    #[tokio::test]
    async fn test_zero_tail_means_default() {
        let v = get_json(app(None), "/engine/titles?tail=0").await;
        assert_eq!(v["count"], 5);

        let v = get_json(app(None), "/engine/stream_start?tail=0").await;
        assert_eq!(v["found"], true);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let state = HttpState::new(
            FakeLogs::default(),
            FakeNow(None),
            FakeSchedulerApi { up: true },
            LogPatterns::builtin(),
            Config::default(),
        );
        let result = start_server("127.0.0.1".to_string(), port, state).await.unwrap();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("binding http listener"));
    }

    #[tokio::test]
    async fn test_stream_start_route() {
        let v = get_json(app(None), "/engine/stream_start?window=10").await;
        assert_eq!(v["ok"], true);
        assert_eq!(v["found"], true);
        assert_eq!(v["window_s"], 10);
        assert_eq!(v["ts_raw"], "2025-01-14T08:00:00.000000001Z");
        assert_eq!(v["recent"], false);
    }

    #[tokio::test]
    async fn test_status_reports_containers() {
        let v = get_json(app(None), "/status").await;
        assert_eq!(v["ok"], true);
        assert_eq!(v["engine"]["present"], true);
        assert_eq!(v["engine"]["image"], "radio/engine:latest");
        assert!(v["engine"]["uptime_s"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_logs_is_plain_text() {
        let (status, body) = get_body(app(None), "/logs?service=engine&tail=0").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("preprocess: 5. D.mp3"));

        let (_, body) = get_body(app(None), "/logs?service=mystery").await;
        assert_eq!(body, "[control] container not found: mystery");
    }

    #[tokio::test]
    async fn test_logs_requires_service() {
        let (status, _) = get_body(app(None), "/logs").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_now() {
        let v = get_json(app(Some("King Tubby - Dub Fire")), "/now").await;
        assert_eq!(v["title"], "King Tubby - Dub Fire");
        assert_eq!(v["source"], "fake:/radio");
    }
}

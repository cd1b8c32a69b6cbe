mod docker;
mod http;
mod icecast;
mod scheduler_api;

use anyhow::Context;
use mixctl_core::config::Config;
use mixctl_core::patterns::LogPatterns;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // File logging + stdout
    let data_dir = mixctl_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = mixctl_core::platform::log_file();

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,mixctl_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let patterns =
        LogPatterns::from_config(&config.patterns).context("invalid [patterns] configuration")?;
    info!(
        "Patterns: {} preprocess, {} scheduler NEXT, {} stream-start",
        patterns.preprocess.len(),
        patterns.next.len(),
        patterns.stream_start.len()
    );
    info!(
        "Containers: engine={} scheduler={}",
        config.containers.engine, config.containers.scheduler
    );

    let logs = docker::DockerCli::new(&config.docker);
    let now_playing = icecast::IcecastStatus::new(&config.now_playing);
    let scheduler_api = scheduler_api::SchedulerClient::new(&config.scheduler_api);
    info!("Scheduler API: {}", config.scheduler_api.base_url);

    let bind_address = config.http.bind_address.clone();
    let port = config.http.port;
    let state = http::HttpState::new(logs, now_playing, scheduler_api, patterns, config);

    let server = http::start_server(bind_address, port, state);
    server.await??;

    Ok(())
}

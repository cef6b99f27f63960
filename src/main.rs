use axum::{extract::State, response::Json, routing::get, Router};
use std::env;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bahnwacht::config::load_monitor_config;
use bahnwacht::monitor::scheduler::Monitor;
use bahnwacht::monitor::store::KnownStore;
use bahnwacht::monitor::StatusBoard;
use bahnwacht::notify::chat::{DiscordSink, StatusCommandPoller};
use bahnwacht::notify::social::{login_once, XSink};
use bahnwacht::notify::Dispatcher;

fn port_from_env() -> Option<u16> {
    for k in ["BAHNWACHT_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_monitor_config();

    // One-shot session capture for the X sink, then exit.
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--x-login") {
        let username = env::var("X_USERNAME")
            .map_err(|_| anyhow::anyhow!("--x-login needs X_USERNAME set"))?;
        let password = env::var("X_PASSWORD")
            .map_err(|_| anyhow::anyhow!("--x-login needs X_PASSWORD set"))?;
        login_once(&username, &password, &config.resolve_x_session_file())
            .await
            .map_err(|e| anyhow::anyhow!("x login failed: {e}"))?;
        return Ok(());
    }

    info!("Starting bahnwacht v{}", env!("CARGO_PKG_VERSION"));

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()?;

    let status = StatusBoard::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // --- Sinks ---
    let mut dispatcher = Dispatcher::new();
    let mut diagnostics = None;
    match (config.resolve_discord_token(), config.resolve_discord_channel()) {
        (Some(token), Some(channel)) => {
            let sink = DiscordSink::new(http_client.clone(), token, channel);
            diagnostics = Some(sink.clone());
            dispatcher.push(Arc::new(sink.clone()));

            let poller =
                StatusCommandPoller::new(sink, config.resolve_discord_admin(), status.clone());
            tokio::spawn(poller.run(shutdown_rx.clone()));
        }
        _ => warn!("DISCORD_TOKEN/CHANNEL_ID not set — chat sink disabled"),
    }
    if config.resolve_x_enabled() {
        dispatcher.push(Arc::new(XSink::new(config.resolve_x_session_file())));
    }
    if dispatcher.sink_count() == 0 {
        warn!("no notification sinks configured — running detection only");
    }

    // --- Monitor ---
    let store = KnownStore::load(&config.resolve_state_file());
    let monitor = Monitor::new(
        config.clone(),
        store,
        dispatcher,
        status.clone(),
        diagnostics,
    );
    let monitor_task = tokio::spawn(monitor.run(shutdown_rx));

    // --- Health server ---
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(status);

    let port: u16 = port_from_env().unwrap_or(8080);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or set PORT/BAHNWACHT_PORT.",
                bind_addr
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("Health endpoint listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Server is down; tell the background tasks and wait for the monitor to
    // finish its current cycle cleanly.
    let _ = shutdown_tx.send(true);
    if let Err(e) = monitor_task.await {
        warn!("monitor task ended abnormally: {}", e);
    }
    info!("bahnwacht stopped");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
}

// Plain-text body: uptime probes only check for 200 + "OK".
async fn health_check() -> &'static str {
    "OK"
}

async fn status_handler(State(status): State<StatusBoard>) -> Json<serde_json::Value> {
    let mut body = status.snapshot();
    if let Some(map) = body.as_object_mut() {
        map.insert(
            "service".into(),
            serde_json::Value::String("bahnwacht".into()),
        );
        map.insert(
            "version".into(),
            serde_json::Value::String(env!("CARGO_PKG_VERSION").into()),
        );
    }
    Json(body)
}

//! CO2 Alert Monitor Service
//!
//! Wires the serial feed, the alert fan-out, the Telegram command transport
//! and the HTTP control API together.

use axum::{
    routing::{get, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub mod commands;
pub mod feed;
pub mod rate_limit;
mod routes;
pub mod settings;
pub mod sink;
pub mod telemetry;

use alerting::{BroadcastHub, LogNotifier, Notifier, SubscriberRegistry};
use co2_feed::{FeedError, MockSource, SerialSource};
use rate_limit::{create_governor_config, RateLimitConfig};
use settings::Settings;
use sink::AlertSink;
use telegram::{CommandPoller, TelegramClient};

/// Application state shared across handlers
pub struct AppState<N> {
    pub registry: Arc<SubscriberRegistry<N>>,
    pub hub: Arc<BroadcastHub>,
    /// Prometheus handle, absent when no recorder could be installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl<N: Notifier> AppState<N> {
    pub fn new(
        registry: Arc<SubscriberRegistry<N>>,
        hub: Arc<BroadcastHub>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            registry,
            hub,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }
}

/// Create the application router
pub fn create_router<N: Notifier>(state: Arc<AppState<N>>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::get_health::<N>))
        .route("/api/v1/subscribers", get(routes::subscribers::list::<N>))
        .route(
            "/api/v1/subscribers/:id",
            put(routes::subscribers::subscribe::<N>).delete(routes::subscribers::unsubscribe::<N>),
        )
        .route("/api/v1/subscribers/:id/snooze", put(routes::subscribers::snooze::<N>))
        .route("/metrics", get(routes::health::get_metrics::<N>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the control API on a bound listener until cancelled
pub async fn run_server<N: Notifier>(
    listener: TcpListener,
    state: Arc<AppState<N>>,
    rate: RateLimitConfig,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let mut app = create_router(state);

    match create_governor_config(&rate) {
        Some(governor) => {
            let limiter = governor.limiter().clone();
            let sweep_cancel = cancel.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                loop {
                    tokio::select! {
                        _ = sweep_cancel.cancelled() => break,
                        _ = interval.tick() => limiter.retain_recent(),
                    }
                }
            });
            app = app.layer(GovernorLayer { config: governor });
        }
        None => warn!("Rate limiting disabled: invalid quota {:?}", rate),
    }

    info!("Starting control API on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

/// Run the whole service until Ctrl-C
pub async fn run(settings: Settings, force_mock: bool) -> anyhow::Result<()> {
    let metrics = match telemetry::install_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };

    let cancel = CancellationToken::new();
    let hub = Arc::new(BroadcastHub::new());
    info!("Alert thresholds: {:?}", settings.values);

    let telegram = if settings.telegram.enabled {
        Some(Arc::new(TelegramClient::new(&settings.telegram)?))
    } else {
        info!("Telegram disabled, alerts go to the log");
        None
    };
    let sink = match &telegram {
        Some(client) => AlertSink::Telegram(client.clone()),
        None => AlertSink::Log(LogNotifier),
    };
    let registry = Arc::new(SubscriberRegistry::new(
        hub.clone(),
        Arc::new(settings.values.clone()),
        Arc::new(sink),
    ));

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // Sensor feed
    let reconnect_delay = Duration::from_millis(settings.serial.reconnect_delay_ms);
    if force_mock || settings.serial.is_mock() {
        info!("Using mock CO2 source");
        tasks.push(tokio::spawn(feed::run_feed(
            || async { Ok::<_, FeedError>(MockSource::demo()) },
            hub.clone(),
            reconnect_delay,
            cancel.clone(),
        )));
    } else {
        let serial = settings.serial.clone();
        let validation = settings.validation.clone();
        tasks.push(tokio::spawn(feed::run_feed(
            move || {
                let serial = serial.clone();
                let validation = validation.clone();
                async move {
                    let source = SerialSource::open(&serial, validation).await?;
                    info!("Reading CO2 from {}", source.device());
                    Ok::<_, FeedError>(source)
                }
            },
            hub.clone(),
            reconnect_delay,
            cancel.clone(),
        )));
    }

    // Chat commands
    let (command_tx, command_rx) = mpsc::channel(64);
    tasks.push(tokio::spawn(commands::run_dispatcher(
        registry.clone(),
        command_rx,
        cancel.clone(),
    )));
    if let Some(client) = telegram {
        let poller = CommandPoller::new(
            client,
            settings.telegram.poll_timeout,
            Duration::from_secs(settings.telegram.retry_delay),
        );
        tasks.push(tokio::spawn(poller.run(command_tx, cancel.clone())));
    }

    if let Some(user) = settings.telegram.default_user() {
        registry.subscribe(user).await;
    }

    // Control API
    if settings.server.enabled {
        let listener = TcpListener::bind(settings.server_addr()?).await?;
        let state = Arc::new(AppState::new(registry.clone(), hub.clone(), metrics));
        let rate = RateLimitConfig::from(&settings.server);
        let server_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = run_server(listener, state, rate, server_cancel).await {
                error!("Control API failed: {}", e);
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            error!("Task ended abnormally: {}", e);
        }
    }
    registry.shutdown().await;

    info!("CO2 alert monitor stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AlertConfig, MemoryNotifier, UserId};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<SubscriberRegistry<MemoryNotifier>>) {
        let hub = Arc::new(BroadcastHub::new());
        let registry = Arc::new(SubscriberRegistry::new(
            hub.clone(),
            Arc::new(AlertConfig::default()),
            Arc::new(MemoryNotifier::new()),
        ));
        let state = Arc::new(AppState::new(registry.clone(), hub, None));
        (create_router(state), registry)
    }

    fn request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _registry) = app();
        let response = app.oneshot(request("GET", "/api/v1/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_subscribe_lifecycle() {
        let (app, registry) = app();

        let response = app.clone().oneshot(request("PUT", "/api/v1/subscribers/42", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json(response).await["created"], true);

        let response = app.clone().oneshot(request("PUT", "/api/v1/subscribers/42", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("PUT", "/api/v1/subscribers/42/snooze", Some(r#"{"minutes": 30}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.clone().oneshot(request("GET", "/api/v1/subscribers", None)).await.unwrap();
        let body = json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["user"], 42);
        assert_eq!(body["data"][0]["snooze_minutes"], 30);

        let response = app.clone().oneshot(request("DELETE", "/api/v1/subscribers/42", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!registry.is_active(UserId(42)).await);

        let response = app.oneshot(request("DELETE", "/api/v1/subscribers/42", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_snooze_unknown_user() {
        let (app, _registry) = app();
        let response = app
            .oneshot(request("PUT", "/api/v1/subscribers/7/snooze", Some(r#"{"minutes": 5}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let (app, _registry) = app();
        let response = app.oneshot(request("GET", "/metrics", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

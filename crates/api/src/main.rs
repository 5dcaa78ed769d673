//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::{Config, LogFormat};
use domain::{CartStorage, InMemoryCartStorage};
use metrics_exporter_prometheus::PrometheusHandle;
use notifier::{LogMailer, Mailer, NotificationDispatcher, SendGridMailer};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresCartStorage, PostgresStore, Storefront};
use tokio::signal;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How long shutdown waits for an in-flight delivery pass.
const DISPATCHER_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (text, json) = match config.log_format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

fn describe_metrics() {
    metrics::describe_counter!("orders_placed_total", "Orders accepted at checkout");
    metrics::describe_counter!(
        "order_placement_rejected_total",
        "Checkouts rejected, labelled by reason"
    );
    metrics::describe_counter!("orders_cancelled_total", "Orders cancelled and restocked");
    metrics::describe_counter!(
        "order_status_changes_total",
        "Admin status changes, labelled by target status"
    );
    metrics::describe_counter!("notifications_sent_total", "Emails delivered");
    metrics::describe_counter!("notifications_failed_total", "Email delivery attempts that failed");
    metrics::describe_histogram!(
        "order_placement_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent placing an order"
    );
}

fn build_mailer(config: &Config) -> Arc<dyn Mailer> {
    match &config.sendgrid_api_key {
        Some(key) => {
            let mailer = SendGridMailer::new(key.clone(), config.mail_from.clone())
                .expect("failed to build SendGrid client");
            tracing::info!(from = %config.mail_from, "sending email through SendGrid");
            Arc::new(mailer)
        }
        None => {
            tracing::warn!("SENDGRID_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    }
}

/// Runs the dispatcher and the HTTP server until a shutdown signal arrives.
async fn serve<S: Storefront, C: CartStorage + 'static>(
    config: Config,
    store: S,
    carts: C,
    metrics_handle: PrometheusHandle,
) {
    let shutdown = CancellationToken::new();
    let wake = Arc::new(Notify::new());

    let dispatcher =
        NotificationDispatcher::new(store.clone(), build_mailer(&config), config.dispatcher_config());
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown.clone(), wake.clone()));

    let state = api::create_state(store, carts, config.status_policy, wake);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(
        %addr,
        status_policy = config.status_policy.as_str(),
        "starting API server"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    shutdown.cancel();
    match tokio::time::timeout(DISPATCHER_SHUTDOWN_GRACE, dispatcher_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "notification dispatcher panicked"),
        Err(_) => tracing::warn!("notification dispatcher did not stop in time"),
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();

    // 3. Pick the backing store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool.clone());
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");

            serve(config, store, PostgresCartStorage::new(pool), metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve(
                config,
                InMemoryStore::new(),
                InMemoryCartStorage::new(),
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}

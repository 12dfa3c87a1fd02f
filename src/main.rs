use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use vserver_stats::*;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let (tx, _) = broadcast::channel::<models::TickReport>(app_config.publishing.broadcast_capacity);

    let store = match &app_config.publishing.stats_file {
        Some(path) => store::SnapshotStore::open(path).await?,
        None => store::SnapshotStore::in_memory(),
    };
    match store.path() {
        Some(path) => tracing::info!(path = %path.display(), "persisting stats after each tick"),
        None => tracing::info!("no stats_file configured; last-known stats kept in memory"),
    }
    let executor: Arc<dyn remote::CommandExecutor> = Arc::new(remote::SshExecutor::new(
        app_config.polling.connect_timeout(),
    ));
    let publisher: Arc<dyn publish::Publisher> = match &app_config.mqtt {
        Some(mqtt) => {
            tracing::info!(broker = %format!("{}:{}", mqtt.host, mqtt.port), "publishing to MQTT");
            Arc::new(publish::MqttPublisher::connect(mqtt.clone()))
        }
        None => {
            tracing::info!("no [mqtt] section; publishing to the log");
            Arc::new(publish::LogPublisher)
        }
    };

    let ws_stats_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let poller = poller::Poller::new(
        app_config.hosts.clone(),
        poller::PollerDeps {
            executor: executor.clone(),
            publisher,
            store: store.clone(),
            tx: tx.clone(),
        },
        poller::PollerConfig::from_app(&app_config),
    );
    tracing::info!(
        hosts = app_config.hosts.len(),
        interval_secs = poller.interval().as_secs(),
        "starting poller"
    );
    let poller_handle = poller::spawn(poller, shutdown_rx);

    let app = routes::app(tx, store, ws_stats_connections, app_config.clone(), executor);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = poller_handle.await;
        }
    }

    Ok(())
}

// WebSocket stream of tick reports

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::TickReport;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the ws_stats connection count on drop (connect = +1, drop = -1).
struct WsStatsGuard(Arc<AtomicUsize>);

impl Drop for WsStatsGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(super) async fn ws_stats(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let tx = state.stats_tx.clone();
    let conn_count = state.ws_stats_connections.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) = stream_stats(socket, &mut rx, conn_count).await {
            tracing::info!("Stats stream error: {}", e);
        }
    })
}

async fn send(socket: &mut WebSocket, msg: Message) -> bool {
    matches!(timeout(WS_SEND_TIMEOUT, socket.send(msg)).await, Ok(Ok(())))
}

async fn stream_stats(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<TickReport>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, Ordering::Relaxed);
    let _guard = WsStatsGuard(conn_count);
    tracing::info!("Client connected to stats stream");

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                let report = match result {
                    Ok(r) => r,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "stats stream lagging");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let json = serde_json::to_string(&report.hosts)?;
                if !send(&mut socket, Message::Text(json.into())).await {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !send(&mut socket, Message::Ping(Bytes::new())).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

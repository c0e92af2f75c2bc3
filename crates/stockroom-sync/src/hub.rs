//! # Change Hub
//!
//! Registry of live `/ws` connections and the fan-out of change
//! notifications to them.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ChangeHub                                      │
//! │                                                                         │
//! │   services ── broadcast_to_owner("a", n) ──┐                           │
//! │                                            ▼                            │
//! │   ┌──────────────────────────────────────────────────────────────┐     │
//! │   │  connections: RwLock<HashMap<conn_id, Connection>>           │     │
//! │   │                                                              │     │
//! │   │   c-1  owner "a"   awaiting_pong: no   tx ──▶ socket task    │     │
//! │   │   c-2  owner "a"   awaiting_pong: yes  tx ──▶ socket task    │     │
//! │   │   c-3  (untagged)  awaiting_pong: no   tx ──▶ socket task    │     │
//! │   └──────────────────────────────────────────────────────────────┘     │
//! │                                                                         │
//! │   Delivery: try_send on each bounded queue. A full queue drops the     │
//! │   notification for that connection only; a closed queue removes it.   │
//! │                                                                         │
//! │   Heartbeat tick:                                                       │
//! │     awaiting_pong? ──yes──▶ Close + remove                              │
//! │          │ no                                                           │
//! │          └──────────────▶ Ping, awaiting_pong = yes                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The hub knows nothing about sockets: each connection is a
//! `mpsc::Receiver<Outbound>` drained by [`crate::socket`], so tests drive it
//! directly through channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HubSettings;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{ChangeNotification, Outbound};

// =============================================================================
// Connection
// =============================================================================

/// One registered connection.
#[derive(Debug)]
struct Connection {
    owner_id: Option<String>,
    awaiting_pong: bool,
    tx: mpsc::Sender<Outbound>,
    connected_at: Instant,
}

/// Outcome of one heartbeat tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub pinged: usize,
    pub dropped: usize,
}

// =============================================================================
// Hub
// =============================================================================

/// Connection registry with owner-scoped fan-out.
///
/// Constructed once in `main` and shared as `Arc<ChangeHub>`.
#[derive(Debug)]
pub struct ChangeHub {
    connections: RwLock<HashMap<String, Connection>>,
    outbound_buffer: usize,
    closed: AtomicBool,
}

impl ChangeHub {
    /// Creates an empty hub.
    pub fn new(settings: &HubSettings) -> Self {
        ChangeHub {
            connections: RwLock::new(HashMap::new()),
            outbound_buffer: settings.outbound_buffer.max(1),
            closed: AtomicBool::new(false),
        }
    }

    // -------------------------------------------------------------------------
    // Connection Lifecycle
    // -------------------------------------------------------------------------

    /// Registers a new, untagged connection.
    ///
    /// Returns its generated id and the queue the socket task must drain.
    pub async fn register(&self) -> SyncResult<(String, mpsc::Receiver<Outbound>)> {
        if self.is_shut_down() {
            return Err(SyncError::ShuttingDown);
        }

        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.outbound_buffer);

        self.connections.write().await.insert(
            id.clone(),
            Connection {
                owner_id: None,
                awaiting_pong: false,
                tx,
                connected_at: Instant::now(),
            },
        );

        debug!(conn_id = %id, "Connection registered");
        Ok((id, rx))
    }

    /// Tags a connection with its owner. Re-authenticating replaces the tag.
    pub async fn authenticate(&self, conn_id: &str, owner_id: &str) -> SyncResult<()> {
        let mut connections = self.connections.write().await;
        let conn = connections
            .get_mut(conn_id)
            .ok_or_else(|| SyncError::UnknownConnection(conn_id.to_string()))?;

        conn.owner_id = Some(owner_id.to_string());
        info!(conn_id = %conn_id, owner_id = %owner_id, "Connection authenticated");
        Ok(())
    }

    /// Marks the last ping as answered.
    pub async fn acknowledge(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.awaiting_pong = false;
        }
    }

    /// Removes a connection. Returns false if it was already gone.
    pub async fn unregister(&self, conn_id: &str) -> bool {
        match self.connections.write().await.remove(conn_id) {
            Some(conn) => {
                info!(
                    conn_id = %conn_id,
                    owner_id = ?conn.owner_id,
                    connected_for = ?conn.connected_at.elapsed(),
                    "Connection removed"
                );
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Fan-out
    // -------------------------------------------------------------------------

    /// Sends to every connection. Returns how many accepted the message.
    pub async fn broadcast_all(&self, notification: &ChangeNotification) -> usize {
        self.deliver(notification, |_| true).await
    }

    /// Sends to every connection tagged with `owner_id`.
    ///
    /// With no owner (unowned entries) the notification goes to everyone.
    pub async fn broadcast_to_owner(
        &self,
        owner_id: Option<&str>,
        notification: &ChangeNotification,
    ) -> usize {
        match owner_id {
            Some(owner) => {
                self.deliver(notification, |conn| conn.owner_id.as_deref() == Some(owner))
                    .await
            }
            None => self.broadcast_all(notification).await,
        }
    }

    async fn deliver(
        &self,
        notification: &ChangeNotification,
        matches: impl Fn(&Connection) -> bool,
    ) -> usize {
        let payload = match serde_json::to_string(notification) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize change notification");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        {
            let connections = self.connections.read().await;
            for (id, conn) in connections.iter().filter(|(_, c)| matches(c)) {
                match conn.tx.try_send(Outbound::Notify(payload.clone())) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(conn_id = %id, "Outbound queue full, notification dropped");
                    }
                    Err(TrySendError::Closed(_)) => gone.push(id.clone()),
                }
            }
        }

        for id in gone {
            self.unregister(&id).await;
        }

        debug!(
            kind = ?notification.kind,
            product_id = %notification.product_id,
            delivered,
            "Change notification fanned out"
        );
        delivered
    }

    // -------------------------------------------------------------------------
    // Liveness
    // -------------------------------------------------------------------------

    /// Drops connections that never answered the previous ping and pings the
    /// rest.
    pub async fn heartbeat_tick(&self) -> HeartbeatReport {
        let mut report = HeartbeatReport::default();
        let mut connections = self.connections.write().await;

        connections.retain(|id, conn| {
            if conn.awaiting_pong {
                let _ = conn.tx.try_send(Outbound::Close);
                warn!(conn_id = %id, owner_id = ?conn.owner_id, "Heartbeat missed, dropping connection");
                report.dropped += 1;
                return false;
            }

            match conn.tx.try_send(Outbound::Ping) {
                Ok(()) | Err(TrySendError::Full(_)) => {
                    conn.awaiting_pong = true;
                    report.pinged += 1;
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    false
                }
            }
        });

        if report.dropped > 0 {
            info!(pinged = report.pinged, dropped = report.dropped, "Heartbeat tick");
        }
        report
    }

    // -------------------------------------------------------------------------
    // Introspection & Shutdown
    // -------------------------------------------------------------------------

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of connections tagged with `owner_id`.
    pub async fn owner_connection_count(&self, owner_id: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.owner_id.as_deref() == Some(owner_id))
            .count()
    }

    /// True once [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes every connection and refuses new ones. Returns how many were
    /// closed.
    pub async fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::Release);

        let drained: Vec<_> = self.connections.write().await.drain().collect();
        for (_, conn) in &drained {
            let _ = conn.tx.try_send(Outbound::Close);
        }

        info!(closed = drained.len(), "Change hub shut down");
        drained.len()
    }
}

// =============================================================================
// Heartbeat Task
// =============================================================================

/// Runs [`ChangeHub::heartbeat_tick`] every `period` until `shutdown` flips
/// to true or its sender is dropped.
pub fn spawn_heartbeat(
    hub: Arc<ChangeHub>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    hub.heartbeat_tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Heartbeat task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChangeKind;

    fn hub() -> ChangeHub {
        ChangeHub::new(&HubSettings::default())
    }

    fn notification(id: &str) -> ChangeNotification {
        ChangeNotification {
            kind: ChangeKind::ProductUpdated,
            product_id: id.to_string(),
            product_name: "Brake Pad Front".to_string(),
            stock: None,
            timestamp: 1,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_owner_broadcast_reaches_only_tagged_connections() {
        let hub = hub();
        let (a1, mut rx_a1) = hub.register().await.unwrap();
        let (a2, mut rx_a2) = hub.register().await.unwrap();
        let (b1, mut rx_b1) = hub.register().await.unwrap();
        let (_untagged, mut rx_untagged) = hub.register().await.unwrap();

        hub.authenticate(&a1, "a").await.unwrap();
        hub.authenticate(&a2, "a").await.unwrap();
        hub.authenticate(&b1, "b").await.unwrap();

        let delivered = hub.broadcast_to_owner(Some("a"), &notification("p1")).await;
        assert_eq!(delivered, 2);
        assert_eq!(drain(&mut rx_a1).len(), 1);
        assert_eq!(drain(&mut rx_a2).len(), 1);
        assert!(drain(&mut rx_b1).is_empty());
        assert!(drain(&mut rx_untagged).is_empty());

        assert_eq!(hub.broadcast_to_owner(Some("nobody"), &notification("p1")).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_owner_and_broadcast_all_reach_everyone() {
        let hub = hub();
        let (a1, mut rx_a1) = hub.register().await.unwrap();
        let (_untagged, mut rx_untagged) = hub.register().await.unwrap();
        hub.authenticate(&a1, "a").await.unwrap();

        assert_eq!(hub.broadcast_to_owner(None, &notification("p1")).await, 2);
        assert_eq!(hub.broadcast_all(&notification("p2")).await, 2);
        assert_eq!(drain(&mut rx_a1).len(), 2);

        match drain(&mut rx_untagged).remove(0) {
            Outbound::Notify(json) => {
                let parsed: ChangeNotification = serde_json::from_str(&json).unwrap();
                assert_eq!(parsed.product_id, "p1");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authenticate_unknown_connection() {
        let hub = hub();
        let err = hub.authenticate("missing", "a").await.unwrap_err();
        assert!(matches!(err, SyncError::UnknownConnection(_)));
    }

    #[tokio::test]
    async fn test_closed_receiver_is_pruned_on_delivery() {
        let hub = hub();
        let (_id, rx) = hub.register().await.unwrap();
        drop(rx);

        assert_eq!(hub.broadcast_all(&notification("p1")).await, 0);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_notification_but_keeps_connection() {
        let hub = ChangeHub::new(&HubSettings {
            heartbeat_interval_secs: 30,
            outbound_buffer: 1,
        });
        let (_id, mut rx) = hub.register().await.unwrap();

        assert_eq!(hub.broadcast_all(&notification("p1")).await, 1);
        assert_eq!(hub.broadcast_all(&notification("p2")).await, 0);
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_drops_silent_connections() {
        let hub = hub();
        let (alive, mut rx_alive) = hub.register().await.unwrap();
        let (_silent, mut rx_silent) = hub.register().await.unwrap();

        let first = hub.heartbeat_tick().await;
        assert_eq!(first, HeartbeatReport { pinged: 2, dropped: 0 });
        assert_eq!(drain(&mut rx_alive), vec![Outbound::Ping]);
        assert_eq!(drain(&mut rx_silent), vec![Outbound::Ping]);

        hub.acknowledge(&alive).await;

        let second = hub.heartbeat_tick().await;
        assert_eq!(second, HeartbeatReport { pinged: 1, dropped: 1 });
        assert_eq!(drain(&mut rx_silent), vec![Outbound::Close]);
        assert_eq!(drain(&mut rx_alive), vec![Outbound::Ping]);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let hub = hub();
        let (_a, mut rx_a) = hub.register().await.unwrap();
        let (_b, mut rx_b) = hub.register().await.unwrap();

        assert_eq!(hub.shutdown().await, 2);
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(drain(&mut rx_a), vec![Outbound::Close]);
        assert_eq!(drain(&mut rx_b), vec![Outbound::Close]);
        assert!(matches!(hub.register().await, Err(SyncError::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_task_pings_on_schedule_and_stops() {
        let hub = Arc::new(hub());
        let (_id, mut rx) = hub.register().await.unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = spawn_heartbeat(hub.clone(), Duration::from_secs(30), stop_rx);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(drain(&mut rx), vec![Outbound::Ping]);

        // Unanswered: the next tick drops it.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(drain(&mut rx), vec![Outbound::Close]);
        assert_eq!(hub.connection_count().await, 0);

        stop_tx.send(true).unwrap();
        task.await.unwrap();
    }
}

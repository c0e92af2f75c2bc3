//! # WebSocket Bridge
//!
//! Connects one upgraded axum `WebSocket` to the [`ChangeHub`].
//!
//! ```text
//!   hub queue ──▶ outgoing task ──▶ socket sink      (Notify → Text, Ping, Close)
//!   socket stream ──▶ receive loop ──▶ hub           (authenticate, pong)
//! ```
//!
//! Either side ending tears the whole connection down and unregisters it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use stockroom_core::validation::validate_owner_id;

use crate::hub::ChangeHub;
use crate::protocol::{ClientMessage, Outbound};

/// Largest text frame a client may send.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Serves one connection until either side closes it.
pub async fn serve_connection(socket: WebSocket, hub: Arc<ChangeHub>) {
    let (conn_id, mut outbound) = match hub.register().await {
        Ok(registered) => registered,
        Err(e) => {
            debug!(error = %e, "Rejecting WebSocket connection");
            let mut socket = socket;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let writer_id = conn_id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let (msg, last) = match frame {
                Outbound::Notify(json) => (Message::Text(json.into()), false),
                Outbound::Ping => (Message::Ping(Default::default()), false),
                Outbound::Close => (Message::Close(None), true),
            };
            if sender.send(msg).await.is_err() || last {
                break;
            }
        }
        debug!(conn_id = %writer_id, "Outgoing task finished");
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&hub, &conn_id, text.as_str()).await,
                Some(Ok(Message::Pong(_))) => hub.acknowledge(&conn_id).await,
                Some(Ok(Message::Close(_))) => {
                    info!(conn_id = %conn_id, "Client requested close");
                    break;
                }
                // Pings are answered by axum; binary frames carry nothing we read.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                None => {
                    info!(conn_id = %conn_id, "Client disconnected");
                    break;
                }
            }
        }
    }

    writer.abort();
    hub.unregister(&conn_id).await;
}

/// Applies one client text frame.
async fn handle_text(hub: &ChangeHub, conn_id: &str, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Authenticate { user_id }) => {
            if let Err(e) = validate_owner_id(&user_id) {
                warn!(conn_id = %conn_id, error = %e, "Rejected authenticate message");
                return;
            }
            if let Err(e) = hub.authenticate(conn_id, &user_id).await {
                debug!(conn_id = %conn_id, error = %e, "Authenticate after removal");
            }
        }
        Ok(ClientMessage::Pong) => hub.acknowledge(conn_id).await,
        Err(e) => debug!(conn_id = %conn_id, error = %e, "Ignoring unknown client message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubSettings;
    use crate::hub::HeartbeatReport;

    #[tokio::test]
    async fn test_text_frames_drive_the_hub() {
        let hub = ChangeHub::new(&HubSettings::default());
        let (id, _rx) = hub.register().await.unwrap();

        handle_text(&hub, &id, r#"{"type":"authenticate","userId":"owner-1"}"#).await;
        assert_eq!(hub.owner_connection_count("owner-1").await, 1);

        hub.heartbeat_tick().await;
        handle_text(&hub, &id, r#"{"type":"pong"}"#).await;
        assert_eq!(
            hub.heartbeat_tick().await,
            HeartbeatReport { pinged: 1, dropped: 0 }
        );
    }

    #[tokio::test]
    async fn test_bad_frames_are_ignored() {
        let hub = ChangeHub::new(&HubSettings::default());
        let (id, _rx) = hub.register().await.unwrap();

        handle_text(&hub, &id, "not json").await;
        handle_text(&hub, &id, r#"{"type":"authenticate","userId":"has space"}"#).await;

        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.owner_connection_count("has space").await, 0);
    }
}

//! # Change Broadcast Protocol
//!
//! Messages exchanged over the `/ws` connection.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Change Broadcast Messages                            │
//! │                                                                         │
//! │  IDENTIFY                                                              │
//! │  ────────                                                              │
//! │  CLIENT ───► { "type": "authenticate", "userId": "..." }               │
//! │              (optional; untagged connections only get broadcast-all)   │
//! │                                                                         │
//! │  NOTIFY                                                                │
//! │  ──────                                                                │
//! │  SERVER ───► { "type": "stock-updated", "productId": "...",            │
//! │                "productName": "...", "stock": 7, "timestamp": ... }    │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  SERVER ───► WebSocket Ping                                            │
//! │  CLIENT ───► WebSocket Pong  or  { "type": "pong" }                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notifications are hints. A client that missed one catches up through
//! delta sync; nothing is replayed.

use serde::{Deserialize, Serialize};

use stockroom_core::Product;

// =============================================================================
// Server → Client
// =============================================================================

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    StockUpdated,
    VariantAdded,
}

/// One change notification as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub product_id: String,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChangeNotification {
    /// Notification about `product`, stamped with its last write time.
    pub fn for_product(kind: ChangeKind, product: &Product) -> Self {
        ChangeNotification {
            kind,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            stock: None,
            timestamp: product.updated_at.timestamp_millis(),
        }
    }

    /// Attaches the new on-hand quantity.
    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    /// Overrides the timestamp (used for deletions, stamped with the tombstone).
    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = timestamp_ms;
        self
    }
}

// =============================================================================
// Client → Server
// =============================================================================

/// Text frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Tags the connection with an owner.
    Authenticate {
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// Answers the last heartbeat.
    Pong,
}

// =============================================================================
// Hub → Socket Task
// =============================================================================

/// Frames queued for one connection. The socket task turns these into
/// WebSocket frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized [`ChangeNotification`].
    Notify(String),
    /// Heartbeat.
    Ping,
    /// The hub dropped this connection.
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockroom_core::{Markup, Money, ProductDraft};

    fn product() -> Product {
        let draft = ProductDraft {
            name: "Brake Pad Front".to_string(),
            code: None,
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(500),
            price: Money::from_cents(500),
            markup: Markup::zero(),
            currency: "EUR".to_string(),
            on_hand: 4,
            category_id: None,
            images: vec![],
            visible: true,
        };
        Product::from_draft("p1".into(), Some("a".into()), draft, vec![], Utc::now())
    }

    #[test]
    fn test_notification_wire_shape() {
        let p = product();
        let n = ChangeNotification::for_product(ChangeKind::StockUpdated, &p).with_stock(7);
        let json = serde_json::to_value(&n).unwrap();

        assert_eq!(json["type"], "stock-updated");
        assert_eq!(json["productId"], "p1");
        assert_eq!(json["productName"], "Brake Pad Front");
        assert_eq!(json["stock"], 7);
        assert_eq!(json["timestamp"], p.updated_at.timestamp_millis());
    }

    #[test]
    fn test_stock_omitted_when_absent() {
        let n = ChangeNotification::for_product(ChangeKind::ProductDeleted, &product()).at(42);
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("stock").is_none());
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["type"], "product-deleted");
    }

    #[test]
    fn test_client_messages() {
        let auth: ClientMessage =
            serde_json::from_str(r#"{"type":"authenticate","userId":"owner-1"}"#).unwrap();
        assert_eq!(
            auth,
            ClientMessage::Authenticate {
                user_id: "owner-1".into()
            }
        );

        let pong: ClientMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(pong, ClientMessage::Pong);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}

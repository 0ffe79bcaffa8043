//! Fire-and-forget audit events after significant mutations.
//!
//! The core only emits; whatever subscriber is installed decides storage
//! and retention. Events carry a stable name plus a structured payload.

use serde_json::Value;

pub fn record(event: &'static str, payload: Value) {
    tracing::info!(target: "audit", event, payload = %payload);
}

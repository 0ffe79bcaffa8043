//! Opaque pagination cursors.
//!
//! The store hands back a last-evaluated key when a page fills; callers
//! see only its base64-encoded form. Decoding is defensive: a malformed
//! or tampered cursor decodes to `None` (restart from the beginning)
//! rather than an error — a corrupt pagination token must never fail a
//! request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Where a paged scan left off: the primary key of the last item
/// returned, plus the secondary-index sort value when the scan ran over
/// an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastKey {
    pub pk: String,
    pub sk: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub isk: Option<String>,
}

pub fn encode(last: &LastKey) -> String {
    // LastKey serialization cannot fail: plain strings only.
    let json = serde_json::to_vec(last).unwrap_or_default();
    STANDARD.encode(json)
}

pub fn decode(token: &str) -> Option<LastKey> {
    let bytes = STANDARD.decode(token).ok()?;
    serde_json::from_slice(&bytes).ok()
}

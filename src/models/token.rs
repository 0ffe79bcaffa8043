use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single-use refresh token record. Consumption flips `valid` under a
/// conditional write, so a replayed token always loses the race.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    pub user_id: Uuid,
    pub jti: Uuid,
    pub valid: bool,
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked_at: Option<i64>,
    pub created_at: i64,
}

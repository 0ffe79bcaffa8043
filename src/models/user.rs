use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::UserRole;

/// A staff account. Email uniqueness is enforced through the
/// `USER_EMAIL#` index item, never by this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub email_norm: String,
    pub name: String,
    pub role: UserRole,
    pub password_hash: String,
    /// Failed-login counter for the lockout backpressure mechanism.
    pub failed_attempts: i64,
    /// Epoch millis until which logins are refused, if locked.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lock_until: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub password_hash: String,
}

/// Doctor profile, keyed separately from the user account so visits can
/// reference doctors without touching credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub specialty: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    /// Normalized forms backing the uniqueness index key; rewritten on
    /// every rename.
    pub name_norm: String,
    pub phone_norm: String,
    /// Precomputed haystack for substring search (normalized name +
    /// phone).
    pub search_text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dob: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub address: Option<String>,
    /// Soft-deleted patients are excluded from all normal reads and
    /// searches; the item itself stays for audit/history.
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub phone: String,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
}

/// Sparse patch: absent fields are untouched; the `clear_*` flags request
/// explicit removal of an optional field. Name/phone changes route
/// through the uniqueness-rename protocol.
#[derive(Debug, Clone, Default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    pub clear_dob: bool,
    pub clear_address: bool,
}

impl PatientPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.gender.is_none()
            && self.dob.is_none()
            && self.address.is_none()
            && !self.clear_dob
            && !self.clear_address
    }
}

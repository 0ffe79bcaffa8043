//! Key-space model: deterministic mapping from (entity type, identifiers)
//! to primary and secondary-index key strings.
//!
//! Every key is a fixed literal prefix joined to its identifiers with `#`.
//! Identifiers are either store-generated UUIDs or normalized strings with
//! the separator stripped (see `normalize`), so distinct (entity,
//! identifier) pairs can never collide and the same pair always maps to
//! the same key — the property the conditional-existence uniqueness
//! guards rely on.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::enums::{PresetKind, VisitKind, VisitStatus};

/// A composite primary key addressing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub pk: String,
    pub sk: String,
}

impl Key {
    fn new(pk: String, sk: impl Into<String>) -> Self {
        Self { pk, sk: sk.into() }
    }
}

/// Denormalized secondary-index key attributes carried on an item. A
/// `None` pair means the item does not appear in that index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKeys {
    pub i1pk: Option<String>,
    pub i1sk: Option<String>,
    pub i2pk: Option<String>,
    pub i2sk: Option<String>,
    pub i3pk: Option<String>,
    pub i3sk: Option<String>,
}

/// Entity-type discriminator tags.
pub mod entity {
    pub const USER: &str = "USER";
    pub const USER_EMAIL: &str = "USER_EMAIL";
    pub const DOCTOR: &str = "DOCTOR";
    pub const PATIENT: &str = "PATIENT";
    pub const PATIENT_PHONE: &str = "PATIENT_PHONE";
    pub const VISIT: &str = "VISIT";
    pub const PATIENT_VISIT: &str = "PATIENT_VISIT";
    pub const BILLING: &str = "BILLING";
    pub const FOLLOWUP: &str = "FOLLOWUP";
    pub const PRESET: &str = "PRESET";
    pub const PRESET_NAME: &str = "PRESET_NAME";
    pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";
    pub const COUNTER: &str = "COUNTER";
}

pub fn user(id: &Uuid) -> Key {
    Key::new(format!("USER#{id}"), "META")
}

pub fn user_email(email_norm: &str) -> Key {
    Key::new(format!("USER_EMAIL#{email_norm}"), "META")
}

pub fn doctor(id: &Uuid) -> Key {
    Key::new(format!("DOCTOR#{id}"), "PROFILE")
}

pub fn patient(id: &Uuid) -> Key {
    Key::new(format!("PATIENT#{id}"), "PROFILE")
}

/// Uniqueness guard for the (phone, name) pair.
pub fn patient_phone(phone_norm: &str, name_norm: &str) -> Key {
    Key::new(format!("PATIENT_PHONE#{phone_norm}#{name_norm}"), "PROFILE")
}

pub fn visit(id: &Uuid) -> Key {
    Key::new(format!("VISIT#{id}"), "META")
}

/// Per-patient projection of a visit, queryable as a partition range.
pub fn patient_visit(patient_id: &Uuid, visit_id: &Uuid) -> Key {
    Key::new(format!("PATIENT#{patient_id}"), format!("VISIT#{visit_id}"))
}

pub fn billing(visit_id: &Uuid) -> Key {
    Key::new(format!("VISIT#{visit_id}"), "BILLING")
}

pub fn followup(visit_id: &Uuid) -> Key {
    Key::new(format!("VISIT#{visit_id}"), "FOLLOWUP")
}

pub fn preset(kind: PresetKind, id: &Uuid) -> Key {
    Key::new(format!("{}_PRESET#{id}", kind.as_str()), "META")
}

/// Uniqueness guard for a preset/medicine name within its kind.
pub fn preset_name(kind: PresetKind, name_norm: &str) -> Key {
    Key::new(format!("{}_NAME#{name_norm}", kind.as_str()), "META")
}

pub fn refresh_token(user_id: &Uuid, jti: &Uuid) -> Key {
    Key::new(format!("REFRESH_TOKEN#{user_id}"), format!("RT#{jti}"))
}

/// Partition key for all of one user's refresh tokens.
pub fn refresh_token_partition(user_id: &Uuid) -> String {
    format!("REFRESH_TOKEN#{user_id}")
}

pub fn bill_counter(date: NaiveDate) -> Key {
    Key::new(format!("COUNTER#BILL#{date}"), "META")
}

/// Index-1 projection: preset typeahead, kind-partitioned, ordered by
/// normalized name.
pub fn preset_search_index(kind: PresetKind, name_norm: &str) -> IndexKeys {
    IndexKeys {
        i1pk: Some(kind.as_str().to_string()),
        i1sk: Some(name_norm.to_string()),
        ..IndexKeys::default()
    }
}

/// Index-2 + Index-3 projections for a canonical visit item: queue
/// ordering per doctor+date, and the daily listing. The timestamp is
/// zero-padded so lexicographic order matches numeric order.
pub fn visit_indexes(
    doctor_id: &Uuid,
    date: NaiveDate,
    status: VisitStatus,
    queued_at: i64,
    kind: VisitKind,
    visit_id: &Uuid,
) -> IndexKeys {
    IndexKeys {
        i2pk: Some(format!("DOCTOR#{doctor_id}#DATE#{date}")),
        i2sk: Some(format!("{}#{queued_at:013}", status.as_str())),
        i3pk: Some(format!("DAY#{date}")),
        i3sk: Some(format!("VISIT#{}#{visit_id}", kind.as_str())),
        ..IndexKeys::default()
    }
}

pub fn visit_queue_partition(doctor_id: &Uuid, date: NaiveDate) -> String {
    format!("DOCTOR#{doctor_id}#DATE#{date}")
}

pub fn day_partition(date: NaiveDate) -> String {
    format!("DAY#{date}")
}

/// Index-3 projection for a follow-up, partitioned by its due date.
pub fn followup_day_index(date: NaiveDate, visit_id: &Uuid) -> IndexKeys {
    IndexKeys {
        i3pk: Some(format!("DAY#{date}")),
        i3sk: Some(format!("FOLLOWUP#{visit_id}")),
        ..IndexKeys::default()
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{PaymentMode, VisitKind, VisitStatus};

/// A clinic visit. The canonical item lives at `VISIT#<id>/META`; an
/// identical body is mirrored to the patient projection
/// `PATIENT#<patientId>/VISIT#<id>`, and both are written in the same
/// transaction on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub kind: VisitKind,
    pub status: VisitStatus,
    /// Queue-entry timestamp (epoch millis); feeds the Index-2 sort key.
    pub queued_at: i64,
    /// Zero-billed visits default to no billing, and if billed anyway
    /// must total exactly zero.
    pub zero_billed: bool,
    /// Set once by checkout; its absence is the write-time idempotency
    /// backstop.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub billing_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bill_number: Option<String>,
    pub checked_out: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub checked_out_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payment_mode: Option<PaymentMode>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewVisit {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub kind: VisitKind,
    pub zero_billed: bool,
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PaymentMode;

/// One bill line. Amounts are integer minor currency units; quantities
/// and unit amounts must be non-negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillLine {
    pub description: String,
    pub quantity: i64,
    pub unit_amount: i64,
}

/// The billing record for a checked-out visit, stored at
/// `VISIT#<id>/BILLING`. Created at most once per visit through checkout;
/// replaceable only by the administrative bill update, which preserves
/// `bill_number` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub visit_id: Uuid,
    pub patient_id: Uuid,
    pub bill_number: String,
    pub items: Vec<BillLine>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub tax_amount: i64,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payment_mode: Option<PaymentMode>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Follow-up requested as part of checkout.
#[derive(Debug, Clone)]
pub struct FollowUpRequest {
    pub date: NaiveDate,
    pub note: Option<String>,
}

/// Caller input to checkout (and to the administrative bill update,
/// which ignores the follow-up and bypass fields).
#[derive(Debug, Clone)]
pub struct BillInput {
    pub items: Vec<BillLine>,
    pub discount_amount: i64,
    pub tax_amount: i64,
    pub payment_mode: Option<PaymentMode>,
    /// Explicit opt-in to bill a zero-billed visit (the total must still
    /// be exactly zero).
    pub bill_zero_billed: bool,
    pub follow_up: Option<FollowUpRequest>,
}

impl BillInput {
    pub fn new(items: Vec<BillLine>, discount_amount: i64, tax_amount: i64) -> Self {
        Self {
            items,
            discount_amount,
            tax_amount,
            payment_mode: None,
            bill_zero_billed: false,
            follow_up: None,
        }
    }
}

/// Result of the pure totals computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillTotals {
    pub subtotal: i64,
    pub total: i64,
}

//! Checkout: billing creation with the daily bill counter, the
//! all-or-nothing write set, and the administrative bill update.

use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit;
use crate::config;
use crate::errors::DataError;
use crate::models::{BillInput, BillLine, BillTotals, Billing, FollowUp, Visit, VisitStatus};
use crate::store::{keys, Condition, Item, KvStore, StoreError, WriteOp};

use super::patient;

/// Pure totals computation over integer minor units. Rejects negative
/// lines, negative adjustments, a discount exceeding the subtotal, and
/// arithmetic overflow; never touches the store.
pub fn compute_totals(
    items: &[BillLine],
    discount_amount: i64,
    tax_amount: i64,
) -> Result<BillTotals, DataError> {
    if discount_amount < 0 || tax_amount < 0 {
        return Err(DataError::Validation("discount and tax must be non-negative".into()));
    }
    let mut subtotal: i64 = 0;
    for line in items {
        if line.quantity < 0 || line.unit_amount < 0 {
            return Err(DataError::Validation(format!(
                "negative quantity or amount on line '{}'",
                line.description
            )));
        }
        let line_total = line
            .quantity
            .checked_mul(line.unit_amount)
            .and_then(|t| subtotal.checked_add(t))
            .ok_or_else(|| DataError::Validation("bill amount overflow".into()))?;
        subtotal = line_total;
    }
    if discount_amount > subtotal {
        return Err(DataError::Validation("discount exceeds subtotal".into()));
    }
    let total = subtotal
        .checked_sub(discount_amount)
        .and_then(|t| t.checked_add(tax_amount))
        .ok_or_else(|| DataError::Validation("bill amount overflow".into()))?;
    if total < 0 {
        return Err(DataError::Validation("bill total must be non-negative".into()));
    }
    Ok(BillTotals { subtotal, total })
}

/// `B<YYYYMMDD>-<seq>` with the sequence zero-padded to four digits.
fn bill_number(date: NaiveDate, seq: i64) -> String {
    format!("B{}-{seq:04}", date.format("%Y%m%d"))
}

/// Check out a DONE visit: validate, draw a bill number from the day's
/// counter, and commit the billing record, both visit items, and the
/// optional follow-up as one all-or-nothing write set.
pub fn checkout(store: &KvStore, visit_id: &Uuid, input: BillInput) -> Result<Billing, DataError> {
    checkout_at(store, visit_id, input, config::clinic_today())
}

/// Checkout against an explicit clinic-local date (injected by tests).
pub fn checkout_at(
    store: &KvStore,
    visit_id: &Uuid,
    input: BillInput,
    today: NaiveDate,
) -> Result<Billing, DataError> {
    let visit: Visit = store
        .get_item(&keys::visit(visit_id))?
        .ok_or(DataError::NotFound {
            entity_type: "visit",
            id: visit_id.to_string(),
        })?
        .decode()?;
    if visit.status != VisitStatus::Done {
        return Err(DataError::VisitNotDone);
    }
    match patient::get_patient(store, &visit.patient_id) {
        Ok(_) => {}
        Err(DataError::NotFound { .. }) => {
            return Err(DataError::Validation("patient is deleted or missing".into()))
        }
        Err(e) => return Err(e),
    }
    if store.get_item(&keys::billing(visit_id))?.is_some() {
        return Err(DataError::DuplicateCheckout);
    }
    if visit.zero_billed && !input.bill_zero_billed {
        return Err(DataError::Validation(
            "zero-billed visit requires explicit billing opt-in".into(),
        ));
    }
    if let Some(fu) = &input.follow_up {
        if store.get_item(&keys::followup(visit_id))?.is_some() {
            return Err(DataError::Duplicate { entity: "follow-up" });
        }
        if fu.date < visit.date || fu.date < today {
            return Err(DataError::Validation("follow-up date is in the past".into()));
        }
    }
    let totals = compute_totals(&input.items, input.discount_amount, input.tax_amount)?;
    if visit.zero_billed && totals.total != 0 {
        return Err(DataError::Validation("zero-billed visit must total zero".into()));
    }

    // The counter draw commits independently of the write set below; a
    // lost race burns the sequence number, which is acceptable — bill
    // numbers are unique and ordered, not gapless.
    let seq = store.increment_counter(&keys::bill_counter(today))?;
    let number = bill_number(today, seq);
    let now = config::now_millis();

    let billing = Billing {
        visit_id: *visit_id,
        patient_id: visit.patient_id,
        bill_number: number.clone(),
        items: input.items,
        subtotal: totals.subtotal,
        discount_amount: input.discount_amount,
        tax_amount: input.tax_amount,
        total: totals.total,
        payment_mode: input.payment_mode,
        created_at: now,
        updated_at: now,
    };

    let mut set: Vec<(String, Value)> = vec![
        ("billingAmount".into(), json!(totals.total)),
        ("billNumber".into(), json!(number)),
        ("checkedOut".into(), json!(true)),
        ("checkedOutAt".into(), json!(now)),
        ("updatedAt".into(), json!(now)),
    ];
    if let Some(mode) = input.payment_mode {
        set.push(("paymentMode".into(), json!(mode)));
    }

    let mut ops = vec![
        WriteOp::Update {
            key: keys::visit(visit_id),
            set: set.clone(),
            remove: vec![],
            index: None,
            // Revalidated at write time: still DONE, never billed. Any
            // concurrent winner trips this and the whole set rolls back.
            condition: Condition::All(vec![
                Condition::Exists,
                Condition::FieldEquals("status".into(), json!(VisitStatus::Done)),
                Condition::FieldAbsent("billingAmount".into()),
            ]),
        },
        WriteOp::Update {
            key: keys::patient_visit(&visit.patient_id, visit_id),
            set,
            remove: vec![],
            index: None,
            condition: Condition::Exists,
        },
        WriteOp::Put {
            item: Item::new(keys::billing(visit_id), keys::entity::BILLING, &billing)?,
            condition: Condition::NotExists,
        },
    ];
    if let Some(fu) = input.follow_up {
        let followup = FollowUp {
            id: Uuid::new_v4(),
            visit_id: *visit_id,
            patient_id: visit.patient_id,
            date: fu.date,
            note: fu.note,
            created_at: now,
        };
        ops.push(WriteOp::Put {
            item: Item::new(keys::followup(visit_id), keys::entity::FOLLOWUP, &followup)?
                .with_index(keys::followup_day_index(followup.date, visit_id)),
            condition: Condition::NotExists,
        });
    }

    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            audit::record("checkout.lost_race", json!({ "visitId": visit_id }));
            return Err(DataError::DuplicateCheckout);
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        "checkout.completed",
        json!({ "visitId": visit_id, "billNumber": billing.bill_number, "total": billing.total }),
    );
    Ok(billing)
}

pub fn get_billing(store: &KvStore, visit_id: &Uuid) -> Result<Billing, DataError> {
    store
        .get_item(&keys::billing(visit_id))?
        .ok_or(DataError::NotFound {
            entity_type: "billing",
            id: visit_id.to_string(),
        })?
        .decode()
        .map_err(DataError::from)
}

/// Administrative correction of an existing bill. The bill number and
/// creation time survive; the follow-up and zero-billing opt-in fields
/// of the input are ignored, but the zero-billed ceiling still applies.
pub fn update_bill(store: &KvStore, visit_id: &Uuid, input: BillInput) -> Result<Billing, DataError> {
    let existing = get_billing(store, visit_id)?;
    let visit: Visit = store
        .get_item(&keys::visit(visit_id))?
        .ok_or(DataError::NotFound {
            entity_type: "visit",
            id: visit_id.to_string(),
        })?
        .decode()?;

    let totals = compute_totals(&input.items, input.discount_amount, input.tax_amount)?;
    if visit.zero_billed && totals.total != 0 {
        return Err(DataError::Validation("zero-billed visit must total zero".into()));
    }

    let now = config::now_millis();
    let billing = Billing {
        visit_id: *visit_id,
        patient_id: existing.patient_id,
        bill_number: existing.bill_number,
        items: input.items,
        subtotal: totals.subtotal,
        discount_amount: input.discount_amount,
        tax_amount: input.tax_amount,
        total: totals.total,
        payment_mode: input.payment_mode.or(existing.payment_mode),
        created_at: existing.created_at,
        updated_at: now,
    };

    let mut set: Vec<(String, Value)> = vec![
        ("billingAmount".into(), json!(totals.total)),
        ("updatedAt".into(), json!(now)),
    ];
    if let Some(mode) = billing.payment_mode {
        set.push(("paymentMode".into(), json!(mode)));
    }

    let ops = vec![
        WriteOp::Put {
            item: Item::new(keys::billing(visit_id), keys::entity::BILLING, &billing)?,
            condition: Condition::Exists,
        },
        WriteOp::Update {
            key: keys::visit(visit_id),
            set: set.clone(),
            remove: vec![],
            index: None,
            condition: Condition::All(vec![
                Condition::Exists,
                Condition::FieldEquals("status".into(), json!(VisitStatus::Done)),
            ]),
        },
        WriteOp::Update {
            key: keys::patient_visit(&billing.patient_id, visit_id),
            set,
            remove: vec![],
            index: None,
            condition: Condition::Exists,
        },
    ];
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::StateConflict("billing changed concurrently"))
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        "billing.updated",
        json!({ "visitId": visit_id, "billNumber": billing.bill_number, "total": billing.total }),
    );
    Ok(billing)
}

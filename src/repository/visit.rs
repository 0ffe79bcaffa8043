//! Visit lifecycle: creation of the canonical/projection pair, the
//! strictly ordered status machine, and the queue/day/history queries.

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::config;
use crate::errors::DataError;
use crate::models::{NewVisit, Visit, VisitStatus};
use crate::store::{keys, Condition, Item, KvStore, Query, QueryTarget, StoreError, WriteOp};

use super::{decode_page, parse_cursor, PageOf};

use super::{patient, user};

/// Queue a visit. The canonical item (with its queue and day index
/// projections) and the patient-history projection are created together;
/// the patient must be live and the doctor must exist.
pub fn create_visit(store: &KvStore, new: NewVisit) -> Result<Visit, DataError> {
    patient::get_patient(store, &new.patient_id)?;
    user::get_doctor(store, &new.doctor_id)?;

    let now = config::now_millis();
    let visit = Visit {
        id: Uuid::new_v4(),
        patient_id: new.patient_id,
        doctor_id: new.doctor_id,
        date: new.date,
        kind: new.kind,
        status: VisitStatus::Queued,
        queued_at: now,
        zero_billed: new.zero_billed,
        billing_amount: None,
        bill_number: None,
        checked_out: false,
        checked_out_at: None,
        payment_mode: None,
        created_at: now,
        updated_at: now,
    };

    let index = keys::visit_indexes(
        &visit.doctor_id,
        visit.date,
        visit.status,
        visit.queued_at,
        visit.kind,
        &visit.id,
    );
    let ops = vec![
        WriteOp::Put {
            item: Item::new(keys::visit(&visit.id), keys::entity::VISIT, &visit)?.with_index(index),
            condition: Condition::NotExists,
        },
        WriteOp::Put {
            item: Item::new(
                keys::patient_visit(&visit.patient_id, &visit.id),
                keys::entity::PATIENT_VISIT,
                &visit,
            )?,
            condition: Condition::NotExists,
        },
    ];
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::Duplicate { entity: "visit" })
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        "visit.created",
        json!({ "visitId": visit.id, "patientId": visit.patient_id, "doctorId": visit.doctor_id }),
    );
    Ok(visit)
}

pub fn get_visit(store: &KvStore, id: &Uuid) -> Result<Visit, DataError> {
    store
        .get_item(&keys::visit(id))?
        .ok_or(DataError::NotFound {
            entity_type: "visit",
            id: id.to_string(),
        })?
        .decode()
        .map_err(DataError::from)
}

/// Advance the visit to `requested`. Only the single legal successor is
/// accepted; skips and reversals are invalid transitions. The canonical
/// item (with regrouped queue index) and the history projection move in
/// one transaction, guarded on the status the caller saw.
pub fn advance_visit_status(
    store: &KvStore,
    id: &Uuid,
    requested: VisitStatus,
) -> Result<Visit, DataError> {
    let visit = get_visit(store, id)?;
    if visit.status.next() != Some(requested) {
        return Err(DataError::InvalidTransition {
            from: visit.status.as_str(),
            to: requested.as_str(),
        });
    }

    let now = config::now_millis();
    let set = vec![
        ("status".into(), json!(requested)),
        ("updatedAt".into(), json!(now)),
    ];
    let index = keys::visit_indexes(
        &visit.doctor_id,
        visit.date,
        requested,
        visit.queued_at,
        visit.kind,
        &visit.id,
    );
    let ops = vec![
        WriteOp::Update {
            key: keys::visit(id),
            set: set.clone(),
            remove: vec![],
            index: Some(index),
            condition: Condition::All(vec![
                Condition::Exists,
                Condition::FieldEquals("status".into(), json!(visit.status)),
            ]),
        },
        WriteOp::Update {
            key: keys::patient_visit(&visit.patient_id, &visit.id),
            set,
            remove: vec![],
            index: None,
            condition: Condition::Exists,
        },
    ];
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::StateConflict("visit status changed concurrently"))
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        "visit.status_changed",
        json!({ "visitId": id, "from": visit.status, "to": requested }),
    );
    get_visit(store, id)
}

/// One doctor's queue for a day, grouped by status and ordered by
/// queue-entry time within each group.
pub fn doctor_queue(
    store: &KvStore,
    doctor_id: &Uuid,
    date: NaiveDate,
    limit: usize,
    cursor: Option<&str>,
) -> Result<PageOf<Visit>, DataError> {
    let partition = keys::visit_queue_partition(doctor_id, date);
    let page = store.query(
        Query::new(QueryTarget::Index2, &partition)
            .limit(limit)
            .start(parse_cursor(cursor)),
    )?;
    decode_page(page)
}

/// All visits of a calendar day, any doctor.
pub fn visits_on_day(
    store: &KvStore,
    date: NaiveDate,
    limit: usize,
    cursor: Option<&str>,
) -> Result<PageOf<Visit>, DataError> {
    let partition = keys::day_partition(date);
    let page = store.query(
        Query::new(QueryTarget::Index3, &partition)
            .sk_prefix("VISIT#")
            .limit(limit)
            .start(parse_cursor(cursor)),
    )?;
    decode_page(page)
}

/// A patient's visit history from the projection partition.
pub fn patient_visits(
    store: &KvStore,
    patient_id: &Uuid,
    limit: usize,
    cursor: Option<&str>,
) -> Result<PageOf<Visit>, DataError> {
    let partition = keys::patient(patient_id).pk;
    let page = store.query(
        Query::new(QueryTarget::Primary, &partition)
            .sk_prefix("VISIT#")
            .limit(limit)
            .start(parse_cursor(cursor)),
    )?;
    decode_page(page)
}

//! Follow-ups: at most one per visit, surfaced in the daily listing by
//! due date.

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::config;
use crate::errors::DataError;
use crate::models::FollowUp;
use crate::store::{keys, Condition, Item, KvStore, Query, QueryTarget, StoreError};

use super::{decode_page, parse_cursor, visit, PageOf};

/// Schedule a follow-up for a visit outside the checkout flow.
pub fn create_followup(
    store: &KvStore,
    visit_id: &Uuid,
    date: NaiveDate,
    note: Option<String>,
) -> Result<FollowUp, DataError> {
    create_followup_at(store, visit_id, date, note, config::clinic_today())
}

pub fn create_followup_at(
    store: &KvStore,
    visit_id: &Uuid,
    date: NaiveDate,
    note: Option<String>,
    today: NaiveDate,
) -> Result<FollowUp, DataError> {
    let v = visit::get_visit(store, visit_id)?;
    if date < v.date || date < today {
        return Err(DataError::Validation("follow-up date is in the past".into()));
    }

    let followup = FollowUp {
        id: Uuid::new_v4(),
        visit_id: *visit_id,
        patient_id: v.patient_id,
        date,
        note,
        created_at: config::now_millis(),
    };
    let item = Item::new(keys::followup(visit_id), keys::entity::FOLLOWUP, &followup)?
        .with_index(keys::followup_day_index(date, visit_id));
    match store.put_item(item, Condition::NotExists) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::Duplicate { entity: "follow-up" })
        }
        Err(e) => return Err(e.into()),
    }

    audit::record("followup.created", json!({ "visitId": visit_id, "date": date }));
    Ok(followup)
}

pub fn get_followup(store: &KvStore, visit_id: &Uuid) -> Result<FollowUp, DataError> {
    store
        .get_item(&keys::followup(visit_id))?
        .ok_or(DataError::NotFound {
            entity_type: "follow-up",
            id: visit_id.to_string(),
        })?
        .decode()
        .map_err(DataError::from)
}

/// Follow-ups due on a calendar day, for the reminder worklist.
pub fn followups_on_day(
    store: &KvStore,
    date: NaiveDate,
    limit: usize,
    cursor: Option<&str>,
) -> Result<PageOf<FollowUp>, DataError> {
    let partition = keys::day_partition(date);
    let page = store.query(
        Query::new(QueryTarget::Index3, &partition)
            .sk_prefix("FOLLOWUP#")
            .limit(limit)
            .start(parse_cursor(cursor)),
    )?;
    decode_page(page)
}

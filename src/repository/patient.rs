//! Patient registry: identity-unique creation, sparse updates with the
//! rename protocol, soft deletion, and search.

use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::config::{self, MAX_PAGE_SIZE};
use crate::errors::DataError;
use crate::models::{NewPatient, Patient, PatientPatch};
use crate::store::normalize::{digits_only, normalize_name, normalize_phone, search_text};
use crate::store::{keys, Condition, Item, KvStore, StoreError, WriteOp};

use super::{decode_page, parse_cursor, PageOf};

/// Register a patient. The (normalized phone, normalized name) pair is
/// claimed atomically alongside the profile; a second registration with
/// the same pair loses the race and surfaces as a duplicate.
pub fn create_patient(store: &KvStore, new: NewPatient) -> Result<Patient, DataError> {
    let name_norm = normalize_name(&new.name);
    if name_norm.is_empty() {
        return Err(DataError::Validation("patient name must not be empty".into()));
    }
    let phone_norm = normalize_phone(&new.phone);
    if phone_norm.is_empty() {
        return Err(DataError::Validation("patient phone must contain digits".into()));
    }

    let now = config::now_millis();
    let patient = Patient {
        id: Uuid::new_v4(),
        search_text: search_text(&new.name, &new.phone),
        name: new.name,
        phone: new.phone,
        name_norm: name_norm.clone(),
        phone_norm: phone_norm.clone(),
        gender: new.gender,
        dob: new.dob,
        address: new.address,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let ops = vec![
        WriteOp::Put {
            item: Item::new(keys::patient(&patient.id), keys::entity::PATIENT, &patient)?,
            condition: Condition::NotExists,
        },
        WriteOp::Put {
            item: Item::new(
                keys::patient_phone(&phone_norm, &name_norm),
                keys::entity::PATIENT_PHONE,
                &json!({ "patientId": patient.id }),
            )?,
            condition: Condition::NotExists,
        },
    ];
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::Duplicate { entity: "patient" })
        }
        Err(e) => return Err(e.into()),
    }

    audit::record("patient.created", json!({ "patientId": patient.id }));
    Ok(patient)
}

/// Fetch a patient; soft-deleted records read as not found.
pub fn get_patient(store: &KvStore, id: &Uuid) -> Result<Patient, DataError> {
    let item = store.get_item(&keys::patient(id))?.ok_or(DataError::NotFound {
        entity_type: "patient",
        id: id.to_string(),
    })?;
    let patient: Patient = item.decode()?;
    if patient.is_deleted {
        return Err(DataError::NotFound {
            entity_type: "patient",
            id: id.to_string(),
        });
    }
    Ok(patient)
}

/// Apply a sparse patch. When the patch touches name or phone, the new
/// identity pair is claimed and the old one released in the same
/// transaction as the profile update.
pub fn update_patient(store: &KvStore, id: &Uuid, patch: PatientPatch) -> Result<Patient, DataError> {
    if patch.is_empty() {
        return Err(DataError::Validation("empty patch".into()));
    }
    let current = get_patient(store, id)?;

    let name = patch.name.clone().unwrap_or_else(|| current.name.clone());
    let phone = patch.phone.clone().unwrap_or_else(|| current.phone.clone());
    let name_norm = normalize_name(&name);
    if name_norm.is_empty() {
        return Err(DataError::Validation("patient name must not be empty".into()));
    }
    let phone_norm = normalize_phone(&phone);
    if phone_norm.is_empty() {
        return Err(DataError::Validation("patient phone must contain digits".into()));
    }

    let now = config::now_millis();
    let (set, remove) = compile_patch(&patch, &name, &phone, &name_norm, &phone_norm, now);

    let identity_changed = name_norm != current.name_norm || phone_norm != current.phone_norm;
    let guard = Condition::All(vec![
        Condition::Exists,
        Condition::FieldEquals("isDeleted".into(), json!(false)),
    ]);

    if identity_changed {
        let ops = vec![
            WriteOp::Put {
                item: Item::new(
                    keys::patient_phone(&phone_norm, &name_norm),
                    keys::entity::PATIENT_PHONE,
                    &json!({ "patientId": id }),
                )?,
                condition: Condition::NotExists,
            },
            WriteOp::Update {
                key: keys::patient(id),
                set,
                remove,
                index: None,
                condition: guard,
            },
            WriteOp::Delete {
                key: keys::patient_phone(&current.phone_norm, &current.name_norm),
                condition: Condition::Exists,
            },
        ];
        match store.transact_write(ops) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(DataError::Duplicate { entity: "patient" })
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        match store.update_item(keys::patient(id), set, remove, guard) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(DataError::NotFound {
                    entity_type: "patient",
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }

    audit::record("patient.updated", json!({ "patientId": id }));
    get_patient(store, id)
}

/// Mark the patient deleted and release the identity pair. History items
/// under the partition are left untouched.
pub fn soft_delete_patient(store: &KvStore, id: &Uuid) -> Result<(), DataError> {
    let current = get_patient(store, id)?;
    let now = config::now_millis();
    let ops = vec![
        WriteOp::Update {
            key: keys::patient(id),
            set: vec![
                ("isDeleted".into(), json!(true)),
                ("updatedAt".into(), json!(now)),
            ],
            remove: vec![],
            index: None,
            condition: Condition::FieldEquals("isDeleted".into(), json!(false)),
        },
        WriteOp::Delete {
            key: keys::patient_phone(&current.phone_norm, &current.name_norm),
            condition: Condition::Exists,
        },
    ];
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::NotFound {
                entity_type: "patient",
                id: id.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    }
    audit::record("patient.deleted", json!({ "patientId": id }));
    Ok(())
}

/// Substring search over the patient registry. Digit queries match on
/// the digits-only phone form; everything else matches the normalized
/// name+phone haystack. Linear scan under the hood; the registry of a
/// single clinic stays small enough for that.
pub fn search_patients(store: &KvStore, query: &str, limit: usize) -> Result<Vec<Patient>, DataError> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let digits = digits_only(query);
    let phone_like = !digits.is_empty() && !query.chars().any(|c| c.is_alphabetic());
    let needle = normalize_name(query);
    if !phone_like && needle.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let mut start = None;
    loop {
        let page = store.scan_page("PATIENT#", Some("PROFILE"), MAX_PAGE_SIZE, start.as_ref())?;
        for item in &page.items {
            let patient: Patient = item.decode()?;
            if patient.is_deleted {
                continue;
            }
            let hit = if phone_like {
                patient.phone_norm.contains(&digits)
            } else {
                patient.search_text.contains(&needle)
            };
            if hit {
                out.push(patient);
                if out.len() == limit {
                    return Ok(out);
                }
            }
        }
        match page.last_key {
            Some(k) => start = Some(k),
            None => break,
        }
    }
    Ok(out)
}

/// Paged listing of non-deleted patients in key order. Deleted records
/// are filtered after the page is cut, so a page may come back short
/// while the cursor still advances.
pub fn list_patients(
    store: &KvStore,
    limit: usize,
    cursor: Option<&str>,
) -> Result<PageOf<Patient>, DataError> {
    let start = parse_cursor(cursor);
    let page = store.scan_page("PATIENT#", Some("PROFILE"), limit, start.as_ref())?;
    let mut decoded = decode_page::<Patient>(page)?;
    decoded.items.retain(|p| !p.is_deleted);
    Ok(decoded)
}

pub fn count_patients(store: &KvStore) -> Result<usize, DataError> {
    let mut total = 0;
    let mut start = None;
    loop {
        let page = store.scan_page("PATIENT#", Some("PROFILE"), MAX_PAGE_SIZE, start.as_ref())?;
        for item in &page.items {
            let patient: Patient = item.decode()?;
            if !patient.is_deleted {
                total += 1;
            }
        }
        match page.last_key {
            Some(k) => start = Some(k),
            None => break,
        }
    }
    Ok(total)
}

fn compile_patch(
    patch: &PatientPatch,
    name: &str,
    phone: &str,
    name_norm: &str,
    phone_norm: &str,
    now: i64,
) -> (Vec<(String, serde_json::Value)>, Vec<String>) {
    let mut set = vec![
        ("name".into(), json!(name)),
        ("phone".into(), json!(phone)),
        ("nameNorm".into(), json!(name_norm)),
        ("phoneNorm".into(), json!(phone_norm)),
        ("searchText".into(), json!(search_text(name, phone))),
        ("updatedAt".into(), json!(now)),
    ];
    let mut remove = Vec::new();
    if let Some(gender) = &patch.gender {
        set.push(("gender".into(), json!(gender)));
    }
    if patch.clear_dob {
        remove.push("dob".into());
    } else if let Some(dob) = &patch.dob {
        set.push(("dob".into(), json!(dob)));
    }
    if patch.clear_address {
        remove.push("address".into());
    } else if let Some(address) = &patch.address {
        set.push(("address".into(), json!(address)));
    }
    (set, remove)
}

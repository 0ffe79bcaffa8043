//! Medicine and prescription presets: kind-scoped name uniqueness,
//! ownership rules for inline presets, and typeahead search.

use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::config::{self, MAX_PAGE_SIZE};
use crate::errors::DataError;
use crate::models::{NewPreset, Preset, PresetKind, PresetPatch, UserRole};
use crate::store::normalize::normalize_preset_name;
use crate::store::{keys, Condition, Item, KvStore, Query, QueryTarget, StoreError, WriteOp};

use super::{decode_page, parse_cursor, PageOf};

pub fn create_preset(store: &KvStore, new: NewPreset) -> Result<Preset, DataError> {
    let name_norm = normalize_preset_name(&new.name);
    if name_norm.is_empty() {
        return Err(DataError::Validation("preset name must not be empty".into()));
    }

    let now = config::now_millis();
    let preset = Preset {
        id: Uuid::new_v4(),
        kind: new.kind,
        name: new.name,
        name_norm: name_norm.clone(),
        details: new.details,
        created_by: new.created_by,
        inline: new.inline,
        created_at: now,
        updated_at: now,
    };

    let ops = vec![
        WriteOp::Put {
            item: Item::new(keys::preset(preset.kind, &preset.id), keys::entity::PRESET, &preset)?
                .with_index(keys::preset_search_index(preset.kind, &name_norm)),
            condition: Condition::NotExists,
        },
        WriteOp::Put {
            item: Item::new(
                keys::preset_name(preset.kind, &name_norm),
                keys::entity::PRESET_NAME,
                &json!({ "presetId": preset.id }),
            )?,
            condition: Condition::NotExists,
        },
    ];
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::Duplicate { entity: "preset name" })
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        "preset.created",
        json!({ "presetId": preset.id, "kind": preset.kind, "inline": preset.inline }),
    );
    Ok(preset)
}

pub fn get_preset(store: &KvStore, kind: PresetKind, id: &Uuid) -> Result<Preset, DataError> {
    store
        .get_item(&keys::preset(kind, id))?
        .ok_or(DataError::NotFound {
            entity_type: "preset",
            id: id.to_string(),
        })?
        .decode()
        .map_err(DataError::from)
}

/// Inline presets belong to their creator until an admin says otherwise.
fn check_ownership(preset: &Preset, actor_id: &Uuid, actor_role: UserRole) -> Result<(), DataError> {
    if preset.inline && preset.created_by != *actor_id && actor_role != UserRole::Admin {
        return Err(DataError::Forbidden("inline presets are editable only by their creator"));
    }
    Ok(())
}

/// Patch a preset. A name change runs the rename protocol against the
/// kind-scoped name registry and refreshes the typeahead index key.
pub fn update_preset(
    store: &KvStore,
    kind: PresetKind,
    id: &Uuid,
    patch: PresetPatch,
    actor_id: &Uuid,
    actor_role: UserRole,
) -> Result<Preset, DataError> {
    let preset = get_preset(store, kind, id)?;
    check_ownership(&preset, actor_id, actor_role)?;

    let name = patch.name.clone().unwrap_or_else(|| preset.name.clone());
    let name_norm = normalize_preset_name(&name);
    if name_norm.is_empty() {
        return Err(DataError::Validation("preset name must not be empty".into()));
    }

    let now = config::now_millis();
    let mut set = vec![
        ("name".into(), json!(name)),
        ("nameNorm".into(), json!(name_norm)),
        ("updatedAt".into(), json!(now)),
    ];
    let mut remove = Vec::new();
    if patch.clear_details {
        remove.push("details".into());
    } else if let Some(details) = &patch.details {
        set.push(("details".into(), json!(details)));
    }

    if name_norm != preset.name_norm {
        let ops = vec![
            WriteOp::Put {
                item: Item::new(
                    keys::preset_name(kind, &name_norm),
                    keys::entity::PRESET_NAME,
                    &json!({ "presetId": id }),
                )?,
                condition: Condition::NotExists,
            },
            WriteOp::Update {
                key: keys::preset(kind, id),
                set,
                remove,
                index: Some(keys::preset_search_index(kind, &name_norm)),
                condition: Condition::Exists,
            },
            WriteOp::Delete {
                key: keys::preset_name(kind, &preset.name_norm),
                condition: Condition::Exists,
            },
        ];
        match store.transact_write(ops) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(DataError::Duplicate { entity: "preset name" })
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        match store.update_item(keys::preset(kind, id), set, remove, Condition::Exists) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(DataError::NotFound {
                    entity_type: "preset",
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }

    audit::record("preset.updated", json!({ "presetId": id, "kind": kind }));
    get_preset(store, kind, id)
}

/// Delete a preset and release its name in one transaction.
pub fn delete_preset(
    store: &KvStore,
    kind: PresetKind,
    id: &Uuid,
    actor_id: &Uuid,
    actor_role: UserRole,
) -> Result<(), DataError> {
    let preset = get_preset(store, kind, id)?;
    check_ownership(&preset, actor_id, actor_role)?;

    let ops = vec![
        WriteOp::Delete {
            key: keys::preset(kind, id),
            condition: Condition::Exists,
        },
        WriteOp::Delete {
            key: keys::preset_name(kind, &preset.name_norm),
            condition: Condition::Exists,
        },
    ];
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::NotFound {
                entity_type: "preset",
                id: id.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    }
    audit::record("preset.deleted", json!({ "presetId": id, "kind": kind }));
    Ok(())
}

/// Typeahead: prefix match on the normalized name through the search
/// index; an empty query lists the kind alphabetically.
pub fn search_presets(
    store: &KvStore,
    kind: PresetKind,
    query: &str,
    limit: usize,
    cursor: Option<&str>,
) -> Result<PageOf<Preset>, DataError> {
    let needle = normalize_preset_name(query);
    let mut q = Query::new(QueryTarget::Index1, kind.as_str())
        .limit(limit)
        .start(parse_cursor(cursor));
    if !needle.is_empty() {
        q = q.sk_prefix(&needle);
    }
    let page = store.query(q)?;
    decode_page(page)
}

pub fn count_presets(store: &KvStore, kind: PresetKind) -> Result<usize, DataError> {
    let mut total = 0;
    let mut start = None;
    loop {
        let page = store.query(
            Query::new(QueryTarget::Index1, kind.as_str())
                .limit(MAX_PAGE_SIZE)
                .start(start),
        )?;
        total += page.items.len();
        match page.last_key {
            Some(k) => start = Some(k),
            None => break,
        }
    }
    Ok(total)
}

//! Staff accounts: email-unique creation, login lockout backpressure,
//! and the doctor profile written alongside doctor accounts.

use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::config::{self, LOCKOUT_THRESHOLD, LOCKOUT_WINDOW_MS};
use crate::errors::DataError;
use crate::models::{Doctor, NewUser, User, UserRole};
use crate::store::normalize::normalize_email;
use crate::store::{keys, Condition, Item, KvStore, StoreError, WriteOp};

/// Create a staff account, claiming the normalized email atomically. A
/// doctor account additionally gets its doctor profile in the same
/// transaction, so a doctor can never exist half-registered.
pub fn create_user(store: &KvStore, new: NewUser) -> Result<User, DataError> {
    let email_norm = normalize_email(&new.email);
    if email_norm.is_empty() || !email_norm.contains('@') {
        return Err(DataError::Validation("invalid email".into()));
    }
    if new.name.trim().is_empty() {
        return Err(DataError::Validation("user name must not be empty".into()));
    }

    let now = config::now_millis();
    let user = User {
        id: Uuid::new_v4(),
        email: new.email,
        email_norm: email_norm.clone(),
        name: new.name,
        role: new.role,
        password_hash: new.password_hash,
        failed_attempts: 0,
        lock_until: None,
        created_at: now,
        updated_at: now,
    };

    let mut ops = vec![
        WriteOp::Put {
            item: Item::new(keys::user(&user.id), keys::entity::USER, &user)?,
            condition: Condition::NotExists,
        },
        WriteOp::Put {
            item: Item::new(
                keys::user_email(&email_norm),
                keys::entity::USER_EMAIL,
                &json!({ "userId": user.id }),
            )?,
            condition: Condition::NotExists,
        },
    ];
    if user.role == UserRole::Doctor {
        let doctor = Doctor {
            id: user.id,
            name: user.name.clone(),
            specialty: None,
            created_at: now,
            updated_at: now,
        };
        ops.push(WriteOp::Put {
            item: Item::new(keys::doctor(&user.id), keys::entity::DOCTOR, &doctor)?,
            condition: Condition::NotExists,
        });
    }
    match store.transact_write(ops) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::Duplicate { entity: "user email" })
        }
        Err(e) => return Err(e.into()),
    }

    audit::record("user.created", json!({ "userId": user.id, "role": user.role }));
    Ok(user)
}

pub fn get_user(store: &KvStore, id: &Uuid) -> Result<User, DataError> {
    store
        .get_item(&keys::user(id))?
        .ok_or(DataError::NotFound {
            entity_type: "user",
            id: id.to_string(),
        })?
        .decode()
        .map_err(DataError::from)
}

/// Login-path lookup through the email index item.
pub fn get_user_by_email(store: &KvStore, email: &str) -> Result<User, DataError> {
    let email_norm = normalize_email(email);
    let pointer = store
        .get_item(&keys::user_email(&email_norm))?
        .ok_or(DataError::NotFound {
            entity_type: "user",
            id: email_norm.clone(),
        })?;
    let user_id = pointer
        .body
        .get("userId")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| StoreError::Corrupt(format!("email index for {email_norm} has no userId")))?;
    get_user(store, &user_id)
}

pub fn get_doctor(store: &KvStore, id: &Uuid) -> Result<Doctor, DataError> {
    store
        .get_item(&keys::doctor(id))?
        .ok_or(DataError::NotFound {
            entity_type: "doctor",
            id: id.to_string(),
        })?
        .decode()
        .map_err(DataError::from)
}

/// Change an account's email through the rename protocol: claim the new
/// index item, rewrite the account, release the old one, atomically.
pub fn update_user_email(store: &KvStore, id: &Uuid, new_email: &str) -> Result<User, DataError> {
    let user = get_user(store, id)?;
    let new_norm = normalize_email(new_email);
    if new_norm.is_empty() || !new_norm.contains('@') {
        return Err(DataError::Validation("invalid email".into()));
    }
    let now = config::now_millis();
    let set = vec![
        ("email".into(), json!(new_email)),
        ("emailNorm".into(), json!(new_norm)),
        ("updatedAt".into(), json!(now)),
    ];

    if new_norm == user.email_norm {
        match store.update_item(keys::user(id), set, vec![], Condition::Exists) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(DataError::NotFound {
                    entity_type: "user",
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        let ops = vec![
            WriteOp::Put {
                item: Item::new(
                    keys::user_email(&new_norm),
                    keys::entity::USER_EMAIL,
                    &json!({ "userId": id }),
                )?,
                condition: Condition::NotExists,
            },
            WriteOp::Update {
                key: keys::user(id),
                set,
                remove: vec![],
                index: None,
                condition: Condition::Exists,
            },
            WriteOp::Delete {
                key: keys::user_email(&user.email_norm),
                condition: Condition::Exists,
            },
        ];
        match store.transact_write(ops) {
            Ok(()) => {}
            Err(StoreError::ConditionFailed) => {
                return Err(DataError::Duplicate { entity: "user email" })
            }
            Err(e) => return Err(e.into()),
        }
    }
    audit::record("user.email_changed", json!({ "userId": id }));
    get_user(store, id)
}

/// True while a lockout window is active.
pub fn is_locked(user: &User, now: i64) -> bool {
    user.lock_until.is_some_and(|until| until > now)
}

/// Record a failed login attempt. Crossing the threshold resets the
/// counter and stamps a lock window; the write is conditioned on the
/// counter value read, so two racing failures cannot both claim the same
/// increment. Returns the lock expiry when the account just locked.
pub fn record_failed_login(store: &KvStore, id: &Uuid, now: i64) -> Result<Option<i64>, DataError> {
    let user = get_user(store, id)?;
    let guard = Condition::FieldEquals("failedAttempts".into(), json!(user.failed_attempts));
    let attempts = user.failed_attempts + 1;

    let (set, locked_until) = if attempts >= LOCKOUT_THRESHOLD {
        let until = now + LOCKOUT_WINDOW_MS;
        (
            vec![
                ("failedAttempts".into(), json!(0)),
                ("lockUntil".into(), json!(until)),
                ("updatedAt".into(), json!(now)),
            ],
            Some(until),
        )
    } else {
        (
            vec![
                ("failedAttempts".into(), json!(attempts)),
                ("updatedAt".into(), json!(now)),
            ],
            None,
        )
    };
    match store.update_item(keys::user(id), set, vec![], guard) {
        Ok(()) => {}
        Err(StoreError::ConditionFailed) => {
            return Err(DataError::StateConflict("login counter changed"))
        }
        Err(e) => return Err(e.into()),
    }
    if let Some(until) = locked_until {
        audit::record("user.locked", json!({ "userId": id, "lockUntil": until }));
    }
    Ok(locked_until)
}

/// Successful login (or expired lock): zero the counter, drop the lock.
pub fn clear_login_lockout(store: &KvStore, id: &Uuid) -> Result<(), DataError> {
    let now = config::now_millis();
    match store.update_item(
        keys::user(id),
        vec![
            ("failedAttempts".into(), json!(0)),
            ("updatedAt".into(), json!(now)),
        ],
        vec!["lockUntil".into()],
        Condition::Exists,
    ) {
        Ok(()) => Ok(()),
        Err(StoreError::ConditionFailed) => Err(DataError::NotFound {
            entity_type: "user",
            id: id.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

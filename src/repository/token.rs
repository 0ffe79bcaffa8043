//! Refresh tokens: single-use rotation records under conditional
//! consumption, plus housekeeping for expired rows.

use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::config::{self, MAX_PAGE_SIZE, REFRESH_TOKEN_TTL_MS};
use crate::errors::DataError;
use crate::models::RefreshToken;
use crate::store::{keys, Condition, Item, KvStore, Query, QueryTarget, StoreError};

/// Mint a refresh token for a user. The caller stores only the jti in
/// the signed token it hands out; the record here is the source of truth
/// for validity.
pub fn issue_refresh_token(store: &KvStore, user_id: &Uuid) -> Result<RefreshToken, DataError> {
    let now = config::now_millis();
    let token = RefreshToken {
        user_id: *user_id,
        jti: Uuid::new_v4(),
        valid: true,
        expires_at: now + REFRESH_TOKEN_TTL_MS,
        revoked_at: None,
        created_at: now,
    };
    let item = Item::new(
        keys::refresh_token(user_id, &token.jti),
        keys::entity::REFRESH_TOKEN,
        &token,
    )?;
    match store.put_item(item, Condition::NotExists) {
        Ok(()) => Ok(token),
        Err(StoreError::ConditionFailed) => Err(DataError::Duplicate { entity: "refresh token" }),
        Err(e) => Err(e.into()),
    }
}

/// Consume a token during rotation. Expiry is checked first; the flip of
/// `valid` is conditioned on it still being true, so of two racing
/// refreshes exactly one succeeds and the replay is rejected.
pub fn consume_refresh_token(store: &KvStore, user_id: &Uuid, jti: &Uuid) -> Result<(), DataError> {
    consume_refresh_token_at(store, user_id, jti, config::now_millis())
}

pub fn consume_refresh_token_at(
    store: &KvStore,
    user_id: &Uuid,
    jti: &Uuid,
    now: i64,
) -> Result<(), DataError> {
    let key = keys::refresh_token(user_id, jti);
    let token: RefreshToken = store
        .get_item(&key)?
        .ok_or(DataError::NotFound {
            entity_type: "refresh token",
            id: jti.to_string(),
        })?
        .decode()?;
    if now >= token.expires_at {
        return Err(DataError::TokenRejected);
    }
    match store.update_item(
        key,
        vec![
            ("valid".into(), json!(false)),
            ("revokedAt".into(), json!(now)),
        ],
        vec![],
        Condition::FieldEquals("valid".into(), json!(true)),
    ) {
        Ok(()) => Ok(()),
        Err(StoreError::ConditionFailed) => {
            audit::record("token.replayed", json!({ "userId": user_id, "jti": jti }));
            Err(DataError::TokenRejected)
        }
        Err(e) => Err(e.into()),
    }
}

/// Revoke every token of a user (logout-everywhere, password change).
pub fn revoke_all_tokens(store: &KvStore, user_id: &Uuid) -> Result<usize, DataError> {
    let now = config::now_millis();
    let partition = keys::refresh_token_partition(user_id);
    let mut revoked = 0;
    let mut start = None;
    loop {
        let page = store.query(
            Query::new(QueryTarget::Primary, &partition)
                .sk_prefix("RT#")
                .limit(MAX_PAGE_SIZE)
                .start(start),
        )?;
        for item in &page.items {
            let token: RefreshToken = item.decode()?;
            if !token.valid {
                continue;
            }
            match store.update_item(
                keys::refresh_token(user_id, &token.jti),
                vec![
                    ("valid".into(), json!(false)),
                    ("revokedAt".into(), json!(now)),
                ],
                vec![],
                Condition::FieldEquals("valid".into(), json!(true)),
            ) {
                Ok(()) => revoked += 1,
                // Lost to a concurrent consume; already invalid.
                Err(StoreError::ConditionFailed) => {}
                Err(e) => return Err(e.into()),
            }
        }
        match page.last_key {
            Some(k) => start = Some(k),
            None => break,
        }
    }
    audit::record("token.revoked_all", json!({ "userId": user_id, "count": revoked }));
    Ok(revoked)
}

/// Delete token records past expiry. Run opportunistically; the expiry
/// check in `consume_refresh_token` is the actual security boundary.
pub fn purge_expired_tokens(store: &KvStore, user_id: &Uuid, now: i64) -> Result<usize, DataError> {
    let partition = keys::refresh_token_partition(user_id);
    let mut purged = 0;
    let mut start = None;
    loop {
        let page = store.query(
            Query::new(QueryTarget::Primary, &partition)
                .sk_prefix("RT#")
                .limit(MAX_PAGE_SIZE)
                .start(start),
        )?;
        let last_key = page.last_key;
        for item in &page.items {
            let token: RefreshToken = item.decode()?;
            if now >= token.expires_at {
                store.delete_item(keys::refresh_token(user_id, &token.jti), Condition::None)?;
                purged += 1;
            }
        }
        match last_key {
            Some(k) => start = Some(k),
            None => break,
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KvStore {
        KvStore::open_in_memory().unwrap()
    }

    #[test]
    fn consume_is_single_use() {
        let store = store();
        let user_id = Uuid::new_v4();
        let token = issue_refresh_token(&store, &user_id).unwrap();

        consume_refresh_token(&store, &user_id, &token.jti).unwrap();
        let err = consume_refresh_token(&store, &user_id, &token.jti).unwrap_err();
        assert!(matches!(err, DataError::TokenRejected));
    }

    #[test]
    fn racing_consumption_admits_exactly_one_writer() {
        let store = store();
        let user_id = Uuid::new_v4();
        let token = issue_refresh_token(&store, &user_id).unwrap();

        // Both racers have already read the token as valid; each now
        // attempts the conditional flip the consume path performs.
        let attempt = || {
            store.update_item(
                keys::refresh_token(&user_id, &token.jti),
                vec![
                    ("valid".into(), json!(false)),
                    ("revokedAt".into(), json!(token.created_at + 1)),
                ],
                vec![],
                Condition::FieldEquals("valid".into(), json!(true)),
            )
        };
        attempt().unwrap();
        let err = attempt().unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));

        // Through the repository the losing racer sees a rejection, not
        // a second success.
        let err = consume_refresh_token_at(&store, &user_id, &token.jti, token.created_at + 1)
            .unwrap_err();
        assert!(matches!(err, DataError::TokenRejected));
    }

    #[test]
    fn unknown_token_is_not_found() {
        let store = store();
        let err = consume_refresh_token(&store, &Uuid::new_v4(), &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DataError::NotFound { entity_type: "refresh token", .. }));
    }

    #[test]
    fn expired_token_is_rejected_even_if_valid() {
        let store = store();
        let user_id = Uuid::new_v4();
        let token = issue_refresh_token(&store, &user_id).unwrap();
        let err =
            consume_refresh_token_at(&store, &user_id, &token.jti, token.expires_at).unwrap_err();
        assert!(matches!(err, DataError::TokenRejected));
    }

    #[test]
    fn revoke_all_invalidates_outstanding_tokens() {
        let store = store();
        let user_id = Uuid::new_v4();
        let t1 = issue_refresh_token(&store, &user_id).unwrap();
        let t2 = issue_refresh_token(&store, &user_id).unwrap();
        consume_refresh_token(&store, &user_id, &t1.jti).unwrap();

        assert_eq!(revoke_all_tokens(&store, &user_id).unwrap(), 1);
        let err = consume_refresh_token(&store, &user_id, &t2.jti).unwrap_err();
        assert!(matches!(err, DataError::TokenRejected));
    }

    #[test]
    fn purge_removes_only_expired_records() {
        let store = store();
        let user_id = Uuid::new_v4();
        let t1 = issue_refresh_token(&store, &user_id).unwrap();
        let _t2 = issue_refresh_token(&store, &user_id).unwrap();

        // At t1's expiry both are expired (issued in the same instant or
        // later); just past issuance nothing is.
        assert_eq!(purge_expired_tokens(&store, &user_id, t1.created_at + 1).unwrap(), 0);
        let purged = purge_expired_tokens(&store, &user_id, t1.expires_at + REFRESH_TOKEN_TTL_MS).unwrap();
        assert_eq!(purged, 2);
        assert!(matches!(
            consume_refresh_token(&store, &user_id, &t1.jti),
            Err(DataError::NotFound { .. })
        ));
    }
}

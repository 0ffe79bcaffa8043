//! Single-table key-value store over SQLite.
//!
//! The table hosts every entity as an item: composite (pk, sk) primary
//! key, an entity_type discriminator, a JSON attribute body, and up to
//! three pairs of denormalized secondary-index key columns. The store
//! exposes the only concurrency-control primitives the rest of the crate
//! is allowed to use: conditional single-item writes, bounded multi-item
//! all-or-nothing transactions, atomic counter increments, and ordered
//! prefix queries with continuation keys.

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::cursor::LastKey;
use super::keys::{IndexKeys, Key};
use super::StoreError;

const ITEM_COLS: &str = "pk, sk, entity_type, body, i1pk, i1sk, i2pk, i2sk, i3pk, i3sk";

/// One stored item: primary key, discriminator, JSON body, index keys.
#[derive(Debug, Clone)]
pub struct Item {
    pub pk: String,
    pub sk: String,
    pub entity_type: String,
    pub body: Map<String, Value>,
    pub index: IndexKeys,
}

impl Item {
    /// Build an item from a typed entity. The entity must serialize to a
    /// JSON object.
    pub fn new<T: Serialize>(key: Key, entity_type: &str, entity: &T) -> Result<Self, StoreError> {
        match serde_json::to_value(entity)? {
            Value::Object(body) => Ok(Self {
                pk: key.pk,
                sk: key.sk,
                entity_type: entity_type.to_string(),
                body,
                index: IndexKeys::default(),
            }),
            other => Err(StoreError::Corrupt(format!(
                "entity body must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn with_index(mut self, index: IndexKeys) -> Self {
        self.index = index;
        self
    }

    /// Decode the body back into a typed entity.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.body.clone()))?)
    }
}

/// Precondition attached to a write. Evaluated against the item's current
/// stored state inside the same transaction as the write itself.
#[derive(Debug, Clone)]
pub enum Condition {
    None,
    /// The item must not exist (uniqueness guards, create-once items).
    NotExists,
    /// The item must exist.
    Exists,
    /// The item must exist and the named body field must equal the value
    /// (optimistic state guards).
    FieldEquals(String, Value),
    /// The item must exist and the named body field must be missing or
    /// null (idempotency backstops).
    FieldAbsent(String),
    /// Every sub-condition must hold.
    All(Vec<Condition>),
}

impl Condition {
    fn holds(&self, current: Option<&Item>) -> bool {
        match self {
            Condition::None => true,
            Condition::NotExists => current.is_none(),
            Condition::Exists => current.is_some(),
            Condition::FieldEquals(field, value) => {
                current.is_some_and(|item| item.body.get(field) == Some(value))
            }
            Condition::FieldAbsent(field) => current.is_some_and(|item| {
                matches!(item.body.get(field), None | Some(Value::Null))
            }),
            Condition::All(conds) => conds.iter().all(|c| c.holds(current)),
        }
    }
}

/// One write inside a transaction set.
#[derive(Debug)]
pub enum WriteOp {
    /// Full item write (replace semantics).
    Put { item: Item, condition: Condition },
    /// Partial update of an existing item's body: set the given fields,
    /// remove the named fields, optionally rewrite all index key columns.
    /// Fails the condition check if the item does not exist.
    Update {
        key: Key,
        set: Vec<(String, Value)>,
        remove: Vec<String>,
        index: Option<IndexKeys>,
        condition: Condition,
    },
    Delete { key: Key, condition: Condition },
}

/// Which key ordering a query runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    Primary,
    Index1,
    Index2,
    Index3,
}

impl QueryTarget {
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            QueryTarget::Primary => ("pk", "sk"),
            QueryTarget::Index1 => ("i1pk", "i1sk"),
            QueryTarget::Index2 => ("i2pk", "i2sk"),
            QueryTarget::Index3 => ("i3pk", "i3sk"),
        }
    }

    fn index_sk(self, item: &Item) -> Option<String> {
        match self {
            QueryTarget::Primary => None,
            QueryTarget::Index1 => item.index.i1sk.clone(),
            QueryTarget::Index2 => item.index.i2sk.clone(),
            QueryTarget::Index3 => item.index.i3sk.clone(),
        }
    }
}

/// An ordered partition query with optional sort-key prefix and
/// continuation key.
#[derive(Debug)]
pub struct Query<'a> {
    pub target: QueryTarget,
    pub pk: &'a str,
    pub sk_prefix: Option<&'a str>,
    pub limit: usize,
    pub start: Option<LastKey>,
    pub forward: bool,
}

impl<'a> Query<'a> {
    pub fn new(target: QueryTarget, pk: &'a str) -> Self {
        Self {
            target,
            pk,
            sk_prefix: None,
            limit: crate::config::DEFAULT_PAGE_SIZE,
            start: None,
            forward: true,
        }
    }

    pub fn sk_prefix(mut self, prefix: &'a str) -> Self {
        self.sk_prefix = Some(prefix);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, crate::config::MAX_PAGE_SIZE);
        self
    }

    pub fn start(mut self, start: Option<LastKey>) -> Self {
        self.start = start;
        self
    }

    pub fn backward(mut self) -> Self {
        self.forward = false;
        self
    }
}

/// One page of query results. `last_key` is present when more results may
/// exist; feed it back as the next query's start key.
#[derive(Debug)]
pub struct Page {
    pub items: Vec<Item>,
    pub last_key: Option<LastKey>,
}

/// Handle on the single-table store. Constructed once at process start
/// and shared by injection; all mutation goes through conditional writes.
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    /// Open (or create) the store at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Point lookup by primary key.
    pub fn get_item(&self, key: &Key) -> Result<Option<Item>, StoreError> {
        get_item_on(&self.conn, &key.pk, &key.sk)
    }

    /// Single conditional put.
    pub fn put_item(&self, item: Item, condition: Condition) -> Result<(), StoreError> {
        self.transact_write(vec![WriteOp::Put { item, condition }])
    }

    /// Single conditional partial update.
    pub fn update_item(
        &self,
        key: Key,
        set: Vec<(String, Value)>,
        remove: Vec<String>,
        condition: Condition,
    ) -> Result<(), StoreError> {
        self.transact_write(vec![WriteOp::Update {
            key,
            set,
            remove,
            index: None,
            condition,
        }])
    }

    /// Single conditional delete.
    pub fn delete_item(&self, key: Key, condition: Condition) -> Result<(), StoreError> {
        self.transact_write(vec![WriteOp::Delete { key, condition }])
    }

    /// Multi-item all-or-nothing write. Every op's condition is evaluated
    /// against current stored state inside one transaction; any failure
    /// rolls the whole set back and surfaces `ConditionFailed` with no
    /// partial effect.
    pub fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        for op in &ops {
            apply_op(&tx, op)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Atomic increment-and-read of a counter item (ADD semantics). Safe
    /// under concurrent callers: the read-modify-write runs in one
    /// transaction, so a value is never handed out twice.
    pub fn increment_counter(&self, key: &Key) -> Result<i64, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let current = get_item_on(&tx, &key.pk, &key.sk)?;
        let next = current
            .as_ref()
            .and_then(|item| item.body.get("value"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
            + 1;
        tx.execute(
            "INSERT INTO items (pk, sk, entity_type, body)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (pk, sk) DO UPDATE SET body = excluded.body",
            params![
                key.pk,
                key.sk,
                super::keys::entity::COUNTER,
                serde_json::json!({ "value": next }).to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(next)
    }

    /// Ordered partition query over the primary key or a secondary index.
    /// Returns up to `limit` items plus a continuation key when more may
    /// exist.
    pub fn query(&self, q: Query<'_>) -> Result<Page, StoreError> {
        let (pk_col, sk_col) = q.target.columns();
        let (cmp, dir) = if q.forward { (">", "ASC") } else { ("<", "DESC") };

        let mut sql = format!("SELECT {ITEM_COLS} FROM items WHERE {pk_col} = ?");
        let mut args: Vec<String> = vec![q.pk.to_string()];

        if let Some(prefix) = q.sk_prefix {
            sql.push_str(&format!(" AND {sk_col} LIKE ? ESCAPE '\\'"));
            args.push(like_prefix(prefix));
        }
        if let Some(start) = &q.start {
            match q.target {
                QueryTarget::Primary => {
                    sql.push_str(&format!(" AND sk {cmp} ?"));
                    args.push(start.sk.clone());
                }
                _ => {
                    // Index sort values are not unique; the primary key
                    // breaks ties so a continuation never skips or
                    // repeats an item.
                    sql.push_str(&format!(" AND ({sk_col}, pk, sk) {cmp} (?, ?, ?)"));
                    args.push(start.isk.clone().unwrap_or_default());
                    args.push(start.pk.clone());
                    args.push(start.sk.clone());
                }
            }
        }
        match q.target {
            QueryTarget::Primary => sql.push_str(&format!(" ORDER BY sk {dir}")),
            _ => sql.push_str(&format!(" ORDER BY {sk_col} {dir}, pk {dir}, sk {dir}")),
        }
        let fetch = q.limit + 1;
        sql.push_str(&format!(" LIMIT {fetch}"));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_item)?;
        let mut items: Vec<Item> = rows.collect::<Result<_, _>>()?;

        let last_key = if items.len() > q.limit {
            items.truncate(q.limit);
            items.last().map(|item| LastKey {
                pk: item.pk.clone(),
                sk: item.sk.clone(),
                isk: q.target.index_sk(item),
            })
        } else {
            None
        };
        Ok(Page { items, last_key })
    }

    /// Paged scan over a partition-key prefix, ordered by (pk, sk). The
    /// linear-scan fallback behind substring search and admin listings —
    /// bounded datasets only.
    pub fn scan_page(
        &self,
        pk_prefix: &str,
        sk: Option<&str>,
        limit: usize,
        start: Option<&LastKey>,
    ) -> Result<Page, StoreError> {
        let mut sql = format!("SELECT {ITEM_COLS} FROM items WHERE pk LIKE ? ESCAPE '\\'");
        let mut args: Vec<String> = vec![like_prefix(pk_prefix)];
        if let Some(sk) = sk {
            sql.push_str(" AND sk = ?");
            args.push(sk.to_string());
        }
        if let Some(start) = start {
            sql.push_str(" AND (pk, sk) > (?, ?)");
            args.push(start.pk.clone());
            args.push(start.sk.clone());
        }
        let limit = limit.clamp(1, crate::config::MAX_PAGE_SIZE);
        let fetch = limit + 1;
        sql.push_str(&format!(" ORDER BY pk, sk LIMIT {fetch}"));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_item)?;
        let mut items: Vec<Item> = rows.collect::<Result<_, _>>()?;

        let last_key = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|item| LastKey {
                pk: item.pk.clone(),
                sk: item.sk.clone(),
                isk: None,
            })
        } else {
            None
        };
        Ok(Page { items, last_key })
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(())
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![
        (1, include_str!("../../resources/migrations/001_items.sql")),
    ];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running store migration v{version}");
            conn.execute_batch(sql).map_err(|e| StoreError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }
    Ok(())
}

fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

fn get_item_on(conn: &Connection, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
    let item = conn
        .query_row(
            &format!("SELECT {ITEM_COLS} FROM items WHERE pk = ?1 AND sk = ?2"),
            params![pk, sk],
            row_to_item,
        )
        .optional()?;
    Ok(item)
}

fn apply_op(conn: &Connection, op: &WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Put { item, condition } => {
            let current = get_item_on(conn, &item.pk, &item.sk)?;
            if !condition.holds(current.as_ref()) {
                return Err(StoreError::ConditionFailed);
            }
            conn.execute(
                "INSERT INTO items (pk, sk, entity_type, body, i1pk, i1sk, i2pk, i2sk, i3pk, i3sk)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (pk, sk) DO UPDATE SET
                     entity_type = excluded.entity_type,
                     body = excluded.body,
                     i1pk = excluded.i1pk, i1sk = excluded.i1sk,
                     i2pk = excluded.i2pk, i2sk = excluded.i2sk,
                     i3pk = excluded.i3pk, i3sk = excluded.i3sk",
                params![
                    item.pk,
                    item.sk,
                    item.entity_type,
                    Value::Object(item.body.clone()).to_string(),
                    item.index.i1pk,
                    item.index.i1sk,
                    item.index.i2pk,
                    item.index.i2sk,
                    item.index.i3pk,
                    item.index.i3sk,
                ],
            )?;
            Ok(())
        }
        WriteOp::Update {
            key,
            set,
            remove,
            index,
            condition,
        } => {
            let current = get_item_on(conn, &key.pk, &key.sk)?;
            if !condition.holds(current.as_ref()) {
                return Err(StoreError::ConditionFailed);
            }
            // Updates never create items; a missing target is a failed
            // precondition even under Condition::None.
            let Some(mut item) = current else {
                return Err(StoreError::ConditionFailed);
            };
            for (field, value) in set {
                item.body.insert(field.clone(), value.clone());
            }
            for field in remove {
                item.body.remove(field);
            }
            if let Some(index) = index {
                item.index = index.clone();
            }
            conn.execute(
                "UPDATE items SET body = ?3,
                     i1pk = ?4, i1sk = ?5, i2pk = ?6, i2sk = ?7, i3pk = ?8, i3sk = ?9
                 WHERE pk = ?1 AND sk = ?2",
                params![
                    key.pk,
                    key.sk,
                    Value::Object(item.body).to_string(),
                    item.index.i1pk,
                    item.index.i1sk,
                    item.index.i2pk,
                    item.index.i2sk,
                    item.index.i3pk,
                    item.index.i3sk,
                ],
            )?;
            Ok(())
        }
        WriteOp::Delete { key, condition } => {
            let current = get_item_on(conn, &key.pk, &key.sk)?;
            if !condition.holds(current.as_ref()) {
                return Err(StoreError::ConditionFailed);
            }
            conn.execute(
                "DELETE FROM items WHERE pk = ?1 AND sk = ?2",
                params![key.pk, key.sk],
            )?;
            Ok(())
        }
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> Result<Item, rusqlite::Error> {
    let body_text: String = row.get(3)?;
    let body = match serde_json::from_str::<Value>(&body_text) {
        Ok(Value::Object(map)) => map,
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("item body is not a JSON object: {body_text}").into(),
            ))
        }
    };
    Ok(Item {
        pk: row.get(0)?,
        sk: row.get(1)?,
        entity_type: row.get(2)?,
        body,
        index: IndexKeys {
            i1pk: row.get(4)?,
            i1sk: row.get(5)?,
            i2pk: row.get(6)?,
            i2sk: row.get(7)?,
            i3pk: row.get(8)?,
            i3sk: row.get(9)?,
        },
    })
}

/// Escape LIKE metacharacters in a literal prefix and append the
/// wildcard.
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::keys;
    use serde_json::json;
    use uuid::Uuid;

    fn test_store() -> KvStore {
        KvStore::open_in_memory().unwrap()
    }

    fn item(pk: &str, sk: &str, body: Value) -> Item {
        let Value::Object(body) = body else { panic!("body must be an object") };
        Item {
            pk: pk.into(),
            sk: sk.into(),
            entity_type: "TEST".into(),
            body,
            index: IndexKeys::default(),
        }
    }

    fn key(pk: &str, sk: &str) -> Key {
        Key { pk: pk.into(), sk: sk.into() }
    }

    #[test]
    fn open_on_disk_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(&dir.path().join("clinic.db")).unwrap();
        assert!(store.get_item(&key("A#1", "META")).unwrap().is_none());
    }

    #[test]
    fn migrations_are_idempotent() {
        let store = test_store();
        run_migrations(&store.conn).unwrap();
        assert_eq!(get_current_version(&store.conn), 1);
    }

    #[test]
    fn put_then_get_round_trips_body() {
        let store = test_store();
        store
            .put_item(item("A#1", "META", json!({"name": "x", "n": 3})), Condition::None)
            .unwrap();
        let got = store.get_item(&key("A#1", "META")).unwrap().unwrap();
        assert_eq!(got.body.get("name"), Some(&json!("x")));
        assert_eq!(got.body.get("n"), Some(&json!(3)));
    }

    #[test]
    fn conditional_create_rejects_existing() {
        let store = test_store();
        store
            .put_item(item("A#1", "META", json!({"v": 1})), Condition::NotExists)
            .unwrap();
        let err = store
            .put_item(item("A#1", "META", json!({"v": 2})), Condition::NotExists)
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
        // Original untouched
        let got = store.get_item(&key("A#1", "META")).unwrap().unwrap();
        assert_eq!(got.body.get("v"), Some(&json!(1)));
    }

    #[test]
    fn field_equals_guards_update() {
        let store = test_store();
        store
            .put_item(item("A#1", "META", json!({"status": "QUEUED"})), Condition::None)
            .unwrap();
        store
            .update_item(
                key("A#1", "META"),
                vec![("status".into(), json!("IN_PROGRESS"))],
                vec![],
                Condition::FieldEquals("status".into(), json!("QUEUED")),
            )
            .unwrap();
        let err = store
            .update_item(
                key("A#1", "META"),
                vec![("status".into(), json!("DONE"))],
                vec![],
                Condition::FieldEquals("status".into(), json!("QUEUED")),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[test]
    fn field_absent_treats_null_as_absent() {
        let store = test_store();
        store
            .put_item(item("A#1", "META", json!({"amount": null})), Condition::None)
            .unwrap();
        store
            .update_item(
                key("A#1", "META"),
                vec![("amount".into(), json!(450))],
                vec![],
                Condition::FieldAbsent("amount".into()),
            )
            .unwrap();
        let err = store
            .update_item(
                key("A#1", "META"),
                vec![("amount".into(), json!(900))],
                vec![],
                Condition::FieldAbsent("amount".into()),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[test]
    fn update_missing_item_fails_condition() {
        let store = test_store();
        let err = store
            .update_item(key("A#1", "META"), vec![("x".into(), json!(1))], vec![], Condition::None)
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[test]
    fn update_removes_fields() {
        let store = test_store();
        store
            .put_item(item("A#1", "META", json!({"keep": 1, "drop": 2})), Condition::None)
            .unwrap();
        store
            .update_item(key("A#1", "META"), vec![], vec!["drop".into()], Condition::Exists)
            .unwrap();
        let got = store.get_item(&key("A#1", "META")).unwrap().unwrap();
        assert!(got.body.contains_key("keep"));
        assert!(!got.body.contains_key("drop"));
    }

    #[test]
    fn transaction_rolls_back_whole_set_on_condition_failure() {
        let store = test_store();
        store
            .put_item(item("A#2", "META", json!({"v": 1})), Condition::None)
            .unwrap();
        let err = store
            .transact_write(vec![
                WriteOp::Put {
                    item: item("A#1", "META", json!({"v": 1})),
                    condition: Condition::NotExists,
                },
                WriteOp::Put {
                    item: item("A#2", "META", json!({"v": 2})),
                    condition: Condition::NotExists, // fails
                },
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
        // First op rolled back too
        assert!(store.get_item(&key("A#1", "META")).unwrap().is_none());
    }

    #[test]
    fn counter_increments_monotonically() {
        let store = test_store();
        let k = keys::bill_counter(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(store.increment_counter(&k).unwrap(), 1);
        assert_eq!(store.increment_counter(&k).unwrap(), 2);
        assert_eq!(store.increment_counter(&k).unwrap(), 3);
        // Different day, independent counter
        let k2 = keys::bill_counter(chrono::NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(store.increment_counter(&k2).unwrap(), 1);
    }

    #[test]
    fn primary_query_pages_in_sort_order() {
        let store = test_store();
        for n in [3, 1, 2, 5, 4] {
            store
                .put_item(item("P#1", &format!("VISIT#{n:02}"), json!({"n": n})), Condition::None)
                .unwrap();
        }
        let page1 = store
            .query(Query::new(QueryTarget::Primary, "P#1").sk_prefix("VISIT#").limit(2))
            .unwrap();
        assert_eq!(page1.items.len(), 2);
        assert_eq!(page1.items[0].sk, "VISIT#01");
        assert_eq!(page1.items[1].sk, "VISIT#02");
        let last = page1.last_key.expect("more pages");

        let page2 = store
            .query(
                Query::new(QueryTarget::Primary, "P#1")
                    .sk_prefix("VISIT#")
                    .limit(2)
                    .start(Some(last)),
            )
            .unwrap();
        assert_eq!(page2.items[0].sk, "VISIT#03");
        assert_eq!(page2.items[1].sk, "VISIT#04");

        let page3 = store
            .query(
                Query::new(QueryTarget::Primary, "P#1")
                    .sk_prefix("VISIT#")
                    .limit(2)
                    .start(page2.last_key),
            )
            .unwrap();
        assert_eq!(page3.items.len(), 1);
        assert!(page3.last_key.is_none());
    }

    #[test]
    fn index_query_orders_by_index_sort_key() {
        let store = test_store();
        for (id, name) in [("b", "ibuprofen"), ("a", "paracetamol"), ("c", "insulin")] {
            let it = item(&format!("MEDICINE_PRESET#{id}"), "META", json!({"name": name}))
                .with_index(IndexKeys {
                    i1pk: Some("MEDICINE".into()),
                    i1sk: Some(name.to_string()),
                    ..IndexKeys::default()
                });
            store.put_item(it, Condition::None).unwrap();
        }
        let page = store
            .query(Query::new(QueryTarget::Index1, "MEDICINE").limit(10))
            .unwrap();
        let names: Vec<_> = page
            .items
            .iter()
            .map(|i| i.body.get("name").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["ibuprofen", "insulin", "paracetamol"]);
    }

    #[test]
    fn index_query_prefix_filters() {
        let store = test_store();
        for (id, name) in [("a", "paracetamol"), ("b", "paraffin"), ("c", "ibuprofen")] {
            let it = item(&format!("MEDICINE_PRESET#{id}"), "META", json!({"name": name}))
                .with_index(IndexKeys {
                    i1pk: Some("MEDICINE".into()),
                    i1sk: Some(name.to_string()),
                    ..IndexKeys::default()
                });
            store.put_item(it, Condition::None).unwrap();
        }
        let page = store
            .query(Query::new(QueryTarget::Index1, "MEDICINE").sk_prefix("para").limit(10))
            .unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn index_query_continuation_handles_duplicate_sort_values() {
        let store = test_store();
        for id in 0..5 {
            let it = item(&format!("VISIT#{id}"), "META", json!({"id": id})).with_index(IndexKeys {
                i2pk: Some("DOCTOR#d#DATE#2024-03-01".into()),
                i2sk: Some("QUEUED#0000000001000".into()),
                ..IndexKeys::default()
            });
            store.put_item(it, Condition::None).unwrap();
        }
        let mut seen = Vec::new();
        let mut start = None;
        loop {
            let page = store
                .query(
                    Query::new(QueryTarget::Index2, "DOCTOR#d#DATE#2024-03-01")
                        .limit(2)
                        .start(start),
                )
                .unwrap();
            seen.extend(page.items.iter().map(|i| i.pk.clone()));
            match page.last_key {
                Some(k) => start = Some(k),
                None => break,
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5, "continuation must not skip or repeat items");
    }

    #[test]
    fn scan_page_walks_partition_prefix() {
        let store = test_store();
        for n in 0..5 {
            let id = Uuid::from_u128(n);
            store
                .put_item(item(&format!("PATIENT#{id}"), "PROFILE", json!({"n": n})), Condition::None)
                .unwrap();
        }
        // A non-PROFILE row under the same prefix must be excluded
        store
            .put_item(item("PATIENT#zzz", "VISIT#1", json!({})), Condition::None)
            .unwrap();
        let mut total = 0;
        let mut start: Option<LastKey> = None;
        loop {
            let page = store.scan_page("PATIENT#", Some("PROFILE"), 2, start.as_ref()).unwrap();
            total += page.items.len();
            match page.last_key {
                Some(k) => start = Some(k),
                None => break,
            }
        }
        assert_eq!(total, 5);
    }

    #[test]
    fn like_prefix_escapes_metacharacters() {
        assert_eq!(like_prefix("a%b_c"), "a\\%b\\_c%");
        assert_eq!(like_prefix("plain"), "plain%");
    }
}

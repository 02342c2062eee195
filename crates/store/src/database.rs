use crate::changeset::LogEntry;
use crate::version::Version;
use crate::{Error, Result};
use keys::{ColKey, Mixed, ObjKey, TableKey, Value};
use schema::Schema;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One stored cell. Which variant is valid for a given `(table, obj,
/// col)` is determined by the column's [`keys::ColumnAttributes::collection`]
/// (spec §3: "exactly-one-of scalar/list/set/dictionary").
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Scalar(Mixed),
    List(Vec<Mixed>),
    Set(Vec<Mixed>),
    Dict(Vec<(String, Mixed)>),
}

/// A primary-key value, restricted to the hashable subset of [`Value`]
/// that [`schema::Schema::set_primary_key`] accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PkValue {
    Int(i64),
    Str(String),
    ObjectId(keys::ObjectId),
    Uuid(uuid::Uuid),
}

impl PkValue {
    pub(crate) fn from_value(value: &Value) -> Option<PkValue> {
        match value {
            Value::Int(i) => Some(PkValue::Int(*i)),
            Value::String(s) => Some(PkValue::Str(s.clone())),
            Value::ObjectId(o) => Some(PkValue::ObjectId(*o)),
            Value::Uuid(u) => Some(PkValue::Uuid(*u)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TableData {
    pub(crate) order: Vec<ObjKey>,
    pub(crate) rows: HashMap<ObjKey, HashMap<ColKey, Cell>>,
    pub(crate) pk_index: HashMap<PkValue, ObjKey>,
}

impl TableData {
    pub(crate) fn object_count(&self) -> u64 {
        self.order.len() as u64
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DbState {
    pub(crate) schema: Schema,
    pub(crate) tables: HashMap<TableKey, TableData>,
    pub(crate) version: Version,
    pub(crate) next_obj_ordinal: u64,
}

impl DbState {
    fn new(schema: Schema) -> DbState {
        let mut tables = HashMap::new();
        for table in schema.tables() {
            tables.insert(table.key(), TableData::default());
        }
        DbState {
            schema,
            tables,
            version: Version::zero(),
            next_obj_ordinal: 0,
        }
    }
}

/// Tunable behavior passed to [`Database::open`]: analogous to the small
/// options-struct `journal-client::connect_journal_client` takes for its
/// connection parameters. Covers the advisory write-lock path; the
/// `notify` scheduler and `sync` session defaults are configured on
/// those layers directly, since a `store::Database` can be used headless
/// of both.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// How long `begin_write` waits to acquire the advisory write lock
    /// before returning [`Error::WriteLockHeld`].
    pub write_lock_timeout: std::time::Duration,
}

impl Default for DatabaseOptions {
    fn default() -> DatabaseOptions {
        DatabaseOptions {
            write_lock_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// An embedded database: a [`Schema`] plus the object data it describes,
/// an append-only transaction log, and an advisory single-writer lock
/// (spec §5: "Concurrency model").
pub struct Database {
    pub(crate) state: Arc<RwLock<DbState>>,
    pub(crate) log: Arc<RwLock<Vec<LogEntry>>>,
    pub(crate) write_lock: Arc<tokio::sync::Mutex<()>>,
    pub(crate) options: DatabaseOptions,
}

impl Database {
    pub fn open(schema: Schema) -> Database {
        Self::open_with_options(schema, DatabaseOptions::default())
    }

    pub fn open_with_options(schema: Schema, options: DatabaseOptions) -> Database {
        tracing::debug!("opening database");
        Database {
            state: Arc::new(RwLock::new(DbState::new(schema))),
            log: Arc::new(RwLock::new(Vec::new())),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            options,
        }
    }

    pub fn version(&self) -> Version {
        self.state.read().unwrap().version
    }

    pub fn read(&self) -> crate::ReadTransaction {
        let state = self.state.read().unwrap().clone();
        crate::ReadTransaction::new(state)
    }

    /// Acquires the advisory write lock and starts a write transaction
    /// whose working copy is cloned from the currently committed state.
    /// At most one write transaction exists at a time (spec §5).
    pub async fn begin_write(&self) -> Result<crate::WriteTransaction> {
        let guard = tokio::time::timeout(self.options.write_lock_timeout, self.write_lock.clone().lock_owned())
            .await
            .map_err(|_| Error::WriteLockHeld)?;
        let working = self.state.read().unwrap().clone();
        Ok(crate::WriteTransaction::new(working, guard, self.state.clone(), self.log.clone()))
    }

    pub fn transaction_log(&self) -> Vec<LogEntry> {
        self.log.read().unwrap().clone()
    }

    /// Replaces this database's entire committed state and transaction
    /// log with `merged`'s, as a single atomic swap (spec §4.9 step 5:
    /// "the merged replica replaces the original file atomically").
    /// Takes the advisory write lock so no write transaction is racing
    /// the swap; live read transactions already open keep their own
    /// snapshot (§5: "a pinned read transaction taken before the reset
    /// keeps its old-version snapshot valid until released").
    pub async fn replace_atomically(&self, merged: Database) -> Result<()> {
        let _guard = tokio::time::timeout(self.options.write_lock_timeout, self.write_lock.clone().lock_owned())
            .await
            .map_err(|_| Error::WriteLockHeld)?;
        let new_state = merged.state.read().unwrap().clone();
        let new_log = merged.log.read().unwrap().clone();
        *self.state.write().unwrap() = new_state;
        *self.log.write().unwrap() = new_log;
        tracing::debug!(version = %self.version(), "replaced database content atomically");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use schema::Schema;

    #[test]
    fn test_open_seeds_empty_table_storage() {
        let mut schema = Schema::new();
        schema.add_table("Person").unwrap();
        let db = Database::open(schema);
        assert_eq!(db.version(), Version::zero());
    }
}

use crate::changeset::{LogEntry, Mutation};
use crate::database::{Cell, DbState, PkValue, TableData};
use crate::version::Version;
use crate::{Error, Result};
use keys::{ColKey, ColumnKind, Mixed, ObjKey, TableKey, Value};
use std::sync::{Arc, RwLock};

/// Whether [`WriteTransaction::set_value`] skips writing (and logging) a
/// value that's identical to what's already stored. `Diff` is the
/// default; `Always` forces a write-and-notify even for a no-op change
/// (spec §4.3 "assign" semantics: `UpdateAll` vs `UpdateModified`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    Diff,
    Always,
}

/// A read-only view pinned to the [`Version`] it was opened at (spec
/// §4.4 `freeze`/`snapshot`). Concurrent write transactions never
/// mutate a `ReadTransaction`'s view, since it holds an owned clone of
/// the committed state.
pub struct ReadTransaction {
    pub(crate) state: DbState,
}

impl ReadTransaction {
    pub(crate) fn new(state: DbState) -> ReadTransaction {
        ReadTransaction { state }
    }

    pub fn version(&self) -> Version {
        self.state.version
    }

    pub fn schema(&self) -> &schema::Schema {
        &self.state.schema
    }

    pub fn table_object_count(&self, table: TableKey) -> Result<u64> {
        Ok(table_data(&self.state, table)?.object_count())
    }

    pub fn objects(&self, table: TableKey) -> Result<Vec<ObjKey>> {
        Ok(table_data(&self.state, table)?.order.clone())
    }

    pub fn get_value(&self, table: TableKey, obj: ObjKey, col: ColKey) -> Result<Mixed> {
        get_scalar(&self.state, table, obj, col)
    }

    /// Reads a `list`- or `set`-attributed column's contents (spec §4.3).
    /// An absent cell reads as empty rather than an error, matching
    /// `get_value`'s treatment of an absent scalar as `Mixed::Null`.
    pub fn get_collection(&self, table: TableKey, obj: ObjKey, col: ColKey) -> Result<Vec<Mixed>> {
        column_kind(&self.state, table, col)?;
        let row = table_data(&self.state, table)?.rows.get(&obj).ok_or(Error::UnknownObject(table, obj))?;
        match row.get(&col) {
            Some(Cell::List(values)) | Some(Cell::Set(values)) => Ok(values.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(Error::WrongType(col, col.kind())),
        }
    }

    /// Reads a `dictionary`-attributed column's contents (spec §4.3).
    pub fn get_dictionary(&self, table: TableKey, obj: ObjKey, col: ColKey) -> Result<Vec<(String, Mixed)>> {
        column_kind(&self.state, table, col)?;
        let row = table_data(&self.state, table)?.rows.get(&obj).ok_or(Error::UnknownObject(table, obj))?;
        match row.get(&col) {
            Some(Cell::Dict(entries)) => Ok(entries.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(Error::WrongType(col, col.kind())),
        }
    }

    pub fn find_by_primary_key(&self, table: TableKey, pk: &Value) -> Result<Option<ObjKey>> {
        let primary_key_col = self
            .state
            .schema
            .table(table)
            .ok_or(Error::UnknownTable(table))?
            .primary_key
            .ok_or(Error::NoPrimaryKey(table))?;
        let pk_value = PkValue::from_value(pk).ok_or(Error::WrongType(primary_key_col, keys::kind_of(pk)))?;
        Ok(table_data(&self.state, table)?.pk_index.get(&pk_value).copied())
    }
}

fn table_data(state: &DbState, table: TableKey) -> Result<&TableData> {
    state.tables.get(&table).ok_or(Error::UnknownTable(table))
}

fn column_kind(state: &DbState, table: TableKey, col: ColKey) -> Result<ColumnKind> {
    state
        .schema
        .table(table)
        .ok_or(Error::UnknownTable(table))?
        .column(col)
        .ok_or(Error::UnknownColumn(table, col))?;
    Ok(col.kind())
}

fn get_scalar(state: &DbState, table: TableKey, obj: ObjKey, col: ColKey) -> Result<Mixed> {
    column_kind(state, table, col)?;
    let row = table_data(state, table)?
        .rows
        .get(&obj)
        .ok_or(Error::UnknownObject(table, obj))?;
    match row.get(&col) {
        Some(Cell::Scalar(value)) => Ok(value.clone()),
        Some(_) => Err(Error::WrongType(col, col.kind())),
        None => Ok(Mixed::Null),
    }
}

/// A write transaction. Mutations are applied to an owned working copy
/// of the database state as they're called (so subsequent reads within
/// the same transaction see them) and staged into a [`Changeset`] that
/// is appended to the log atomically at [`Self::commit`] (spec §5, §6).
pub struct WriteTransaction {
    pub(crate) working: DbState,
    mutations: Vec<Mutation>,
    write_policy: WritePolicy,
    _guard: tokio::sync::OwnedMutexGuard<()>,
    shared_state: Arc<RwLock<DbState>>,
    shared_log: Arc<RwLock<Vec<LogEntry>>>,
}

impl WriteTransaction {
    pub(crate) fn new(
        working: DbState,
        guard: tokio::sync::OwnedMutexGuard<()>,
        shared_state: Arc<RwLock<DbState>>,
        shared_log: Arc<RwLock<Vec<LogEntry>>>,
    ) -> WriteTransaction {
        WriteTransaction {
            working,
            mutations: Vec::new(),
            write_policy: WritePolicy::Diff,
            _guard: guard,
            shared_state,
            shared_log,
        }
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> WriteTransaction {
        self.write_policy = policy;
        self
    }

    pub fn schema(&self) -> &schema::Schema {
        &self.working.schema
    }

    pub fn schema_mut(&mut self) -> &mut schema::Schema {
        &mut self.working.schema
    }

    pub fn version(&self) -> Version {
        self.working.version
    }

    pub fn table_object_count(&self, table: TableKey) -> Result<u64> {
        Ok(table_data(&self.working, table)?.object_count())
    }

    pub fn object<'t>(&'t mut self, table: TableKey, obj: ObjKey) -> Result<crate::Object<'t>> {
        table_data(&self.working, table)?
            .rows
            .get(&obj)
            .ok_or(Error::UnknownObject(table, obj))?;
        Ok(crate::Object::new(self, table, obj))
    }

    /// Creates a new object, inserting it into the primary-key index if
    /// the table has one and `pk` is given (spec §4.3, §4.4).
    pub fn create_object(&mut self, table: TableKey, pk: Option<Value>) -> Result<ObjKey> {
        let table_def = self.working.schema.table(table).ok_or(Error::UnknownTable(table))?;
        let primary_key_col = table_def.primary_key;

        if primary_key_col.is_some() && pk.is_none() {
            return Err(Error::MissingPrimaryKey(table));
        }

        let pk_value = match (&primary_key_col, &pk) {
            (Some(_), Some(v)) => {
                let pk_value = PkValue::from_value(v).ok_or(Error::WrongType(primary_key_col.unwrap(), keys::kind_of(v)))?;
                let td = table_data(&self.working, table)?;
                if td.pk_index.contains_key(&pk_value) {
                    return Err(Error::DuplicatePrimaryKey(table));
                }
                Some(pk_value)
            }
            _ => None,
        };

        let obj = ObjKey::from_raw(self.working.next_obj_ordinal());

        let td = self.working.tables.get_mut(&table).unwrap();
        td.order.push(obj);
        td.rows.insert(obj, std::collections::HashMap::new());
        if let Some(pk_value) = pk_value {
            td.pk_index.insert(pk_value, obj);
        }
        if let (Some(col), Some(v)) = (primary_key_col, pk) {
            td.rows.get_mut(&obj).unwrap().insert(col, Cell::Scalar(Mixed::Value(v.clone())));
            self.mutations.push(Mutation::CreateObject { table, obj });
            self.mutations.push(Mutation::Set {
                table,
                obj,
                col,
                value: Mixed::Value(v),
            });
        } else {
            self.mutations.push(Mutation::CreateObject { table, obj });
        }

        tracing::trace!(?table, ?obj, "created object");
        Ok(obj)
    }

    /// Removes an object, cascading into embedded link targets and
    /// clearing any incoming links recorded on its backlink columns
    /// (spec §4.3: "remove() backlink/incoming-link cleanup").
    pub fn remove_object(&mut self, table: TableKey, obj: ObjKey) -> Result<()> {
        let columns: Vec<_> = self
            .working
            .schema
            .table(table)
            .ok_or(Error::UnknownTable(table))?
            .columns()
            .cloned()
            .collect();

        for def in &columns {
            if def.key.kind() == ColumnKind::BackLink {
                if let Some(origin) = def.link_target {
                    let incoming = self.read_link_list(table, obj, def.key);
                    for origin_obj in incoming {
                        self.clear_incoming_link(origin.table, origin_obj, origin.col, table, obj);
                    }
                }
            } else if def.key.kind() == ColumnKind::Link {
                if let Some(target) = def.link_target {
                    let embedded = self
                        .working
                        .schema
                        .table(target.table)
                        .map(|t| t.embedded)
                        .unwrap_or(false);
                    if embedded {
                        for target_obj in self.read_link_list(table, obj, def.key) {
                            self.remove_object(target.table, target_obj)?;
                        }
                    }
                }
            }
        }

        let td = self.working.tables.get_mut(&table).ok_or(Error::UnknownTable(table))?;
        td.rows.remove(&obj);
        td.order.retain(|k| *k != obj);
        td.pk_index.retain(|_, v| *v != obj);

        self.mutations.push(Mutation::EraseObject { table, obj });
        tracing::trace!(?table, ?obj, "removed object");
        Ok(())
    }

    fn read_link_list(&self, table: TableKey, obj: ObjKey, col: ColKey) -> Vec<ObjKey> {
        let Some(row) = self.working.tables.get(&table).and_then(|t| t.rows.get(&obj)) else {
            return Vec::new();
        };
        match row.get(&col) {
            Some(Cell::Scalar(Mixed::Value(Value::Link(o)))) => vec![*o],
            Some(Cell::List(values)) => values
                .iter()
                .filter_map(|v| match v {
                    Mixed::Value(Value::Link(o)) => Some(*o),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn clear_incoming_link(&mut self, table: TableKey, obj: ObjKey, col: ColKey, removed_target_table: TableKey, removed_target: ObjKey) {
        let Some(row) = self.working.tables.get_mut(&table).and_then(|t| t.rows.get_mut(&obj)) else {
            return;
        };
        let _ = removed_target_table;
        match row.get_mut(&col) {
            Some(Cell::Scalar(value)) => {
                if matches!(value, Mixed::Value(Value::Link(o)) if *o == removed_target) {
                    *value = Mixed::Null;
                    self.mutations.push(Mutation::Set { table, obj, col, value: Mixed::Null });
                }
            }
            Some(Cell::List(values)) => {
                if let Some(pos) = values
                    .iter()
                    .position(|v| matches!(v, Mixed::Value(Value::Link(o)) if *o == removed_target))
                {
                    values.remove(pos);
                    self.mutations.push(Mutation::ListErase { table, obj, col, index: pos });
                }
            }
            _ => {}
        }
    }

    fn link_target_of(&self, table: TableKey, col: ColKey) -> Option<schema::LinkTarget> {
        self.working.schema.table(table)?.column(col)?.link_target
    }

    fn maintain_backlinks_on_link_added(&mut self, table: TableKey, obj: ObjKey, col: ColKey, target_obj: ObjKey) {
        if let Some(target) = self.link_target_of(table, col) {
            self.push_backlink(target.table, target_obj, target.col, obj);
        }
    }

    fn maintain_backlinks_on_link_removed(&mut self, table: TableKey, obj: ObjKey, col: ColKey, target_obj: ObjKey) {
        if let Some(target) = self.link_target_of(table, col) {
            self.pop_backlink(target.table, target_obj, target.col, obj);
        }
    }

    fn push_backlink(&mut self, table: TableKey, obj: ObjKey, col: ColKey, origin_obj: ObjKey) {
        if let Some(row) = self.working.tables.get_mut(&table).and_then(|t| t.rows.get_mut(&obj)) {
            match row.entry(col).or_insert_with(|| Cell::List(Vec::new())) {
                Cell::List(values) => values.push(Mixed::Value(Value::Link(origin_obj))),
                _ => {}
            }
        }
    }

    fn pop_backlink(&mut self, table: TableKey, obj: ObjKey, col: ColKey, origin_obj: ObjKey) {
        if let Some(row) = self.working.tables.get_mut(&table).and_then(|t| t.rows.get_mut(&obj)) {
            if let Some(Cell::List(values)) = row.get_mut(&col) {
                if let Some(pos) = values.iter().position(|v| matches!(v, Mixed::Value(Value::Link(o)) if *o == origin_obj)) {
                    values.remove(pos);
                }
            }
        }
    }

    /// Sets a scalar column's value. Under [`WritePolicy::Diff`] (the
    /// default) a write that would leave the stored value unchanged is
    /// skipped entirely -- no mutation is staged and no notification
    /// fires (spec §4.3).
    pub fn set_value(&mut self, table: TableKey, obj: ObjKey, col: ColKey, value: Mixed) -> Result<()> {
        column_kind(&self.working, table, col)?;
        let row = self
            .working
            .tables
            .get(&table)
            .and_then(|t| t.rows.get(&obj))
            .ok_or(Error::UnknownObject(table, obj))?;
        let previous = match row.get(&col) {
            Some(Cell::Scalar(v)) => Some(v.clone()),
            Some(_) => return Err(Error::WrongType(col, col.kind())),
            None => None,
        };

        if self.write_policy == WritePolicy::Diff && previous.as_ref() == Some(&value) {
            return Ok(());
        }

        if col.kind() == ColumnKind::Link {
            if let Some(Mixed::Value(Value::Link(old))) = &previous {
                let old = *old;
                self.maintain_backlinks_on_link_removed(table, obj, col, old);
            }
            if let Mixed::Value(Value::Link(new_target)) = &value {
                let new_target = *new_target;
                self.maintain_backlinks_on_link_added(table, obj, col, new_target);
            }
        }

        let td = self.working.tables.get_mut(&table).unwrap();
        td.rows.get_mut(&obj).unwrap().insert(col, Cell::Scalar(value.clone()));
        self.mutations.push(Mutation::Set { table, obj, col, value });
        Ok(())
    }

    pub fn get_value(&self, table: TableKey, obj: ObjKey, col: ColKey) -> Result<Mixed> {
        get_scalar(&self.working, table, obj, col)
    }

    pub(crate) fn cell_mut(&mut self, table: TableKey, obj: ObjKey, col: ColKey) -> Result<&mut Cell> {
        column_kind(&self.working, table, col)?;
        let collection = col.attrs().collection;
        let row = self
            .working
            .tables
            .get_mut(&table)
            .and_then(|t| t.rows.get_mut(&obj))
            .ok_or(Error::UnknownObject(table, obj))?;
        Ok(row.entry(col).or_insert_with(|| match collection {
            keys::CollectionType::List => Cell::List(Vec::new()),
            keys::CollectionType::Set => Cell::Set(Vec::new()),
            keys::CollectionType::Dictionary => Cell::Dict(Vec::new()),
            keys::CollectionType::Scalar => Cell::Scalar(Mixed::Null),
        }))
    }

    pub(crate) fn record(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub(crate) fn on_link_added(&mut self, table: TableKey, obj: ObjKey, col: ColKey, target: ObjKey) {
        self.maintain_backlinks_on_link_added(table, obj, col, target);
    }

    pub(crate) fn on_link_removed(&mut self, table: TableKey, obj: ObjKey, col: ColKey, target: ObjKey) {
        self.maintain_backlinks_on_link_removed(table, obj, col, target);
    }

    pub(crate) fn remove_if_embedded(&mut self, table: TableKey, col: ColKey, target: ObjKey) -> Result<()> {
        if let Some(link_target) = self.link_target_of(table, col) {
            let embedded = self.working.schema.table(link_target.table).map(|t| t.embedded).unwrap_or(false);
            if embedded {
                self.remove_object(link_target.table, target)?;
            }
        }
        Ok(())
    }

    /// Commits the transaction: swaps this transaction's working copy in
    /// as the database's new committed state, bumps [`Version`], and
    /// appends the staged [`Changeset`] to the log.
    pub fn commit(mut self) -> Result<Version> {
        self.working.version = self.working.version.next();
        let version = self.working.version;

        {
            let mut shared = self.shared_state.write().unwrap();
            *shared = self.working.clone();
        }
        {
            let mut log = self.shared_log.write().unwrap();
            log.push(LogEntry {
                version,
                mutations: std::mem::take(&mut self.mutations),
            });
        }
        tracing::debug!(%version, "committed write transaction");
        Ok(version)
    }

    pub fn rollback(self) {
        tracing::debug!("rolled back write transaction");
    }
}

impl DbState {
    fn next_obj_ordinal(&mut self) -> u64 {
        self.next_obj_ordinal += 1;
        self.next_obj_ordinal - 1
    }
}

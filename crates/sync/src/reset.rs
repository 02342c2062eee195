use keys::{ColKey, Mixed, TableKey, Value};
use schema::Schema;
use std::collections::HashMap;
use std::sync::Arc;
use store::{Database, Result as StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Healthy,
    Diverged,
    DownloadingFresh,
    Merging,
    Uploading,
}

/// Whether objects this replica created or changed since its last
/// successful sync, and that the fresh replica knows nothing about, are
/// carried forward into the merged replica (spec §4.9: "recovery-enabled
/// merges local-only changes back in; recovery-disabled discards them").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    Enabled,
    Disabled,
}

/// One schema entity present locally but not on the fresh replica, found
/// by name rather than by `TableKey`/`ColKey` identity: a diverged local
/// replica's schema and the fresh replica's schema were not built from
/// the same allocation sequence, so only names are comparable across them
/// (spec §4.9 step 2, "schema-entity replay").
#[derive(Debug, Clone, PartialEq)]
enum SchemaOp {
    AddTable {
        name: String,
    },
    AddColumn {
        table_name: String,
        name: String,
        kind: keys::ColumnKind,
        attrs: keys::ColumnAttributes,
        link_target_name: Option<String>,
    },
}

fn schema_diff(local: &Schema, fresh: &Schema) -> Vec<SchemaOp> {
    let mut ops = Vec::new();
    for table in local.tables() {
        if fresh.table_by_name(&table.name).is_none() {
            ops.push(SchemaOp::AddTable { name: table.name.clone() });
        }
    }
    for table in local.tables() {
        let fresh_table = fresh.table_by_name(&table.name);
        for col in table.columns() {
            if col.key.kind() == keys::ColumnKind::BackLink {
                // Synthesized automatically by its forward Link's AddColumn.
                continue;
            }
            let already_present = fresh_table.is_some_and(|t| t.resolve_name(&col.name).is_some());
            if already_present {
                continue;
            }
            let link_target_name = col.link_target.map(|lt| local.table(lt.table).unwrap().name.clone());
            ops.push(SchemaOp::AddColumn {
                table_name: table.name.clone(),
                name: col.name.clone(),
                kind: col.key.kind(),
                attrs: col.key.attrs(),
                link_target_name,
            });
        }
    }
    ops
}

fn apply_schema_op(schema: &mut Schema, op: &SchemaOp) -> Result<(), schema::SchemaError> {
    match op {
        SchemaOp::AddTable { name } => {
            schema.add_table(name.clone())?;
            Ok(())
        }
        SchemaOp::AddColumn {
            table_name,
            name,
            kind,
            attrs,
            link_target_name,
        } => {
            // `schema_diff` only ever emits an `AddColumn` for a
            // `table_name` that either already exists on `fresh` or was
            // just added by an `AddTable` op earlier in the same list.
            let table = schema.table_by_name(table_name).expect("schema_diff orders AddTable before its AddColumns").key();
            let link_target = link_target_name
                .as_ref()
                .map(|n| schema.table_by_name(n).expect("link target table replayed by its own schema_diff entry").key());
            schema.add_column(table, name.clone(), *kind, *attrs, link_target)?;
            Ok(())
        }
    }
}

/// Drives a client reset: merges a diverged local replica's local-only
/// schema and data into a freshly-downloaded replica, then hands back the
/// merged [`Database`] for the caller to swap in via
/// [`Database::replace_atomically`] (spec §4.9).
///
/// This does not itself talk to a [`crate::transport::Transport`] --
/// `fresh` is whatever the caller already downloaded as a full snapshot.
/// Driving the download belongs to the session layer; this controller is
/// the merge algorithm.
pub struct ClientResetController {
    state: ResetState,
    recovery: RecoveryMode,
}

impl ClientResetController {
    pub fn new(recovery: RecoveryMode) -> ClientResetController {
        ClientResetController {
            state: ResetState::Healthy,
            recovery,
        }
    }

    pub fn state(&self) -> ResetState {
        self.state
    }

    /// Runs the full merge and returns the merged, not-yet-swapped-in
    /// replica. Callers typically follow this with
    /// `local.replace_atomically(merged).await`.
    pub async fn run(&mut self, local: &Arc<Database>, fresh: Database) -> StoreResult<Database> {
        self.state = ResetState::Diverged;

        let local_txn = local.read();
        let mut fresh_schema = fresh.read().schema().clone();

        self.state = ResetState::DownloadingFresh;
        for op in schema_diff(local_txn.schema(), &fresh_schema) {
            apply_schema_op(&mut fresh_schema, &op)?;
        }

        self.state = ResetState::Merging;
        let merged = Database::open(fresh_schema);
        let mut obj_map = ObjMap::default();
        copy_table_data(&fresh, &merged, &mut obj_map, AlwaysCopy).await?;

        if self.recovery == RecoveryMode::Enabled {
            copy_table_data(local, &merged, &mut obj_map, SkipAlreadyPresent).await?;
        }

        self.state = ResetState::Uploading;
        Ok(merged)
    }

    pub fn finish(&mut self) {
        self.state = ResetState::Healthy;
    }
}

/// Maps a source object to the `ObjKey` it was (re)created as on the
/// merge destination. Threaded across both merge passes (fresh, then
/// local-only) so a link from a local-only object to a fresh-copied one,
/// or vice versa, resolves to the right destination object instead of
/// the source replica's own `ObjKey`, which means nothing on `dest`.
#[derive(Default)]
struct ObjMap(HashMap<(TableKey, keys::ObjKey), keys::ObjKey>);

impl ObjMap {
    fn insert(&mut self, table: TableKey, src_obj: keys::ObjKey, dest_obj: keys::ObjKey) {
        self.0.insert((table, src_obj), dest_obj);
    }

    fn get(&self, table: TableKey, src_obj: keys::ObjKey) -> Option<keys::ObjKey> {
        self.0.get(&(table, src_obj)).copied()
    }
}

/// Whether an object already present on `dest` should be reused (skipping
/// both creation and column copy) rather than treated as new.
trait CopyFilter {
    fn existing(&self, dest_snapshot: &store::ReadTransaction, dest_table: TableKey, pk: Option<&Value>) -> StoreResult<Option<keys::ObjKey>>;
}

/// Used for the fresh-replica pass: `dest` starts empty, so nothing is
/// ever already present.
struct AlwaysCopy;
impl CopyFilter for AlwaysCopy {
    fn existing(&self, _dest_snapshot: &store::ReadTransaction, _dest_table: TableKey, _pk: Option<&Value>) -> StoreResult<Option<keys::ObjKey>> {
        Ok(None)
    }
}

/// Used for the local-only pass: an object already matched by primary key
/// came from the fresh replica and must not be recreated or overwritten
/// (spec §4.9: the fresh replica's data for a shared object wins over the
/// diverged local copy).
struct SkipAlreadyPresent;
impl CopyFilter for SkipAlreadyPresent {
    fn existing(&self, dest_snapshot: &store::ReadTransaction, dest_table: TableKey, pk: Option<&Value>) -> StoreResult<Option<keys::ObjKey>> {
        match pk {
            Some(v) => dest_snapshot.find_by_primary_key(dest_table, v),
            None => Ok(None),
        }
    }
}

/// Copies `source`'s rows into `dest`'s matching (by name) tables and
/// columns, in two passes: first every object is created (or, per
/// `filter`, matched to one already on `dest`) and recorded in `obj_map`;
/// only then are non-key columns copied, so a `Link` value pointing
/// forward to an object this same pass hasn't created yet still resolves
/// (spec §4.9 steps 2-4: schema replay, object matching, data merge).
async fn copy_table_data(source: &Database, dest: &Database, obj_map: &mut ObjMap, filter: impl CopyFilter) -> StoreResult<()> {
    let src_txn = source.read();
    let dest_snapshot = dest.read();
    let mut wtx = dest.begin_write().await?;

    let mut pending: Vec<(TableKey, keys::ObjKey, TableKey, keys::ObjKey)> = Vec::new();
    for table in src_txn.schema().tables() {
        let Some(dest_table) = wtx.schema().table_by_name(&table.name).map(|t| t.key()) else {
            continue;
        };
        let primary_key_col = table.primary_key;
        for obj in src_txn.objects(table.key())? {
            let pk_value = match primary_key_col {
                Some(col) => match src_txn.get_value(table.key(), obj, col)? {
                    Mixed::Value(v) => Some(v),
                    Mixed::Null => None,
                },
                None => None,
            };

            if let Some(existing) = filter.existing(&dest_snapshot, dest_table, pk_value.as_ref())? {
                obj_map.insert(table.key(), obj, existing);
                continue;
            }

            let dest_obj = wtx.create_object(dest_table, pk_value)?;
            obj_map.insert(table.key(), obj, dest_obj);
            pending.push((table.key(), obj, dest_table, dest_obj));
        }
    }

    for (src_table, src_obj, dest_table, dest_obj) in pending {
        copy_non_key_columns(&src_txn, &mut wtx, obj_map, src_table, src_obj, dest_table, dest_obj)?;
    }

    wtx.commit()?;
    Ok(())
}

fn copy_non_key_columns(
    src_txn: &store::ReadTransaction,
    wtx: &mut store::WriteTransaction,
    obj_map: &ObjMap,
    src_table: TableKey,
    src_obj: keys::ObjKey,
    dest_table: TableKey,
    dest_obj: keys::ObjKey,
) -> StoreResult<()> {
    let primary_key_col = src_txn.schema().table(src_table).and_then(|t| t.primary_key);
    let dest_columns: HashMap<String, ColKey> = wtx
        .schema()
        .table(dest_table)
        .unwrap()
        .columns()
        .map(|c| (c.name.clone(), c.key))
        .collect();

    let src_schema_table = src_txn.schema().table(src_table).unwrap().clone();
    for col in src_schema_table.columns() {
        if Some(col.key) == primary_key_col || col.key.kind() == keys::ColumnKind::BackLink {
            continue;
        }
        let Some(&dest_col) = dest_columns.get(&col.name) else {
            continue;
        };
        let link_target_table = col.link_target.map(|lt| lt.table);

        // A `Link` value names the source replica's `ObjKey`, which means
        // nothing on `dest`; remap it through `obj_map`. A link to an
        // object this merge dropped (filtered out, belongs to neither
        // pass) is dropped too rather than left dangling.
        let remap = |value: Mixed| -> Mixed {
            match (&value, link_target_table) {
                (Mixed::Value(Value::Link(o)), Some(target_table)) => match obj_map.get(target_table, *o) {
                    Some(mapped) => Mixed::Value(Value::Link(mapped)),
                    None => Mixed::Null,
                },
                _ => value,
            }
        };

        match col.key.attrs().collection {
            keys::CollectionType::Scalar => {
                let value = remap(src_txn.get_value(src_table, src_obj, col.key)?);
                wtx.set_value(dest_table, dest_obj, dest_col, value)?;
            }
            keys::CollectionType::List => {
                let values = src_txn.get_collection(src_table, src_obj, col.key)?;
                let mut obj = wtx.object(dest_table, dest_obj)?;
                let mut list = obj.list(dest_col);
                for value in values {
                    list.add(remap(value))?;
                }
            }
            keys::CollectionType::Set => {
                let values = src_txn.get_collection(src_table, src_obj, col.key)?;
                let mut obj = wtx.object(dest_table, dest_obj)?;
                let mut set = obj.set_collection(dest_col);
                for value in values {
                    set.add(remap(value))?;
                }
            }
            keys::CollectionType::Dictionary => {
                let entries = src_txn.get_dictionary(src_table, src_obj, col.key)?;
                let mut obj = wtx.object(dest_table, dest_obj)?;
                let mut dict = obj.dictionary(dest_col);
                for (key, value) in entries {
                    dict.set(key, remap(value))?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use keys::{ColumnAttributes, ColumnKind, Value};
    use schema::Schema;

    fn people_schema() -> (Schema, TableKey, ColKey) {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let name = schema.add_column(people, "name", ColumnKind::String, ColumnAttributes::scalar(), None).unwrap();
        schema.set_primary_key(people, Some(name)).unwrap();
        schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
        (schema, people, name)
    }

    #[tokio::test]
    async fn test_reset_copies_fresh_replica_data() {
        let (schema, people, _name) = people_schema();
        let fresh = Database::open(schema.clone());
        let mut wtx = fresh.begin_write().await.unwrap();
        wtx.create_object(people, Some(Value::String("mary".into()))).unwrap();
        wtx.commit().unwrap();

        let local = Arc::new(Database::open(schema));
        let mut controller = ClientResetController::new(RecoveryMode::Enabled);
        let merged = controller.run(&local, fresh).await.unwrap();

        let txn = merged.read();
        let people_key = txn.schema().table_by_name("Person").unwrap().key();
        assert_eq!(txn.objects(people_key).unwrap().len(), 1);
        assert_eq!(controller.state(), ResetState::Uploading);
    }

    #[tokio::test]
    async fn test_reset_adds_schema_entities_missing_on_fresh() {
        let (local_schema, _people, _name) = people_schema();

        let mut fresh_schema = Schema::new();
        fresh_schema.add_table("Person").unwrap();
        let fresh = Database::open(fresh_schema);

        let local = Arc::new(Database::open(local_schema));
        let mut controller = ClientResetController::new(RecoveryMode::Disabled);
        let merged = controller.run(&local, fresh).await.unwrap();

        let txn = merged.read();
        let people_key = txn.schema().table_by_name("Person").unwrap().key();
        assert!(txn.schema().table(people_key).unwrap().resolve_name("age").is_some());
    }
}

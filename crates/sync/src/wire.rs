use keys::{ColKey, GlobalKey, Mixed, ObjKey, TableKey, Value};
use std::collections::HashMap;
use store::{Mutation, ReadTransaction, WriteTransaction};

/// How a wire mutation names the object it targets. A table with a
/// primary key travels by content-derived [`GlobalKey`], so two replicas
/// that independently created "the same" object agree on identity without
/// ever having shared an `ObjKey` allocation. A table with no primary key
/// has no such content identity; its objects travel by raw `ObjKey` and
/// are only meaningful because every replica applies the exact same
/// sequence of object-creating mutations in the same order (spec §3
/// `GlobalKey`, §6 changeset wire vocabulary).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ObjectRef {
    Global(GlobalKey),
    Local(ObjKey),
}

/// The changeset vocabulary as it travels over the wire: one-for-one with
/// [`store::Mutation`], except every `ObjKey` naming the mutated object is
/// replaced by an [`ObjectRef`] that a receiving replica can resolve
/// against its own, independently-allocated `ObjKey` space.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum WireMutation {
    /// `primary_key` carries the raw value a [`GlobalKey::from_primary_key`]
    /// was derived from, since the hash itself cannot be inverted: a
    /// receiving replica needs the value to call `create_object` on a
    /// primary-keyed table, not just the `ObjectRef` naming the result.
    CreateObject {
        table: TableKey,
        obj: ObjectRef,
        primary_key: Option<Value>,
    },
    EraseObject {
        table: TableKey,
        obj: ObjectRef,
    },
    Set {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        value: Mixed,
    },
    ListInsert {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        index: usize,
        value: Mixed,
    },
    ListSet {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        index: usize,
        value: Mixed,
    },
    ListMove {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        from: usize,
        to: usize,
    },
    ListErase {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        index: usize,
    },
    ListClear {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
    },
    SetInsert {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        value: Mixed,
    },
    SetErase {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        value: Mixed,
    },
    SetClear {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
    },
    DictSet {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        key: String,
        value: Mixed,
    },
    DictErase {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
        key: String,
    },
    DictClear {
        table: TableKey,
        obj: ObjectRef,
        col: ColKey,
    },
}

pub type WireChangeset = Vec<WireMutation>;

/// Resolves `obj` to the [`ObjectRef`] a peer replica should use to name
/// it: `Global` when `table` has a primary key and the object's current
/// value can be read, `Local` otherwise.
fn resolve_ref(txn: &ReadTransaction, table: TableKey, obj: ObjKey) -> ObjectRef {
    let primary_key_col = txn.schema().table(table).and_then(|t| t.primary_key);
    if let Some(col) = primary_key_col {
        if let Ok(Mixed::Value(v)) = txn.get_value(table, obj, col) {
            return ObjectRef::Global(GlobalKey::from_primary_key(table, &v));
        }
    }
    ObjectRef::Local(obj)
}

/// Translates one locally-recorded [`Mutation`] into its wire form, as
/// read back from the transaction log after commit (so that, for a
/// primary-keyed table, the object's primary key value is already visible
/// via `txn`).
pub fn to_wire(mutation: &Mutation, txn: &ReadTransaction) -> WireMutation {
    match mutation.clone() {
        Mutation::CreateObject { table, obj } => {
            let primary_key_col = txn.schema().table(table).and_then(|t| t.primary_key);
            let primary_key = primary_key_col.and_then(|col| match txn.get_value(table, obj, col) {
                Ok(Mixed::Value(v)) => Some(v),
                _ => None,
            });
            WireMutation::CreateObject {
                table,
                obj: resolve_ref(txn, table, obj),
                primary_key,
            }
        }
        Mutation::EraseObject { table, obj } => WireMutation::EraseObject { table, obj: resolve_ref(txn, table, obj) },
        Mutation::Set { table, obj, col, value } => WireMutation::Set {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            value,
        },
        Mutation::ListInsert { table, obj, col, index, value } => WireMutation::ListInsert {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            index,
            value,
        },
        Mutation::ListSet { table, obj, col, index, value } => WireMutation::ListSet {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            index,
            value,
        },
        Mutation::ListMove { table, obj, col, from, to } => WireMutation::ListMove {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            from,
            to,
        },
        Mutation::ListErase { table, obj, col, index } => WireMutation::ListErase {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            index,
        },
        Mutation::ListClear { table, obj, col } => WireMutation::ListClear {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
        },
        Mutation::SetInsert { table, obj, col, value } => WireMutation::SetInsert {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            value,
        },
        Mutation::SetErase { table, obj, col, value } => WireMutation::SetErase {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            value,
        },
        Mutation::SetClear { table, obj, col } => WireMutation::SetClear {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
        },
        Mutation::DictSet { table, obj, col, key, value } => WireMutation::DictSet {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            key,
            value,
        },
        Mutation::DictErase { table, obj, col, key } => WireMutation::DictErase {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
            key,
        },
        Mutation::DictClear { table, obj, col } => WireMutation::DictClear {
            table,
            obj: resolve_ref(txn, table, obj),
            col,
        },
    }
}

/// Tracks `GlobalKey -> ObjKey` resolutions across a [`crate::session::Session`]'s
/// whole lifetime, not just a single changeset: a `CreateObject` downloaded
/// today can be referenced by a mutation downloaded next week, so the
/// mapping is owned by the session and threaded into every
/// [`apply_changeset`] call rather than rebuilt per call. A receiving
/// replica also back-fills this map from its own locally-created,
/// primary-keyed objects (see [`ReplayMap::observe_local`]), so a global
/// ref can resolve to an object this replica created itself before ever
/// downloading anything.
#[derive(Default)]
pub struct ReplayMap {
    by_global: HashMap<GlobalKey, ObjKey>,
}

impl ReplayMap {
    pub fn new() -> ReplayMap {
        ReplayMap::default()
    }

    fn remember(&mut self, obj_ref: &ObjectRef, obj: ObjKey) {
        if let ObjectRef::Global(g) = obj_ref {
            self.by_global.insert(*g, obj);
        }
    }

    /// Records that `obj` (in `table`) is this replica's local object for
    /// `primary_key`, so a later download naming it by `GlobalKey` resolves
    /// to it without ever having been created via [`apply`].
    pub fn observe_local(&mut self, table: TableKey, obj: ObjKey, primary_key: &Value) {
        self.by_global.insert(GlobalKey::from_primary_key(table, primary_key), obj);
    }

    /// Resolves `obj_ref` to a local `ObjKey`. `Local` refs pass through
    /// directly -- valid only under the same-order replay assumption
    /// documented on [`ObjectRef`]. `Global` refs must already be in this
    /// map, either from a prior [`apply`] call or [`ReplayMap::observe_local`];
    /// an unmapped `Global` ref means the changeset referenced an object
    /// before creating it, which violates changeset ordering.
    fn resolve(&self, table: TableKey, obj_ref: &ObjectRef) -> store::Result<ObjKey> {
        match obj_ref {
            ObjectRef::Local(obj) => Ok(*obj),
            ObjectRef::Global(g) => self
                .by_global
                .get(g)
                .copied()
                .ok_or(store::Error::UnknownObject(table, ObjKey::from_raw(0))),
        }
    }
}

/// Applies one [`WireMutation`] against `txn`, creating the referenced
/// object first if this is a `CreateObject` (or the first mutation this
/// pass has seen naming a not-yet-resolved `ObjectRef`).
pub fn apply(txn: &mut WriteTransaction, map: &mut ReplayMap, mutation: &WireMutation) -> store::Result<()> {
    match mutation.clone() {
        WireMutation::CreateObject { table, obj, primary_key } => {
            let created = txn.create_object(table, primary_key)?;
            map.remember(&obj, created);
            Ok(())
        }
        WireMutation::EraseObject { table, obj } => {
            let resolved = map.resolve(table, &obj)?;
            txn.remove_object(table, resolved)
        }
        WireMutation::Set { table, obj, col, value } => {
            let resolved = map.resolve(table, &obj)?;
            txn.set_value(table, resolved, col, value)
        }
        WireMutation::ListInsert { table, obj, col, index, value } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.list(col).insert(index, value)
        }
        WireMutation::ListSet { table, obj, col, index, value } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.list(col).set(index, value)
        }
        WireMutation::ListMove { table, obj, col, from, to } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.list(col).move_to(from, to)
        }
        WireMutation::ListErase { table, obj, col, index } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.list(col).remove(index)
        }
        WireMutation::ListClear { table, obj, col } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.list(col).remove_all()
        }
        WireMutation::SetInsert { table, obj, col, value } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.set_collection(col).add(value).map(|_| ())
        }
        WireMutation::SetErase { table, obj, col, value } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.set_collection(col).remove(&value).map(|_| ())
        }
        WireMutation::SetClear { table, obj, col } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.set_collection(col).clear()
        }
        WireMutation::DictSet { table, obj, col, key, value } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.dictionary(col).set(key, value)
        }
        WireMutation::DictErase { table, obj, col, key } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.dictionary(col).remove(&key).map(|_| ())
        }
        WireMutation::DictClear { table, obj, col } => {
            let resolved = map.resolve(table, &obj)?;
            txn.object(table, resolved)?.dictionary(col).clear()
        }
    }
}

/// Applies an entire downloaded changeset in order against the caller's
/// long-lived [`ReplayMap`], so later entries (in this changeset or a
/// future one) can reference objects this changeset just created.
pub fn apply_changeset(txn: &mut WriteTransaction, map: &mut ReplayMap, changeset: &WireChangeset) -> store::Result<()> {
    for mutation in changeset {
        apply(txn, map, mutation)?;
    }
    Ok(())
}

/// Translates an entire locally-committed [`store::Changeset`] (as read
/// back from the transaction log) into its wire form.
pub fn to_wire_changeset(mutations: &[Mutation], txn: &ReadTransaction) -> WireChangeset {
    mutations.iter().map(|m| to_wire(m, txn)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use keys::{ColumnAttributes, ColumnKind};
    use schema::Schema;
    use store::Database;

    fn person_schema() -> (Schema, TableKey, ColKey, ColKey) {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let name = schema.add_column(people, "name", ColumnKind::String, ColumnAttributes::scalar(), None).unwrap();
        schema.set_primary_key(people, Some(name)).unwrap();
        let age = schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
        (schema, people, name, age)
    }

    #[tokio::test]
    async fn test_primary_keyed_create_round_trips_through_global_ref() {
        let (schema, people, _name, age) = person_schema();
        let db = Database::open(schema);

        let mut wtx = db.begin_write().await.unwrap();
        let obj = wtx.create_object(people, Some(keys::Value::String("mary".into()))).unwrap();
        wtx.set_value(people, obj, age, Mixed::Value(keys::Value::Int(30))).unwrap();
        wtx.commit().unwrap();

        let log = db.transaction_log();
        let txn = db.read();
        let wire: WireChangeset = to_wire_changeset(&log[0].mutations, &txn);

        assert!(matches!(&wire[0], WireMutation::CreateObject { obj: ObjectRef::Global(_), .. }));

        let mut schema2 = Schema::new();
        let people2 = schema2.add_table("Person").unwrap();
        let name2 = schema2.add_column(people2, "name", ColumnKind::String, ColumnAttributes::scalar(), None).unwrap();
        schema2.set_primary_key(people2, Some(name2)).unwrap();
        schema2.add_column(people2, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
        let db2 = Database::open(schema2);
        let mut wtx2 = db2.begin_write().await.unwrap();
        let mut map = ReplayMap::new();
        apply_changeset(&mut wtx2, &mut map, &wire).unwrap();
        wtx2.commit().unwrap();

        let txn2 = db2.read();
        let objs = txn2.objects(people2).unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(txn2.get_value(people2, objs[0], name2).unwrap(), Mixed::Value(keys::Value::String("mary".into())));
    }

    #[test]
    fn test_local_ref_passes_through_obj_key_unchanged() {
        let mut map = ReplayMap::new();
        let obj = ObjKey::from_raw(7);
        map.remember(&ObjectRef::Local(obj), obj);
        assert!(map.by_global.is_empty());
    }
}

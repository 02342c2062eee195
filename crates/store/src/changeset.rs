use crate::Version;
use keys::{ColKey, Mixed, ObjKey, TableKey};

/// One staged write, in the order it was applied within a transaction.
/// This is also the changeset wire vocabulary `sync` replays (spec §6).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Mutation {
    CreateObject {
        table: TableKey,
        obj: ObjKey,
    },
    EraseObject {
        table: TableKey,
        obj: ObjKey,
    },
    Set {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        value: Mixed,
    },
    ListInsert {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        index: usize,
        value: Mixed,
    },
    ListSet {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        index: usize,
        value: Mixed,
    },
    ListMove {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        from: usize,
        to: usize,
    },
    ListErase {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        index: usize,
    },
    ListClear {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
    },
    SetInsert {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        value: Mixed,
    },
    SetErase {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        value: Mixed,
    },
    SetClear {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
    },
    DictSet {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        key: String,
        value: Mixed,
    },
    DictErase {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
        key: String,
    },
    DictClear {
        table: TableKey,
        obj: ObjKey,
        col: ColKey,
    },
}

/// A single transaction's worth of mutations, in application order.
pub type Changeset = Vec<Mutation>;

/// One entry of the append-only local transaction log (spec §5, §6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    pub version: Version,
    pub mutations: Changeset,
}

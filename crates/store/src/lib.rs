//! The object accessor, collection accessors, and transaction machinery
//! that sit on top of [`schema`]: a [`Database`] opens against a
//! [`schema::Schema`], [`Transaction`]/[`WriteTransaction`] expose typed
//! `get`/`set` and collection operations, and every commit appends to an
//! in-memory transaction log that [`notify`] and `sync` read from.

mod changeset;
mod collection;
mod database;
mod object;
mod results;
mod txn;
mod version;

pub use changeset::{Changeset, LogEntry, Mutation};
pub use collection::{Dictionary, ListHandle, SetHandle};
pub use database::{Database, DatabaseOptions};
pub use object::Object;
pub use results::{compare_mixed, Ordering, Results};
pub use txn::{ReadTransaction, WriteTransaction};
pub use version::Version;

use keys::{ColKey, ObjKey, TableKey};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),

    #[error("table {0:?} does not exist")]
    UnknownTable(TableKey),

    #[error("object {1:?} does not exist in table {0:?}")]
    UnknownObject(TableKey, ObjKey),

    #[error("column {1:?} does not exist on table {0:?}")]
    UnknownColumn(TableKey, ColKey),

    #[error("column {0:?} holds a {1:?}, not the requested kind")]
    WrongType(ColKey, keys::ColumnKind),

    #[error("index {index} is out of bounds for a collection of size {size}")]
    OutOfBoundsIndex { index: usize, size: usize },

    #[error("operation is not valid on an embedded object: {0}")]
    InvalidEmbeddedOperation(&'static str),

    #[error("primary key value is already used by another object in table {0:?}")]
    DuplicatePrimaryKey(TableKey),

    #[error("the database's write lock is already held by another transaction")]
    WriteLockHeld,

    #[error("this read transaction is pinned to a version that has been superseded")]
    StaleTransaction,

    #[error("table {0:?} has no primary key column")]
    NoPrimaryKey(TableKey),

    #[error("table {0:?} requires a primary key value to create an object")]
    MissingPrimaryKey(TableKey),
}

impl Error {
    pub(crate) fn wrong_collection(col: ColKey) -> Error {
        Error::WrongType(col, col.kind())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

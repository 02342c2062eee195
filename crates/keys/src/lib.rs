//! Stable identifiers and the closed value model shared by every layer of
//! the store: tables, columns, and objects are named by keys that outlive
//! row reordering, and values are represented by a single tagged [`Value`]
//! enum covering the closed [`ColumnKind`] set.

mod col_key;
mod decimal128;
mod global_key;
mod kind;
mod literal;
mod object_id;
mod obj_key;
mod table_key;
mod timestamp;
mod value;

pub use col_key::{ColKey, ColumnAttributes, CollectionType};
pub use decimal128::Decimal128;
pub use global_key::GlobalKey;
pub use kind::{is_comparable, kind_of, kind_of_mixed, ColumnKind};
pub use literal::{coerce_literal, LiteralError};
pub use object_id::ObjectId;
pub use obj_key::ObjKey;
pub use table_key::TableKey;
pub use timestamp::{Timestamp, TimestampError};
pub use value::{Mixed, Value};

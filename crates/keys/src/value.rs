use crate::decimal128::Decimal128;
use crate::object_id::ObjectId;
use crate::obj_key::ObjKey;
use crate::timestamp::Timestamp;

/// A concrete value of one of the non-`Mixed`, non-`BackLink` column
/// kinds. `Link` holds the target object's key directly rather than a
/// `(TableKey, ObjKey)` pair, because a link's target table is fixed by
/// the column definition (spec §3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(Timestamp),
    ObjectId(ObjectId),
    Decimal128(Decimal128),
    Uuid(uuid::Uuid),
    Link(ObjKey),
}

/// A `Mixed`-kind cell. `Mixed` storage distinguishes the null value
/// (`Mixed::Null`) from the absent one -- an absent cell is modeled by
/// `Option<Mixed>` at the accessor level, so a list-of-mixed may contain
/// nulls without needing `Option<Option<Mixed>>` (spec §3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Mixed {
    Null,
    Value(Value),
}

impl Mixed {
    pub fn is_null(&self) -> bool {
        matches!(self, Mixed::Null)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Mixed::Null => None,
            Mixed::Value(v) => Some(v),
        }
    }
}

impl From<Value> for Mixed {
    fn from(value: Value) -> Mixed {
        Mixed::Value(value)
    }
}

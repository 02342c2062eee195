use crate::value::{Mixed, Value};

/// The closed set of primitive column kinds, plus the polymorphic `Mixed`
/// kind and the two link kinds. `BackLink` is never chosen by a user;
/// it's synthesized by the schema whenever a `Link`/list-of-`Link` column
/// is added (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ColumnKind {
    Int,
    Bool,
    Float,
    Double,
    String,
    Binary,
    Timestamp,
    ObjectId,
    Decimal128,
    Uuid,
    Link,
    BackLink,
    Mixed,
}

impl ColumnKind {
    /// True for the four kinds the comparability table treats as
    /// mutually comparable numerics (spec §4.1).
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnKind::Int | ColumnKind::Float | ColumnKind::Double | ColumnKind::Decimal128
        )
    }

    // Packs into the kind subfield of a ColKey.
    pub(crate) fn to_code(self) -> u8 {
        match self {
            ColumnKind::Int => 0,
            ColumnKind::Bool => 1,
            ColumnKind::Float => 2,
            ColumnKind::Double => 3,
            ColumnKind::String => 4,
            ColumnKind::Binary => 5,
            ColumnKind::Timestamp => 6,
            ColumnKind::ObjectId => 7,
            ColumnKind::Decimal128 => 8,
            ColumnKind::Uuid => 9,
            ColumnKind::Link => 10,
            ColumnKind::BackLink => 11,
            ColumnKind::Mixed => 12,
        }
    }

    pub(crate) fn from_code(code: u8) -> ColumnKind {
        match code {
            0 => ColumnKind::Int,
            1 => ColumnKind::Bool,
            2 => ColumnKind::Float,
            3 => ColumnKind::Double,
            4 => ColumnKind::String,
            5 => ColumnKind::Binary,
            6 => ColumnKind::Timestamp,
            7 => ColumnKind::ObjectId,
            8 => ColumnKind::Decimal128,
            9 => ColumnKind::Uuid,
            10 => ColumnKind::Link,
            11 => ColumnKind::BackLink,
            _ => ColumnKind::Mixed,
        }
    }
}

/// The kind a concrete [`Value`] carries.
pub fn kind_of(value: &Value) -> ColumnKind {
    match value {
        Value::Int(_) => ColumnKind::Int,
        Value::Bool(_) => ColumnKind::Bool,
        Value::Float(_) => ColumnKind::Float,
        Value::Double(_) => ColumnKind::Double,
        Value::String(_) => ColumnKind::String,
        Value::Binary(_) => ColumnKind::Binary,
        Value::Timestamp(_) => ColumnKind::Timestamp,
        Value::ObjectId(_) => ColumnKind::ObjectId,
        Value::Decimal128(_) => ColumnKind::Decimal128,
        Value::Uuid(_) => ColumnKind::Uuid,
        Value::Link(_) => ColumnKind::Link,
    }
}

/// The kind a runtime `Mixed` cell carries, distinguishing the null value
/// (some kind-less `Mixed` slot holding `Mixed::Null`) from an absent one
/// (the caller never stored anything, modeled by `Option<Mixed>` at the
/// accessor level).
pub fn kind_of_mixed(value: &Mixed) -> Option<ColumnKind> {
    match value {
        Mixed::Null => None,
        Mixed::Value(v) => Some(kind_of(v)),
    }
}

/// Answers "may operator X be applied between a column of kind `k` and a
/// constant of kind `l`", per the comparability table in spec §4.1.
pub fn is_comparable(k: ColumnKind, l: ColumnKind) -> bool {
    if k == ColumnKind::Mixed || l == ColumnKind::Mixed {
        return true;
    }
    if k.is_numeric() && l.is_numeric() {
        return true;
    }
    k == l
}

/// Exactly one of these collection shapes applies to any given column
/// (spec §3: "exactly-one-of `{scalar, list, set, dictionary}`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CollectionType {
    Scalar,
    List,
    Set,
    Dictionary,
}

/// The orthogonal flags a column carries alongside its `CollectionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ColumnAttributes {
    pub collection: CollectionType,
    pub nullable: bool,
    pub indexed: bool,
    pub unique: bool,
    pub strong_link: bool,
}

impl ColumnAttributes {
    pub fn scalar() -> ColumnAttributes {
        ColumnAttributes {
            collection: CollectionType::Scalar,
            nullable: false,
            indexed: false,
            unique: false,
            strong_link: false,
        }
    }

    pub fn nullable(mut self) -> ColumnAttributes {
        self.nullable = true;
        self
    }

    pub fn indexed(mut self) -> ColumnAttributes {
        self.indexed = true;
        self
    }

    pub fn unique(mut self) -> ColumnAttributes {
        self.unique = true;
        self
    }

    pub fn with_collection(mut self, collection: CollectionType) -> ColumnAttributes {
        self.collection = collection;
        self
    }

    // Packs into the bitmask subfield of a ColKey. Bit layout is private
    // to this crate; only ColKey needs it.
    pub(crate) fn to_bits(self) -> u16 {
        let collection_bits: u16 = match self.collection {
            CollectionType::Scalar => 0,
            CollectionType::List => 1,
            CollectionType::Set => 2,
            CollectionType::Dictionary => 3,
        };
        collection_bits
            | (self.nullable as u16) << 2
            | (self.indexed as u16) << 3
            | (self.unique as u16) << 4
            | (self.strong_link as u16) << 5
    }

    pub(crate) fn from_bits(bits: u16) -> ColumnAttributes {
        let collection = match bits & 0b11 {
            0 => CollectionType::Scalar,
            1 => CollectionType::List,
            2 => CollectionType::Set,
            _ => CollectionType::Dictionary,
        };
        ColumnAttributes {
            collection,
            nullable: bits & (1 << 2) != 0,
            indexed: bits & (1 << 3) != 0,
            unique: bits & (1 << 4) != 0,
            strong_link: bits & (1 << 5) != 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_numeric_comparability() {
        assert!(is_comparable(ColumnKind::Int, ColumnKind::Double));
        assert!(is_comparable(ColumnKind::Decimal128, ColumnKind::Float));
        assert!(!is_comparable(ColumnKind::Int, ColumnKind::String));
        assert!(is_comparable(ColumnKind::String, ColumnKind::Mixed));
        assert!(is_comparable(ColumnKind::Bool, ColumnKind::Bool));
        assert!(!is_comparable(ColumnKind::Bool, ColumnKind::Int));
    }

    #[test]
    fn test_attribute_round_trip() {
        let attrs = ColumnAttributes::scalar()
            .nullable()
            .indexed()
            .with_collection(CollectionType::List);
        let bits = attrs.to_bits();
        assert_eq!(ColumnAttributes::from_bits(bits), attrs);
    }
}

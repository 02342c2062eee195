use crate::kind::ColumnKind;
pub use crate::kind::{ColumnAttributes, CollectionType};
use std::fmt;

/// Packed identifier of a column. Carries four logical subfields so that
/// a single 64-bit value answers "what kind is this column, what are its
/// attributes, and is it the same column generation as before" without a
/// side table lookup (spec §3):
///
/// - `leaf_index`: unique within the table, bits 0..20.
/// - `kind`: the column's `ColumnKind`, bits 20..28.
/// - `attrs`: the attribute bitmask, bits 28..44.
/// - `salt`: distinguishes a removed-then-re-added column, bits 44..64.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ColKey(u64);

const LEAF_BITS: u32 = 20;
const KIND_BITS: u32 = 8;
const ATTRS_BITS: u32 = 16;

const LEAF_MASK: u64 = (1 << LEAF_BITS) - 1;
const KIND_SHIFT: u32 = LEAF_BITS;
const KIND_MASK: u64 = (1 << KIND_BITS) - 1;
const ATTRS_SHIFT: u32 = LEAF_BITS + KIND_BITS;
const ATTRS_MASK: u64 = (1 << ATTRS_BITS) - 1;
const SALT_SHIFT: u32 = LEAF_BITS + KIND_BITS + ATTRS_BITS;

impl ColKey {
    pub fn new(leaf_index: u32, kind: ColumnKind, attrs: ColumnAttributes, salt: u16) -> ColKey {
        assert!(leaf_index as u64 <= LEAF_MASK, "leaf index overflows ColKey");
        let packed = (leaf_index as u64 & LEAF_MASK)
            | ((kind.to_code() as u64 & KIND_MASK) << KIND_SHIFT)
            | ((attrs.to_bits() as u64 & ATTRS_MASK) << ATTRS_SHIFT)
            | ((salt as u64) << SALT_SHIFT);
        ColKey(packed)
    }

    pub const fn from_raw(packed: u64) -> ColKey {
        ColKey(packed)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn leaf_index(self) -> u32 {
        (self.0 & LEAF_MASK) as u32
    }

    pub fn kind(self) -> ColumnKind {
        ColumnKind::from_code(((self.0 >> KIND_SHIFT) & KIND_MASK) as u8)
    }

    pub fn attrs(self) -> ColumnAttributes {
        ColumnAttributes::from_bits(((self.0 >> ATTRS_SHIFT) & ATTRS_MASK) as u16)
    }

    pub fn salt(self) -> u16 {
        (self.0 >> SALT_SHIFT) as u16
    }
}

impl fmt::Debug for ColKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColKey")
            .field("leaf_index", &self.leaf_index())
            .field("kind", &self.kind())
            .field("attrs", &self.attrs())
            .field("salt", &self.salt())
            .finish()
    }
}

impl fmt::Display for ColKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col#{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pack_unpack_round_trip() {
        let attrs = ColumnAttributes::scalar().nullable().unique();
        let key = ColKey::new(7, ColumnKind::String, attrs, 3);

        assert_eq!(key.leaf_index(), 7);
        assert_eq!(key.kind(), ColumnKind::String);
        assert_eq!(key.attrs(), attrs);
        assert_eq!(key.salt(), 3);
    }

    #[test]
    fn test_salt_distinguishes_regenerated_column() {
        let attrs = ColumnAttributes::scalar();
        let a = ColKey::new(2, ColumnKind::Int, attrs, 0);
        let b = ColKey::new(2, ColumnKind::Int, attrs, 1);
        assert_ne!(a, b);
        assert_eq!(a.leaf_index(), b.leaf_index());
    }
}

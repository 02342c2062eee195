use std::fmt;

/// Stable identifier of an object within its table.
///
/// An object keeps its key across insertions and deletions of other
/// objects in the same table; a deleted object's key is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ObjKey(u64);

impl ObjKey {
    pub const fn from_raw(ordinal: u64) -> ObjKey {
        ObjKey(ordinal)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

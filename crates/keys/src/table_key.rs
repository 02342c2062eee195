use std::fmt;

/// Opaque, process-stable identifier of a table within a database.
///
/// Allocated sequentially as tables are added to the schema and never
/// reused, even if the table is later dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TableKey(u32);

impl TableKey {
    /// Builds a TableKey from its raw ordinal. Only the schema allocator
    /// and sync's wire decoding should call this directly.
    pub const fn from_raw(ordinal: u32) -> TableKey {
        TableKey(ordinal)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

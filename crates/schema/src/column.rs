use keys::{ColKey, TableKey};

/// Identifies the partner side of a `Link`/`BackLink` pair: which table
/// the link points at (or, for a `BackLink`, which table originates it)
/// and which column on that table is the partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTarget {
    pub table: TableKey,
    pub col: ColKey,
}

/// One column's persisted metadata: its packed key, its display name,
/// and -- for `Link`/`BackLink` columns only -- its partner (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub key: ColKey,
    pub name: String,
    pub link_target: Option<LinkTarget>,
}

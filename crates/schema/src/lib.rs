//! The persisted per-table schema record and the operations that mutate
//! it (spec §3, §4.2): tables, columns, primary keys, embedded tables,
//! and the forward-link/backlink pairing invariant.

mod column;
mod migration;
mod table;

pub use column::{ColumnDef, LinkTarget};
pub use migration::{LegacyColumnKind, MigrationState};
pub use table::TableDef;

use keys::{ColKey, ColumnAttributes, ColumnKind, TableKey};
use std::collections::HashMap;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table {0:?} does not exist")]
    UnknownTable(TableKey),
    #[error("column {1:?} does not exist on table {0:?}")]
    UnknownColumn(TableKey, ColKey),
    #[error("table {0:?} already has a column named {1:?}")]
    DuplicateColumnName(TableKey, String),
    #[error("table {0:?} already has a table named {1:?}")]
    DuplicateTableName(String),
    #[error("link column must name a link_target table")]
    MissingLinkTarget,
    #[error("non-link column must not name a link_target table")]
    UnexpectedLinkTarget,
    #[error("primary key column must be Int, String, ObjectId, or Uuid, got {0:?}")]
    InvalidPrimaryKeyKind(ColumnKind),
    #[error("cannot remove primary key column while table {0:?} has {1} object(s)")]
    PrimaryKeyInUse(TableKey, u64),
    #[error("column {1:?} on table {0:?} is a BackLink and cannot be added or removed directly")]
    BackLinkIsInternal(TableKey, ColKey),
}

/// The full schema of a database: every table's [`TableDef`], keyed by
/// [`TableKey`], plus the migration state of the schema as a whole.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: HashMap<TableKey, TableDef>,
    table_names: HashMap<String, TableKey>,
    next_table_ordinal: u32,
    pub migration_state: MigrationState,
}

impl Schema {
    pub fn new() -> Schema {
        Schema {
            tables: HashMap::new(),
            table_names: HashMap::new(),
            next_table_ordinal: 0,
            migration_state: MigrationState::Ready,
        }
    }

    pub fn table(&self, key: TableKey) -> Option<&TableDef> {
        self.tables.get(&key)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&TableDef> {
        self.table_names.get(name).and_then(|k| self.tables.get(k))
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    pub fn add_table(&mut self, name: impl Into<String>) -> Result<TableKey, SchemaError> {
        let name = name.into();
        if self.table_names.contains_key(&name) {
            return Err(SchemaError::DuplicateTableName(name));
        }
        let key = TableKey::from_raw(self.next_table_ordinal);
        self.next_table_ordinal += 1;

        self.table_names.insert(name.clone(), key);
        self.tables.insert(key, TableDef::new(key, name));
        tracing::debug!(?key, "added table");
        Ok(key)
    }

    /// Adds a column. `link_target` must be `Some(target_table)` exactly
    /// when `kind == ColumnKind::Link`, in which case the partner
    /// `BackLink` column is synthesized atomically in `target_table`
    /// (spec §3 invariants, §4.2).
    pub fn add_column(
        &mut self,
        table: TableKey,
        name: impl Into<String>,
        kind: ColumnKind,
        attrs: ColumnAttributes,
        link_target: Option<TableKey>,
    ) -> Result<ColKey, SchemaError> {
        if kind == ColumnKind::BackLink {
            return Err(SchemaError::MissingLinkTarget);
        }
        match (kind, link_target) {
            (ColumnKind::Link, None) => return Err(SchemaError::MissingLinkTarget),
            (k, Some(_)) if k != ColumnKind::Link => return Err(SchemaError::UnexpectedLinkTarget),
            _ => {}
        }
        if link_target.is_some_and(|t| !self.tables.contains_key(&t)) {
            return Err(SchemaError::UnknownTable(link_target.unwrap()));
        }

        let col_key = self.add_column_inner(table, name, kind, attrs, None)?;

        if let Some(target) = link_target {
            let backlink_name = backlink_column_name(table, col_key);
            let backlink_attrs = ColumnAttributes::scalar().with_collection(keys::CollectionType::List);
            let backlink_key = self.add_column_inner(
                target,
                backlink_name,
                ColumnKind::BackLink,
                backlink_attrs,
                Some(LinkTarget {
                    table,
                    col: col_key,
                }),
            )?;

            // Point the forward link column at its own backlink partner too,
            // so removing one side can find the other without a table scan.
            let t = self.tables.get_mut(&table).unwrap();
            let def = t.column_mut(col_key).unwrap();
            def.link_target = Some(LinkTarget {
                table: target,
                col: backlink_key,
            });
        }

        Ok(col_key)
    }

    fn add_column_inner(
        &mut self,
        table: TableKey,
        name: impl Into<String>,
        kind: ColumnKind,
        attrs: ColumnAttributes,
        link_target: Option<LinkTarget>,
    ) -> Result<ColKey, SchemaError> {
        let t = self.tables.get_mut(&table).ok_or(SchemaError::UnknownTable(table))?;

        let mut name = name.into();
        if name.is_empty() {
            name = format!("col_{}", t.next_ordinal_hint());
        }
        if t.resolve_name(&name).is_some() {
            return Err(SchemaError::DuplicateColumnName(table, name));
        }

        let col_key = t.allocate_column(kind, attrs);
        t.insert_column(ColumnDef {
            key: col_key,
            name,
            link_target,
        });
        Ok(col_key)
    }

    /// Removes a column. For a `Link`/`BackLink` column this removes both
    /// partners atomically (spec §3). Passing a `BackLink` key directly
    /// is rejected -- remove the forward `Link` column instead.
    pub fn remove_column(&mut self, table: TableKey, col: ColKey) -> Result<(), SchemaError> {
        let t = self.tables.get(&table).ok_or(SchemaError::UnknownTable(table))?;
        let def = t
            .column(col)
            .ok_or(SchemaError::UnknownColumn(table, col))?
            .clone();

        if col.kind() == ColumnKind::BackLink {
            return Err(SchemaError::BackLinkIsInternal(table, col));
        }

        if let Some(target) = def.link_target {
            let partner_table = self.tables.get_mut(&target.table).ok_or(SchemaError::UnknownTable(target.table))?;
            partner_table.remove_column(target.col);
        }

        let t = self.tables.get_mut(&table).unwrap();
        if t.primary_key == Some(col) {
            t.primary_key = None;
        }
        t.remove_column(col);
        Ok(())
    }

    /// As [`Self::remove_column`], but first checks the primary-key
    /// non-empty-table invariant using a caller-supplied object count
    /// (spec §4.2). Schema itself has no notion of live objects; the
    /// store layer is the one that knows `table_object_count`.
    pub fn remove_column_checked(
        &mut self,
        table: TableKey,
        col: ColKey,
        table_object_count: u64,
    ) -> Result<(), SchemaError> {
        let t = self.tables.get(&table).ok_or(SchemaError::UnknownTable(table))?;
        if Some(col) == t.primary_key && table_object_count > 0 {
            return Err(SchemaError::PrimaryKeyInUse(table, table_object_count));
        }
        self.remove_column(table, col)
    }

    pub fn rename_column(
        &mut self,
        table: TableKey,
        col: ColKey,
        new_name: impl Into<String>,
    ) -> Result<(), SchemaError> {
        let new_name = new_name.into();
        let t = self.tables.get_mut(&table).ok_or(SchemaError::UnknownTable(table))?;
        if t.resolve_name(&new_name).is_some() {
            return Err(SchemaError::DuplicateColumnName(table, new_name));
        }
        let def = t.column_mut(col).ok_or(SchemaError::UnknownColumn(table, col))?;
        def.name = new_name;
        Ok(())
    }

    pub fn set_primary_key(&mut self, table: TableKey, col: Option<ColKey>) -> Result<(), SchemaError> {
        let t = self.tables.get_mut(&table).ok_or(SchemaError::UnknownTable(table))?;
        if let Some(col) = col {
            let kind = t
                .column(col)
                .ok_or(SchemaError::UnknownColumn(table, col))?
                .key
                .kind();
            if !matches!(
                kind,
                ColumnKind::Int | ColumnKind::String | ColumnKind::ObjectId | ColumnKind::Uuid
            ) {
                return Err(SchemaError::InvalidPrimaryKeyKind(kind));
            }
        }
        t.primary_key = col;
        Ok(())
    }

    pub fn set_embedded(&mut self, table: TableKey, embedded: bool) -> Result<(), SchemaError> {
        let t = self.tables.get_mut(&table).ok_or(SchemaError::UnknownTable(table))?;
        t.embedded = embedded;
        Ok(())
    }

    pub fn resolve_name(&self, table: TableKey, name: &str) -> Option<ColKey> {
        self.tables.get(&table).and_then(|t| t.resolve_name(name))
    }
}

fn backlink_column_name(origin_table: TableKey, origin_col: ColKey) -> String {
    format!("@backlink_{}_{}", origin_table.raw(), origin_col.leaf_index())
}

#[cfg(test)]
mod test {
    use super::*;
    use keys::CollectionType;

    fn fresh_schema() -> (Schema, TableKey, TableKey) {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let teams = schema.add_table("Team").unwrap();
        (schema, people, teams)
    }

    #[test]
    fn test_add_table_rejects_duplicate_name() {
        let mut schema = Schema::new();
        schema.add_table("Person").unwrap();
        assert_eq!(
            schema.add_table("Person"),
            Err(SchemaError::DuplicateTableName("Person".into()))
        );
    }

    #[test]
    fn test_empty_column_name_rewritten() {
        let (mut schema, people, _) = fresh_schema();
        let col = schema
            .add_column(people, "", ColumnKind::Int, ColumnAttributes::scalar(), None)
            .unwrap();
        let def = schema.table(people).unwrap().column(col).unwrap();
        assert!(def.name.starts_with("col_"));
    }

    #[test]
    fn test_add_link_column_synthesizes_backlink() {
        let (mut schema, people, teams) = fresh_schema();
        let link = schema
            .add_column(
                people,
                "team",
                ColumnKind::Link,
                ColumnAttributes::scalar(),
                Some(teams),
            )
            .unwrap();

        let teams_def = schema.table(teams).unwrap();
        let backlinks: Vec<_> = teams_def
            .columns()
            .filter(|c| c.key.kind() == ColumnKind::BackLink)
            .collect();
        assert_eq!(backlinks.len(), 1);
        assert_eq!(backlinks[0].link_target, Some(LinkTarget { table: people, col: link }));
    }

    #[test]
    fn test_remove_link_column_removes_backlink_too() {
        let (mut schema, people, teams) = fresh_schema();
        let link = schema
            .add_column(people, "team", ColumnKind::Link, ColumnAttributes::scalar(), Some(teams))
            .unwrap();

        schema.remove_column(people, link).unwrap();

        let teams_def = schema.table(teams).unwrap();
        assert_eq!(teams_def.columns().filter(|c| c.key.kind() == ColumnKind::BackLink).count(), 0);
    }

    #[test]
    fn test_cannot_remove_backlink_directly() {
        let (mut schema, people, teams) = fresh_schema();
        schema
            .add_column(people, "team", ColumnKind::Link, ColumnAttributes::scalar(), Some(teams))
            .unwrap();
        let backlink = schema
            .table(teams)
            .unwrap()
            .columns()
            .find(|c| c.key.kind() == ColumnKind::BackLink)
            .unwrap()
            .key;
        assert!(matches!(
            schema.remove_column(teams, backlink),
            Err(SchemaError::BackLinkIsInternal(_, _))
        ));
    }

    #[test]
    fn test_primary_key_kind_validated() {
        let (mut schema, people, _) = fresh_schema();
        let col = schema
            .add_column(people, "flag", ColumnKind::Bool, ColumnAttributes::scalar(), None)
            .unwrap();
        assert_eq!(
            schema.set_primary_key(people, Some(col)),
            Err(SchemaError::InvalidPrimaryKeyKind(ColumnKind::Bool))
        );
    }

    #[test]
    fn test_primary_key_not_removable_while_table_non_empty() {
        let (mut schema, people, _) = fresh_schema();
        let col = schema
            .add_column(people, "id", ColumnKind::Int, ColumnAttributes::scalar(), None)
            .unwrap();
        schema.set_primary_key(people, Some(col)).unwrap();

        assert_eq!(
            schema.remove_column_checked(people, col, 1),
            Err(SchemaError::PrimaryKeyInUse(people, 1))
        );
        assert!(schema.remove_column_checked(people, col, 0).is_ok());
    }

    #[test]
    fn test_duplicate_column_name_rejected() {
        let (mut schema, people, _) = fresh_schema();
        schema
            .add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None)
            .unwrap();
        assert_eq!(
            schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None),
            Err(SchemaError::DuplicateColumnName(people, "age".into()))
        );
    }

    #[test]
    fn test_list_attribute_preserved() {
        let (mut schema, people, _) = fresh_schema();
        let col = schema
            .add_column(
                people,
                "tags",
                ColumnKind::String,
                ColumnAttributes::scalar().with_collection(CollectionType::List),
                None,
            )
            .unwrap();
        assert_eq!(col.attrs().collection, CollectionType::List);
    }
}

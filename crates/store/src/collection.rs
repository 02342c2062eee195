use crate::changeset::Mutation;
use crate::database::Cell;
use crate::txn::WriteTransaction;
use crate::{Error, Result};
use keys::{ColKey, Mixed, ObjKey, TableKey, Value};

fn as_link(value: &Mixed) -> Option<ObjKey> {
    match value {
        Mixed::Value(Value::Link(o)) => Some(*o),
        _ => None,
    }
}

/// A handle onto a `list`-attributed column's value (spec §4.3: `size`,
/// `get`, `set`, `add`, `insert`, `move`, `swap`, `remove`,
/// `remove_all`, `delete_at`, `delete_all`, `find`, aggregates).
pub struct ListHandle<'t> {
    txn: &'t mut WriteTransaction,
    table: TableKey,
    obj: ObjKey,
    col: ColKey,
}

impl<'t> ListHandle<'t> {
    pub(crate) fn new(txn: &'t mut WriteTransaction, table: TableKey, obj: ObjKey, col: ColKey) -> ListHandle<'t> {
        ListHandle { txn, table, obj, col }
    }

    fn values(&self) -> Result<Vec<Mixed>> {
        let row = self
            .txn
            .working
            .tables
            .get(&self.table)
            .and_then(|t| t.rows.get(&self.obj))
            .ok_or(Error::UnknownObject(self.table, self.obj))?;
        match row.get(&self.col) {
            Some(Cell::List(values)) => Ok(values.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(Error::wrong_collection(self.col)),
        }
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.values()?.len())
    }

    pub fn get(&self, index: usize) -> Result<Mixed> {
        let values = self.values()?;
        let size = values.len();
        values.into_iter().nth(index).ok_or(Error::OutOfBoundsIndex { index, size })
    }

    pub fn find(&self, value: &Mixed) -> Result<Option<usize>> {
        Ok(self.values()?.iter().position(|v| v == value))
    }

    pub fn add(&mut self, value: Mixed) -> Result<usize> {
        let index = self.values()?.len();
        self.insert(index, value)?;
        Ok(index)
    }

    pub fn insert(&mut self, index: usize, value: Mixed) -> Result<()> {
        if let Some(target) = as_link(&value) {
            self.txn.on_link_added(self.table, self.obj, self.col, target);
        }
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::List(values) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        if index > values.len() {
            return Err(Error::OutOfBoundsIndex { index, size: values.len() });
        }
        values.insert(index, value.clone());
        self.txn.record(Mutation::ListInsert {
            table: self.table,
            obj: self.obj,
            col: self.col,
            index,
            value,
        });
        Ok(())
    }

    pub fn set(&mut self, index: usize, value: Mixed) -> Result<()> {
        let old = self.get(index)?;
        if let Some(old_target) = as_link(&old) {
            self.txn.on_link_removed(self.table, self.obj, self.col, old_target);
        }
        if let Some(new_target) = as_link(&value) {
            self.txn.on_link_added(self.table, self.obj, self.col, new_target);
        }
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::List(values) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        if index >= values.len() {
            return Err(Error::OutOfBoundsIndex { index, size: values.len() });
        }
        values[index] = value.clone();
        self.txn.record(Mutation::ListSet {
            table: self.table,
            obj: self.obj,
            col: self.col,
            index,
            value,
        });
        Ok(())
    }

    pub fn move_to(&mut self, from: usize, to: usize) -> Result<()> {
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::List(values) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        if from >= values.len() || to >= values.len() {
            return Err(Error::OutOfBoundsIndex { index: from.max(to), size: values.len() });
        }
        let value = values.remove(from);
        values.insert(to, value);
        self.txn.record(Mutation::ListMove { table: self.table, obj: self.obj, col: self.col, from, to });
        Ok(())
    }

    pub fn swap(&mut self, i: usize, j: usize) -> Result<()> {
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::List(values) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        if i >= values.len() || j >= values.len() {
            return Err(Error::OutOfBoundsIndex { index: i.max(j), size: values.len() });
        }
        values.swap(i, j);
        self.txn.record(Mutation::ListMove { table: self.table, obj: self.obj, col: self.col, from: i, to: j });
        self.txn.record(Mutation::ListMove { table: self.table, obj: self.obj, col: self.col, from: j, to: i });
        Ok(())
    }

    /// Removes the entry at `index`. If the column is a `Link` into an
    /// embedded table, the target object is cascade-deleted (spec §4.3,
    /// §4.4).
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let removed = self.get(index)?;
        if let Some(target) = as_link(&removed) {
            self.txn.on_link_removed(self.table, self.obj, self.col, target);
        }
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::List(values) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        if index >= values.len() {
            return Err(Error::OutOfBoundsIndex { index, size: values.len() });
        }
        values.remove(index);
        self.txn.record(Mutation::ListErase { table: self.table, obj: self.obj, col: self.col, index });

        if let Some(target) = as_link(&removed) {
            self.txn.remove_if_embedded(self.table, self.col, target)?;
        }
        Ok(())
    }

    pub fn remove_all(&mut self) -> Result<()> {
        let len = self.values()?.len();
        for i in (0..len).rev() {
            self.remove(i)?;
        }
        self.txn.record(Mutation::ListClear { table: self.table, obj: self.obj, col: self.col });
        Ok(())
    }

    pub fn delete_at(&mut self, index: usize) -> Result<()> {
        self.remove(index)
    }

    pub fn delete_all(&mut self) -> Result<()> {
        self.remove_all()
    }

    pub fn sum(&self) -> Result<f64> {
        Ok(self.values()?.iter().filter_map(numeric_of).sum())
    }

    pub fn min(&self) -> Result<Option<f64>> {
        Ok(self.values()?.iter().filter_map(numeric_of).fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v)))))
    }

    pub fn max(&self) -> Result<Option<f64>> {
        Ok(self.values()?.iter().filter_map(numeric_of).fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v)))))
    }

    pub fn avg(&self) -> Result<Option<f64>> {
        let values: Vec<f64> = self.values()?.iter().filter_map(numeric_of).collect();
        if values.is_empty() {
            Ok(None)
        } else {
            Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
        }
    }
}

fn numeric_of(value: &Mixed) -> Option<f64> {
    match value {
        Mixed::Value(Value::Int(i)) => Some(*i as f64),
        Mixed::Value(Value::Float(f)) => Some(*f as f64),
        Mixed::Value(Value::Double(d)) => Some(*d),
        _ => None,
    }
}

/// A handle onto a `set`-attributed column's value (spec §4.3).
pub struct SetHandle<'t> {
    txn: &'t mut WriteTransaction,
    table: TableKey,
    obj: ObjKey,
    col: ColKey,
}

impl<'t> SetHandle<'t> {
    pub(crate) fn new(txn: &'t mut WriteTransaction, table: TableKey, obj: ObjKey, col: ColKey) -> SetHandle<'t> {
        SetHandle { txn, table, obj, col }
    }

    fn values(&self) -> Result<Vec<Mixed>> {
        let row = self
            .txn
            .working
            .tables
            .get(&self.table)
            .and_then(|t| t.rows.get(&self.obj))
            .ok_or(Error::UnknownObject(self.table, self.obj))?;
        match row.get(&self.col) {
            Some(Cell::Set(values)) => Ok(values.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(Error::wrong_collection(self.col)),
        }
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.values()?.len())
    }

    pub fn contains(&self, value: &Mixed) -> Result<bool> {
        Ok(self.values()?.iter().any(|v| v == value))
    }

    pub fn add(&mut self, value: Mixed) -> Result<bool> {
        if self.contains(&value)? {
            return Ok(false);
        }
        if let Some(target) = as_link(&value) {
            self.txn.on_link_added(self.table, self.obj, self.col, target);
        }
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::Set(values) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        values.push(value.clone());
        self.txn.record(Mutation::SetInsert { table: self.table, obj: self.obj, col: self.col, value });
        Ok(true)
    }

    pub fn remove(&mut self, value: &Mixed) -> Result<bool> {
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::Set(values) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        let Some(pos) = values.iter().position(|v| v == value) else {
            return Ok(false);
        };
        values.remove(pos);
        if let Some(target) = as_link(value) {
            self.txn.on_link_removed(self.table, self.obj, self.col, target);
        }
        self.txn.record(Mutation::SetErase { table: self.table, obj: self.obj, col: self.col, value: value.clone() });
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        for value in self.values()? {
            self.remove(&value)?;
        }
        self.txn.record(Mutation::SetClear { table: self.table, obj: self.obj, col: self.col });
        Ok(())
    }
}

/// A handle onto a `dictionary`-attributed column's value (spec §4.3):
/// a `String`-keyed map of `Mixed` values.
pub struct Dictionary<'t> {
    txn: &'t mut WriteTransaction,
    table: TableKey,
    obj: ObjKey,
    col: ColKey,
}

impl<'t> Dictionary<'t> {
    pub(crate) fn new(txn: &'t mut WriteTransaction, table: TableKey, obj: ObjKey, col: ColKey) -> Dictionary<'t> {
        Dictionary { txn, table, obj, col }
    }

    fn entries(&self) -> Result<Vec<(String, Mixed)>> {
        let row = self
            .txn
            .working
            .tables
            .get(&self.table)
            .and_then(|t| t.rows.get(&self.obj))
            .ok_or(Error::UnknownObject(self.table, self.obj))?;
        match row.get(&self.col) {
            Some(Cell::Dict(entries)) => Ok(entries.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(Error::wrong_collection(self.col)),
        }
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn get(&self, key: &str) -> Result<Option<Mixed>> {
        Ok(self.entries()?.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|(k, _)| k).collect())
    }

    pub fn set(&mut self, key: impl Into<String>, value: Mixed) -> Result<()> {
        let key = key.into();
        if let Some(target) = as_link(&value) {
            self.txn.on_link_added(self.table, self.obj, self.col, target);
        }
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::Dict(entries) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        if let Some(existing) = entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value.clone();
        } else {
            entries.push((key.clone(), value.clone()));
        }
        self.txn.record(Mutation::DictSet { table: self.table, obj: self.obj, col: self.col, key, value });
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Mixed>> {
        let cell = self.txn.cell_mut(self.table, self.obj, self.col)?;
        let Cell::Dict(entries) = cell else {
            return Err(Error::wrong_collection(self.col));
        };
        let Some(pos) = entries.iter().position(|(k, _)| k == key) else {
            return Ok(None);
        };
        let (_, value) = entries.remove(pos);
        if let Some(target) = as_link(&value) {
            self.txn.on_link_removed(self.table, self.obj, self.col, target);
        }
        self.txn.record(Mutation::DictErase { table: self.table, obj: self.obj, col: self.col, key: key.to_string() });
        Ok(Some(value))
    }

    pub fn clear(&mut self) -> Result<()> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        self.txn.record(Mutation::DictClear { table: self.table, obj: self.obj, col: self.col });
        Ok(())
    }
}

use crate::txn::WriteTransaction;
use crate::{Dictionary, ListHandle, Result, SetHandle};
use keys::{ColKey, Mixed, ObjKey, TableKey, Value};

/// A handle onto one object's row, borrowed from a [`WriteTransaction`]
/// (spec §4.3: "typed get/set"). Dropped at the end of its borrow; there
/// is nothing to flush, since every call writes straight through to the
/// transaction's working copy.
pub struct Object<'t> {
    txn: &'t mut WriteTransaction,
    table: TableKey,
    obj: ObjKey,
}

impl<'t> Object<'t> {
    pub(crate) fn new(txn: &'t mut WriteTransaction, table: TableKey, obj: ObjKey) -> Object<'t> {
        Object { txn, table, obj }
    }

    pub fn key(&self) -> ObjKey {
        self.obj
    }

    pub fn get(&self, col: ColKey) -> Result<Mixed> {
        self.txn.get_value(self.table, self.obj, col)
    }

    pub fn set(&mut self, col: ColKey, value: Mixed) -> Result<()> {
        self.txn.set_value(self.table, self.obj, col, value)
    }

    pub fn set_link(&mut self, col: ColKey, target: ObjKey) -> Result<()> {
        self.set(col, Mixed::Value(Value::Link(target)))
    }

    pub fn list(&mut self, col: ColKey) -> ListHandle<'_> {
        ListHandle::new(self.txn, self.table, self.obj, col)
    }

    pub fn set_collection(&mut self, col: ColKey) -> SetHandle<'_> {
        SetHandle::new(self.txn, self.table, self.obj, col)
    }

    pub fn dictionary(&mut self, col: ColKey) -> Dictionary<'_> {
        Dictionary::new(self.txn, self.table, self.obj, col)
    }

    /// Removes the underlying object (spec §4.3 `remove()`), cascading
    /// through embedded link targets and clearing incoming links.
    pub fn remove(self) -> Result<()> {
        self.txn.remove_object(self.table, self.obj)
    }
}


use crate::txn::ReadTransaction;
use crate::Result;
use keys::{ColKey, Mixed, ObjKey, TableKey, Value};
use std::cmp::Ordering as CmpOrdering;

/// How a [`Results`] set presents its members (spec §4.3: "`Results`
/// over table/list/query with `unordered`/`insertion`/`sorted`
/// ordering").
#[derive(Debug, Clone)]
pub enum Ordering {
    /// No particular order is promised; iteration follows internal
    /// storage order. Cheapest to produce.
    Unordered,
    /// The order objects were created in.
    Insertion,
    /// Ascending (or, with `true`, descending) by each named column in
    /// turn.
    Sorted(Vec<(ColKey, bool)>),
}

/// A live-at-a-version collection of objects (spec §4.3, §4.8). This is
/// the base every table/list/query result set is built from; `query`
/// layers predicate filtering and `DescriptorOrdering` on top, `notify`
/// layers change tracking on top of that.
pub struct Results {
    table: TableKey,
    objects: Vec<ObjKey>,
}

impl Results {
    pub fn table(&self) -> TableKey {
        self.table
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjKey> + '_ {
        self.objects.iter().copied()
    }

    pub fn get(&self, index: usize) -> Option<ObjKey> {
        self.objects.get(index).copied()
    }
}

impl ReadTransaction {
    /// Builds a [`Results`] over every object in `table`, in the
    /// requested [`Ordering`].
    pub fn results(&self, table: TableKey, ordering: Ordering) -> Result<Results> {
        let mut objects = self.objects(table)?;
        match ordering {
            Ordering::Unordered | Ordering::Insertion => {}
            Ordering::Sorted(keys) => {
                objects.sort_by(|a, b| self.compare_by_keys(table, *a, *b, &keys));
            }
        }
        Ok(Results { table, objects })
    }

    fn compare_by_keys(&self, table: TableKey, a: ObjKey, b: ObjKey, keys: &[(ColKey, bool)]) -> CmpOrdering {
        for (col, descending) in keys {
            let va = self.get_value(table, a, *col).unwrap_or(Mixed::Null);
            let vb = self.get_value(table, b, *col).unwrap_or(Mixed::Null);
            let ord = compare_mixed(&va, &vb);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != CmpOrdering::Equal {
                return ord;
            }
        }
        CmpOrdering::Equal
    }
}

/// Total order over [`Mixed`] values used for `Sorted` results: `Null`
/// sorts least, numerics compare across kind by magnitude (matching the
/// comparability table in spec §4.1), and otherwise same-kind values
/// compare structurally. Comparing across non-numeric, differing kinds
/// is defined as equal -- query's compiler is the layer responsible for
/// rejecting incomparable sort keys before they reach here.
pub fn compare_mixed(a: &Mixed, b: &Mixed) -> CmpOrdering {
    match (a, b) {
        (Mixed::Null, Mixed::Null) => CmpOrdering::Equal,
        (Mixed::Null, _) => CmpOrdering::Less,
        (_, Mixed::Null) => CmpOrdering::Greater,
        (Mixed::Value(va), Mixed::Value(vb)) => compare_value(va, vb),
    }
}

fn compare_value(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
        (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
        (Value::Link(a), Value::Link(b)) => a.cmp(b),
        _ => match (numeric_of(a), numeric_of(b)) {
            (Some(a), Some(b)) => total_cmp_f64(a, b),
            _ => CmpOrdering::Equal,
        },
    }
}

fn numeric_of(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f as f64),
        Value::Double(d) => Some(*d),
        Value::Decimal128(d) => Some(d.to_f64_approx()),
        _ => None,
    }
}

// NaN sorts greatest, matching Decimal128's own total order (spec §4.7),
// so a Double NaN and a Decimal128 NaN end up in the same tail position.
fn total_cmp_f64(a: f64, b: f64) -> CmpOrdering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => CmpOrdering::Equal,
        (true, false) => CmpOrdering::Greater,
        (false, true) => CmpOrdering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal),
    }
}

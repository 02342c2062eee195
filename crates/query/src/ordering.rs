use keys::{ColKey, Mixed, ObjKey, TableKey};
use std::cmp::Ordering as CmpOrdering;
use store::{compare_mixed, ReadTransaction};

/// The `sort`/`distinct`/`limit` descriptors layered on top of a
/// predicate match (spec §4.3, §4.8), applied in that order: sorting
/// establishes the order `distinct` walks to decide which duplicate of
/// a run it keeps, and `limit` always applies last.
#[derive(Debug, Clone, Default)]
pub struct DescriptorOrdering {
    sort: Vec<(ColKey, bool)>,
    distinct: Vec<ColKey>,
    limit: Option<usize>,
}

impl DescriptorOrdering {
    pub fn new() -> DescriptorOrdering {
        DescriptorOrdering::default()
    }

    pub fn sort_by(mut self, col: ColKey, descending: bool) -> DescriptorOrdering {
        self.sort.push((col, descending));
        self
    }

    pub fn distinct_by(mut self, col: ColKey) -> DescriptorOrdering {
        self.distinct.push(col);
        self
    }

    pub fn limit(mut self, n: usize) -> DescriptorOrdering {
        self.limit = Some(n);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sort.is_empty() && self.distinct.is_empty() && self.limit.is_none()
    }

    /// Appends `other`'s sort/distinct terms after this ordering's own,
    /// and tightens `limit` to whichever of the two is smaller. Used to
    /// compose a predicate text's own `SORT`/`DISTINCT`/`LIMIT` suffix
    /// (spec §6) with an ordering supplied separately by the caller.
    pub fn merge(mut self, other: &DescriptorOrdering) -> DescriptorOrdering {
        self.sort.extend(other.sort.iter().cloned());
        self.distinct.extend(other.distinct.iter().cloned());
        self.limit = match (self.limit, other.limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, None) => a,
            (None, b) => b,
        };
        self
    }

    pub fn apply(&self, txn: &ReadTransaction, table: TableKey, mut objects: Vec<ObjKey>) -> Vec<ObjKey> {
        if !self.sort.is_empty() {
            objects.sort_by(|a, b| compare_by_sort_keys(txn, table, *a, *b, &self.sort));
        }

        if !self.distinct.is_empty() {
            let mut seen_keys: Vec<Vec<Mixed>> = Vec::new();
            objects.retain(|obj| {
                let key: Vec<Mixed> = self
                    .distinct
                    .iter()
                    .map(|col| txn.get_value(table, *obj, *col).unwrap_or(Mixed::Null))
                    .collect();
                if seen_keys.iter().any(|k| *k == key) {
                    false
                } else {
                    seen_keys.push(key);
                    true
                }
            });
        }

        if let Some(n) = self.limit {
            objects.truncate(n);
        }

        objects
    }
}

fn compare_by_sort_keys(txn: &ReadTransaction, table: TableKey, a: ObjKey, b: ObjKey, keys: &[(ColKey, bool)]) -> CmpOrdering {
    for (col, descending) in keys {
        let va = txn.get_value(table, a, *col).unwrap_or(Mixed::Null);
        let vb = txn.get_value(table, b, *col).unwrap_or(Mixed::Null);
        let ord = compare_mixed(&va, &vb);
        let ord = if *descending { ord.reverse() } else { ord };
        if ord != CmpOrdering::Equal {
            return ord;
        }
    }
    CmpOrdering::Equal
}

#[cfg(test)]
mod test {
    use super::*;
    use keys::{ColumnAttributes, ColumnKind};
    use schema::Schema;
    use store::Database;

    #[tokio::test]
    async fn test_sort_then_limit() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let age = schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
        let db = Database::open(schema);

        let mut wtx = db.begin_write().await.unwrap();
        let mut objs = Vec::new();
        for value in [30, 10, 20] {
            let obj = wtx.create_object(people, None).unwrap();
            wtx.object(people, obj).unwrap().set(age, keys::Value::Int(value).into()).unwrap();
            objs.push(obj);
        }
        wtx.commit().unwrap();

        let rtx = db.read();
        let ordering = DescriptorOrdering::new().sort_by(age, false).limit(2);
        let ordered = ordering.apply(&rtx, people, objs);
        assert_eq!(ordered.len(), 2);
        assert_eq!(rtx.get_value(people, ordered[0], age).unwrap(), keys::Mixed::Value(keys::Value::Int(10)));
        assert_eq!(rtx.get_value(people, ordered[1], age).unwrap(), keys::Mixed::Value(keys::Value::Int(20)));
    }

    #[test]
    fn test_merge_takes_the_tighter_limit() {
        let a = DescriptorOrdering::new().limit(5);
        let b = DescriptorOrdering::new().limit(2);
        assert_eq!(a.merge(&b).limit, Some(2));
    }
}

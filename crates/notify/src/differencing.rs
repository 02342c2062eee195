use crate::changeset::ChangeSet;
use keys::{ColKey, ObjKey, TableKey};
use std::collections::{HashMap, HashSet};
use store::{LogEntry, Mutation, Version};

/// Computes the minimal [`ChangeSet`] between two committed orderings of
/// the same live view, using `ObjKey` identity (not row position) so
/// that an unrelated reorder of other rows never surfaces as a spurious
/// modification (spec §4.8 step 2).
pub(crate) fn diff(table: TableKey, old_objects: &[ObjKey], new_objects: &[ObjKey], old_version: Version, new_version: Version, log: &[LogEntry]) -> ChangeSet {
    let old_index: HashMap<ObjKey, usize> = old_objects.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    let new_index: HashMap<ObjKey, usize> = new_objects.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let deletions = old_objects.iter().enumerate().filter(|(_, k)| !new_index.contains_key(k)).map(|(i, _)| i).collect();

    let insertions = new_objects.iter().enumerate().filter(|(_, k)| !old_index.contains_key(k)).map(|(i, _)| i).collect();

    let moves = moved_pairs(new_objects, &old_index, &new_index);

    let mut touched = touched_objects(table, old_version, new_version, log);
    let mut modifications = std::collections::BTreeSet::new();
    let mut columns: HashMap<ColKey, std::collections::BTreeSet<usize>> = HashMap::new();
    for (obj, cols) in touched.drain() {
        // A row that was created this round is covered by `insertions`,
        // not `modifications`; only rows present both before and after
        // can be "modified".
        if !old_index.contains_key(&obj) {
            continue;
        }
        if let Some(&idx) = new_index.get(&obj) {
            modifications.insert(idx);
            for col in cols {
                columns.entry(col).or_default().insert(idx);
            }
        }
    }

    ChangeSet { insertions, deletions, modifications, moves, columns }
}

/// Objects whose relative order changed are exactly those *not*
/// participating in the longest increasing subsequence of old-indices
/// taken in new-order -- the standard minimal-reorder construction.
fn moved_pairs(new_objects: &[ObjKey], old_index: &HashMap<ObjKey, usize>, new_index: &HashMap<ObjKey, usize>) -> Vec<(usize, usize)> {
    let common: Vec<(ObjKey, usize)> = new_objects.iter().filter_map(|k| old_index.get(k).map(|&old_pos| (*k, old_pos))).collect();
    let old_positions: Vec<usize> = common.iter().map(|(_, old_pos)| *old_pos).collect();
    let kept = longest_increasing_subsequence(&old_positions);

    common
        .iter()
        .enumerate()
        .filter(|(i, _)| !kept.contains(i))
        .map(|(_, (k, old_pos))| (*old_pos, new_index[k]))
        .collect()
}

/// Indices (into `values`) participating in a longest non-decreasing
/// subsequence, via patience sorting (O(n log n)).
fn longest_increasing_subsequence(values: &[usize]) -> HashSet<usize> {
    if values.is_empty() {
        return HashSet::new();
    }
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; values.len()];

    for i in 0..values.len() {
        let v = values[i];
        let pos = tails.partition_point(|&tail_idx| values[tail_idx] <= v);
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
        prev[i] = if pos > 0 { Some(tails[pos - 1]) } else { None };
    }

    let mut kept = HashSet::new();
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        kept.insert(i);
        cursor = prev[i];
    }
    kept
}

/// Objects in `table` touched by any mutation in the versions
/// `(old_version, new_version]`, along with the specific columns each
/// was touched on (empty for whole-object mutations like create/erase).
pub(crate) fn touched_objects(table: TableKey, old_version: Version, new_version: Version, log: &[LogEntry]) -> HashMap<ObjKey, HashSet<ColKey>> {
    let mut touched: HashMap<ObjKey, HashSet<ColKey>> = HashMap::new();
    for entry in log {
        if entry.version <= old_version || entry.version > new_version {
            continue;
        }
        for mutation in &entry.mutations {
            if let Some((mutation_table, obj, col)) = mutation_target(mutation) {
                if mutation_table != table {
                    continue;
                }
                let columns = touched.entry(obj).or_default();
                if let Some(col) = col {
                    columns.insert(col);
                }
            }
        }
    }
    touched
}

fn mutation_target(mutation: &Mutation) -> Option<(TableKey, ObjKey, Option<ColKey>)> {
    use Mutation::*;
    Some(match *mutation {
        CreateObject { table, obj } => (table, obj, None),
        EraseObject { table, obj } => (table, obj, None),
        Set { table, obj, col, .. } => (table, obj, Some(col)),
        ListInsert { table, obj, col, .. } => (table, obj, Some(col)),
        ListSet { table, obj, col, .. } => (table, obj, Some(col)),
        ListMove { table, obj, col, .. } => (table, obj, Some(col)),
        ListErase { table, obj, col, .. } => (table, obj, Some(col)),
        ListClear { table, obj, col } => (table, obj, Some(col)),
        SetInsert { table, obj, col, .. } => (table, obj, Some(col)),
        SetErase { table, obj, col, .. } => (table, obj, Some(col)),
        SetClear { table, obj, col } => (table, obj, Some(col)),
        DictSet { table, obj, col, .. } => (table, obj, Some(col)),
        DictErase { table, obj, col, .. } => (table, obj, Some(col)),
        DictClear { table, obj, col } => (table, obj, Some(col)),
    })
}

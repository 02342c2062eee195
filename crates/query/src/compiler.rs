use crate::arguments::Arguments;
use crate::ast::{AggrOp, ConstantLit, Descriptor, EqOp, Expr, PathSegment, PropertyPath, Quantifier, RelOp, StringOpKind, ValueExpr};
use crate::ordering::DescriptorOrdering;
use keys::{coerce_literal, is_comparable, CollectionType, ColKey, ColumnKind, Mixed, ObjKey, TableKey, Value};
use schema::{LinkTarget, Schema};
use store::ReadTransaction;
use std::cmp::Ordering as CmpOrdering;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CompileError {
    #[error("table {0:?} does not exist")]
    UnknownTable(TableKey),
    #[error("table {0:?} has no property named {1:?}")]
    UnknownProperty(TableKey, String),
    #[error("@links.{0}.{1} does not name a link column targeting this table")]
    UnknownBackLink(String, String),
    #[error("property {0:?} does not continue into a link")]
    NotALink(ColKey),
    #[error("@size/.length must follow a collection property")]
    InvalidSizeOf,
    #[error("argument ${0} was not bound")]
    MissingArgument(usize),
    #[error("{0:?} and {1:?} are not comparable")]
    Incomparable(ColumnKind, ColumnKind),
    #[error("sort/distinct property {0:?} must be a direct field of the queried table")]
    InvalidSortProperty(String),
    #[error(transparent)]
    Literal(#[from] keys::LiteralError),
}

/// One step of a property path resolved against a [`Schema`] (spec
/// §4.5, §6): either a column read (hopping to `hop_to`'s table when the
/// path continues past it) or a collection-size read of the preceding
/// field.
#[derive(Debug, Clone, PartialEq)]
enum PathStep {
    Field { col: ColKey, hop_to: Option<TableKey> },
    SizeOf(ColKey),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    quantifier: Quantifier,
    steps: Vec<PathStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CValue {
    Path(ResolvedPath),
    Constant(Mixed),
    Aggr { path: ResolvedPath, op: AggrOp },
    Subquery { base: ResolvedPath, predicate: Box<CExpr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CExpr {
    Or(Vec<CExpr>),
    And(Vec<CExpr>),
    Not(Box<CExpr>),
    True,
    False,
    Equality { lhs: CValue, op: EqOp, rhs: CValue, case_insensitive: bool },
    Relational { lhs: CValue, op: RelOp, rhs: CValue },
    StringOp { lhs: CValue, op: StringOpKind, rhs: CValue, case_insensitive: bool },
    Between { value: CValue, lo: CValue, hi: CValue },
}

/// A predicate resolved and validated against a [`Schema`], ready to be
/// evaluated against objects read from a [`ReadTransaction`] (spec §4.5,
/// §6). Produced by [`compile`], never constructed directly.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    table: TableKey,
    expr: CExpr,
}

impl CompiledPredicate {
    pub fn table(&self) -> TableKey {
        self.table
    }

    pub fn evaluate(&self, txn: &ReadTransaction, obj: ObjKey) -> Result<bool, store::Error> {
        evaluate(&self.expr, txn, self.table, obj)
    }
}

pub fn compile(schema: &Schema, table: TableKey, expr: &Expr, args: &Arguments) -> Result<CompiledPredicate, CompileError> {
    let compiler = Compiler { schema, args };
    Ok(CompiledPredicate { table, expr: compiler.compile(table, expr)? })
}

/// Resolves a name-based [`Descriptor`] (the `SORT`/`DISTINCT`/`LIMIT`
/// suffix produced by [`crate::parse`]) against `schema` into a
/// [`DescriptorOrdering`] (spec §4.6, §4.8). Sort and distinct terms must
/// name a direct field of `table`; they do not hop across links.
pub fn resolve_descriptor(schema: &Schema, table: TableKey, descriptor: &Descriptor) -> Result<DescriptorOrdering, CompileError> {
    let mut ordering = DescriptorOrdering::new();
    for (path, descending) in &descriptor.sort {
        ordering = ordering.sort_by(resolve_descriptor_column(schema, table, path)?, *descending);
    }
    for path in &descriptor.distinct {
        ordering = ordering.distinct_by(resolve_descriptor_column(schema, table, path)?);
    }
    if let Some(n) = descriptor.limit {
        ordering = ordering.limit(n);
    }
    Ok(ordering)
}

fn resolve_descriptor_column(schema: &Schema, table: TableKey, path: &PropertyPath) -> Result<ColKey, CompileError> {
    let [PathSegment::Field(name)] = path.segments.as_slice() else {
        let rendered = path
            .segments
            .iter()
            .map(|s| match s {
                PathSegment::Field(n) => n.clone(),
                PathSegment::Size => "length".into(),
                PathSegment::BackLink { table, column } => format!("@links.{table}.{column}"),
            })
            .collect::<Vec<_>>()
            .join(".");
        return Err(CompileError::InvalidSortProperty(rendered));
    };
    let def = schema.table(table).ok_or(CompileError::UnknownTable(table))?;
    def.resolve_name(name).ok_or_else(|| CompileError::UnknownProperty(table, name.clone()))
}

struct Compiler<'s> {
    schema: &'s Schema,
    args: &'s Arguments,
}

impl<'s> Compiler<'s> {
    fn compile(&self, table: TableKey, expr: &Expr) -> Result<CExpr, CompileError> {
        Ok(match expr {
            Expr::Or(terms) => CExpr::Or(terms.iter().map(|t| self.compile(table, t)).collect::<Result<_, _>>()?),
            Expr::And(terms) => CExpr::And(terms.iter().map(|t| self.compile(table, t)).collect::<Result<_, _>>()?),
            Expr::Not(inner) => CExpr::Not(Box::new(self.compile(table, inner)?)),
            Expr::Parens(inner) => self.compile(table, inner)?,
            Expr::True => CExpr::True,
            Expr::False => CExpr::False,
            Expr::Equality { lhs, op, rhs, case_insensitive, .. } => {
                let (lhs, rhs) = self.compile_pair(table, lhs, rhs)?;
                CExpr::Equality { lhs, op: *op, rhs, case_insensitive: *case_insensitive }
            }
            Expr::Relational { lhs, op, rhs, .. } => {
                let (lhs, rhs) = self.compile_pair(table, lhs, rhs)?;
                let (lk, rk) = (self.value_kind_hint(&lhs), self.value_kind_hint(&rhs));
                if !is_comparable(lk, rk) {
                    return Err(CompileError::Incomparable(lk, rk));
                }
                CExpr::Relational { lhs, op: *op, rhs }
            }
            Expr::StringOp { lhs, op, rhs, case_insensitive, .. } => {
                let (lhs, rhs) = self.compile_pair(table, lhs, rhs)?;
                CExpr::StringOp { lhs, op: *op, rhs, case_insensitive: *case_insensitive }
            }
            Expr::Between { value, lo, hi, .. } => {
                let value = self.compile_value(table, value)?;
                let kind = self.value_kind_hint(&value);
                let lo = self.compile_with_hint(table, lo, kind)?;
                let hi = self.compile_with_hint(table, hi, kind)?;
                CExpr::Between { value, lo, hi }
            }
        })
    }

    fn compile_with_hint(&self, table: TableKey, v: &ValueExpr, kind: ColumnKind) -> Result<CValue, CompileError> {
        match v {
            ValueExpr::Constant(lit) => Ok(CValue::Constant(self.lower_constant(lit, kind)?)),
            _ => self.compile_value(table, v),
        }
    }

    /// Compiles a comparison's two operands together so a bare constant
    /// on either side can be parsed using the other side's resolved
    /// column kind (spec §4.1: literal coercion against sibling kind).
    fn compile_pair(&self, table: TableKey, lhs: &ValueExpr, rhs: &ValueExpr) -> Result<(CValue, CValue), CompileError> {
        match (lhs, rhs) {
            (ValueExpr::Constant(l), ValueExpr::Constant(r)) => Ok((
                CValue::Constant(self.lower_constant(l, ColumnKind::Mixed)?),
                CValue::Constant(self.lower_constant(r, ColumnKind::Mixed)?),
            )),
            (ValueExpr::Constant(l), _) => {
                let rhs = self.compile_value(table, rhs)?;
                let kind = self.value_kind_hint(&rhs);
                Ok((CValue::Constant(self.lower_constant(l, kind)?), rhs))
            }
            (_, ValueExpr::Constant(r)) => {
                let lhs = self.compile_value(table, lhs)?;
                let kind = self.value_kind_hint(&lhs);
                Ok((lhs, CValue::Constant(self.lower_constant(r, kind)?)))
            }
            _ => Ok((self.compile_value(table, lhs)?, self.compile_value(table, rhs)?)),
        }
    }

    fn compile_value(&self, table: TableKey, v: &ValueExpr) -> Result<CValue, CompileError> {
        Ok(match v {
            ValueExpr::Property(path) => CValue::Path(self.resolve_path(table, path)?),
            ValueExpr::Constant(lit) => CValue::Constant(self.lower_constant(lit, ColumnKind::Mixed)?),
            ValueExpr::Argument(n) => CValue::Constant(self.args.get(*n).cloned().ok_or(CompileError::MissingArgument(*n))?),
            ValueExpr::ListAggr { path, op } => CValue::Aggr { path: self.resolve_path(table, path)?, op: *op },
            ValueExpr::LinkAggr { path, op, target } => {
                let (mut resolved, target_table) = self.resolve_link_path(table, path)?;
                let target_path = PropertyPath { quantifier: Quantifier::Unspecified, segments: target.clone() };
                let (target_resolved, _) = self.resolve_path_impl(target_table, &target_path, false)?;
                resolved.steps.extend(target_resolved.steps);
                CValue::Aggr { path: resolved, op: *op }
            }
            ValueExpr::Subquery { base, predicate, .. } => {
                let (resolved, target_table) = self.resolve_link_path(table, base)?;
                let compiled = self.compile(target_table, predicate)?;
                CValue::Subquery { base: resolved, predicate: Box::new(compiled) }
            }
        })
    }

    fn value_kind_hint(&self, v: &CValue) -> ColumnKind {
        match v {
            CValue::Path(p) => terminal_kind(p),
            CValue::Aggr { op: AggrOp::Count, .. } => ColumnKind::Int,
            CValue::Aggr { .. } => ColumnKind::Double,
            CValue::Subquery { .. } => ColumnKind::Int,
            CValue::Constant(m) => keys::kind_of_mixed(m).unwrap_or(ColumnKind::Mixed),
        }
    }

    fn lower_constant(&self, lit: &ConstantLit, kind: ColumnKind) -> Result<Mixed, CompileError> {
        Ok(match lit {
            ConstantLit::Null => Mixed::Null,
            ConstantLit::Bool(b) => Mixed::Value(Value::Bool(*b)),
            ConstantLit::Text(t) => {
                let kind = if matches!(kind, ColumnKind::Link | ColumnKind::BackLink) { ColumnKind::String } else { kind };
                coerce_literal(t, kind)?
            }
            ConstantLit::Number(n) => coerce_literal(n, kind)?,
        })
    }

    fn resolve_path(&self, start: TableKey, path: &PropertyPath) -> Result<ResolvedPath, CompileError> {
        Ok(self.resolve_path_impl(start, path, false)?.0)
    }

    fn resolve_link_path(&self, start: TableKey, path: &PropertyPath) -> Result<(ResolvedPath, TableKey), CompileError> {
        self.resolve_path_impl(start, path, true)
    }

    fn resolve_path_impl(&self, start: TableKey, path: &PropertyPath, force_terminal_hop: bool) -> Result<(ResolvedPath, TableKey), CompileError> {
        let mut table = start;
        let mut steps = Vec::new();
        let n = path.segments.len();

        for (i, seg) in path.segments.iter().enumerate() {
            let is_last = i + 1 == n;
            let must_hop = !is_last || force_terminal_hop;

            match seg {
                PathSegment::Size => {
                    if must_hop {
                        return Err(CompileError::InvalidSizeOf);
                    }
                    match steps.pop() {
                        Some(PathStep::Field { col, hop_to: None }) => steps.push(PathStep::SizeOf(col)),
                        _ => return Err(CompileError::InvalidSizeOf),
                    }
                }
                PathSegment::Field(name) => {
                    let def = self.schema.table(table).ok_or(CompileError::UnknownTable(table))?;
                    let col = def.resolve_name(name).ok_or_else(|| CompileError::UnknownProperty(table, name.clone()))?;
                    if must_hop {
                        let target = def.column(col).and_then(|c| c.link_target).ok_or(CompileError::NotALink(col))?;
                        steps.push(PathStep::Field { col, hop_to: Some(target.table) });
                        table = target.table;
                    } else {
                        steps.push(PathStep::Field { col, hop_to: None });
                    }
                }
                PathSegment::BackLink { table: tname, column } => {
                    let target_def = self.schema.table_by_name(tname).ok_or_else(|| CompileError::UnknownProperty(table, tname.clone()))?;
                    let fwd = target_def
                        .resolve_name(column)
                        .ok_or_else(|| CompileError::UnknownBackLink(tname.clone(), column.clone()))?;
                    let cur = self.schema.table(table).ok_or(CompileError::UnknownTable(table))?;
                    let back = cur
                        .columns()
                        .find(|c| c.link_target == Some(LinkTarget { table: target_def.key(), col: fwd }))
                        .ok_or_else(|| CompileError::UnknownBackLink(tname.clone(), column.clone()))?
                        .key;
                    if must_hop {
                        steps.push(PathStep::Field { col: back, hop_to: Some(target_def.key()) });
                        table = target_def.key();
                    } else {
                        steps.push(PathStep::Field { col: back, hop_to: None });
                    }
                }
            }
        }

        Ok((ResolvedPath { quantifier: path.quantifier, steps }, table))
    }
}

fn terminal_kind(path: &ResolvedPath) -> ColumnKind {
    match path.steps.last() {
        Some(PathStep::Field { col, .. }) => col.kind(),
        Some(PathStep::SizeOf(_)) => ColumnKind::Int,
        None => ColumnKind::Mixed,
    }
}

enum WalkResult {
    Values(Vec<Mixed>),
    Contexts(Vec<(TableKey, ObjKey)>),
}

fn walk(txn: &ReadTransaction, table: TableKey, obj: ObjKey, steps: &[PathStep]) -> Result<WalkResult, store::Error> {
    let mut contexts = vec![(table, obj)];

    for (i, step) in steps.iter().enumerate() {
        let is_last = i + 1 == steps.len();
        match step {
            PathStep::SizeOf(col) => {
                let mut values = Vec::with_capacity(contexts.len());
                for (t, o) in &contexts {
                    let len = if col.attrs().collection == CollectionType::Dictionary {
                        txn.get_dictionary(*t, *o, *col)?.len()
                    } else {
                        txn.get_collection(*t, *o, *col)?.len()
                    };
                    values.push(Mixed::Value(Value::Int(len as i64)));
                }
                return Ok(WalkResult::Values(values));
            }
            PathStep::Field { col, hop_to: None } => {
                let mut values = Vec::new();
                for (t, o) in &contexts {
                    if col.attrs().collection == CollectionType::Scalar {
                        values.push(txn.get_value(*t, *o, *col)?);
                    } else {
                        values.extend(txn.get_collection(*t, *o, *col)?);
                    }
                }
                return Ok(WalkResult::Values(values));
            }
            PathStep::Field { col, hop_to: Some(target_table) } => {
                let mut next = Vec::new();
                for (t, o) in &contexts {
                    if col.attrs().collection == CollectionType::Scalar {
                        if let Mixed::Value(Value::Link(target_obj)) = txn.get_value(*t, *o, *col)? {
                            next.push((*target_table, target_obj));
                        }
                    } else {
                        for v in txn.get_collection(*t, *o, *col)? {
                            if let Mixed::Value(Value::Link(target_obj)) = v {
                                next.push((*target_table, target_obj));
                            }
                        }
                    }
                }
                contexts = next;
                if is_last {
                    return Ok(WalkResult::Contexts(contexts));
                }
            }
        }
    }
    Ok(WalkResult::Contexts(contexts))
}

fn resolve_values(txn: &ReadTransaction, table: TableKey, obj: ObjKey, path: &ResolvedPath) -> Result<Vec<Mixed>, store::Error> {
    match walk(txn, table, obj, &path.steps)? {
        WalkResult::Values(values) => Ok(values),
        WalkResult::Contexts(ctx) => Ok(ctx.into_iter().map(|(_, o)| Mixed::Value(Value::Link(o))).collect()),
    }
}

fn resolve_link_contexts(txn: &ReadTransaction, table: TableKey, obj: ObjKey, path: &ResolvedPath) -> Result<Vec<(TableKey, ObjKey)>, store::Error> {
    match walk(txn, table, obj, &path.steps)? {
        WalkResult::Contexts(ctx) => Ok(ctx),
        WalkResult::Values(_) => Ok(Vec::new()),
    }
}

fn eval_value(cv: &CValue, txn: &ReadTransaction, table: TableKey, obj: ObjKey) -> Result<(Vec<Mixed>, Quantifier), store::Error> {
    Ok(match cv {
        CValue::Constant(m) => (vec![m.clone()], Quantifier::Unspecified),
        CValue::Path(path) => (resolve_values(txn, table, obj, path)?, path.quantifier),
        CValue::Aggr { path, op } => {
            let values = resolve_values(txn, table, obj, path)?;
            (vec![apply_aggr(*op, &values)], Quantifier::Unspecified)
        }
        CValue::Subquery { base, predicate } => {
            let mut count = 0i64;
            for (t, o) in resolve_link_contexts(txn, table, obj, base)? {
                if evaluate(predicate, txn, t, o)? {
                    count += 1;
                }
            }
            (vec![Mixed::Value(Value::Int(count))], Quantifier::Unspecified)
        }
    })
}

pub fn evaluate(expr: &CExpr, txn: &ReadTransaction, table: TableKey, obj: ObjKey) -> Result<bool, store::Error> {
    Ok(match expr {
        CExpr::Or(terms) => {
            let mut any = false;
            for t in terms {
                if evaluate(t, txn, table, obj)? {
                    any = true;
                    break;
                }
            }
            any
        }
        CExpr::And(terms) => {
            let mut all = true;
            for t in terms {
                if !evaluate(t, txn, table, obj)? {
                    all = false;
                    break;
                }
            }
            all
        }
        CExpr::Not(inner) => !evaluate(inner, txn, table, obj)?,
        CExpr::True => true,
        CExpr::False => false,
        CExpr::Equality { lhs, op, rhs, case_insensitive } => {
            let (lv, lq) = eval_value(lhs, txn, table, obj)?;
            let (rv, rq) = eval_value(rhs, txn, table, obj)?;
            let matched = combine(&lv, lq, &rv, rq, |a, b| values_equal(a, b, *case_insensitive));
            if *op == EqOp::Eq {
                matched
            } else {
                !matched
            }
        }
        CExpr::Relational { lhs, op, rhs } => {
            let (lv, lq) = eval_value(lhs, txn, table, obj)?;
            let (rv, rq) = eval_value(rhs, txn, table, obj)?;
            combine(&lv, lq, &rv, rq, |a, b| relational_test(*op, a, b))
        }
        CExpr::StringOp { lhs, op, rhs, case_insensitive } => {
            let (lv, lq) = eval_value(lhs, txn, table, obj)?;
            let (rv, rq) = eval_value(rhs, txn, table, obj)?;
            combine(&lv, lq, &rv, rq, |a, b| string_op_test(*op, a, b, *case_insensitive))
        }
        CExpr::Between { value, lo, hi } => {
            let (values, q) = eval_value(value, txn, table, obj)?;
            let (los, _) = eval_value(lo, txn, table, obj)?;
            let (his, _) = eval_value(hi, txn, table, obj)?;
            let lo = los.first().cloned().unwrap_or(Mixed::Null);
            let hi = his.first().cloned().unwrap_or(Mixed::Null);
            let test = |v: &Mixed| {
                store::compare_mixed(v, &lo) != CmpOrdering::Less && store::compare_mixed(v, &hi) != CmpOrdering::Greater
            };
            match q {
                Quantifier::All => values.is_empty() || values.iter().all(test),
                Quantifier::None => !values.iter().any(test),
                Quantifier::Any | Quantifier::Unspecified => values.iter().any(test),
            }
        }
    })
}

/// Combines a (possibly multi-valued) left and right operand under
/// whichever side names a quantified path (spec §4.5 ANY/ALL/NONE),
/// defaulting to `ANY` when neither side is a quantified path.
fn combine(lhs: &[Mixed], lq: Quantifier, rhs: &[Mixed], rq: Quantifier, test: impl Fn(&Mixed, &Mixed) -> bool) -> bool {
    let quantifier = match (lq, rq) {
        (Quantifier::Unspecified, Quantifier::Unspecified) => Quantifier::Any,
        (q, Quantifier::Unspecified) => q,
        (Quantifier::Unspecified, q) => q,
        (q, _) => q,
    };
    match quantifier {
        Quantifier::Any | Quantifier::Unspecified => lhs.iter().any(|a| rhs.iter().any(|b| test(a, b))),
        Quantifier::All => lhs.is_empty() || rhs.is_empty() || lhs.iter().all(|a| rhs.iter().all(|b| test(a, b))),
        Quantifier::None => !lhs.iter().any(|a| rhs.iter().any(|b| test(a, b))),
    }
}

fn values_equal(a: &Mixed, b: &Mixed, case_insensitive: bool) -> bool {
    if case_insensitive {
        if let (Mixed::Value(Value::String(x)), Mixed::Value(Value::String(y))) = (a, b) {
            return x.eq_ignore_ascii_case(y);
        }
    }
    store::compare_mixed(a, b) == CmpOrdering::Equal
}

fn relational_test(op: RelOp, a: &Mixed, b: &Mixed) -> bool {
    let ord = store::compare_mixed(a, b);
    match op {
        RelOp::Lt => ord == CmpOrdering::Less,
        RelOp::Lte => ord != CmpOrdering::Greater,
        RelOp::Gt => ord == CmpOrdering::Greater,
        RelOp::Gte => ord != CmpOrdering::Less,
    }
}

fn string_op_test(op: StringOpKind, a: &Mixed, b: &Mixed, case_insensitive: bool) -> bool {
    if op == StringOpKind::In {
        return values_equal(a, b, case_insensitive);
    }
    let (Mixed::Value(Value::String(s)), Mixed::Value(Value::String(needle))) = (a, b) else {
        return false;
    };
    let (s, needle) = if case_insensitive {
        (s.to_lowercase(), needle.to_lowercase())
    } else {
        (s.clone(), needle.clone())
    };
    match op {
        StringOpKind::Contains => s.contains(&needle),
        StringOpKind::BeginsWith => s.starts_with(&needle),
        StringOpKind::EndsWith => s.ends_with(&needle),
        StringOpKind::Like => like_match(&s, &needle),
        StringOpKind::In => unreachable!(),
    }
}

/// Glob-style matching for `LIKE`: `*` matches any run of characters,
/// `?` matches exactly one (spec §4.5).
fn like_match(text: &str, pattern: &str) -> bool {
    fn rec(t: &[u8], p: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => rec(t, &p[1..]) || (!t.is_empty() && rec(&t[1..], p)),
            Some(b'?') => !t.is_empty() && rec(&t[1..], &p[1..]),
            Some(pc) => t.first() == Some(pc) && rec(&t[1..], &p[1..]),
        }
    }
    rec(text.as_bytes(), pattern.as_bytes())
}

fn apply_aggr(op: AggrOp, values: &[Mixed]) -> Mixed {
    match op {
        AggrOp::Count => Mixed::Value(Value::Int(values.len() as i64)),
        AggrOp::Sum => Mixed::Value(Value::Double(values.iter().filter_map(numeric_of).sum())),
        AggrOp::Min => fold_numeric(values, f64::min),
        AggrOp::Max => fold_numeric(values, f64::max),
        AggrOp::Avg => {
            let vs: Vec<f64> = values.iter().filter_map(numeric_of).collect();
            if vs.is_empty() {
                Mixed::Null
            } else {
                Mixed::Value(Value::Double(vs.iter().sum::<f64>() / vs.len() as f64))
            }
        }
    }
}

fn fold_numeric(values: &[Mixed], op: impl Fn(f64, f64) -> f64) -> Mixed {
    values
        .iter()
        .filter_map(numeric_of)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| op(a, v))))
        .map(|v| Mixed::Value(Value::Double(v)))
        .unwrap_or(Mixed::Null)
}

fn numeric_of(value: &Mixed) -> Option<f64> {
    match value {
        Mixed::Value(Value::Int(i)) => Some(*i as f64),
        Mixed::Value(Value::Float(f)) => Some(*f as f64),
        Mixed::Value(Value::Double(d)) => Some(*d),
        Mixed::Value(Value::Decimal128(d)) => Some(d.to_f64_approx()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse;
    use keys::{ColumnAttributes, ColumnKind as CK};
    use store::Database;

    async fn sample_db() -> (Database, TableKey, TableKey, ColKey, ColKey, ColKey) {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let dogs = schema.add_table("Dog").unwrap();
        let name = schema
            .add_column(people, "name", CK::String, ColumnAttributes::scalar(), None)
            .unwrap();
        let age = schema.add_column(people, "age", CK::Int, ColumnAttributes::scalar(), None).unwrap();
        let owner = schema
            .add_column(dogs, "owner", CK::Link, ColumnAttributes::scalar(), Some(people))
            .unwrap();

        let db = Database::open(schema);
        (db, people, dogs, name, age, owner)
    }

    #[tokio::test]
    async fn test_equality_and_relational_match() {
        let (db, people, _dogs, name, age, _owner) = sample_db().await;
        let mut wtx = db.begin_write().await.unwrap();
        let alice = wtx.create_object(people, None).unwrap();
        wtx.object(people, alice).unwrap().set(name, keys::Value::String("Alice".into()).into()).unwrap();
        wtx.object(people, alice).unwrap().set(age, keys::Value::Int(30).into()).unwrap();
        wtx.commit().unwrap();

        let rtx = db.read();
        let args = Arguments::new().push(keys::Value::Int(21));
        let (expr, _) = parse("age > $0").unwrap();
        let predicate = compile(rtx.schema(), people, &expr, &args).unwrap();
        assert!(predicate.evaluate(&rtx, alice).unwrap());

        let args = Arguments::new().push(keys::Value::String("Alice".into()));
        let (expr, _) = parse("name ==[c] $0").unwrap();
        let predicate = compile(rtx.schema(), people, &expr, &args).unwrap();
        assert!(predicate.evaluate(&rtx, alice).unwrap());
    }

    #[tokio::test]
    async fn test_backlink_count() {
        let (db, people, dogs, _name, _age, owner) = sample_db().await;
        let mut wtx = db.begin_write().await.unwrap();
        let alice = wtx.create_object(people, None).unwrap();
        let fido = wtx.create_object(dogs, None).unwrap();
        wtx.object(dogs, fido).unwrap().set_link(owner, alice).unwrap();
        wtx.commit().unwrap();

        let rtx = db.read();
        let (expr, _) = parse("@links.Dog.owner.@count > $0").unwrap();
        let args = Arguments::new().push(keys::Value::Int(0));
        let predicate = compile(rtx.schema(), people, &expr, &args).unwrap();
        assert!(predicate.evaluate(&rtx, alice).unwrap());
    }

    #[test]
    fn test_incomparable_kinds_rejected() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let name = schema
            .add_column(people, "name", CK::String, ColumnAttributes::scalar(), None)
            .unwrap();
        let _ = name;
        let args = Arguments::new().push(keys::Value::Int(1));
        let (expr, _) = parse("name > $0").unwrap();
        assert!(matches!(compile(&schema, people, &expr, &args), Err(CompileError::Incomparable(_, _))));
    }
}

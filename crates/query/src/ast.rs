use crate::lexer::Span;

/// The predicate node set (spec §4.5, §6 grammar): boolean combinators,
/// the five comparison shapes, and the two literal truth values.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Parens(Box<Expr>),
    True,
    False,
    Equality {
        lhs: ValueExpr,
        op: EqOp,
        rhs: ValueExpr,
        case_insensitive: bool,
        span: Span,
    },
    Relational {
        lhs: ValueExpr,
        op: RelOp,
        rhs: ValueExpr,
        span: Span,
    },
    StringOp {
        lhs: ValueExpr,
        op: StringOpKind,
        rhs: ValueExpr,
        case_insensitive: bool,
        span: Span,
    },
    Between {
        value: ValueExpr,
        lo: ValueExpr,
        hi: ValueExpr,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqOp {
    Eq,
    Neq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOpKind {
    Contains,
    BeginsWith,
    EndsWith,
    Like,
    In,
}

/// A value-producing leaf: a property path, a literal constant, a bound
/// argument, a collection aggregate, or a subquery count (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Property(PropertyPath),
    Constant(ConstantLit),
    Argument(usize),
    ListAggr { path: PropertyPath, op: AggrOp },
    /// An aggregate applied to `target` read off each object `path`
    /// reaches, e.g. `team.@max.age` (spec §6 `property`'s trailing
    /// `('.' identifier)`).
    LinkAggr { path: PropertyPath, op: AggrOp, target: Vec<PathSegment> },
    Subquery { base: PropertyPath, variable: String, predicate: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggrOp {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

/// `ANY`/`ALL`/`NONE` null-propagation mode for a path that crosses a
/// list/set-of-link hop (spec §4.5). Unspecified defaults to `Any`,
/// matching the grammar's implicit-quantifier rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
    None,
    Unspecified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPath {
    pub quantifier: Quantifier,
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Field(String),
    /// `@links.<Table>.<column>`: hop backwards across a forward-link
    /// column named on another table (spec §4.5, §6).
    BackLink { table: String, column: String },
    /// `@size`, or `length` rewritten to it (spec §6).
    Size,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantLit {
    Text(String),
    Number(String),
    Null,
    Bool(bool),
}

/// The name-based `sort`/`distinct`/`limit` descriptor suffix (spec §6:
/// `predicate := or_expr (sort|distinct|limit)*`), produced by [`crate::parse`]
/// alongside the boolean [`Expr`]. Resolved against a `Schema` into a
/// [`crate::DescriptorOrdering`] at compile time, mirroring the
/// name/[`PropertyPath`] vs. resolved/`ColKey` split used for predicates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptor {
    pub sort: Vec<(PropertyPath, bool)>,
    pub distinct: Vec<PropertyPath>,
    pub limit: Option<usize>,
}

impl Descriptor {
    pub fn is_empty(&self) -> bool {
        self.sort.is_empty() && self.distinct.is_empty() && self.limit.is_none()
    }
}

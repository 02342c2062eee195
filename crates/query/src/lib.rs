//! The textual predicate language layered on top of [`store`]: a lexer
//! and recursive-descent parser produce an [`ast::Expr`], [`compiler`]
//! resolves it against a [`schema::Schema`] into a [`CompiledPredicate`],
//! and [`ordering::DescriptorOrdering`] applies `sort`/`distinct`/
//! `limit` on top of the matched object set (spec §4.5, §6).

mod arguments;
mod ast;
mod compiler;
mod lexer;
mod ordering;
mod parser;

pub use arguments::Arguments;
pub use ast::{AggrOp, ConstantLit, Descriptor, EqOp, Expr, PathSegment, PropertyPath, Quantifier, RelOp, StringOpKind, ValueExpr};
pub use compiler::{compile, resolve_descriptor, CompiledPredicate, CompileError};
pub use lexer::{LexError, Span, Token, TokenKind};
pub use ordering::DescriptorOrdering;
pub use parser::{parse, ParseError};

use keys::ObjKey;
use keys::TableKey;
use store::ReadTransaction;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Store(#[from] store::Error),
}

/// Parses, compiles, and evaluates `predicate` over every object of
/// `table`, then applies `predicate`'s own `SORT`/`DISTINCT`/`LIMIT`
/// suffix (spec §4.6) merged with the caller-supplied `ordering` to the
/// surviving set (spec §4.5, §6, §4.8). This is the one-shot convenience
/// entry point; callers that re-run the same predicate with new argument
/// bindings should call [`parse`] and [`compile`] once and reuse the
/// resulting [`CompiledPredicate`].
pub fn query(txn: &ReadTransaction, table: TableKey, predicate: &str, args: &Arguments, ordering: &DescriptorOrdering) -> Result<Vec<ObjKey>, Error> {
    let (expr, descriptor) = parse(predicate)?;
    let compiled = compile(txn.schema(), table, &expr, args)?;
    let ordering = resolve_descriptor(txn.schema(), table, &descriptor)?.merge(ordering);
    Ok(run(txn, &compiled, &ordering)?)
}

/// Evaluates an already-compiled predicate over every object of its
/// table and applies `ordering` to the matches.
pub fn run(txn: &ReadTransaction, predicate: &CompiledPredicate, ordering: &DescriptorOrdering) -> Result<Vec<ObjKey>, store::Error> {
    let mut matches = Vec::new();
    for obj in txn.objects(predicate.table())? {
        if predicate.evaluate(txn, obj)? {
            matches.push(obj);
        }
    }
    Ok(ordering.apply(txn, predicate.table(), matches))
}

#[cfg(test)]
mod test {
    use super::*;
    use keys::{ColumnAttributes, ColumnKind, Value};
    use schema::Schema;
    use store::Database;

    #[tokio::test]
    async fn test_end_to_end_query_and_order() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let name = schema
            .add_column(people, "name", ColumnKind::String, ColumnAttributes::scalar(), None)
            .unwrap();
        let age = schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
        let db = Database::open(schema);

        let mut wtx = db.begin_write().await.unwrap();
        for (n, a) in [("Alice", 30), ("Bob", 25), ("Cara", 40)] {
            let obj = wtx.create_object(people, None).unwrap();
            let mut o = wtx.object(people, obj).unwrap();
            o.set(name, Value::String(n.into()).into()).unwrap();
            o.set(age, Value::Int(a).into()).unwrap();
        }
        wtx.commit().unwrap();

        let rtx = db.read();
        let args = Arguments::new().push(Value::Int(26));
        let ordering = DescriptorOrdering::new().sort_by(age, false);
        let matches = query(&rtx, people, "age > $0", &args, &ordering).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(rtx.get_value(people, matches[0], age).unwrap(), keys::Mixed::Value(Value::Int(30)));
        assert_eq!(rtx.get_value(people, matches[1], age).unwrap(), keys::Mixed::Value(Value::Int(40)));
    }

    #[test]
    fn test_parse_error_propagates() {
        assert!(parse("age >").is_err());
    }

    #[tokio::test]
    async fn test_textual_sort_and_limit_suffix() {
        let mut schema = Schema::new();
        let people = schema.add_table("Person").unwrap();
        let name = schema
            .add_column(people, "name", ColumnKind::String, ColumnAttributes::scalar(), None)
            .unwrap();
        let age = schema.add_column(people, "age", ColumnKind::Int, ColumnAttributes::scalar(), None).unwrap();
        let db = Database::open(schema);

        let mut wtx = db.begin_write().await.unwrap();
        for (n, a) in [("Alice", 30), ("Bob", 25), ("Cara", 40)] {
            let obj = wtx.create_object(people, None).unwrap();
            let mut o = wtx.object(people, obj).unwrap();
            o.set(name, Value::String(n.into()).into()).unwrap();
            o.set(age, Value::Int(a).into()).unwrap();
        }
        wtx.commit().unwrap();

        let rtx = db.read();
        let args = Arguments::new().push(Value::Int(0));
        let ordering = DescriptorOrdering::new();
        let matches = query(&rtx, people, "age > $0 SORT(age DESC) LIMIT(1)", &args, &ordering).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(rtx.get_value(people, matches[0], age).unwrap(), keys::Mixed::Value(Value::Int(40)));
    }
}

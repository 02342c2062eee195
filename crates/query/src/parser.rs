use crate::ast::{AggrOp, ConstantLit, Descriptor, EqOp, Expr, PathSegment, PropertyPath, Quantifier, RelOp, StringOpKind, ValueExpr};
use crate::lexer::{Lexer, Span, Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{message} at {}..{}", span.start, span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// A recursive-descent parser over the textual predicate grammar (spec
/// §6). Written from scratch rather than generated, per the redesign
/// direction against porting parser-generator output.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Bound variables in scope, innermost last, so nested `SUBQUERY`s
    /// can shadow an outer binding of the same name.
    bound_vars: Vec<String>,
}

/// Parses a full `predicate := or_expr (sort|distinct|limit)*` root
/// (spec §6, §4.6) into its boolean [`Expr`] and name-based [`Descriptor`]
/// suffix.
pub fn parse(source: &str) -> Result<(Expr, Descriptor), ParseError> {
    let tokens = Lexer::new(source).tokenize().map_err(|e| ParseError { message: e.message, span: e.span })?;
    let mut parser = Parser { tokens, pos: 0, bound_vars: Vec::new() };
    let expr = parser.parse_or()?;
    let descriptor = parser.parse_descriptor()?;
    parser.expect_eof()?;
    Ok((expr, descriptor))
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(ParseError {
                message: format!("expected {kind:?}, found {:?}", self.peek()),
                span: self.span(),
            })
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(ParseError {
                message: format!("unexpected trailing token {:?}", self.peek()),
                span: self.span(),
            })
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&TokenKind::Or) {
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 { terms.pop().unwrap() } else { Expr::Or(terms) })
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat(&TokenKind::And) {
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 { terms.pop().unwrap() } else { Expr::And(terms) })
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            TokenKind::True => {
                self.advance();
                Ok(Expr::True)
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::False)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Parens(Box::new(inner)))
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let lhs = self.parse_value()?;

        if self.eat(&TokenKind::Between) {
            self.expect(TokenKind::LBrace)?;
            let lo = self.parse_value()?;
            self.expect(TokenKind::Comma)?;
            let hi = self.parse_value()?;
            self.expect(TokenKind::RBrace)?;
            return Ok(Expr::Between {
                value: lhs,
                lo,
                hi,
                span: Span { start: start.start, end: self.span().start },
            });
        }

        let (eq_op, rel_op, str_op) = match self.peek() {
            TokenKind::Eq => (Some(EqOp::Eq), None, None),
            TokenKind::Neq => (Some(EqOp::Neq), None, None),
            TokenKind::Lt => (None, Some(RelOp::Lt), None),
            TokenKind::Lte => (None, Some(RelOp::Lte), None),
            TokenKind::Gt => (None, Some(RelOp::Gt), None),
            TokenKind::Gte => (None, Some(RelOp::Gte), None),
            TokenKind::Contains => (None, None, Some(StringOpKind::Contains)),
            TokenKind::BeginsWith => (None, None, Some(StringOpKind::BeginsWith)),
            TokenKind::EndsWith => (None, None, Some(StringOpKind::EndsWith)),
            TokenKind::Like => (None, None, Some(StringOpKind::Like)),
            TokenKind::In => (None, None, Some(StringOpKind::In)),
            other => {
                return Err(ParseError {
                    message: format!("expected a comparison operator, found {other:?}"),
                    span: self.span(),
                })
            }
        };
        self.advance();

        let case_insensitive = self.eat(&TokenKind::CaseInsensitiveMarker);
        let rhs = self.parse_value()?;
        let span = Span { start: start.start, end: self.span().start };

        if let Some(op) = eq_op {
            Ok(Expr::Equality { lhs, op, rhs, case_insensitive, span })
        } else if let Some(op) = rel_op {
            Ok(Expr::Relational { lhs, op, rhs, span })
        } else if let Some(op) = str_op {
            Ok(Expr::StringOp { lhs, op, rhs, case_insensitive, span })
        } else {
            unreachable!("one of the three operator kinds must have matched")
        }
    }

    fn parse_value(&mut self) -> Result<ValueExpr, ParseError> {
        match self.peek().clone() {
            TokenKind::Argument(n) => {
                self.advance();
                Ok(ValueExpr::Argument(n))
            }
            TokenKind::StringLiteral(text) => {
                self.advance();
                Ok(ValueExpr::Constant(ConstantLit::Text(text)))
            }
            TokenKind::NumberLiteral(text) => {
                self.advance();
                Ok(ValueExpr::Constant(ConstantLit::Number(text)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(ValueExpr::Constant(ConstantLit::Null))
            }
            TokenKind::True => {
                self.advance();
                Ok(ValueExpr::Constant(ConstantLit::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(ValueExpr::Constant(ConstantLit::Bool(false)))
            }
            TokenKind::Any | TokenKind::All | TokenKind::None => self.parse_quantified_path(),
            TokenKind::Subquery => self.parse_subquery(),
            TokenKind::Identifier(_) | TokenKind::At | TokenKind::Variable(_) => self.parse_path_value(),
            other => Err(ParseError {
                message: format!("expected a value, found {other:?}"),
                span: self.span(),
            }),
        }
    }

    fn parse_quantified_path(&mut self) -> Result<ValueExpr, ParseError> {
        let quantifier = match self.advance().kind {
            TokenKind::Any => Quantifier::Any,
            TokenKind::All => Quantifier::All,
            TokenKind::None => Quantifier::None,
            _ => unreachable!(),
        };
        let mut value = self.parse_path_value()?;
        match &mut value {
            ValueExpr::Property(path) => path.quantifier = quantifier,
            ValueExpr::ListAggr { path, .. } | ValueExpr::LinkAggr { path, .. } => path.quantifier = quantifier,
            _ => {}
        }
        Ok(value)
    }

    fn parse_path_value(&mut self) -> Result<ValueExpr, ParseError> {
        let mut segments = Vec::new();

        if let TokenKind::Variable(name) = self.peek().clone() {
            if !self.bound_vars.iter().any(|bound| bound == &name) {
                return Err(ParseError {
                    message: format!("unbound variable ${name}"),
                    span: self.span(),
                });
            }
            self.advance();
            self.expect(TokenKind::Dot)?;
        }

        loop {
            match self.peek().clone() {
                TokenKind::At => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    match name.as_str() {
                        "size" => segments.push(PathSegment::Size),
                        "links" => {
                            self.expect(TokenKind::Dot)?;
                            let table = self.expect_identifier()?;
                            self.expect(TokenKind::Dot)?;
                            let column = self.expect_identifier()?;
                            segments.push(PathSegment::BackLink { table, column });
                        }
                        "count" | "sum" | "min" | "max" | "avg" => {
                            if segments.is_empty() {
                                return Err(ParseError {
                                    message: format!("@{name} must follow a property path"),
                                    span: self.span(),
                                });
                            }
                            let op = match name.as_str() {
                                "count" => AggrOp::Count,
                                "sum" => AggrOp::Sum,
                                "min" => AggrOp::Min,
                                "max" => AggrOp::Max,
                                _ => AggrOp::Avg,
                            };
                            let path = PropertyPath { quantifier: Quantifier::Unspecified, segments };

                            // A trailing `.identifier` chain names a property
                            // read off the objects `path` links to, e.g.
                            // `team.@max.age` (spec §6 `property`).
                            if op != AggrOp::Count && self.eat(&TokenKind::Dot) {
                                let mut target = Vec::new();
                                loop {
                                    let field = self.expect_identifier()?;
                                    if field.eq_ignore_ascii_case("length") {
                                        target.push(PathSegment::Size);
                                    } else {
                                        target.push(PathSegment::Field(field));
                                    }
                                    if !self.eat(&TokenKind::Dot) {
                                        break;
                                    }
                                }
                                return Ok(ValueExpr::LinkAggr { path, op, target });
                            }
                            return Ok(ValueExpr::ListAggr { path, op });
                        }
                        other => {
                            return Err(ParseError {
                                message: format!("unknown postop @{other}"),
                                span: self.span(),
                            })
                        }
                    }
                }
                TokenKind::Identifier(name) => {
                    self.advance();
                    if name.eq_ignore_ascii_case("length") {
                        segments.push(PathSegment::Size);
                    } else {
                        segments.push(PathSegment::Field(name));
                    }
                }
                _ => break,
            }
            if !self.eat(&TokenKind::Dot) {
                break;
            }
        }

        if segments.is_empty() {
            return Err(ParseError {
                message: "expected a property path".into(),
                span: self.span(),
            });
        }

        Ok(ValueExpr::Property(PropertyPath {
            quantifier: Quantifier::Unspecified,
            segments,
        }))
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.advance().kind {
            TokenKind::Identifier(name) => Ok(name),
            other => Err(ParseError {
                message: format!("expected an identifier, found {other:?}"),
                span: self.span(),
            }),
        }
    }

    fn expect_variable(&mut self) -> Result<String, ParseError> {
        match self.advance().kind {
            TokenKind::Variable(name) => Ok(name),
            other => Err(ParseError {
                message: format!("expected a bound variable such as $v, found {other:?}"),
                span: self.span(),
            }),
        }
    }

    fn expect_number(&mut self) -> Result<usize, ParseError> {
        match self.advance().kind {
            TokenKind::NumberLiteral(text) => text.parse::<usize>().map_err(|_| ParseError {
                message: format!("expected a non-negative integer, found {text:?}"),
                span: self.span(),
            }),
            other => Err(ParseError {
                message: format!("expected a number, found {other:?}"),
                span: self.span(),
            }),
        }
    }

    /// A bare dotted identifier chain, with no quantifier prefix or
    /// trailing postop -- used by `SUBQUERY`'s collection argument and
    /// by the `SORT`/`DISTINCT` descriptor terms (spec §6).
    fn parse_simple_path(&mut self) -> Result<PropertyPath, ParseError> {
        let mut segments = Vec::new();
        loop {
            let field = self.expect_identifier()?;
            if field.eq_ignore_ascii_case("length") {
                segments.push(PathSegment::Size);
            } else {
                segments.push(PathSegment::Field(field));
            }
            if !self.eat(&TokenKind::Dot) {
                break;
            }
        }
        Ok(PropertyPath { quantifier: Quantifier::Unspecified, segments })
    }

    /// `SUBQUERY(coll, $v, pred).@size` (spec §6, §4.7 step 6): `$v` is
    /// bound only while `pred` is parsed, so `pred` can reference it as
    /// `$v.property` the same way a top-level predicate references its
    /// own object's properties.
    fn parse_subquery(&mut self) -> Result<ValueExpr, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let base = self.parse_simple_path()?;
        self.expect(TokenKind::Comma)?;
        let variable = self.expect_variable()?;
        self.expect(TokenKind::Comma)?;

        self.bound_vars.push(variable.clone());
        let predicate = self.parse_or();
        self.bound_vars.pop();
        let predicate = predicate?;

        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Dot)?;
        self.expect(TokenKind::At)?;
        let postop = self.expect_identifier()?;
        if !postop.eq_ignore_ascii_case("size") {
            return Err(ParseError {
                message: format!("expected .@size after SUBQUERY(...), found @{postop}"),
                span: self.span(),
            });
        }

        Ok(ValueExpr::Subquery {
            base,
            variable,
            predicate: Box::new(predicate),
        })
    }

    /// `(sort|distinct|limit)*` (spec §6, §4.6), applied after the
    /// boolean predicate has been fully parsed.
    fn parse_descriptor(&mut self) -> Result<Descriptor, ParseError> {
        let mut descriptor = Descriptor::default();
        loop {
            match self.peek() {
                TokenKind::Sort => {
                    self.advance();
                    self.expect(TokenKind::LParen)?;
                    loop {
                        let path = self.parse_simple_path()?;
                        let descending = match self.peek() {
                            TokenKind::Descending => {
                                self.advance();
                                true
                            }
                            TokenKind::Ascending => {
                                self.advance();
                                false
                            }
                            _ => false,
                        };
                        descriptor.sort.push((path, descending));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                }
                TokenKind::Distinct => {
                    self.advance();
                    self.expect(TokenKind::LParen)?;
                    loop {
                        descriptor.distinct.push(self.parse_simple_path()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                }
                TokenKind::Limit => {
                    self.advance();
                    self.expect(TokenKind::LParen)?;
                    descriptor.limit = Some(self.expect_number()?);
                    self.expect(TokenKind::RParen)?;
                }
                _ => break,
            }
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parses_simple_equality() {
        let (expr, _) = parse("name == $0").unwrap();
        assert!(matches!(expr, Expr::Equality { .. }));
    }

    #[test]
    fn test_parses_and_or_precedence() {
        let (expr, _) = parse("a == $0 AND b == $1 OR c == $2").unwrap();
        match expr {
            Expr::Or(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[0], Expr::And(_)));
            }
            other => panic!("expected Or at top level, got {other:?}"),
        }
    }

    #[test]
    fn test_parses_between() {
        let (expr, _) = parse("age BETWEEN {$0, $1}").unwrap();
        assert!(matches!(expr, Expr::Between { .. }));
    }

    #[test]
    fn test_parses_backlink_path() {
        let (expr, _) = parse("@links.Dog.owner.@count > $0").unwrap();
        match expr {
            Expr::Relational { lhs: ValueExpr::ListAggr { path, op: AggrOp::Count }, .. } => {
                assert_eq!(
                    path.segments,
                    vec![PathSegment::BackLink {
                        table: "Dog".into(),
                        column: "owner".into()
                    }]
                );
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_length_rewritten_to_size() {
        let (expr, _) = parse("tags.length == $0").unwrap();
        match expr {
            Expr::Equality { lhs: ValueExpr::Property(path), .. } => {
                assert_eq!(path.segments, vec![PathSegment::Field("tags".into()), PathSegment::Size]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_case_insensitive_equality_marker() {
        let (expr, _) = parse("name ==[c] $0").unwrap();
        match expr {
            Expr::Equality { case_insensitive, .. } => assert!(case_insensitive),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_quantifier_prefix() {
        let (expr, _) = parse("ALL scores > $0").unwrap();
        match expr {
            Expr::Relational { lhs: ValueExpr::Property(path), .. } => {
                assert_eq!(path.quantifier, Quantifier::All);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parses_link_aggr_target_property() {
        let (expr, _) = parse("team.@max.age >= $0").unwrap();
        match expr {
            Expr::Relational {
                lhs: ValueExpr::LinkAggr { path, op: AggrOp::Max, target },
                ..
            } => {
                assert_eq!(path.segments, vec![PathSegment::Field("team".into())]);
                assert_eq!(target, vec![PathSegment::Field("age".into())]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_list_aggr_without_trailing_property_is_unchanged() {
        let (expr, _) = parse("team.@count > $0").unwrap();
        assert!(matches!(
            expr,
            Expr::Relational {
                lhs: ValueExpr::ListAggr { op: AggrOp::Count, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_parses_subquery_size() {
        let (expr, _) = parse("SUBQUERY(team, $p, $p.age > $0).@size > $1").unwrap();
        match expr {
            Expr::Relational { lhs: ValueExpr::Subquery { base, variable, predicate }, .. } => {
                assert_eq!(base.segments, vec![PathSegment::Field("team".into())]);
                assert_eq!(variable, "p");
                assert!(matches!(*predicate, Expr::Relational { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_subquery_rejects_unbound_variable() {
        let err = parse("SUBQUERY(team, $p, $other.age > $0).@size > $1").unwrap_err();
        assert!(err.message.contains("unbound variable"));
    }

    #[test]
    fn test_parses_sort_distinct_limit_descriptor() {
        let (_, descriptor) = parse("age > $0 SORT(age DESC, name ASC) DISTINCT(name) LIMIT(5)").unwrap();
        assert_eq!(descriptor.sort.len(), 2);
        assert_eq!(descriptor.sort[0].1, true);
        assert_eq!(descriptor.sort[1].1, false);
        assert_eq!(descriptor.distinct.len(), 1);
        assert_eq!(descriptor.limit, Some(5));
    }

    #[test]
    fn test_descriptor_defaults_to_ascending() {
        let (_, descriptor) = parse("age > $0 SORT(age)").unwrap();
        assert_eq!(descriptor.sort, vec![(PropertyPath { quantifier: Quantifier::Unspecified, segments: vec![PathSegment::Field("age".into())] }, false)]);
    }
}

//! Recursive-descent parser for XPath 2.0.
//!
//! One function per precedence level, lowest first:
//! `,` < for/some/every/if < or < and < comparison < to < additive <
//! multiplicative < union < intersect/except < instance of < treat as <
//! castable as < cast as < unary < path < primary.
//!
//! Names are resolved against the [`StaticContext`] while parsing, so the
//! resulting AST holds expanded names only. Syntax errors are buffered with the
//! set of tokens that would have been accepted; the parser then resynchronizes
//! at the next top-level `,` a bounded number of times before reporting every
//! buffered diagnostic as one `XPST0003`.

pub mod ast;
pub mod lexer;
pub mod token;

use std::collections::VecDeque;

use crate::consts::XS;
use crate::engine::runtime::{Error, ErrorCode, SourcePosition, StaticContext};
use crate::schema::{SchemaType, builtin_code};
use crate::xdm::{Cardinality, ExpandedName, NameConstraint, SequenceType, XdmAtomicValue, XmlTypeCode};
use ast::{
    ArithOp, Axis, BinaryOp, CompOp, Expr, ExprKind, NameTest, NodeComp, NodeTest, Predicate, Quantifier,
    ResultType, SetOp,
};
use lexer::Lexer;
use token::{Token, TokenKind, TokenValue};

/// Resynchronizations attempted before the parse is declared irrecoverable.
const MAX_RECOVERIES: usize = 3;

const EXPR_START: &[TokenKind] = &[
    TokenKind::IntegerLiteral,
    TokenKind::DecimalLiteral,
    TokenKind::DoubleLiteral,
    TokenKind::StringLiteral,
    TokenKind::VarName,
    TokenKind::LParen,
    TokenKind::Dot,
    TokenKind::DotDot,
    TokenKind::At,
    TokenKind::FunctionName,
    TokenKind::QName,
    TokenKind::Wildcard,
    TokenKind::AxisName,
    TokenKind::KindKeyword,
    TokenKind::Slash,
    TokenKind::DoubleSlash,
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::For,
    TokenKind::Some,
    TokenKind::Every,
    TokenKind::If,
];

/// Parse `input` into an AST, resolving names against `ctx`.
pub fn parse_expression(input: &str, ctx: &StaticContext) -> Result<Expr, Error> {
    Parser::new(input, ctx).parse()
}

struct Diagnostic {
    message: String,
    position: SourcePosition,
}

pub struct Parser<'c> {
    lexer: Lexer,
    lookahead: VecDeque<Token>,
    ctx: &'c StaticContext,
    /// Variables bound by enclosing `for`/`some`/`every` clauses.
    bound: Vec<ExpandedName>,
    diagnostics: Vec<Diagnostic>,
    lexer_failed: bool,
}

impl<'c> Parser<'c> {
    pub fn new(input: &str, ctx: &'c StaticContext) -> Self {
        Self {
            lexer: Lexer::new(input),
            lookahead: VecDeque::new(),
            ctx,
            bound: Vec::new(),
            diagnostics: Vec::new(),
            lexer_failed: false,
        }
    }

    pub fn parse(mut self) -> Result<Expr, Error> {
        let mut items = Vec::new();
        loop {
            match self.parse_expr_single() {
                Ok(e) => items.push(e),
                Err(e) => self.recover(e)?,
            }
            match self.peek_kind()? {
                TokenKind::Comma => {
                    self.next()?;
                }
                TokenKind::EndOfInput => break,
                _ => {
                    let e = self.unexpected(&[TokenKind::Comma, TokenKind::EndOfInput])?;
                    self.recover(e)?;
                    if self.peek_kind()? == TokenKind::EndOfInput {
                        break;
                    }
                    self.next()?;
                }
            }
        }
        if !self.diagnostics.is_empty() {
            return Err(self.failure());
        }
        Ok(match items.len() {
            1 => items.remove(0),
            _ => Expr::new(ExprKind::Sequence(items), ResultType::Any),
        })
    }

    // ----- token plumbing -----

    fn fill(&mut self, n: usize) -> Result<(), Error> {
        while self.lookahead.len() <= n {
            match self.lexer.next_token() {
                Ok(t) => self.lookahead.push_back(t),
                Err(e) => {
                    self.lexer_failed = true;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token, Error> {
        self.peek_nth(0)
    }

    fn peek_kind(&mut self) -> Result<TokenKind, Error> {
        Ok(self.peek()?.kind)
    }

    fn peek_nth(&mut self, n: usize) -> Result<&Token, Error> {
        self.fill(n)?;
        self.lookahead
            .get(n)
            .ok_or_else(|| Error::from_code(ErrorCode::XPST0003, "unexpected end of input"))
    }

    fn next(&mut self) -> Result<Token, Error> {
        self.fill(0)?;
        self.lookahead
            .pop_front()
            .ok_or_else(|| Error::from_code(ErrorCode::XPST0003, "unexpected end of input"))
    }

    fn at(&mut self, kind: TokenKind) -> Result<bool, Error> {
        Ok(self.peek_kind()? == kind)
    }

    fn eat(&mut self, kind: TokenKind) -> Result<bool, Error> {
        if self.at(kind)? {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Error> {
        if self.at(kind)? {
            return self.next();
        }
        Err(self.unexpected(&[kind])?)
    }

    fn position_of(tok: &Token) -> SourcePosition {
        SourcePosition {
            offset: tok.start,
            line: tok.line,
            column: tok.column,
        }
    }

    /// Syntax error at the current token, listing what would have been accepted.
    fn unexpected(&mut self, expected: &[TokenKind]) -> Result<Error, Error> {
        let tok = self.peek()?.clone();
        let found = match (&tok.kind, tok.text()) {
            (TokenKind::EndOfInput, _) => "end of input".to_string(),
            (kind, Some(text)) => format!("{kind} '{text}'"),
            (kind, None) => kind.to_string(),
        };
        let mut names: Vec<&str> = expected.iter().map(|k| k.describe()).collect();
        names.dedup();
        let msg = if names.len() == 1 {
            format!("unexpected {found}; expected {}", names[0])
        } else {
            format!("unexpected {found}; expected one of: {}", names.join(", "))
        };
        Ok(Error::from_code(ErrorCode::XPST0003, msg).with_position(Self::position_of(&tok)))
    }

    fn static_error(code: ErrorCode, msg: impl Into<String>, tok: &Token) -> Error {
        Error::from_code(code, msg).with_position(Self::position_of(tok))
    }

    // ----- error recovery -----

    /// Buffer a syntax error and skip to the next top-level `,` or the end.
    /// Static errors and lexical errors are not recoverable.
    fn recover(&mut self, err: Error) -> Result<(), Error> {
        if err.code_enum() != ErrorCode::XPST0003 || self.lexer_failed {
            if self.diagnostics.is_empty() {
                return Err(err);
            }
            self.push_diagnostic(&err);
            return Err(self.failure());
        }
        self.push_diagnostic(&err);
        if self.diagnostics.len() > MAX_RECOVERIES {
            tracing::warn!(errors = self.diagnostics.len(), "giving up on syntax error recovery");
            return Err(self.failure());
        }
        let mut depth = 0usize;
        loop {
            let kind = match self.peek() {
                Ok(t) => t.kind,
                Err(e) => {
                    self.push_diagnostic(&e);
                    return Err(self.failure());
                }
            };
            match kind {
                TokenKind::EndOfInput => break,
                TokenKind::Comma if depth == 0 => break,
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.next()?;
        }
        let at = self.peek().map(|t| (t.line, t.column)).unwrap_or((0, 0));
        tracing::debug!(line = at.0, column = at.1, "resynchronized after syntax error");
        Ok(())
    }

    fn push_diagnostic(&mut self, err: &Error) {
        self.diagnostics.push(Diagnostic {
            message: err.message.clone(),
            position: err.position.unwrap_or(SourcePosition {
                offset: 0,
                line: 1,
                column: 1,
            }),
        });
    }

    fn failure(&self) -> Error {
        let message = self
            .diagnostics
            .iter()
            .map(|d| format!("{} (line {}, column {})", d.message, d.position.line, d.position.column))
            .collect::<Vec<_>>()
            .join("; ");
        let position = self.diagnostics.first().map(|d| d.position).unwrap_or(SourcePosition {
            offset: 0,
            line: 1,
            column: 1,
        });
        Error::from_code(ErrorCode::XPST0003, message).with_position(position)
    }

    // ----- name resolution -----

    fn name_parts(tok: &Token) -> (Option<&str>, &str) {
        match &tok.value {
            TokenValue::Name { prefix, local } => (prefix.as_deref(), local.as_str()),
            TokenValue::Str(s) => (None, s.as_str()),
            _ => (None, ""),
        }
    }

    fn resolve_prefix(&self, prefix: &str, tok: &Token) -> Result<String, Error> {
        self.ctx
            .namespaces
            .resolve(prefix)
            .map(str::to_string)
            .ok_or_else(|| Self::static_error(ErrorCode::XPST0081, format!("unbound namespace prefix '{prefix}'"), tok))
    }

    /// Resolve a name token; unprefixed names take `default_ns`.
    fn resolve_name(&self, tok: &Token, default_ns: Option<&str>) -> Result<ExpandedName, Error> {
        let (prefix, local) = Self::name_parts(tok);
        let ns = match prefix {
            Some(p) => Some(self.resolve_prefix(p, tok)?),
            None => default_ns.map(str::to_string),
        };
        Ok(ExpandedName::new(ns, local))
    }

    fn default_element_ns(&self) -> Option<&'c str> {
        self.ctx.default_element_namespace.as_deref()
    }

    // ----- ExprSingle -----

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let first = self.parse_expr_single()?;
        if !self.at(TokenKind::Comma)? {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma)? {
            items.push(self.parse_expr_single()?);
        }
        Ok(Expr::new(ExprKind::Sequence(items), ResultType::Any))
    }

    fn parse_expr_single(&mut self) -> Result<Expr, Error> {
        match self.peek_kind()? {
            TokenKind::For => self.parse_for(),
            TokenKind::Some => self.parse_quantified(Quantifier::Some),
            TokenKind::Every => self.parse_quantified(Quantifier::Every),
            TokenKind::If => self.parse_if(),
            _ => self.parse_or(),
        }
    }

    /// `$v in E (, $v in E)*`; the bound names stay in scope until the caller pops them.
    fn parse_bindings(&mut self) -> Result<Vec<(ExpandedName, Expr)>, Error> {
        let mut bindings = Vec::new();
        loop {
            let tok = self.expect(TokenKind::VarName)?;
            let var = self.resolve_name(&tok, None)?;
            self.expect(TokenKind::In)?;
            let in_expr = self.parse_expr_single()?;
            self.bound.push(var.clone());
            bindings.push((var, in_expr));
            if !self.eat(TokenKind::Comma)? {
                return Ok(bindings);
            }
        }
    }

    fn parse_for(&mut self) -> Result<Expr, Error> {
        self.expect(TokenKind::For)?;
        let scope = self.bound.len();
        let bindings = self.parse_bindings()?;
        self.expect(TokenKind::Return)?;
        let body = self.parse_expr_single();
        self.bound.truncate(scope);
        let mut expr = body?;
        for (var, in_expr) in bindings.into_iter().rev() {
            expr = Expr::new(
                ExprKind::For {
                    var,
                    in_expr: Box::new(in_expr),
                    body: Box::new(expr),
                },
                ResultType::Any,
            );
        }
        Ok(expr)
    }

    fn parse_quantified(&mut self, quantifier: Quantifier) -> Result<Expr, Error> {
        self.next()?;
        let scope = self.bound.len();
        let bindings = self.parse_bindings()?;
        self.expect(TokenKind::Satisfies)?;
        let test = self.parse_expr_single();
        self.bound.truncate(scope);
        let mut expr = test?;
        for (var, in_expr) in bindings.into_iter().rev() {
            expr = Expr::new(
                ExprKind::Quantified {
                    quantifier,
                    var,
                    in_expr: Box::new(in_expr),
                    satisfies: Box::new(expr),
                },
                ResultType::Boolean,
            );
        }
        Ok(expr)
    }

    fn parse_if(&mut self) -> Result<Expr, Error> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Then)?;
        let then_branch = self.parse_expr_single()?;
        self.expect(TokenKind::Else)?;
        let else_branch = self.parse_expr_single()?;
        let result = if then_branch.result == else_branch.result {
            then_branch.result
        } else {
            ResultType::Any
        };
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            result,
        ))
    }

    // ----- binary levels -----

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let result = match op {
            BinaryOp::Arithmetic(_) => {
                if left.result == ResultType::Number && right.result == ResultType::Number {
                    ResultType::Number
                } else {
                    ResultType::Any
                }
            }
            BinaryOp::Set(_) => ResultType::NodeSet,
            _ => ResultType::Boolean,
        };
        Expr::new(
            ExprKind::Binary {
                op,
                strategy: op.coercion(),
                left: Box::new(left),
                right: Box::new(right),
            },
            result,
        )
    }

    fn parse_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::Or)? {
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_comparison()?;
        while self.eat(TokenKind::And)? {
            let right = self.parse_comparison()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Error> {
        let left = self.parse_range()?;
        let op = match self.peek_kind()? {
            TokenKind::GeneralEq => BinaryOp::GeneralComparison(CompOp::Eq),
            TokenKind::GeneralNe => BinaryOp::GeneralComparison(CompOp::Ne),
            TokenKind::GeneralLt => BinaryOp::GeneralComparison(CompOp::Lt),
            TokenKind::GeneralLe => BinaryOp::GeneralComparison(CompOp::Le),
            TokenKind::GeneralGt => BinaryOp::GeneralComparison(CompOp::Gt),
            TokenKind::GeneralGe => BinaryOp::GeneralComparison(CompOp::Ge),
            TokenKind::ValueEq => BinaryOp::ValueComparison(CompOp::Eq),
            TokenKind::ValueNe => BinaryOp::ValueComparison(CompOp::Ne),
            TokenKind::ValueLt => BinaryOp::ValueComparison(CompOp::Lt),
            TokenKind::ValueLe => BinaryOp::ValueComparison(CompOp::Le),
            TokenKind::ValueGt => BinaryOp::ValueComparison(CompOp::Gt),
            TokenKind::ValueGe => BinaryOp::ValueComparison(CompOp::Ge),
            TokenKind::Is => BinaryOp::NodeComparison(NodeComp::Is),
            TokenKind::Precedes => BinaryOp::NodeComparison(NodeComp::Precedes),
            TokenKind::Follows => BinaryOp::NodeComparison(NodeComp::Follows),
            _ => return Ok(left),
        };
        self.next()?;
        let right = self.parse_range()?;
        Ok(Self::binary(op, left, right))
    }

    fn parse_range(&mut self) -> Result<Expr, Error> {
        let start = self.parse_additive()?;
        if !self.eat(TokenKind::To)? {
            return Ok(start);
        }
        let end = self.parse_additive()?;
        Ok(Expr::new(
            ExprKind::Range {
                start: Box::new(start),
                end: Box::new(end),
            },
            ResultType::Any,
        ))
    }

    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind()? {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.next()?;
            let right = self.parse_multiplicative()?;
            left = Self::binary(BinaryOp::Arithmetic(op), left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_union()?;
        loop {
            let op = match self.peek_kind()? {
                TokenKind::Multiply => ArithOp::Mul,
                TokenKind::Div => ArithOp::Div,
                TokenKind::IDiv => ArithOp::IDiv,
                TokenKind::Mod => ArithOp::Mod,
                _ => return Ok(left),
            };
            self.next()?;
            let right = self.parse_union()?;
            left = Self::binary(BinaryOp::Arithmetic(op), left, right);
        }
    }

    fn parse_union(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_intersect()?;
        while self.eat(TokenKind::Union)? {
            let right = self.parse_intersect()?;
            left = Self::binary(BinaryOp::Set(SetOp::Union), left, right);
        }
        Ok(left)
    }

    fn parse_intersect(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_instance_of()?;
        loop {
            let op = match self.peek_kind()? {
                TokenKind::Intersect => SetOp::Intersect,
                TokenKind::Except => SetOp::Except,
                _ => return Ok(left),
            };
            self.next()?;
            let right = self.parse_instance_of()?;
            left = Self::binary(BinaryOp::Set(op), left, right);
        }
    }

    fn parse_instance_of(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_treat()?;
        if !self.eat(TokenKind::InstanceOf)? {
            return Ok(expr);
        }
        let ty = self.parse_sequence_type()?;
        Ok(Expr::new(
            ExprKind::InstanceOf {
                expr: Box::new(expr),
                ty,
            },
            ResultType::Boolean,
        ))
    }

    fn parse_treat(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_castable()?;
        if !self.eat(TokenKind::TreatAs)? {
            return Ok(expr);
        }
        let ty = self.parse_sequence_type()?;
        let result = if ty.cardinality == Cardinality::One {
            ResultType::from_type_code(ty.type_code)
        } else if ty.type_code.is_node() {
            ResultType::NodeSet
        } else {
            ResultType::Any
        };
        Ok(Expr::new(
            ExprKind::TreatAs {
                expr: Box::new(expr),
                ty,
            },
            result,
        ))
    }

    fn parse_castable(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_cast()?;
        if !self.eat(TokenKind::CastableAs)? {
            return Ok(expr);
        }
        let target = self.parse_single_type()?;
        let literal = expr.is_literal();
        Ok(Expr::new(
            ExprKind::Castable {
                expr: Box::new(expr),
                target,
                literal,
            },
            ResultType::Boolean,
        ))
    }

    fn parse_cast(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_unary()?;
        if !self.eat(TokenKind::CastAs)? {
            return Ok(expr);
        }
        let target = self.parse_single_type()?;
        Ok(Self::cast(expr, target))
    }

    fn cast(expr: Expr, target: SequenceType) -> Expr {
        let literal = expr.is_literal();
        let result = if target.cardinality == Cardinality::One {
            ResultType::from_type_code(target.type_code)
        } else {
            ResultType::Any
        };
        Expr::new(
            ExprKind::Cast {
                expr: Box::new(expr),
                target,
                literal,
            },
            result,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let mut signs = 0usize;
        let mut negate = false;
        loop {
            match self.peek_kind()? {
                TokenKind::Minus => negate = !negate,
                TokenKind::Plus => {}
                _ => break,
            }
            signs += 1;
            self.next()?;
        }
        let expr = self.parse_path()?;
        if signs == 0 {
            return Ok(expr);
        }
        let result = if expr.result == ResultType::Number {
            ResultType::Number
        } else {
            ResultType::Any
        };
        Ok(Expr::new(
            ExprKind::Unary {
                negate,
                expr: Box::new(expr),
            },
            result,
        ))
    }

    // ----- paths -----

    fn starts_step(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::QName
                | TokenKind::Wildcard
                | TokenKind::PrefixWildcard
                | TokenKind::LocalWildcard
                | TokenKind::AxisName
                | TokenKind::At
                | TokenKind::Dot
                | TokenKind::DotDot
                | TokenKind::KindKeyword
                | TokenKind::FunctionName
                | TokenKind::VarName
                | TokenKind::LParen
                | TokenKind::IntegerLiteral
                | TokenKind::DecimalLiteral
                | TokenKind::DoubleLiteral
                | TokenKind::StringLiteral
        )
    }

    fn root() -> Expr {
        Expr::new(ExprKind::Root, ResultType::Navigator)
    }

    fn descendant_or_self_step() -> Expr {
        Expr::new(
            ExprKind::AxisStep {
                axis: Axis::DescendantOrSelf,
                test: NodeTest::Kind(SequenceType::node(XmlTypeCode::Node)),
                predicates: Vec::new(),
            },
            ResultType::NodeSet,
        )
    }

    fn parse_path(&mut self) -> Result<Expr, Error> {
        match self.peek_kind()? {
            TokenKind::Slash => {
                self.next()?;
                let next = self.peek_kind()?;
                if !Self::starts_step(next) {
                    return Ok(Self::root());
                }
                let mut steps = vec![Self::root()];
                self.parse_relative_path(&mut steps)?;
                Ok(Expr::new(ExprKind::Path(steps), ResultType::NodeSet))
            }
            TokenKind::DoubleSlash => {
                self.next()?;
                let mut steps = vec![Self::root(), Self::descendant_or_self_step()];
                self.parse_relative_path(&mut steps)?;
                Ok(Expr::new(ExprKind::Path(steps), ResultType::NodeSet))
            }
            _ => {
                let mut steps = Vec::new();
                self.parse_relative_path(&mut steps)?;
                if steps.len() == 1 {
                    return Ok(steps.remove(0));
                }
                Ok(Expr::new(ExprKind::Path(steps), ResultType::NodeSet))
            }
        }
    }

    fn parse_relative_path(&mut self, steps: &mut Vec<Expr>) -> Result<(), Error> {
        steps.push(self.parse_step()?);
        loop {
            match self.peek_kind()? {
                TokenKind::Slash => {
                    self.next()?;
                }
                TokenKind::DoubleSlash => {
                    self.next()?;
                    steps.push(Self::descendant_or_self_step());
                }
                _ => return Ok(()),
            }
            steps.push(self.parse_step()?);
        }
    }

    fn parse_step(&mut self) -> Result<Expr, Error> {
        let tok = self.peek()?.clone();
        match tok.kind {
            TokenKind::DotDot => {
                self.next()?;
                let predicates = self.parse_predicates()?;
                Ok(Self::axis_step(
                    Axis::Parent,
                    NodeTest::Kind(SequenceType::node(XmlTypeCode::Node)),
                    predicates,
                ))
            }
            TokenKind::At => {
                self.next()?;
                let test = self.parse_node_test(Axis::Attribute)?;
                let predicates = self.parse_predicates()?;
                Ok(Self::axis_step(Axis::Attribute, test, predicates))
            }
            TokenKind::AxisName => {
                self.next()?;
                let name = tok.text().unwrap_or_default();
                let axis = Axis::from_name(name)
                    .ok_or_else(|| Self::static_error(ErrorCode::XPST0003, format!("unknown axis '{name}'"), &tok))?;
                let test = self.parse_node_test(axis)?;
                let predicates = self.parse_predicates()?;
                Ok(Self::axis_step(axis, test, predicates))
            }
            TokenKind::QName | TokenKind::Wildcard | TokenKind::PrefixWildcard | TokenKind::LocalWildcard => {
                let test = self.parse_node_test(Axis::Child)?;
                let predicates = self.parse_predicates()?;
                Ok(Self::axis_step(Axis::Child, test, predicates))
            }
            TokenKind::KindKeyword => {
                let keyword = tok.text().unwrap_or_default();
                if matches!(keyword, "item" | "empty-sequence") {
                    return Err(Self::static_error(
                        ErrorCode::XPST0003,
                        format!("'{keyword}()' is not allowed as a path step"),
                        &tok,
                    ));
                }
                let axis = if matches!(keyword, "attribute" | "schema-attribute") {
                    Axis::Attribute
                } else {
                    Axis::Child
                };
                let test = self.parse_node_test(axis)?;
                let predicates = self.parse_predicates()?;
                Ok(Self::axis_step(axis, test, predicates))
            }
            _ => self.parse_filter(),
        }
    }

    fn axis_step(axis: Axis, test: NodeTest, predicates: Vec<Predicate>) -> Expr {
        Expr::new(ExprKind::AxisStep { axis, test, predicates }, ResultType::NodeSet)
    }

    fn parse_node_test(&mut self, axis: Axis) -> Result<NodeTest, Error> {
        let tok = self.peek()?.clone();
        match tok.kind {
            TokenKind::QName => {
                self.next()?;
                let default_ns = if axis.principal_kind() == XmlTypeCode::Element {
                    self.default_element_ns()
                } else {
                    None
                };
                Ok(NodeTest::Name(NameTest::Name(self.resolve_name(&tok, default_ns)?)))
            }
            TokenKind::Wildcard => {
                self.next()?;
                Ok(NodeTest::Name(NameTest::Any))
            }
            TokenKind::PrefixWildcard => {
                self.next()?;
                let prefix = tok.text().unwrap_or_default();
                Ok(NodeTest::Name(NameTest::Namespace(self.resolve_prefix(prefix, &tok)?)))
            }
            TokenKind::LocalWildcard => {
                self.next()?;
                Ok(NodeTest::Name(NameTest::Local(tok.text().unwrap_or_default().to_string())))
            }
            TokenKind::KindKeyword => Ok(NodeTest::Kind(self.parse_kind_test()?)),
            _ => Err(self.unexpected(&[
                TokenKind::QName,
                TokenKind::Wildcard,
                TokenKind::PrefixWildcard,
                TokenKind::LocalWildcard,
                TokenKind::KindKeyword,
            ])?),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Predicate>, Error> {
        let mut predicates = Vec::new();
        while self.eat(TokenKind::LBracket)? {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            let uses_last = expr.uses_last();
            predicates.push(Predicate { expr, uses_last });
        }
        Ok(predicates)
    }

    fn parse_filter(&mut self) -> Result<Expr, Error> {
        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        if predicates.is_empty() {
            return Ok(primary);
        }
        let result = match primary.result {
            ResultType::NodeSet | ResultType::Navigator => ResultType::NodeSet,
            _ => ResultType::Any,
        };
        Ok(Expr::new(
            ExprKind::Filter {
                primary: Box::new(primary),
                predicates,
            },
            result,
        ))
    }

    // ----- primary expressions -----

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        let tok = self.peek()?.clone();
        match (&tok.kind, &tok.value) {
            (TokenKind::IntegerLiteral, TokenValue::Integer(i)) => {
                self.next()?;
                Ok(Expr::literal(XdmAtomicValue::Integer(*i)))
            }
            (TokenKind::DecimalLiteral, TokenValue::Decimal(d)) => {
                self.next()?;
                Ok(Expr::literal(XdmAtomicValue::Decimal(*d)))
            }
            (TokenKind::DoubleLiteral, TokenValue::Double(d)) => {
                self.next()?;
                Ok(Expr::literal(XdmAtomicValue::Double(*d)))
            }
            (TokenKind::StringLiteral, TokenValue::Str(s)) => {
                self.next()?;
                Ok(Expr::literal(XdmAtomicValue::String(s.to_string())))
            }
            (TokenKind::VarName, _) => {
                self.next()?;
                let name = self.resolve_name(&tok, None)?;
                if !self.bound.contains(&name) && !self.ctx.in_scope_variables.contains(&name) {
                    return Err(Self::static_error(
                        ErrorCode::XPST0008,
                        format!("variable ${name} is not declared"),
                        &tok,
                    ));
                }
                Ok(Expr::new(ExprKind::VarRef(name), ResultType::Any))
            }
            (TokenKind::LParen, _) => {
                self.next()?;
                if self.eat(TokenKind::RParen)? {
                    return Ok(Expr::empty_sequence());
                }
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            (TokenKind::Dot, _) => {
                self.next()?;
                Ok(Expr::new(ExprKind::ContextItem, ResultType::Any))
            }
            (TokenKind::FunctionName, _) => self.parse_function_call(),
            _ => Err(self.unexpected(EXPR_START)?),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, Error> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen)? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr_single()?);
            if self.eat(TokenKind::Comma)? {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_function_call(&mut self) -> Result<Expr, Error> {
        let tok = self.next()?;
        let name = self.resolve_name(&tok, self.ctx.default_function_namespace.as_deref())?;
        let args = self.parse_arguments()?;

        if name.ns_uri.as_deref() == Some(XS) {
            let code = XmlTypeCode::from_xs_local(&name.local)
                .filter(|c| c.is_atomic() && !c.is_abstract())
                .ok_or_else(|| {
                    Self::static_error(ErrorCode::XPST0017, format!("no constructor function {name}"), &tok)
                })?;
            return self.constructor(&tok, &name, code, args);
        }
        if !self.ctx.functions.contains(&name)
            && let Some(SchemaType::Simple { base, .. }) = self.ctx.schema.resolve_type(&name)
        {
            return self.constructor(&tok, &name, base, args);
        }

        let result = self
            .ctx
            .functions
            .resolve(&name, args.len(), None)
            .map_err(|e| e.into_error().with_position(Self::position_of(&tok)))?;
        Ok(Expr::new(ExprKind::FunctionCall { name, args }, result))
    }

    fn constructor(&self, tok: &Token, name: &ExpandedName, code: XmlTypeCode, mut args: Vec<Expr>) -> Result<Expr, Error> {
        if args.len() != 1 {
            return Err(Self::static_error(
                ErrorCode::XPST0017,
                format!("constructor function {name} takes exactly one argument"),
                tok,
            ));
        }
        let arg = args.remove(0);
        Ok(Self::cast(arg, SequenceType::atomic(code, Cardinality::ZeroOrOne)))
    }

    // ----- types -----

    /// Atomic type name of `cast as` / `castable as`, with its optional `?`.
    fn parse_single_type(&mut self) -> Result<SequenceType, Error> {
        let tok = self.expect(TokenKind::QName)?;
        let name = self.resolve_name(&tok, self.default_element_ns())?;
        let code = self.cast_target(&name, &tok)?;
        let cardinality = if self.eat(TokenKind::OccurrenceOptional)? {
            Cardinality::ZeroOrOne
        } else {
            Cardinality::One
        };
        Ok(SequenceType::atomic(code, cardinality))
    }

    /// Built-in atomic type a cast to `name` converts to.
    fn cast_target(&self, name: &ExpandedName, tok: &Token) -> Result<XmlTypeCode, Error> {
        if let Some(code) = builtin_code(name) {
            if code.is_abstract() {
                return Err(Self::static_error(
                    ErrorCode::XPST0080,
                    format!("{name} is abstract and cannot be a cast target"),
                    tok,
                ));
            }
            if code.is_atomic() {
                return Ok(code);
            }
            return Err(Self::static_error(
                ErrorCode::XPST0051,
                format!("{name} is not an atomic type"),
                tok,
            ));
        }
        match self.ctx.schema.resolve_type(name) {
            Some(SchemaType::Simple { base, .. }) if base.is_abstract() => Err(Self::static_error(
                ErrorCode::XPST0080,
                format!("{name} is abstract and cannot be a cast target"),
                tok,
            )),
            Some(SchemaType::Simple { base, .. }) => Ok(base),
            _ => Err(Self::static_error(
                ErrorCode::XPST0051,
                format!("{name} is not a known atomic type"),
                tok,
            )),
        }
    }

    fn parse_sequence_type(&mut self) -> Result<SequenceType, Error> {
        let tok = self.peek()?.clone();
        let ty = match tok.kind {
            TokenKind::KindKeyword if tok.text() == Some("empty-sequence") => {
                self.next()?;
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::RParen)?;
                return Ok(SequenceType::empty());
            }
            TokenKind::KindKeyword if tok.text() == Some("item") => {
                self.next()?;
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::RParen)?;
                SequenceType::item(Cardinality::One)
            }
            TokenKind::KindKeyword => self.parse_kind_test()?,
            TokenKind::QName => {
                self.next()?;
                let name = self.resolve_name(&tok, self.default_element_ns())?;
                self.atomic_item_type(&name, &tok)?
            }
            _ => return Err(self.unexpected(&[TokenKind::QName, TokenKind::KindKeyword])?),
        };
        let cardinality = match self.peek_kind()? {
            TokenKind::OccurrenceOptional => Cardinality::ZeroOrOne,
            TokenKind::OccurrenceZeroOrMore => Cardinality::ZeroOrMore,
            TokenKind::OccurrenceOneOrMore => Cardinality::OneOrMore,
            _ => return Ok(ty),
        };
        self.next()?;
        Ok(ty.with_cardinality(cardinality))
    }

    fn atomic_item_type(&self, name: &ExpandedName, tok: &Token) -> Result<SequenceType, Error> {
        if let Some(code) = builtin_code(name) {
            if code == XmlTypeCode::AnyAtomicType || code.is_atomic() {
                return Ok(SequenceType::atomic(code, Cardinality::One));
            }
            return Err(Self::static_error(
                ErrorCode::XPST0051,
                format!("{name} is not an atomic type"),
                tok,
            ));
        }
        match self.ctx.schema.resolve_type(name) {
            Some(SchemaType::Simple { base, .. }) => {
                Ok(SequenceType::atomic(base, Cardinality::One).with_schema_type(name.clone()))
            }
            _ => Err(Self::static_error(
                ErrorCode::XPST0051,
                format!("{name} is not a known atomic type"),
                tok,
            )),
        }
    }

    /// `node()`, `text()`, `element(N, T?)`, `document-node(element(..))`, ...
    /// The lexer has already queued the opening parenthesis.
    fn parse_kind_test(&mut self) -> Result<SequenceType, Error> {
        let tok = self.expect(TokenKind::KindKeyword)?;
        let keyword = tok.text().unwrap_or_default().to_string();
        self.expect(TokenKind::LParen)?;
        let ty = match keyword.as_str() {
            "node" => SequenceType::node(XmlTypeCode::Node),
            "text" => SequenceType::node(XmlTypeCode::Text),
            "comment" => SequenceType::node(XmlTypeCode::Comment),
            "processing-instruction" => {
                let ty = SequenceType::node(XmlTypeCode::ProcessingInstruction);
                let name_tok = self.peek()?.clone();
                match name_tok.kind {
                    TokenKind::QName | TokenKind::StringLiteral => {
                        self.next()?;
                        let target = name_tok.text().unwrap_or_default().split_whitespace().collect::<Vec<_>>().join(" ");
                        ty.with_name(NameConstraint::Name(ExpandedName::local(target)))
                    }
                    _ => ty,
                }
            }
            "document-node" => {
                let mut ty = SequenceType::node(XmlTypeCode::Document);
                if self.at(TokenKind::KindKeyword)? {
                    let inner_tok = self.peek()?.clone();
                    if !matches!(inner_tok.text(), Some("element" | "schema-element")) {
                        return Err(Self::static_error(
                            ErrorCode::XPST0003,
                            "document-node() accepts only an element test",
                            &inner_tok,
                        ));
                    }
                    ty.document_element = Some(Box::new(self.parse_kind_test()?));
                }
                ty
            }
            "element" | "attribute" => {
                let is_element = keyword == "element";
                let kind = if is_element {
                    XmlTypeCode::Element
                } else {
                    XmlTypeCode::Attribute
                };
                let mut ty = SequenceType::node(kind);
                let name_tok = self.peek()?.clone();
                match name_tok.kind {
                    TokenKind::Wildcard => {
                        self.next()?;
                        ty = ty.with_name(NameConstraint::Any);
                    }
                    TokenKind::QName => {
                        self.next()?;
                        let default_ns = if is_element { self.default_element_ns() } else { None };
                        ty = ty.with_name(NameConstraint::Name(self.resolve_name(&name_tok, default_ns)?));
                    }
                    _ => {}
                }
                if ty.name.is_some() && self.eat(TokenKind::Comma)? {
                    let type_tok = self.expect(TokenKind::QName)?;
                    let type_name = self.resolve_name(&type_tok, self.default_element_ns())?;
                    if self.ctx.schema.resolve_type(&type_name).is_none() {
                        return Err(Self::static_error(
                            ErrorCode::XPST0008,
                            format!("type {type_name} is not defined"),
                            &type_tok,
                        ));
                    }
                    ty = ty.with_schema_type(type_name);
                    if is_element && self.eat(TokenKind::OccurrenceOptional)? {
                        ty.nillable = true;
                    }
                }
                ty
            }
            "schema-element" | "schema-attribute" => {
                let is_element = keyword == "schema-element";
                let name_tok = self.expect(TokenKind::QName)?;
                let default_ns = if is_element { self.default_element_ns() } else { None };
                let name = self.resolve_name(&name_tok, default_ns)?;
                let declared = if is_element {
                    self.ctx.schema.element_declaration(&name)
                } else {
                    self.ctx.schema.attribute_declaration(&name)
                };
                let Some(decl_type) = declared else {
                    return Err(Self::static_error(
                        ErrorCode::XPST0008,
                        format!("no global declaration for {name}"),
                        &name_tok,
                    ));
                };
                let kind = if is_element {
                    XmlTypeCode::Element
                } else {
                    XmlTypeCode::Attribute
                };
                let mut ty = SequenceType::node(kind)
                    .with_name(NameConstraint::Name(name))
                    .with_schema_type(decl_type);
                ty.schema_declared = true;
                ty
            }
            other => {
                return Err(Self::static_error(
                    ErrorCode::XPST0003,
                    format!("'{other}()' is not allowed here"),
                    &tok,
                ));
            }
        };
        self.expect(TokenKind::RParen)?;
        Ok(ty)
    }
}

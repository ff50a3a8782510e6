//! Typed AST for XPath 2.0 expressions.
//! References: W3C XPath 2.0 (section 3), XDM 1.0 and XQuery Functions & Operators.
//!
//! Every node carries a [`ResultType`] computed once by the parser. The
//! evaluator consults it instead of re-deriving static types per call.

use crate::xdm::{ExpandedName, SequenceType, XdmAtomicValue, XmlTypeCode};

/// Static result-type tag of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    /// Zero or more nodes in document order.
    NodeSet,
    Number,
    String,
    Boolean,
    DateTime,
    Duration,
    QName,
    AnyUri,
    /// Exactly one node.
    Navigator,
    /// Unknown until evaluation.
    Any,
    /// A known atomic type outside the groups above (binary, g* types, ...).
    Other,
}

impl ResultType {
    pub fn from_type_code(code: XmlTypeCode) -> Self {
        if code.is_numeric() {
            return ResultType::Number;
        }
        if code.is_string_derived() || code == XmlTypeCode::UntypedAtomic {
            return ResultType::String;
        }
        if code.is_duration() {
            return ResultType::Duration;
        }
        match code {
            XmlTypeCode::Boolean => ResultType::Boolean,
            XmlTypeCode::DateTime | XmlTypeCode::Date | XmlTypeCode::Time => ResultType::DateTime,
            XmlTypeCode::QName => ResultType::QName,
            XmlTypeCode::AnyUri => ResultType::AnyUri,
            c if c.is_node() => ResultType::Navigator,
            XmlTypeCode::Item | XmlTypeCode::AnyAtomicType | XmlTypeCode::None => ResultType::Any,
            _ => ResultType::Other,
        }
    }

    /// True for tags that always denote a single atomic value.
    pub fn is_atomic_singleton(self) -> bool {
        !matches!(self, ResultType::NodeSet | ResultType::Navigator | ResultType::Any)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
}

/// Relation shared by general (`=`) and value (`eq`) comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompOp {
    /// `a op b` rewritten as `b op' a`.
    pub fn swapped(self) -> Self {
        match self {
            CompOp::Lt => CompOp::Gt,
            CompOp::Le => CompOp::Ge,
            CompOp::Gt => CompOp::Lt,
            CompOp::Ge => CompOp::Le,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeComp {
    Is,
    Precedes,
    Follows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Arithmetic(ArithOp),
    GeneralComparison(CompOp),
    ValueComparison(CompOp),
    NodeComparison(NodeComp),
    Set(SetOp),
    And,
    Or,
}

/// How a binary operator prepares its operands before the operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Both operand sequences atomized in full (general comparisons).
    Atomized,
    /// Each operand reduced to at most one item; a second item is `XPTY0004`.
    Singleton,
    /// Node sequences; the result is in document order without duplicates.
    Ordered,
    /// Operands handed over untouched (`and`/`or` short-circuit).
    Plain,
}

impl BinaryOp {
    pub fn coercion(self) -> Coercion {
        match self {
            BinaryOp::GeneralComparison(_) => Coercion::Atomized,
            BinaryOp::Arithmetic(_) | BinaryOp::ValueComparison(_) | BinaryOp::NodeComparison(_) => {
                Coercion::Singleton
            }
            BinaryOp::Set(_) => Coercion::Ordered,
            BinaryOp::And | BinaryOp::Or => Coercion::Plain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Some,
    Every,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    Attribute,
    SelfAxis,
    DescendantOrSelf,
    FollowingSibling,
    Following,
    Namespace,
    Parent,
    Ancestor,
    PrecedingSibling,
    Preceding,
    AncestorOrSelf,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "following" => Axis::Following,
            "namespace" => Axis::Namespace,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "preceding-sibling" => Axis::PrecedingSibling,
            "preceding" => Axis::Preceding,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            _ => return None,
        })
    }

    /// Reverse axes number their positions from the context node outwards.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling | Axis::Preceding
        )
    }

    /// Node kind selected by a name test on this axis.
    pub fn principal_kind(self) -> XmlTypeCode {
        match self {
            Axis::Attribute => XmlTypeCode::Attribute,
            Axis::Namespace => XmlTypeCode::Namespace,
            _ => XmlTypeCode::Element,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    /// Fully resolved name.
    Name(ExpandedName),
    /// `*`
    Any,
    /// `prefix:*`, holding the resolved namespace URI.
    Namespace(String),
    /// `*:local`
    Local(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    Name(NameTest),
    /// `node()`, `text()`, `element(...)`, ... as a node-kind `SequenceType`.
    Kind(SequenceType),
}

/// A predicate together with whether it reads `last()`, so the context size
/// is only computed when needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub expr: Expr,
    pub uses_last: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(XdmAtomicValue),
    VarRef(ExpandedName),
    /// `.`
    ContextItem,
    /// Leading `/`: the root of the tree containing the context node.
    Root,
    /// `E1/E2/...`; the first step may be `Root`.
    Path(Vec<Expr>),
    AxisStep {
        axis: Axis,
        test: NodeTest,
        predicates: Vec<Predicate>,
    },
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Predicate>,
    },
    Binary {
        op: BinaryOp,
        strategy: Coercion,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        negate: bool,
        expr: Box<Expr>,
    },
    For {
        var: ExpandedName,
        in_expr: Box<Expr>,
        body: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Quantified {
        quantifier: Quantifier,
        var: ExpandedName,
        in_expr: Box<Expr>,
        satisfies: Box<Expr>,
    },
    /// `E cast as T?`; `target.type_code` is always a built-in atomic type.
    Cast {
        expr: Box<Expr>,
        target: SequenceType,
        literal: bool,
    },
    Castable {
        expr: Box<Expr>,
        target: SequenceType,
        literal: bool,
    },
    TreatAs {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    InstanceOf {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    FunctionCall {
        name: ExpandedName,
        args: Vec<Expr>,
    },
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub result: ResultType,
}

impl Expr {
    pub fn new(kind: ExprKind, result: ResultType) -> Self {
        Self { kind, result }
    }

    pub fn literal(value: XdmAtomicValue) -> Self {
        let result = ResultType::from_type_code(value.type_code());
        Self::new(ExprKind::Literal(value), result)
    }

    pub fn empty_sequence() -> Self {
        Self::new(ExprKind::Sequence(Vec::new()), ResultType::Any)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_))
    }

    /// Whether evaluating this expression under a focus reads `last()` of that
    /// focus. Predicates and path steps establish their own focus, so only
    /// their left-hand inputs are inspected.
    pub fn uses_last(&self) -> bool {
        match &self.kind {
            ExprKind::FunctionCall { name, args } => {
                (name.local == "last" && args.is_empty() && name.ns_uri.as_deref() == Some(crate::consts::FNS))
                    || args.iter().any(Expr::uses_last)
            }
            ExprKind::Literal(_) | ExprKind::VarRef(_) | ExprKind::ContextItem | ExprKind::Root => false,
            ExprKind::AxisStep { .. } => false,
            ExprKind::Path(steps) => steps.first().is_some_and(Expr::uses_last),
            ExprKind::Filter { primary, .. } => primary.uses_last(),
            ExprKind::Binary { left, right, .. } => left.uses_last() || right.uses_last(),
            ExprKind::Unary { expr, .. }
            | ExprKind::Cast { expr, .. }
            | ExprKind::Castable { expr, .. }
            | ExprKind::TreatAs { expr, .. }
            | ExprKind::InstanceOf { expr, .. } => expr.uses_last(),
            ExprKind::For { in_expr, body, .. } => in_expr.uses_last() || body.uses_last(),
            ExprKind::Quantified { in_expr, satisfies, .. } => in_expr.uses_last() || satisfies.uses_last(),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => cond.uses_last() || then_branch.uses_last() || else_branch.uses_last(),
            ExprKind::Range { start, end } => start.uses_last() || end.uses_last(),
            ExprKind::Sequence(items) => items.iter().any(Expr::uses_last),
        }
    }
}

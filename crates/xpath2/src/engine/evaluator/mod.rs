//! Tree-walking evaluator over the typed AST.
//!
//! Every expression evaluates to a restartable [`SequenceCursor`]. Ranges,
//! `for`, sequence concatenation, axis steps, predicates and `treat`/`cast`
//! stay lazy; the remaining operators materialize their (usually small)
//! results into a [`VecCursor`].
//!
//! Binary operators prepare their operands according to the [`Coercion`]
//! strategy the parser attached, so the cardinality and atomization rules live
//! in one place instead of in every operator.

mod casting;
mod comparison;
mod cursors;
mod numeric;
mod set_ops;
mod type_check;

use std::sync::Arc;

use crate::engine::collation::{Collation, resolve_collation};
use crate::engine::runtime::{
    CallCtx, DynamicContext, Error, ErrorCode, FancyRegexProvider, Focus, RegexProvider, StaticContext,
};
use crate::model::{NodeKind, XdmNode};
use crate::parser::ast::{BinaryOp, Coercion, Expr, ExprKind, Quantifier};
use crate::xdm::{
    BoxedCursor, ChainCursor, ExpandedName, SequenceCursor, VecCursor, XdmAtomicValue, XdmItem, XdmSequence,
    XdmSequenceStream,
};

pub(crate) use casting::{
    as_decimal, cast_atomic, collapse_whitespace, is_ncname, number_or_nan, untyped_to_double,
};
pub(crate) use comparison::{CompareCtx, compare_order, op_eq};
pub(crate) use numeric::{NumKind, arithmetic, classify, unify_numeric};
pub(crate) use set_ops::document_order;
pub(crate) use type_check::{instance_of, item_matches};

use cursors::{AxisCursor, CardinalityCursor, Conversion, FilterCursor, ForCursor, RangeCursor};

/// A variable binding introduced by `for`, `some` or `every`.
struct Frame<N> {
    name: ExpandedName,
    value: XdmSequence<N>,
    parent: Option<Arc<Frame<N>>>,
}

/// Focus plus the chain of local variable bindings.
pub(crate) struct Env<N> {
    focus: Option<Focus<N>>,
    vars: Option<Arc<Frame<N>>>,
}

impl<N: Clone> Clone for Env<N> {
    fn clone(&self) -> Self {
        Self {
            focus: self.focus.clone(),
            vars: self.vars.clone(),
        }
    }
}

impl<N: Clone> Env<N> {
    fn with_focus(&self, focus: Focus<N>) -> Self {
        Self {
            focus: Some(focus),
            vars: self.vars.clone(),
        }
    }

    fn bind(&self, name: ExpandedName, value: XdmSequence<N>) -> Self {
        Self {
            focus: self.focus.clone(),
            vars: Some(Arc::new(Frame {
                name,
                value,
                parent: self.vars.clone(),
            })),
        }
    }

    fn lookup(&self, name: &ExpandedName) -> Option<&XdmSequence<N>> {
        let mut frame = self.vars.as_deref();
        while let Some(f) = frame {
            if &f.name == name {
                return Some(&f.value);
            }
            frame = f.parent.as_deref();
        }
        None
    }
}

/// Evaluation state shared by every cursor of one evaluation; cheap to clone.
pub struct Evaluator<'a, N> {
    dyn_ctx: &'a DynamicContext<N>,
    static_ctx: &'a StaticContext,
    default_collation: Arc<dyn Collation>,
    regex: Arc<dyn RegexProvider>,
}

impl<N> Clone for Evaluator<'_, N> {
    fn clone(&self) -> Self {
        Self {
            dyn_ctx: self.dyn_ctx,
            static_ctx: self.static_ctx,
            default_collation: Arc::clone(&self.default_collation),
            regex: Arc::clone(&self.regex),
        }
    }
}

fn collect<'a, N: 'static + XdmNode>(cursor: BoxedCursor<'a, N>) -> Result<XdmSequence<N>, Error> {
    XdmSequenceStream::new(cursor).materialize()
}

fn boxed<'a, N: 'static + XdmNode>(items: XdmSequence<N>) -> BoxedCursor<'a, N> {
    Box::new(VecCursor::new(items))
}

fn single<'a, N: 'static + XdmNode>(v: XdmAtomicValue) -> BoxedCursor<'a, N> {
    Box::new(VecCursor::single(XdmItem::Atomic(v)))
}

fn empty<'a, N: 'static + XdmNode>() -> BoxedCursor<'a, N> {
    Box::new(VecCursor::empty())
}

/// Typed values of every item, in order.
pub(crate) fn atomize<N: XdmNode>(seq: XdmSequence<N>) -> Vec<XdmAtomicValue> {
    let mut out = Vec::with_capacity(seq.len());
    for item in seq {
        match item {
            XdmItem::Atomic(a) => out.push(a),
            XdmItem::Node(n) => out.extend(n.typed_value()),
        }
    }
    out
}

/// Effective boolean value (XPath 2.0 section 2.4.3), pulling at most two items.
pub(crate) fn effective_boolean_value<'a, N: XdmNode + 'a>(
    cursor: &mut (dyn SequenceCursor<'a, N> + 'a),
) -> Result<bool, Error> {
    let first = match cursor.next_item() {
        None => return Ok(false),
        Some(item) => item?,
    };
    let atomic = match first {
        XdmItem::Node(_) => return Ok(true),
        XdmItem::Atomic(a) => a,
    };
    if cursor.next_item().transpose()?.is_some() {
        return Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value is not defined for a sequence of two or more atomic values",
        ));
    }
    match &atomic {
        XdmAtomicValue::Boolean(b) => Ok(*b),
        v if v.is_string_like() => Ok(!v.as_str().unwrap_or_default().is_empty()),
        v => match classify(v) {
            Some(n) => Ok(!(n.is_nan() || n.to_f64() == 0.0)),
            None => Err(Error::from_code(
                ErrorCode::FORG0006,
                format!("effective boolean value is not defined for {}", v.type_code()),
            )),
        },
    }
}

fn more_than_one(what: &str) -> Error {
    Error::from_code(ErrorCode::XPTY0004, format!("{what} requires at most one item"))
}

impl<'a, N: 'static + XdmNode> Evaluator<'a, N> {
    pub fn new(static_ctx: &'a StaticContext, dyn_ctx: &'a DynamicContext<N>) -> Result<Self, Error> {
        let default_collation = resolve_collation(dyn_ctx, static_ctx, None)?;
        let regex = dyn_ctx
            .regex
            .clone()
            .unwrap_or_else(|| Arc::new(FancyRegexProvider) as Arc<dyn RegexProvider>);
        Ok(Self {
            dyn_ctx,
            static_ctx,
            default_collation,
            regex,
        })
    }

    /// Evaluate `expr` with the dynamic context's context item as the focus.
    pub fn evaluate(&self, expr: &'a Expr) -> Result<XdmSequenceStream<'a, N>, Error> {
        let env = Env {
            focus: self.dyn_ctx.context_item.clone().map(|item| Focus {
                item,
                position: 1,
                size: Some(1),
            }),
            vars: None,
        };
        Ok(XdmSequenceStream::new(self.eval(expr, &env)?))
    }

    pub(crate) fn compare_ctx(&self) -> CompareCtx<'_> {
        CompareCtx {
            collation: self.default_collation.as_ref(),
            implicit_tz: self.dyn_ctx.implicit_timezone(),
            static_ctx: self.static_ctx,
        }
    }

    fn context_item(env: &Env<N>) -> Result<&XdmItem<N>, Error> {
        env.focus
            .as_ref()
            .map(|f| &f.item)
            .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context item is undefined"))
    }

    fn context_node(env: &Env<N>) -> Result<N, Error> {
        match Self::context_item(env)? {
            XdmItem::Node(n) => Ok(n.clone()),
            XdmItem::Atomic(a) => Err(Error::from_code(
                ErrorCode::XPTY0020,
                format!("context item is an atomic value of type {}, not a node", a.type_code()),
            )),
        }
    }

    pub(crate) fn eval(&self, expr: &'a Expr, env: &Env<N>) -> Result<BoxedCursor<'a, N>, Error> {
        match &expr.kind {
            ExprKind::Literal(v) => Ok(single(v.clone())),
            ExprKind::VarRef(name) => {
                let value = env
                    .lookup(name)
                    .or_else(|| self.dyn_ctx.variables.get(name))
                    .ok_or_else(|| Error::from_code(ErrorCode::XPST0008, format!("variable ${name} is not bound")))?;
                Ok(boxed(value.clone()))
            }
            ExprKind::ContextItem => Ok(Box::new(VecCursor::single(Self::context_item(env)?.clone()))),
            ExprKind::Root => {
                let node = Self::context_node(env)?;
                let mut root = node;
                while let Some(p) = root.parent() {
                    root = p;
                }
                if root.kind() != NodeKind::Document {
                    return Err(Error::from_code(
                        ErrorCode::XPDY0050,
                        "the root of the tree containing the context item is not a document node",
                    ));
                }
                Ok(Box::new(VecCursor::single(XdmItem::Node(root))))
            }
            ExprKind::Path(steps) => Ok(boxed(self.eval_path(steps, env)?)),
            ExprKind::AxisStep { axis, test, predicates } => {
                let node = Self::context_node(env)?;
                let mut cursor: BoxedCursor<'a, N> = Box::new(AxisCursor::new(self.clone(), node, *axis, test));
                for pred in predicates {
                    cursor = Box::new(FilterCursor::new(self.clone(), pred, env.clone(), cursor));
                }
                if axis.is_reverse() {
                    let mut items = collect(cursor)?;
                    items.reverse();
                    return Ok(boxed(items));
                }
                Ok(cursor)
            }
            ExprKind::Filter { primary, predicates } => {
                let mut cursor = self.eval(primary, env)?;
                for pred in predicates {
                    cursor = Box::new(FilterCursor::new(self.clone(), pred, env.clone(), cursor));
                }
                Ok(cursor)
            }
            ExprKind::Binary {
                op,
                strategy,
                left,
                right,
            } => self.eval_binary(*op, *strategy, left, right, env),
            ExprKind::Unary { negate, expr: operand } => {
                let Some(v) = self.atomized_singleton(operand, env, "unary arithmetic")? else {
                    return Ok(empty());
                };
                let v = match v {
                    XdmAtomicValue::UntypedAtomic(s) => untyped_to_double(&s)?,
                    other => other,
                };
                if !v.is_numeric() {
                    return Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        format!("unary arithmetic is not defined for {}", v.type_code()),
                    ));
                }
                Ok(single(if *negate { numeric::negate(&v)? } else { v }))
            }
            ExprKind::For { var, in_expr, body } => {
                let input = self.eval(in_expr, env)?;
                Ok(Box::new(ForCursor::new(self.clone(), var, body, env.clone(), input)))
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut c = self.eval(cond, env)?;
                if effective_boolean_value(c.as_mut())? {
                    self.eval(then_branch, env)
                } else {
                    self.eval(else_branch, env)
                }
            }
            ExprKind::Quantified {
                quantifier,
                var,
                in_expr,
                satisfies,
            } => {
                let mut input = self.eval(in_expr, env)?;
                let want = matches!(quantifier, Quantifier::Some);
                while let Some(item) = input.next_item() {
                    let scope = env.bind(var.clone(), vec![item?]);
                    let mut c = self.eval(satisfies, &scope)?;
                    if effective_boolean_value(c.as_mut())? == want {
                        return Ok(single(XdmAtomicValue::Boolean(want)));
                    }
                }
                Ok(single(XdmAtomicValue::Boolean(!want)))
            }
            ExprKind::Cast {
                expr: operand,
                target,
                literal,
            } => {
                let input = self.eval(operand, env)?;
                Ok(Box::new(CardinalityCursor::new(
                    self.clone(),
                    input,
                    Conversion::Cast {
                        target,
                        literal: *literal,
                    },
                )))
            }
            ExprKind::Castable {
                expr: operand,
                target,
                literal,
            } => {
                // only the cardinality check and the cast itself turn into `false`
                let values = atomize(collect(self.eval(operand, env)?)?);
                let ok = match values.as_slice() {
                    [] => target.accepts_count(0),
                    [v] => cast_atomic(v, target.type_code, *literal, self.static_ctx).is_ok(),
                    _ => false,
                };
                Ok(single(XdmAtomicValue::Boolean(ok)))
            }
            ExprKind::TreatAs { expr: operand, ty } => {
                let input = self.eval(operand, env)?;
                Ok(Box::new(CardinalityCursor::new(self.clone(), input, Conversion::Treat(ty))))
            }
            ExprKind::InstanceOf { expr: operand, ty } => {
                let mut input = self.eval(operand, env)?;
                let matched = instance_of(input.as_mut(), ty, self.static_ctx.schema.as_ref())?;
                Ok(single(XdmAtomicValue::Boolean(matched)))
            }
            ExprKind::FunctionCall { name, args } => self.call_function(name, args, env),
            ExprKind::Range { start, end } => {
                let (Some(lo), Some(hi)) = (self.range_bound(start, env)?, self.range_bound(end, env)?) else {
                    return Ok(empty());
                };
                Ok(Box::new(RangeCursor::new(lo, hi)))
            }
            ExprKind::Sequence(items) => {
                if items.is_empty() {
                    return Ok(empty());
                }
                let parts = items.iter().map(|e| self.eval(e, env)).collect::<Result<Vec<_>, _>>()?;
                Ok(Box::new(ChainCursor::new(parts)))
            }
        }
    }

    /// `E1/E2/...`: each step runs once per item of the previous step with that
    /// item as the focus. Node results come back in document order without
    /// duplicates; a step may not mix nodes and atomic values.
    fn eval_path(&self, steps: &'a [Expr], env: &Env<N>) -> Result<XdmSequence<N>, Error> {
        let Some((first, rest)) = steps.split_first() else {
            return Ok(Vec::new());
        };
        let mut current = collect(self.eval(first, env)?)?;
        for step in rest {
            let size = current.len();
            let mut out: XdmSequence<N> = Vec::new();
            let (mut nodes, mut atomics) = (false, false);
            for (idx, item) in current.into_iter().enumerate() {
                if !item.is_node() {
                    return Err(Error::from_code(
                        ErrorCode::XPTY0019,
                        "a path step was applied to an atomic value",
                    ));
                }
                let scope = env.with_focus(Focus {
                    item,
                    position: idx + 1,
                    size: Some(size),
                });
                let mut c = self.eval(step, &scope)?;
                while let Some(r) = c.next_item() {
                    let r = r?;
                    if r.is_node() {
                        nodes = true;
                    } else {
                        atomics = true;
                    }
                    out.push(r);
                }
            }
            if nodes && atomics {
                return Err(Error::from_code(
                    ErrorCode::XPTY0018,
                    "the result of a path step mixes nodes and atomic values",
                ));
            }
            current = if nodes {
                let ordered = document_order(out.into_iter().filter_map(|i| i.as_node().cloned()).collect())?;
                ordered.into_iter().map(XdmItem::Node).collect()
            } else {
                out
            };
        }
        Ok(current)
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        strategy: Coercion,
        left: &'a Expr,
        right: &'a Expr,
        env: &Env<N>,
    ) -> Result<BoxedCursor<'a, N>, Error> {
        match strategy {
            Coercion::Plain => {
                let mut l = self.eval(left, env)?;
                let lv = effective_boolean_value(l.as_mut())?;
                let result = match op {
                    BinaryOp::And if !lv => false,
                    BinaryOp::Or if lv => true,
                    _ => {
                        let mut r = self.eval(right, env)?;
                        effective_boolean_value(r.as_mut())?
                    }
                };
                Ok(single(XdmAtomicValue::Boolean(result)))
            }
            Coercion::Atomized => {
                let BinaryOp::GeneralComparison(cmp) = op else {
                    return Err(Error::from_code(ErrorCode::XPTY0004, "operator does not take atomized sequences"));
                };
                let lhs = atomize(collect(self.eval(left, env)?)?);
                let rhs = atomize(collect(self.eval(right, env)?)?);
                let result = comparison::general_compare(cmp, &lhs, &rhs, &self.compare_ctx())?;
                Ok(single(XdmAtomicValue::Boolean(result)))
            }
            Coercion::Singleton => match op {
                BinaryOp::NodeComparison(cmp) => {
                    let (Some(a), Some(b)) = (
                        self.singleton_item(left, env, "node comparison")?,
                        self.singleton_item(right, env, "node comparison")?,
                    ) else {
                        return Ok(empty());
                    };
                    match (a, b) {
                        (XdmItem::Node(a), XdmItem::Node(b)) => Ok(single(XdmAtomicValue::Boolean(
                            comparison::node_compare(cmp, &a, &b)?,
                        ))),
                        _ => Err(Error::from_code(ErrorCode::XPTY0004, "node comparison requires nodes")),
                    }
                }
                BinaryOp::ValueComparison(cmp) => {
                    let (Some(a), Some(b)) = (
                        self.atomized_singleton(left, env, "value comparison")?,
                        self.atomized_singleton(right, env, "value comparison")?,
                    ) else {
                        return Ok(empty());
                    };
                    let result = comparison::value_compare(cmp, &a, &b, &self.compare_ctx())?;
                    Ok(single(XdmAtomicValue::Boolean(result)))
                }
                BinaryOp::Arithmetic(arith) => {
                    let (Some(a), Some(b)) = (
                        self.atomized_singleton(left, env, "arithmetic")?,
                        self.atomized_singleton(right, env, "arithmetic")?,
                    ) else {
                        return Ok(empty());
                    };
                    let promote = |v: XdmAtomicValue| match v {
                        XdmAtomicValue::UntypedAtomic(s) => untyped_to_double(&s),
                        other => Ok(other),
                    };
                    let value = numeric::arithmetic(arith, &promote(a)?, &promote(b)?, self.dyn_ctx.implicit_timezone())?;
                    Ok(single(value))
                }
                _ => Err(Error::from_code(ErrorCode::XPTY0004, "operator does not take singleton operands")),
            },
            Coercion::Ordered => {
                let BinaryOp::Set(set) = op else {
                    return Err(Error::from_code(ErrorCode::XPTY0004, "operator does not order its result"));
                };
                let lhs = collect(self.eval(left, env)?)?;
                let rhs = collect(self.eval(right, env)?)?;
                Ok(boxed(set_ops::set_operation(set, lhs, rhs)?))
            }
        }
    }

    fn singleton_item(&self, expr: &'a Expr, env: &Env<N>, what: &str) -> Result<Option<XdmItem<N>>, Error> {
        let mut c = self.eval(expr, env)?;
        let Some(first) = c.next_item().transpose()? else {
            return Ok(None);
        };
        if c.next_item().is_some() {
            return Err(more_than_one(what));
        }
        Ok(Some(first))
    }

    fn atomized_singleton(&self, expr: &'a Expr, env: &Env<N>, what: &str) -> Result<Option<XdmAtomicValue>, Error> {
        match self.singleton_item(expr, env, what)? {
            None => Ok(None),
            Some(XdmItem::Atomic(a)) => Ok(Some(a)),
            Some(XdmItem::Node(n)) => {
                let mut values = n.typed_value();
                if values.len() > 1 {
                    return Err(more_than_one(what));
                }
                Ok(values.pop())
            }
        }
    }

    fn range_bound(&self, expr: &'a Expr, env: &Env<N>) -> Result<Option<i64>, Error> {
        let Some(v) = self.atomized_singleton(expr, env, "range")? else {
            return Ok(None);
        };
        let v = match v {
            XdmAtomicValue::UntypedAtomic(_) => {
                cast_atomic(&v, crate::xdm::XmlTypeCode::Integer, false, self.static_ctx)?
            }
            other => other,
        };
        let i = v.as_integer().ok_or_else(|| {
            Error::from_code(ErrorCode::XPTY0004, format!("range bounds must be integers, got {}", v.type_code()))
        })?;
        i64::try_from(i)
            .map(Some)
            .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "range bound is out of range"))
    }

    fn call_function(&self, name: &ExpandedName, args: &'a [Expr], env: &Env<N>) -> Result<BoxedCursor<'a, N>, Error> {
        let values = args
            .iter()
            .map(|a| self.eval(a, env).and_then(collect))
            .collect::<Result<Vec<_>, _>>()?;
        let f = self
            .dyn_ctx
            .functions
            .resolve(name, values.len(), self.static_ctx.default_function_namespace.as_deref())
            .map_err(|e| e.into_error())?;
        let ctx = CallCtx {
            dyn_ctx: self.dyn_ctx,
            static_ctx: self.static_ctx,
            focus: env.focus.as_ref(),
            default_collation: Arc::clone(&self.default_collation),
            regex: Arc::clone(&self.regex),
        };
        Ok(boxed(f(&ctx, &values)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ebv_rejects_two_atomics() {
        let mut c: VecCursor<crate::simple_node::SimpleNode> = VecCursor::new(vec![
            XdmItem::Atomic(XdmAtomicValue::Integer(1)),
            XdmItem::Atomic(XdmAtomicValue::Integer(2)),
        ]);
        let err = effective_boolean_value(&mut c).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORG0006);
    }

    #[test]
    fn env_lookup_prefers_innermost_binding() {
        let name = ExpandedName::local("x");
        let env: Env<crate::simple_node::SimpleNode> = Env { focus: None, vars: None };
        let outer = env.bind(name.clone(), vec![XdmItem::Atomic(XdmAtomicValue::Integer(1))]);
        let inner = outer.bind(name.clone(), vec![XdmItem::Atomic(XdmAtomicValue::Integer(2))]);
        assert_eq!(
            inner.lookup(&name),
            Some(&vec![XdmItem::Atomic(XdmAtomicValue::Integer(2))])
        );
    }
}

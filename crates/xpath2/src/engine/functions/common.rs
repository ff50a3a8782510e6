//! Argument coercion shared by the built-in functions.

use std::sync::Arc;

use crate::engine::collation::{Collation, resolve_collation};
use crate::engine::evaluator::{
    CompareCtx, NumKind, atomize, classify, effective_boolean_value, op_eq, untyped_to_double,
};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::{VecCursor, XdmAtomicValue, XdmItem, XdmSequence};

pub(super) fn one<N>(v: XdmAtomicValue) -> XdmSequence<N> {
    vec![XdmItem::Atomic(v)]
}

pub(super) fn boolean<N>(b: bool) -> XdmSequence<N> {
    one(XdmAtomicValue::Boolean(b))
}

pub(super) fn string<N>(s: impl Into<String>) -> XdmSequence<N> {
    one(XdmAtomicValue::String(s.into()))
}

pub(super) fn integer<N>(i: i64) -> XdmSequence<N> {
    one(XdmAtomicValue::Integer(i))
}

/// Argument `i`, or an empty slice when the caller used a shorter overload.
pub(super) fn arg<N>(args: &[XdmSequence<N>], i: usize) -> &[XdmItem<N>] {
    args.get(i).map(Vec::as_slice).unwrap_or(&[])
}

pub(super) fn item_string<N: XdmNode>(item: &XdmItem<N>) -> String {
    match item {
        XdmItem::Node(n) => n.string_value(),
        XdmItem::Atomic(a) => a.string_value(),
    }
}

/// Atomize a parameter declared `xs:anyAtomicType?`.
pub(super) fn opt_atomic<N: XdmNode>(seq: &[XdmItem<N>], fname: &str) -> Result<Option<XdmAtomicValue>, Error> {
    let mut atoms = atomize(seq.to_vec()).into_iter();
    let first = atoms.next();
    if atoms.next().is_some() {
        return Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("fn:{fname} expects at most one item"),
        ));
    }
    Ok(first)
}

/// A parameter declared `xs:string?`; the empty sequence reads as `""`.
pub(super) fn string_arg<N: XdmNode>(seq: &[XdmItem<N>], fname: &str) -> Result<String, Error> {
    match opt_atomic(seq, fname)? {
        None => Ok(String::new()),
        Some(v) if v.is_string_like() => Ok(v.string_value()),
        Some(v) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("fn:{fname} expects xs:string, found {}", v.type_code()),
        )),
    }
}

/// A parameter declared `numeric?`; untyped values are promoted to `xs:double`.
pub(super) fn numeric_arg<N: XdmNode>(seq: &[XdmItem<N>], fname: &str) -> Result<Option<NumKind>, Error> {
    let Some(v) = opt_atomic(seq, fname)? else {
        return Ok(None);
    };
    let v = match v {
        XdmAtomicValue::UntypedAtomic(s) => untyped_to_double(&s)?,
        other => other,
    };
    classify(&v).map(Some).ok_or_else(|| {
        Error::from_code(
            ErrorCode::XPTY0004,
            format!("fn:{fname} expects a numeric argument, found {}", v.type_code()),
        )
    })
}

/// A required `xs:double` parameter.
pub(super) fn double_arg<N: XdmNode>(seq: &[XdmItem<N>], fname: &str) -> Result<f64, Error> {
    numeric_arg(seq, fname)?
        .map(NumKind::to_f64)
        .ok_or_else(|| Error::from_code(ErrorCode::XPTY0004, format!("fn:{fname}: empty sequence not allowed")))
}

/// A required `xs:integer` parameter.
pub(super) fn integer_arg<N: XdmNode>(seq: &[XdmItem<N>], fname: &str) -> Result<i64, Error> {
    match opt_atomic(seq, fname)? {
        Some(v) if v.type_code().is_integer_derived() => v
            .as_integer()
            .and_then(|i| i64::try_from(i).ok())
            .ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, format!("fn:{fname}: integer out of range"))),
        Some(XdmAtomicValue::UntypedAtomic(s)) => s.trim().parse::<i64>().map_err(|_| {
            Error::from_code(ErrorCode::FORG0001, format!("fn:{fname}: '{s}' is not a valid xs:integer"))
        }),
        Some(v) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("fn:{fname} expects xs:integer, found {}", v.type_code()),
        )),
        None => Err(Error::from_code(ErrorCode::XPTY0004, format!("fn:{fname}: empty sequence not allowed"))),
    }
}

/// The item a zero-or-one-argument accessor works on: the context item for
/// the zero-argument form, otherwise the (possibly absent) argument.
pub(super) fn item_or_context<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
    fname: &str,
) -> Result<Option<XdmItem<N>>, Error> {
    let Some(seq) = args.first() else {
        return ctx.context_item().map(Some);
    };
    match seq.as_slice() {
        [] => Ok(None),
        [item] => Ok(Some(item.clone())),
        _ => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("fn:{fname} expects at most one item"),
        )),
    }
}

pub(super) fn node_or_context<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
    fname: &str,
) -> Result<Option<N>, Error> {
    match item_or_context(ctx, args, fname)? {
        None => Ok(None),
        Some(XdmItem::Node(n)) => Ok(Some(n)),
        Some(XdmItem::Atomic(a)) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("fn:{fname} expects a node, found {}", a.type_code()),
        )),
    }
}

/// The collation named by argument `idx`, or the default collation when the
/// overload without it was called.
pub(super) fn collation_arg<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
    idx: usize,
    fname: &str,
) -> Result<Arc<dyn Collation>, Error> {
    match args.get(idx) {
        Some(seq) => {
            let uri = string_arg(seq, fname)?;
            resolve_collation(ctx.dyn_ctx, ctx.static_ctx, Some(&uri))
        }
        None => Ok(ctx.default_collation.clone()),
    }
}

pub(super) fn compare_ctx<'c, N>(ctx: &'c CallCtx<N>, collation: &'c dyn Collation) -> CompareCtx<'c> {
    CompareCtx {
        collation,
        implicit_tz: ctx.dyn_ctx.implicit_timezone(),
        static_ctx: ctx.static_ctx,
    }
}

pub(super) fn ebv<N: 'static + XdmNode>(seq: &[XdmItem<N>]) -> Result<bool, Error> {
    let mut cursor = VecCursor::new(seq.to_vec());
    effective_boolean_value(&mut cursor)
}

fn is_nan(v: &XdmAtomicValue) -> bool {
    classify(v).is_some_and(NumKind::is_nan)
}

/// Equality used by `distinct-values`, `index-of` and `deep-equal`:
/// incomparable values are unequal and NaN equals NaN.
pub(super) fn atomic_equal(a: &XdmAtomicValue, b: &XdmAtomicValue, cmp: &CompareCtx<'_>) -> bool {
    (is_nan(a) && is_nan(b)) || op_eq(a, b, cmp, false).unwrap_or(false)
}

fn atoms_equal(a: &[XdmAtomicValue], b: &[XdmAtomicValue], cmp: &CompareCtx<'_>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| atomic_equal(x, y, cmp))
}

fn same_name<N: XdmNode>(a: &N, b: &N) -> bool {
    a.name().map(|q| q.expanded()) == b.name().map(|q| q.expanded())
}

fn significant_children<N: XdmNode>(n: &N) -> Vec<N> {
    n.children()
        .into_iter()
        .filter(|c| !matches!(c.kind(), NodeKind::Comment | NodeKind::ProcessingInstruction))
        .collect()
}

fn nodes_deep_equal<N: XdmNode>(a: &N, b: &N, cmp: &CompareCtx<'_>) -> bool {
    if a.kind() != b.kind() {
        return false;
    }
    match a.kind() {
        NodeKind::Document => children_deep_equal(a, b, cmp),
        NodeKind::Element => {
            if !same_name(a, b) {
                return false;
            }
            let (attrs_a, attrs_b) = (a.attributes(), b.attributes());
            attrs_a.len() == attrs_b.len()
                && attrs_a
                    .iter()
                    .all(|x| attrs_b.iter().any(|y| nodes_deep_equal(x, y, cmp)))
                && children_deep_equal(a, b, cmp)
        }
        NodeKind::Attribute => same_name(a, b) && atoms_equal(&a.typed_value(), &b.typed_value(), cmp),
        NodeKind::ProcessingInstruction | NodeKind::Namespace => {
            same_name(a, b) && a.string_value() == b.string_value()
        }
        NodeKind::Text | NodeKind::Comment => a.string_value() == b.string_value(),
    }
}

fn children_deep_equal<N: XdmNode>(a: &N, b: &N, cmp: &CompareCtx<'_>) -> bool {
    let (ca, cb) = (significant_children(a), significant_children(b));
    ca.len() == cb.len() && ca.iter().zip(&cb).all(|(x, y)| nodes_deep_equal(x, y, cmp))
}

/// `fn:deep-equal` over two sequences under the given comparison settings.
pub(super) fn deep_equal_with_collation<N: XdmNode>(a: &[XdmItem<N>], b: &[XdmItem<N>], cmp: &CompareCtx<'_>) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (XdmItem::Atomic(x), XdmItem::Atomic(y)) => atomic_equal(x, y, cmp),
            (XdmItem::Node(x), XdmItem::Node(y)) => nodes_deep_equal(x, y, cmp),
            _ => false,
        })
}

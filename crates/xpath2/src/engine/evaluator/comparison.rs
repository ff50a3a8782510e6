//! Atomic value comparison for XPath 2.0 value and general comparisons.
//!
//! [`op_eq`] is the single equality primitive: value comparisons call it with
//! `raise_on_mismatch = true`, general comparisons and the sequence functions
//! (`index-of`, `distinct-values`, `deep-equal`) with `false`.

use core::cmp::Ordering;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::engine::collation::Collation;
use crate::engine::runtime::{Error, ErrorCode, StaticContext};
use crate::model::XdmNode;
use crate::parser::ast::{CompOp, NodeComp};
use crate::xdm::XdmAtomicValue;

use super::casting::{cast_atomic, untyped_to_double};
use super::numeric::{NumKind, classify, to_utc, unify_numeric};

/// Everything a comparison needs besides its operands.
#[derive(Clone, Copy)]
pub(crate) struct CompareCtx<'c> {
    pub collation: &'c dyn Collation,
    pub implicit_tz: FixedOffset,
    pub static_ctx: &'c StaticContext,
}

fn mismatch(a: &XdmAtomicValue, b: &XdmAtomicValue) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("cannot compare {} with {}", a.type_code(), b.type_code()),
    )
}

fn to_boolean(v: &XdmAtomicValue) -> Option<bool> {
    if let XdmAtomicValue::Boolean(b) = v {
        return Some(*b);
    }
    if let Some(n) = classify(v) {
        return Some(!(n.is_nan() || n.to_f64() == 0.0));
    }
    match v.as_str().map(str::trim) {
        Some("true" | "1") => Some(true),
        Some("false" | "0") => Some(false),
        _ => None,
    }
}

pub(crate) fn numeric_order(a: NumKind, b: NumKind) -> Option<Ordering> {
    match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => Some(x.cmp(&y)),
        (NumKind::Dec(x), NumKind::Dec(y)) => Some(x.cmp(&y)),
        (NumKind::Float(x), NumKind::Float(y)) => x.partial_cmp(&y),
        (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
    }
}

fn reference_date(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(NaiveTime::MIN))
}

/// Position of a date/time value on the UTC timeline. Partial types (`xs:time`,
/// the `g*` types) are anchored on the 1972 reference dates of F&O 10.4.
fn timeline(v: &XdmAtomicValue, implicit: FixedOffset) -> Option<NaiveDateTime> {
    use XdmAtomicValue as V;
    let (local, tz) = match v {
        V::DateTime { value, tz } => (*value, *tz),
        V::Date { date, tz } => (date.and_time(NaiveTime::MIN), *tz),
        V::Time { time, tz } => (NaiveDate::from_ymd_opt(1972, 12, 31)?.and_time(*time), *tz),
        V::GYearMonth { year, month, tz } => (reference_date(*year, *month, 1)?, *tz),
        V::GYear { year, tz } => (reference_date(*year, 1, 1)?, *tz),
        V::GMonthDay { month, day, tz } => (reference_date(1972, *month, *day)?, *tz),
        V::GDay { day, tz } => (reference_date(1972, 12, *day)?, *tz),
        V::GMonth { month, tz } => (reference_date(1972, *month, 1)?, *tz),
        _ => return None,
    };
    Some(to_utc(local, tz, implicit))
}

/// Equality of two atomic values.
///
/// String-like values compare by collation key; a boolean on either side turns
/// both sides into booleans; numerics compare after promotion; everything else
/// must share a type family.
pub(crate) fn op_eq(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    ctx: &CompareCtx<'_>,
    raise_on_mismatch: bool,
) -> Result<bool, Error> {
    use XdmAtomicValue as V;
    let unresolved = || {
        if raise_on_mismatch {
            Err(mismatch(a, b))
        } else {
            Ok(false)
        }
    };
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str())
        && a.is_string_like()
        && b.is_string_like()
    {
        return Ok(ctx.collation.key(x) == ctx.collation.key(y));
    }
    if matches!(a, V::Boolean(_)) || matches!(b, V::Boolean(_)) {
        return match (to_boolean(a), to_boolean(b)) {
            (Some(x), Some(y)) => Ok(x == y),
            _ => unresolved(),
        };
    }
    if let (Some(x), Some(y)) = (classify(a), classify(b)) {
        return Ok(numeric_order(x, y) == Some(Ordering::Equal));
    }
    if a.is_duration() && b.is_duration() {
        return Ok(duration_parts(a) == duration_parts(b));
    }
    if a.type_code() == b.type_code()
        && let (Some(x), Some(y)) = (timeline(a, ctx.implicit_tz), timeline(b, ctx.implicit_tz))
    {
        return Ok(x == y);
    }
    match (a, b) {
        (
            V::QName {
                ns_uri: n1, local: l1, ..
            },
            V::QName {
                ns_uri: n2, local: l2, ..
            },
        ) => Ok(n1 == n2 && l1 == l2),
        (V::HexBinary(x), V::HexBinary(y)) | (V::Base64Binary(x), V::Base64Binary(y)) => Ok(x == y),
        (V::Notation(x), V::Notation(y)) => Ok(x == y),
        _ => unresolved(),
    }
}

fn duration_parts(v: &XdmAtomicValue) -> (i32, rust_decimal::Decimal) {
    match v {
        XdmAtomicValue::Duration { months, seconds } => (*months, *seconds),
        XdmAtomicValue::YearMonthDuration(m) => (*m, rust_decimal::Decimal::ZERO),
        XdmAtomicValue::DayTimeDuration(s) => (0, *s),
        _ => (0, rust_decimal::Decimal::ZERO),
    }
}

/// `a > b` for string-like operands under the active collation.
pub(crate) fn op_gt(a: &XdmAtomicValue, b: &XdmAtomicValue, ctx: &CompareCtx<'_>) -> Result<bool, Error> {
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) if a.is_string_like() && b.is_string_like() => {
            Ok(ctx.collation.compare(x, y) == Ordering::Greater)
        }
        _ => Err(mismatch(a, b)),
    }
}

/// Ordering of two atomic values; `Ok(None)` when a NaN is involved.
pub(crate) fn compare_order(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    ctx: &CompareCtx<'_>,
) -> Result<Option<Ordering>, Error> {
    use XdmAtomicValue as V;
    if a.is_string_like() && b.is_string_like() {
        return Ok(Some(if op_gt(a, b, ctx)? {
            Ordering::Greater
        } else if op_gt(b, a, ctx)? {
            Ordering::Less
        } else {
            Ordering::Equal
        }));
    }
    if let (Some(x), Some(y)) = (classify(a), classify(b)) {
        return Ok(numeric_order(x, y));
    }
    match (a, b) {
        (V::Boolean(x), V::Boolean(y)) => Ok(Some(x.cmp(y))),
        (V::YearMonthDuration(x), V::YearMonthDuration(y)) => Ok(Some(x.cmp(y))),
        (V::DayTimeDuration(x), V::DayTimeDuration(y)) => Ok(Some(x.cmp(y))),
        (V::DateTime { .. }, V::DateTime { .. }) | (V::Date { .. }, V::Date { .. }) | (V::Time { .. }, V::Time { .. }) => {
            match (timeline(a, ctx.implicit_tz), timeline(b, ctx.implicit_tz)) {
                (Some(x), Some(y)) => Ok(Some(x.cmp(&y))),
                _ => Err(mismatch(a, b)),
            }
        }
        _ => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("values of type {} and {} have no ordering", a.type_code(), b.type_code()),
        )),
    }
}

fn satisfies(op: CompOp, a: &XdmAtomicValue, b: &XdmAtomicValue, ctx: &CompareCtx<'_>, raise: bool) -> Result<bool, Error> {
    Ok(match op {
        CompOp::Eq => op_eq(a, b, ctx, raise)?,
        CompOp::Ne => !op_eq(a, b, ctx, raise)?,
        CompOp::Lt => compare_order(a, b, ctx)? == Some(Ordering::Less),
        CompOp::Le => matches!(compare_order(a, b, ctx)?, Some(Ordering::Less | Ordering::Equal)),
        CompOp::Gt => compare_order(a, b, ctx)? == Some(Ordering::Greater),
        CompOp::Ge => matches!(compare_order(a, b, ctx)?, Some(Ordering::Greater | Ordering::Equal)),
    })
}

/// `eq`, `ne`, `lt`, ... on two atomized singletons. `xs:untypedAtomic` is
/// compared as `xs:string`.
pub(crate) fn value_compare(
    op: CompOp,
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    ctx: &CompareCtx<'_>,
) -> Result<bool, Error> {
    let as_string = |v: &XdmAtomicValue| match v {
        XdmAtomicValue::UntypedAtomic(s) => XdmAtomicValue::String(s.clone()),
        other => other.clone(),
    };
    satisfies(op, &as_string(a), &as_string(b), ctx, true)
}

/// Bring an `xs:untypedAtomic` operand to the type of the other side:
/// `xs:double` against numerics, `xs:string` against string-like values, and
/// a cast to the other side's type otherwise.
pub(crate) fn promote_untyped(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    ctx: &CompareCtx<'_>,
) -> Result<(XdmAtomicValue, XdmAtomicValue), Error> {
    use XdmAtomicValue as V;
    let promote = |u: &str, other: &XdmAtomicValue| -> Result<XdmAtomicValue, Error> {
        if other.is_numeric() {
            untyped_to_double(u)
        } else if other.is_string_like() {
            Ok(V::String(u.to_string()))
        } else {
            cast_atomic(&V::UntypedAtomic(u.to_string()), other.type_code(), false, ctx.static_ctx)
        }
    };
    Ok(match (a, b) {
        (V::UntypedAtomic(x), V::UntypedAtomic(y)) => (V::String(x.clone()), V::String(y.clone())),
        (V::UntypedAtomic(x), other) => (promote(x, other)?, other.clone()),
        (other, V::UntypedAtomic(y)) => (other.clone(), promote(y, other)?),
        _ => (a.clone(), b.clone()),
    })
}

/// Existential comparison over two atomized sequences: true as soon as one
/// pair satisfies `op`. Pairs of incomparable types are skipped.
pub(crate) fn general_compare(
    op: CompOp,
    lhs: &[XdmAtomicValue],
    rhs: &[XdmAtomicValue],
    ctx: &CompareCtx<'_>,
) -> Result<bool, Error> {
    for a in lhs {
        for b in rhs {
            let (x, y) = promote_untyped(a, b, ctx)?;
            match satisfies(op, &x, &y, ctx, false) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.code_enum() == ErrorCode::XPTY0004 => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(false)
}

/// `is`, `<<`, `>>`
pub(crate) fn node_compare<N: XdmNode>(op: NodeComp, a: &N, b: &N) -> Result<bool, Error> {
    Ok(match op {
        NodeComp::Is => a == b,
        NodeComp::Precedes => a.compare_document_order(b)? == Ordering::Less,
        NodeComp::Follows => a.compare_document_order(b)? == Ordering::Greater,
    })
}

use core::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::common::{arg, collation_arg, compare_ctx, integer, integer_arg, numeric_arg, one};
use crate::engine::evaluator::{NumKind, arithmetic, as_decimal, atomize, classify, compare_order, unify_numeric, untyped_to_double};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::parser::ast::ArithOp;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "numeric overflow")
}

fn num_unary<N: XdmNode>(
    args: &[XdmSequence<N>],
    fname: &str,
    f: impl FnOnce(NumKind) -> Result<NumKind, Error>,
) -> Result<XdmSequence<N>, Error> {
    match numeric_arg(arg(args, 0), fname)? {
        None => Ok(vec![]),
        Some(n) => Ok(one(f(n)?.into_atomic())),
    }
}

pub(super) fn abs_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    num_unary(args, "abs", |n| {
        Ok(match n {
            NumKind::Int(i) => NumKind::Int(i.checked_abs().ok_or_else(overflow)?),
            NumKind::Dec(d) => NumKind::Dec(d.abs()),
            NumKind::Float(f) => NumKind::Float(f.abs()),
            NumKind::Double(d) => NumKind::Double(d.abs()),
        })
    })
}

pub(super) fn ceiling_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    num_unary(args, "ceiling", |n| {
        Ok(match n {
            NumKind::Int(i) => NumKind::Int(i),
            NumKind::Dec(d) => NumKind::Dec(d.ceil()),
            NumKind::Float(f) => NumKind::Float(f.ceil()),
            NumKind::Double(d) => NumKind::Double(d.ceil()),
        })
    })
}

pub(super) fn floor_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    num_unary(args, "floor", |n| {
        Ok(match n {
            NumKind::Int(i) => NumKind::Int(i),
            NumKind::Dec(d) => NumKind::Dec(d.floor()),
            NumKind::Float(f) => NumKind::Float(f.floor()),
            NumKind::Double(d) => NumKind::Double(d.floor()),
        })
    })
}

/// Half rounds towards positive infinity; keeps the sign of negative zero.
pub(super) fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    let r = (x + 0.5).floor();
    if r == 0.0 && x < 0.0 { -0.0 } else { r }
}

pub(super) fn round_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    num_unary(args, "round", |n| {
        Ok(match n {
            NumKind::Int(i) => NumKind::Int(i),
            NumKind::Dec(d) => NumKind::Dec(d.checked_add(Decimal::new(5, 1)).ok_or_else(overflow)?.floor()),
            NumKind::Float(f) => NumKind::Float(round_half_up(f64::from(f)) as f32),
            NumKind::Double(d) => NumKind::Double(round_half_up(d)),
        })
    })
}

fn round_even(d: Decimal, precision: i64) -> Result<Decimal, Error> {
    if precision >= 0 {
        return Ok(d.round_dp_with_strategy(precision.min(28) as u32, RoundingStrategy::MidpointNearestEven));
    }
    // 10^29 is past the decimal range: only a zero or an overflow can come out
    if precision < -28 {
        let half = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);
        return if d.abs() <= half { Ok(Decimal::ZERO) } else { Err(overflow()) };
    }
    let factor = Decimal::from_i128_with_scale(10i128.pow((-precision) as u32), 0);
    (d / factor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .checked_mul(factor)
        .ok_or_else(overflow)
}

pub(super) fn round_half_to_even_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let precision = match args.get(1) {
        Some(p) => integer_arg(p, "round-half-to-even")?,
        None => 0,
    };
    num_unary(args, "round-half-to-even", |n| {
        Ok(match n {
            NumKind::Int(i) if precision >= 0 => NumKind::Int(i),
            NumKind::Int(i) => NumKind::Int(round_even(Decimal::from(i), precision)?.to_i64().ok_or_else(overflow)?),
            NumKind::Dec(d) => NumKind::Dec(round_even(d, precision)?),
            NumKind::Float(f) if !f.is_finite() => NumKind::Float(f),
            NumKind::Double(d) if !d.is_finite() => NumKind::Double(d),
            // doubles too large for a decimal are already integral
            other => match as_decimal(other) {
                Some(d) => {
                    let x = other.to_f64();
                    let r = match round_even(d, precision) {
                        Ok(r) => r.to_f64().unwrap_or(x),
                        // past the decimal range a double still has room
                        Err(_) => {
                            let step = 10f64.powi(i32::try_from(-precision).unwrap_or(i32::MAX));
                            (x / step).round_ties_even() * step
                        }
                    };
                    match other {
                        NumKind::Float(_) => NumKind::Float(r as f32),
                        _ => NumKind::Double(r),
                    }
                }
                None => other,
            },
        })
    })
}

/// Atomize an aggregate's input, promoting untyped values to `xs:double`.
fn aggregate_input<N: XdmNode>(seq: &[XdmItem<N>]) -> Result<Vec<XdmAtomicValue>, Error> {
    atomize(seq.to_vec())
        .into_iter()
        .map(|v| match v {
            XdmAtomicValue::UntypedAtomic(s) => untyped_to_double(&s).map_err(|e| e.relabel(ErrorCode::FORG0006)),
            other => Ok(other),
        })
        .collect()
}

fn invalid_aggregate(e: Error) -> Error {
    if e.code_enum() == ErrorCode::XPTY0004 {
        e.relabel(ErrorCode::FORG0006)
    } else {
        e
    }
}

fn summable(v: &XdmAtomicValue, fname: &str) -> Result<(), Error> {
    match v {
        XdmAtomicValue::YearMonthDuration(_) | XdmAtomicValue::DayTimeDuration(_) => Ok(()),
        other if other.is_numeric() => Ok(()),
        other => Err(Error::from_code(
            ErrorCode::FORG0006,
            format!("fn:{fname} cannot aggregate {}", other.type_code()),
        )),
    }
}

fn total<N>(ctx: &CallCtx<N>, values: &[XdmAtomicValue], fname: &str) -> Result<Option<XdmAtomicValue>, Error> {
    let tz = ctx.dyn_ctx.implicit_timezone();
    let mut iter = values.iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    summable(first, fname)?;
    let mut acc = first.clone();
    for v in iter {
        summable(v, fname)?;
        acc = arithmetic(ArithOp::Add, &acc, v, tz).map_err(invalid_aggregate)?;
    }
    Ok(Some(acc))
}

pub(super) fn sum_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let values = aggregate_input(arg(args, 0))?;
    match total(ctx, &values, "sum")? {
        Some(v) => Ok(one(v)),
        None => match args.get(1) {
            Some(zero) => Ok(atomize(zero.clone()).into_iter().map(XdmItem::Atomic).collect()),
            None => Ok(integer(0)),
        },
    }
}

pub(super) fn avg_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let values = aggregate_input(arg(args, 0))?;
    let Some(sum) = total(ctx, &values, "avg")? else {
        return Ok(vec![]);
    };
    let count = XdmAtomicValue::Integer(values.len() as i64);
    let avg = arithmetic(ArithOp::Div, &sum, &count, ctx.dyn_ctx.implicit_timezone()).map_err(invalid_aggregate)?;
    Ok(one(avg))
}

fn extremum<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
    fname: &str,
    wanted: Ordering,
) -> Result<XdmSequence<N>, Error> {
    let values = aggregate_input(arg(args, 0))?;
    let collation = collation_arg(ctx, args, 1, fname)?;
    let cmp = compare_ctx(ctx, collation.as_ref());
    let mut iter = values.into_iter();
    let Some(mut best) = iter.next() else {
        return Ok(vec![]);
    };
    // a lone value must still be orderable
    compare_order(&best, &best, &cmp).map_err(invalid_aggregate)?;
    let mut widest = classify(&best);
    let mut saw_nan = widest.is_some_and(NumKind::is_nan);
    for v in iter {
        let order = compare_order(&v, &best, &cmp).map_err(invalid_aggregate)?;
        if let (Some(w), Some(n)) = (widest, classify(&v)) {
            widest = Some(unify_numeric(w, n).0);
            saw_nan |= n.is_nan();
        }
        if order == Some(wanted) {
            best = v;
        }
    }
    if let (Some(w), Some(b)) = (widest, classify(&best)) {
        let promoted = unify_numeric(b, w).0;
        if saw_nan {
            return Ok(one(match promoted {
                NumKind::Float(_) => XdmAtomicValue::Float(f32::NAN),
                _ => XdmAtomicValue::Double(f64::NAN),
            }));
        }
        return Ok(one(promoted.into_atomic()));
    }
    Ok(one(best))
}

pub(super) fn min_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    extremum(ctx, args, "min", Ordering::Less)
}

pub(super) fn max_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    extremum(ctx, args, "max", Ordering::Greater)
}

pub(super) fn count_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(integer(arg(args, 0).len() as i64))
}

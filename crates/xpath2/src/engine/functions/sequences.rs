use super::common::{
    arg, atomic_equal, boolean, collation_arg, compare_ctx, deep_equal_with_collation, double_arg, integer_arg,
    opt_atomic,
};
use super::numeric::round_half_up;
use crate::engine::evaluator::{atomize, op_eq};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

pub(super) fn empty_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(boolean(arg(args, 0).is_empty()))
}

pub(super) fn exists_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(boolean(!arg(args, 0).is_empty()))
}

/// Keeps the first of each group of equal values; NaN counts as equal to itself.
pub(super) fn distinct_values_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let collation = collation_arg(ctx, args, 1, "distinct-values")?;
    let cmp = compare_ctx(ctx, collation.as_ref());
    let mut seen: Vec<XdmAtomicValue> = Vec::new();
    for v in atomize(arg(args, 0).to_vec()) {
        if !seen.iter().any(|s| atomic_equal(s, &v, &cmp)) {
            seen.push(v);
        }
    }
    Ok(seen.into_iter().map(XdmItem::Atomic).collect())
}

pub(super) fn index_of_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let search = opt_atomic(arg(args, 1), "index-of")?
        .ok_or_else(|| Error::from_code(ErrorCode::XPTY0004, "fn:index-of: search value must not be empty"))?;
    let collation = collation_arg(ctx, args, 2, "index-of")?;
    let cmp = compare_ctx(ctx, collation.as_ref());
    Ok(atomize(arg(args, 0).to_vec())
        .iter()
        .enumerate()
        .filter(|(_, v)| op_eq(v, &search, &cmp, false).unwrap_or(false))
        .map(|(i, _)| XdmItem::Atomic(XdmAtomicValue::Integer(i as i64 + 1)))
        .collect())
}

pub(super) fn insert_before_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let target = arg(args, 0);
    let position = integer_arg(arg(args, 1), "insert-before")?;
    let at = usize::try_from(position.saturating_sub(1)).unwrap_or(0).min(target.len());
    let mut out = Vec::with_capacity(target.len() + arg(args, 2).len());
    out.extend_from_slice(&target[..at]);
    out.extend_from_slice(arg(args, 2));
    out.extend_from_slice(&target[at..]);
    Ok(out)
}

pub(super) fn remove_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let position = integer_arg(arg(args, 1), "remove")?;
    Ok(arg(args, 0)
        .iter()
        .enumerate()
        .filter(|(i, _)| *i as i64 + 1 != position)
        .map(|(_, item)| item.clone())
        .collect())
}

pub(super) fn reverse_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(arg(args, 0).iter().rev().cloned().collect())
}

pub(super) fn subsequence_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let start = round_half_up(double_arg(arg(args, 1), "subsequence")?);
    let end = match args.get(2) {
        Some(len) => start + round_half_up(double_arg(len, "subsequence")?),
        None => f64::INFINITY,
    };
    Ok(arg(args, 0)
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let p = (*i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, item)| item.clone())
        .collect())
}

pub(super) fn unordered_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(arg(args, 0).to_vec())
}

pub(super) fn zero_or_one_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let seq = arg(args, 0);
    if seq.len() > 1 {
        return Err(Error::from_code(ErrorCode::FORG0003, "fn:zero-or-one called with more than one item"));
    }
    Ok(seq.to_vec())
}

pub(super) fn one_or_more_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let seq = arg(args, 0);
    if seq.is_empty() {
        return Err(Error::from_code(ErrorCode::FORG0004, "fn:one-or-more called with an empty sequence"));
    }
    Ok(seq.to_vec())
}

pub(super) fn exactly_one_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let seq = arg(args, 0);
    if seq.len() != 1 {
        return Err(Error::from_code(
            ErrorCode::FORG0005,
            format!("fn:exactly-one called with {} items", seq.len()),
        ));
    }
    Ok(seq.to_vec())
}

pub(super) fn deep_equal_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let collation = collation_arg(ctx, args, 2, "deep-equal")?;
    let cmp = compare_ctx(ctx, collation.as_ref());
    Ok(boolean(deep_equal_with_collation(arg(args, 0), arg(args, 1), &cmp)))
}

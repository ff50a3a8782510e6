use super::common::{arg, boolean, ebv, item_or_context, item_string, one, string};
use crate::engine::evaluator::{atomize, number_or_nan};
use crate::engine::runtime::{CallCtx, Error};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

pub(super) fn fn_true<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(boolean(true))
}

pub(super) fn fn_false<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(boolean(false))
}

pub(super) fn not_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(boolean(!ebv(arg(args, 0))?))
}

pub(super) fn boolean_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(boolean(ebv(arg(args, 0))?))
}

pub(super) fn data_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let input = match args.first() {
        Some(seq) => seq.clone(),
        None => vec![ctx.context_item()?],
    };
    Ok(atomize(input).into_iter().map(XdmItem::Atomic).collect())
}

pub(super) fn string_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let s = item_or_context(ctx, args, "string")?
        .map(|item| item_string(&item))
        .unwrap_or_default();
    Ok(string(s))
}

/// `fn:number`: never raises for unconvertible input, yields NaN instead.
pub(super) fn number_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let value = match item_or_context(ctx, args, "number")? {
        None => f64::NAN,
        Some(item) => match atomize(vec![item]).as_slice() {
            [v] => number_or_nan(v),
            _ => f64::NAN,
        },
    };
    Ok(one(XdmAtomicValue::Double(value)))
}

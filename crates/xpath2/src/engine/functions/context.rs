//! Functions reading the focus and the dynamic context.

use rust_decimal::Decimal;

use super::common::{arg, integer, one, string, string_arg};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmSequence};

fn no_focus() -> Error {
    Error::from_code(ErrorCode::XPDY0002, "focus is undefined")
}

pub(super) fn position_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let focus = ctx.focus.ok_or_else(no_focus)?;
    Ok(integer(focus.position as i64))
}

pub(super) fn last_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let size = ctx.focus.and_then(|f| f.size).ok_or_else(no_focus)?;
    Ok(integer(size as i64))
}

pub(super) fn current_date_time_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let now = ctx.dyn_ctx.now();
    Ok(one(XdmAtomicValue::DateTime {
        value: now.naive_local(),
        tz: Some(*now.offset()),
    }))
}

pub(super) fn current_date_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let now = ctx.dyn_ctx.now();
    Ok(one(XdmAtomicValue::Date {
        date: now.date_naive(),
        tz: Some(*now.offset()),
    }))
}

pub(super) fn current_time_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let now = ctx.dyn_ctx.now();
    Ok(one(XdmAtomicValue::Time {
        time: now.time(),
        tz: Some(*now.offset()),
    }))
}

pub(super) fn implicit_timezone_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let secs = ctx.dyn_ctx.implicit_timezone().local_minus_utc();
    Ok(one(XdmAtomicValue::DayTimeDuration(Decimal::from(secs))))
}

pub(super) fn default_collation_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(string(ctx.default_collation.uri()))
}

pub(super) fn static_base_uri_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    _args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(ctx
        .static_ctx
        .base_uri
        .as_ref()
        .map(|u| one(XdmAtomicValue::AnyUri(u.clone())))
        .unwrap_or_default())
}

/// Only the default collection is available; naming any other URI fails.
pub(super) fn collection_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let uri = string_arg(arg(args, 0), "collection")?;
    if !uri.is_empty() {
        return Err(Error::from_code(
            ErrorCode::FODC0002,
            format!("no collection available for URI '{uri}'"),
        ));
    }
    ctx.dyn_ctx
        .default_collection
        .clone()
        .ok_or_else(|| Error::from_code(ErrorCode::FODC0002, "default collection is undefined"))
}

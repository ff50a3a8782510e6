use super::common::{arg, boolean, string, string_arg};
use crate::engine::runtime::{CallCtx, Error};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

fn flags_arg<N: XdmNode>(args: &[XdmSequence<N>], idx: usize, fname: &str) -> Result<String, Error> {
    match args.get(idx) {
        Some(f) => string_arg(f, fname),
        None => Ok(String::new()),
    }
}

pub(super) fn matches_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let input = string_arg(arg(args, 0), "matches")?;
    let pattern = string_arg(arg(args, 1), "matches")?;
    let flags = flags_arg(args, 2, "matches")?;
    Ok(boolean(ctx.regex.matches(&pattern, &flags, &input)?))
}

pub(super) fn replace_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let input = string_arg(arg(args, 0), "replace")?;
    let pattern = string_arg(arg(args, 1), "replace")?;
    let replacement = string_arg(arg(args, 2), "replace")?;
    let flags = flags_arg(args, 3, "replace")?;
    Ok(string(ctx.regex.replace(&pattern, &flags, &input, &replacement)?))
}

pub(super) fn tokenize_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let input = string_arg(arg(args, 0), "tokenize")?;
    let pattern = string_arg(arg(args, 1), "tokenize")?;
    let flags = flags_arg(args, 2, "tokenize")?;
    Ok(ctx
        .regex
        .tokenize(&pattern, &flags, &input)?
        .into_iter()
        .map(|t| XdmItem::Atomic(XdmAtomicValue::String(t)))
        .collect())
}

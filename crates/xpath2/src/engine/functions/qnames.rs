//! Node names and `xs:QName` accessors.

use super::common::{arg, node_or_context, one, opt_atomic, string, string_arg};
use crate::engine::evaluator::is_ncname;
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::{NodeKind, QName, XdmNode};
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

fn node_qname<N: XdmNode>(ctx: &CallCtx<N>, args: &[XdmSequence<N>], fname: &str) -> Result<Option<QName>, Error> {
    Ok(node_or_context(ctx, args, fname)?.and_then(|n| n.name()))
}

pub(super) fn name_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let lexical = match node_qname(ctx, args, "name")? {
        Some(QName {
            prefix: Some(p), local, ..
        }) if !p.is_empty() => format!("{p}:{local}"),
        Some(q) => q.local,
        None => String::new(),
    };
    Ok(string(lexical))
}

pub(super) fn local_name_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(string(node_qname(ctx, args, "local-name")?.map(|q| q.local).unwrap_or_default()))
}

pub(super) fn namespace_uri_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    // namespace nodes name their prefix, not a namespace
    let uri = match node_or_context(ctx, args, "namespace-uri")? {
        Some(n) if n.kind() != NodeKind::Namespace => n.name().and_then(|q| q.ns_uri).unwrap_or_default(),
        _ => String::new(),
    };
    Ok(one(XdmAtomicValue::AnyUri(uri)))
}

pub(super) fn root_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let Some(mut node) = node_or_context(ctx, args, "root")? else {
        return Ok(vec![]);
    };
    while let Some(parent) = node.parent() {
        node = parent;
    }
    Ok(vec![XdmItem::Node(node)])
}

pub(super) fn node_name_fn<N: 'static + Send + Sync + XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(match node_qname(ctx, args, "node-name")? {
        Some(q) => one(XdmAtomicValue::QName {
            ns_uri: q.ns_uri,
            prefix: q.prefix,
            local: q.local,
        }),
        None => vec![],
    })
}

/// `fn:QName($uri, $lexical)`: a prefixed name requires a namespace URI.
pub(super) fn qname_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let uri = string_arg(arg(args, 0), "QName")?;
    let lexical = string_arg(arg(args, 1), "QName")?;
    let (prefix, local) = match lexical.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, lexical.as_str()),
    };
    if !is_ncname(local) || prefix.is_some_and(|p| !is_ncname(p)) {
        return Err(Error::from_code(
            ErrorCode::FOCA0002,
            format!("'{lexical}' is not a valid lexical QName"),
        ));
    }
    if prefix.is_some() && uri.is_empty() {
        return Err(Error::from_code(
            ErrorCode::FOCA0002,
            format!("prefixed QName '{lexical}' needs a namespace URI"),
        ));
    }
    Ok(one(XdmAtomicValue::QName {
        ns_uri: (!uri.is_empty()).then_some(uri),
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
    }))
}

fn qname_arg<N: XdmNode>(
    args: &[XdmSequence<N>],
    fname: &str,
) -> Result<Option<(Option<String>, String)>, Error> {
    match opt_atomic(arg(args, 0), fname)? {
        None => Ok(None),
        Some(XdmAtomicValue::QName { ns_uri, local, .. }) => Ok(Some((ns_uri, local))),
        Some(other) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("fn:{fname} expects xs:QName, found {}", other.type_code()),
        )),
    }
}

pub(super) fn local_name_from_qname_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(match qname_arg(args, "local-name-from-QName")? {
        Some((_, local)) => one(XdmAtomicValue::NcName(local)),
        None => vec![],
    })
}

pub(super) fn namespace_uri_from_qname_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    Ok(match qname_arg(args, "namespace-uri-from-QName")? {
        Some((ns, _)) => one(XdmAtomicValue::AnyUri(ns.unwrap_or_default())),
        None => vec![],
    })
}

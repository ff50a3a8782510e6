use itertools::Itertools;

use super::common::{arg, item_string, opt_atomic, string_arg};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmSequence};

/// `fn:error`: raises the given code (default `err:FOER0000`) with an
/// optional description; the error object only enriches the message.
pub(super) fn error_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let code = match opt_atomic(arg(args, 0), "error")? {
        None => ErrorCode::FOER0000.qname(),
        Some(XdmAtomicValue::QName { ns_uri, local, .. }) => ExpandedName::new(ns_uri, local),
        Some(other) => {
            return Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("fn:error expects xs:QName as error code, found {}", other.type_code()),
            ));
        }
    };
    let mut message = match args.get(1) {
        Some(desc) => string_arg(desc, "error")?,
        None => "error raised by fn:error".to_string(),
    };
    if let Some(object) = args.get(2).filter(|o| !o.is_empty()) {
        message = format!("{message} [{}]", object.iter().map(item_string).join(", "));
    }
    Err(Error::new_qname(code, message))
}

pub(super) fn trace_fn<N: 'static + Send + Sync + XdmNode>(
    _ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let value = arg(args, 0);
    let label = string_arg(arg(args, 1), "trace")?;
    tracing::debug!(
        label = %label,
        items = value.len(),
        value = %value.iter().map(item_string).join(" "),
        "fn:trace"
    );
    Ok(value.to_vec())
}

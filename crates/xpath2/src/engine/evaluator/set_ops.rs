//! Set operations and document-order utilities for XPath evaluation.

use core::cmp::Ordering;

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::parser::ast::SetOp;
use crate::xdm::{XdmItem, XdmSequence};

/// Sort into document order and drop duplicates (by node identity).
pub(crate) fn document_order<N: XdmNode>(mut nodes: Vec<N>) -> Result<Vec<N>, Error> {
    let mut failure: Option<Error> = None;
    nodes.sort_by(|a, b| match a.compare_document_order(b) {
        Ok(ord) => ord,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }
    nodes.dedup();
    Ok(nodes)
}

fn nodes_of<N: XdmNode>(seq: XdmSequence<N>, op: SetOp) -> Result<Vec<N>, Error> {
    seq.into_iter()
        .map(|item| match item {
            XdmItem::Node(n) => Ok(n),
            XdmItem::Atomic(a) => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("{op:?} requires node sequences, found {}", a.type_code()),
            )),
        })
        .collect()
}

/// `union`/`|`, `intersect`, `except` over node sequences.
pub(crate) fn set_operation<N: XdmNode>(
    op: SetOp,
    lhs: XdmSequence<N>,
    rhs: XdmSequence<N>,
) -> Result<XdmSequence<N>, Error> {
    let mut left = nodes_of(lhs, op)?;
    let right = nodes_of(rhs, op)?;
    let selected = match op {
        SetOp::Union => {
            left.extend(right);
            left
        }
        SetOp::Intersect => left.into_iter().filter(|n| right.contains(n)).collect(),
        SetOp::Except => left.into_iter().filter(|n| !right.contains(n)).collect(),
    };
    Ok(document_order(selected)?.into_iter().map(XdmItem::Node).collect())
}

//! The node-tree collaborator: anything implementing [`XdmNode`] can be queried.

use core::cmp::Ordering;

use crate::consts::XS;
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::{ExpandedName, XdmAtomicValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn expanded(&self) -> ExpandedName {
        ExpandedName::new(self.ns_uri.clone(), self.local.clone())
    }
}

/// Position of `child` among everything `parent` owns: attributes first, then
/// namespace nodes, then children, each group in adapter order.
fn slot_in_parent<N: XdmNode>(parent: &N, child: &N) -> usize {
    let owned = parent
        .attributes()
        .into_iter()
        .chain(parent.namespaces())
        .chain(parent.children());
    owned.take_while(|n| n != child).count()
}

/// Document order derived from ancestry alone: each node is keyed by its root
/// and the slot path leading down to it, so an ancestor (a prefix of the path)
/// sorts before its descendants.
///
/// Nodes under different roots have no order here (`err:FOER0000`); adapters
/// holding several trees override [`XdmNode::compare_document_order`].
pub fn try_compare_by_ancestry<N: XdmNode>(a: &N, b: &N) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    fn locate<N: XdmNode>(node: &N) -> (N, Vec<usize>) {
        let mut slots = Vec::new();
        let mut cur = node.clone();
        while let Some(parent) = cur.parent() {
            slots.push(slot_in_parent(&parent, &cur));
            cur = parent;
        }
        slots.reverse();
        (cur, slots)
    }
    let (root_a, path_a) = locate(a);
    let (root_b, path_b) = locate(b);
    if root_a != root_b {
        return Err(Error::from_code(
            ErrorCode::FOER0000,
            "nodes from different trees have no document order",
        ));
    }
    Ok(path_a.cmp(&path_b))
}

pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;
    fn base_uri(&self) -> Option<String> {
        None
    }

    /// Typed value used by atomization. Untyped trees yield `xs:untypedAtomic`
    /// for elements, attributes, documents and text, `xs:string` for the rest.
    fn typed_value(&self) -> Vec<XdmAtomicValue> {
        let s = self.string_value();
        match self.kind() {
            NodeKind::Comment | NodeKind::ProcessingInstruction | NodeKind::Namespace => {
                vec![XdmAtomicValue::String(s)]
            }
            _ => vec![XdmAtomicValue::UntypedAtomic(s)],
        }
    }

    /// Schema type annotation; `xs:untyped` / `xs:untypedAtomic` when not validated.
    fn type_annotation(&self) -> Option<ExpandedName> {
        match self.kind() {
            NodeKind::Element => Some(ExpandedName::ns(XS, "untyped")),
            NodeKind::Attribute => Some(ExpandedName::ns(XS, "untypedAtomic")),
            _ => None,
        }
    }

    fn is_nilled(&self) -> bool {
        false
    }

    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn namespaces(&self) -> Vec<Self> {
        Vec::new()
    }

    /// Default document order comparison uses ancestry and sibling order.
    fn compare_document_order(&self, other: &Self) -> Result<Ordering, Error> {
        try_compare_by_ancestry(self, other)
    }
}

//! Simple in-memory tree implementing [`XdmNode`], used by tests, demos and benches.
//!
//! ```
//! use xpath2::simple_node::{attr, elem, text};
//! use xpath2::XdmNode;
//!
//! // <root id="r"><child>Hello</child><child world="yes"/></root>
//! let root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .child(elem("child").attr(attr("world", "yes")))
//!     .build();
//!
//! assert_eq!(root.name().unwrap().local, "root");
//! assert_eq!(root.children().len(), 2);
//! assert_eq!(root.string_value(), "Hello");
//! ```
//!
//! Nodes may carry a schema annotation and typed value, which lets tests
//! exercise typed atomization without a validator:
//! ```
//! use xpath2::simple_node::{attr, elem};
//! use xpath2::xdm::XdmAtomicValue;
//! use xpath2::XdmNode;
//!
//! let e = elem("e")
//!     .attr(attr("n", "42").typed("integer", XdmAtomicValue::Integer(42)))
//!     .build();
//! assert_eq!(e.attributes()[0].typed_value(), vec![XdmAtomicValue::Integer(42)]);
//! ```
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::consts::XS;
use crate::model::{NodeKind, QName, XdmNode};
use crate::xdm::{ExpandedName, XdmAtomicValue};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    annotation: Option<(ExpandedName, XdmAtomicValue)>,
    parent: RwLock<Option<Weak<Inner>>>,
    attributes: RwLock<Vec<SimpleNode>>,
    namespaces: RwLock<Vec<SimpleNode>>,
    children: RwLock<Vec<SimpleNode>>,
}

/// Arc-backed node handle; equality is node identity.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SimpleNode {}

impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name.as_ref().map(|n| n.local.as_str()))
            .field("value", &self.0.value)
            .finish()
    }
}

fn local_name(name: &str) -> QName {
    match name.split_once(':') {
        Some((p, l)) => QName {
            prefix: Some(p.to_string()),
            local: l.to_string(),
            ns_uri: None,
        },
        None => QName {
            prefix: None,
            local: name.to_string(),
            ns_uri: None,
        },
    }
}

impl SimpleNode {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            annotation: None,
            parent: RwLock::new(None),
            attributes: RwLock::new(Vec::new()),
            namespaces: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Document, None)
    }

    pub fn element(name: &str) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, Some(local_name(name)))
    }

    pub fn attribute(name: &str, value: &str) -> SimpleNode {
        SimpleNode::new(NodeKind::Attribute, Some(local_name(name)), Some(value.to_string()))
    }

    pub fn text(value: &str) -> SimpleNode {
        SimpleNode::new(NodeKind::Text, None, Some(value.to_string()))
    }

    pub fn comment(value: &str) -> SimpleNode {
        SimpleNode::new(NodeKind::Comment, None, Some(value.to_string()))
    }

    pub fn pi(target: &str, data: &str) -> SimpleNode {
        SimpleNode::new(
            NodeKind::ProcessingInstruction,
            Some(local_name(target)),
            Some(data.to_string()),
        )
    }

    pub fn namespace(prefix: &str, uri: &str) -> SimpleNode {
        SimpleNode::new(
            NodeKind::Namespace,
            Some(QName {
                prefix: None,
                local: prefix.to_string(),
                ns_uri: None,
            }),
            Some(uri.to_string()),
        )
    }

    /// Give a leaf node (attribute or text) an `xs:` annotation and typed value.
    /// Only valid before the node is attached to a parent.
    pub fn typed(self, xs_local: &str, value: XdmAtomicValue) -> SimpleNode {
        match Arc::try_unwrap(self.0) {
            Ok(mut inner) => {
                inner.annotation = Some((ExpandedName::ns(XS, xs_local), value));
                SimpleNode(Arc::new(inner))
            }
            Err(shared) => SimpleNode(shared),
        }
    }

    /// Resolve a namespace prefix through the in-scope namespace nodes.
    pub fn lookup_namespace_uri(&self, prefix: &str) -> Option<String> {
        let mut cur = Some(self.clone());
        while let Some(n) = cur {
            for ns in n.namespaces() {
                if ns.0.name.as_ref().is_some_and(|q| q.local == prefix) {
                    return ns.0.value.clone();
                }
            }
            cur = n.parent();
        }
        None
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    children: Vec<SimpleNode>,
    attrs: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            children: Vec::new(),
            attrs: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.children.push(child.into().build());
        self
    }

    pub fn children<I: IntoIterator<Item = SimpleNodeOrBuilder>>(mut self, it: I) -> Self {
        self.children.extend(it.into_iter().map(SimpleNodeOrBuilder::build));
        self
    }

    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.attrs.push(attr);
        self
    }

    pub fn namespace(mut self, ns: SimpleNode) -> Self {
        debug_assert!(ns.kind() == NodeKind::Namespace);
        self.namespaces.push(ns);
        self
    }

    pub fn build(self) -> SimpleNode {
        let mut name = self.name;
        // element prefixes bind against the element's own namespace declarations only
        if let Some(q) = name.as_mut() {
            let wanted = q.prefix.clone().unwrap_or_default();
            q.ns_uri = self
                .namespaces
                .iter()
                .find(|n| n.0.name.as_ref().is_some_and(|nq| nq.local == wanted))
                .and_then(|n| n.0.value.clone());
        }
        let node = SimpleNode::new(self.kind, name, None);
        let link = |n: &SimpleNode| {
            *n.0.parent.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(&node.0));
        };
        for n in self.attrs.iter().chain(&self.namespaces).chain(&self.children) {
            link(n);
        }
        *node.0.attributes.write().unwrap_or_else(PoisonError::into_inner) = self.attrs;
        *node.0.namespaces.write().unwrap_or_else(PoisonError::into_inner) = self.namespaces;
        *node.0.children.write().unwrap_or_else(PoisonError::into_inner) = self.children;
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl SimpleNodeOrBuilder {
    fn build(self) -> SimpleNode {
        match self {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        }
    }
}

impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}

impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNode::element(name)
}
pub fn text(v: &str) -> SimpleNode {
    SimpleNode::text(v)
}
pub fn attr(name: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute(name, v)
}
pub fn comment(v: &str) -> SimpleNode {
    SimpleNode::comment(v)
}
pub fn pi(target: &str, data: &str) -> SimpleNode {
    SimpleNode::pi(target, data)
}
pub fn ns(prefix: &str, uri: &str) -> SimpleNode {
    SimpleNode::namespace(prefix, uri)
}
pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => {
                fn collect(n: &SimpleNode, out: &mut String) {
                    for c in n.children() {
                        match c.0.kind {
                            NodeKind::Text => out.push_str(c.0.value.as_deref().unwrap_or_default()),
                            NodeKind::Element => collect(&c, out),
                            _ => {}
                        }
                    }
                }
                let mut out = String::new();
                collect(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    fn typed_value(&self) -> Vec<XdmAtomicValue> {
        match &self.0.annotation {
            Some((_, v)) => vec![v.clone()],
            None => {
                let s = self.string_value();
                match self.0.kind {
                    NodeKind::Comment | NodeKind::ProcessingInstruction | NodeKind::Namespace => {
                        vec![XdmAtomicValue::String(s)]
                    }
                    _ => vec![XdmAtomicValue::UntypedAtomic(s)],
                }
            }
        }
    }

    fn type_annotation(&self) -> Option<ExpandedName> {
        if let Some((name, _)) = &self.0.annotation {
            return Some(name.clone());
        }
        match self.0.kind {
            NodeKind::Element => Some(ExpandedName::ns(XS, "untyped")),
            NodeKind::Attribute => Some(ExpandedName::ns(XS, "untypedAtomic")),
            _ => None,
        }
    }

    fn parent(&self) -> Option<Self> {
        let guard = self.0.parent.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().and_then(Weak::upgrade).map(SimpleNode)
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn attributes(&self) -> Vec<Self> {
        self.0.attributes.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn namespaces(&self) -> Vec<Self> {
        self.0.namespaces.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

//! Cursor types for lazy evaluation.

use super::*;

use std::collections::VecDeque;

use crate::parser::ast::{Axis, NameTest, NodeTest, Predicate, ResultType};
use crate::xdm::{SequenceType, XdmItemResult, XmlTypeCode};

/// `lo to hi`
#[derive(Clone)]
pub(super) struct RangeCursor {
    lo: i64,
    hi: i64,
    next: Option<i64>,
}

impl RangeCursor {
    pub(super) fn new(lo: i64, hi: i64) -> Self {
        Self {
            lo,
            hi,
            next: (lo <= hi).then_some(lo),
        }
    }
}

impl<'a, N: 'static + XdmNode> SequenceCursor<'a, N> for RangeCursor {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        let cur = self.next?;
        self.next = if cur < self.hi { Some(cur + 1) } else { None };
        Some(Ok(XdmItem::Atomic(XdmAtomicValue::Integer(cur))))
    }

    fn reset(&mut self) {
        self.next = (self.lo <= self.hi).then_some(self.lo);
    }

    fn boxed_clone(&self) -> BoxedCursor<'a, N> {
        Box::new(self.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(cur) => {
                let rem = usize::try_from(self.hi - cur + 1).unwrap_or(usize::MAX);
                (rem, Some(rem))
            }
            None => (0, Some(0)),
        }
    }
}

/// `for $v in input return body`, one binding per input item.
pub(super) struct ForCursor<'a, N> {
    ev: Evaluator<'a, N>,
    var: &'a ExpandedName,
    body: &'a Expr,
    env: Env<N>,
    input: BoxedCursor<'a, N>,
    current: Option<BoxedCursor<'a, N>>,
}

impl<'a, N: 'static + XdmNode> ForCursor<'a, N> {
    pub(super) fn new(
        ev: Evaluator<'a, N>,
        var: &'a ExpandedName,
        body: &'a Expr,
        env: Env<N>,
        input: BoxedCursor<'a, N>,
    ) -> Self {
        Self {
            ev,
            var,
            body,
            env,
            input,
            current: None,
        }
    }
}

impl<'a, N: 'static + XdmNode> SequenceCursor<'a, N> for ForCursor<'a, N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(cur) = self.current.as_mut() {
                if let Some(item) = cur.next_item() {
                    return Some(item);
                }
                self.current = None;
            }
            let item = match self.input.next_item()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            let scope = self.env.bind(self.var.clone(), vec![item]);
            match self.ev.eval(self.body, &scope) {
                Ok(c) => self.current = Some(c),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.current = None;
    }

    fn boxed_clone(&self) -> BoxedCursor<'a, N> {
        Box::new(ForCursor {
            ev: self.ev.clone(),
            var: self.var,
            body: self.body,
            env: self.env.clone(),
            input: self.input.boxed_clone(),
            current: self.current.as_ref().map(|c| c.boxed_clone()),
        })
    }
}

/// Applies one predicate to its input. Positions count in input order; the
/// context size is only computed (by counting a fork of the input) when the
/// predicate reads `last()`.
pub(super) struct FilterCursor<'a, N> {
    ev: Evaluator<'a, N>,
    pred: &'a Predicate,
    env: Env<N>,
    input: BoxedCursor<'a, N>,
    position: usize,
    size: Option<usize>,
    done: bool,
}

impl<'a, N: 'static + XdmNode> FilterCursor<'a, N> {
    pub(super) fn new(ev: Evaluator<'a, N>, pred: &'a Predicate, env: Env<N>, input: BoxedCursor<'a, N>) -> Self {
        Self {
            ev,
            pred,
            env,
            input,
            position: 0,
            size: None,
            done: false,
        }
    }

    fn count_input(&self) -> Result<usize, Error> {
        let mut fork = self.input.boxed_clone();
        let mut n = self.position;
        while let Some(item) = fork.next_item() {
            item?;
            n += 1;
        }
        Ok(n)
    }

    /// Whether the item at `self.position` passes. `Ok(None)` when a constant
    /// positional predicate can no longer match anything further on.
    fn accepts(&self, item: &XdmItem<N>) -> Result<Option<bool>, Error> {
        if let ExprKind::Literal(v) = &self.pred.expr.kind {
            return Ok(match classify(v) {
                Some(n) => {
                    let pos = self.position as f64;
                    let want = n.to_f64();
                    if pos > want { None } else { Some(pos == want) }
                }
                None => Some(v.as_str().is_some_and(|s| !s.is_empty()) || matches!(v, XdmAtomicValue::Boolean(true))),
            });
        }
        let scope = self.env.with_focus(Focus {
            item: item.clone(),
            position: self.position,
            size: self.size,
        });
        let pred: &'a Predicate = self.pred;
        let mut result = self.ev.eval(&pred.expr, &scope)?;
        if pred.expr.result == ResultType::Boolean {
            return effective_boolean_value(result.as_mut()).map(Some);
        }
        let items = collect(result)?;
        if let [XdmItem::Atomic(v)] = items.as_slice()
            && let Some(n) = classify(v)
        {
            return Ok(Some(n.to_f64() == self.position as f64));
        }
        effective_boolean_value(&mut VecCursor::new(items)).map(Some)
    }
}

impl<'a, N: 'static + XdmNode> SequenceCursor<'a, N> for FilterCursor<'a, N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.done {
            return None;
        }
        if self.pred.uses_last && self.size.is_none() {
            match self.count_input() {
                Ok(n) => self.size = Some(n),
                Err(e) => return Some(Err(e)),
            }
        }
        loop {
            let item = match self.input.next_item()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            self.position += 1;
            match self.accepts(&item) {
                Ok(Some(true)) => return Some(Ok(item)),
                Ok(Some(false)) => {}
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.position = 0;
        self.done = false;
    }

    fn boxed_clone(&self) -> BoxedCursor<'a, N> {
        Box::new(FilterCursor {
            ev: self.ev.clone(),
            pred: self.pred,
            env: self.env.clone(),
            input: self.input.boxed_clone(),
            position: self.position,
            size: self.size,
            done: self.done,
        })
    }
}

#[derive(Clone)]
enum AxisState<N> {
    Init,
    /// Precomputed candidates in axis order.
    Buffered { items: Vec<N>, idx: usize },
    /// Pre-order walk; the stack holds pending subtrees, top first.
    Walk { stack: Vec<N> },
    Ancestors { current: Option<N> },
    Done,
}

/// One axis applied to one context node, yielding matching nodes in axis order
/// (reverse document order for the reverse axes).
pub(super) struct AxisCursor<'a, N> {
    ev: Evaluator<'a, N>,
    node: N,
    axis: Axis,
    test: &'a NodeTest,
    state: AxisState<N>,
}

fn is_attribute_like<N: XdmNode>(n: &N) -> bool {
    matches!(n.kind(), NodeKind::Attribute | NodeKind::Namespace)
}

/// Children pushed so that the first child is popped first.
fn push_children<N: XdmNode>(stack: &mut Vec<N>, n: &N) {
    stack.extend(n.children().into_iter().rev());
}

impl<'a, N: 'static + XdmNode> AxisCursor<'a, N> {
    pub(super) fn new(ev: Evaluator<'a, N>, node: N, axis: Axis, test: &'a NodeTest) -> Self {
        Self {
            ev,
            node,
            axis,
            test,
            state: AxisState::Init,
        }
    }

    fn siblings(&self) -> (Vec<N>, usize) {
        if is_attribute_like(&self.node) {
            return (Vec::new(), 0);
        }
        let Some(parent) = self.node.parent() else {
            return (Vec::new(), 0);
        };
        let sibs = parent.children();
        let idx = sibs.iter().position(|s| s == &self.node).unwrap_or(0);
        (sibs, idx)
    }

    fn preceding(&self) -> Vec<N> {
        // an attribute's preceding nodes are those of its owner element
        let target = if is_attribute_like(&self.node) {
            self.node.parent()
        } else {
            Some(self.node.clone())
        };
        let mut ancestors = Vec::new();
        let mut root = self.node.clone();
        while let Some(p) = root.parent() {
            ancestors.push(p.clone());
            root = p;
        }
        let mut before = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            if Some(&n) == target.as_ref() {
                break;
            }
            if !ancestors.contains(&n) {
                before.push(n.clone());
            }
            push_children(&mut stack, &n);
        }
        before.reverse();
        before
    }

    fn init_state(&self) -> AxisState<N> {
        let buffered = |items: Vec<N>| AxisState::Buffered { items, idx: 0 };
        match self.axis {
            Axis::SelfAxis => buffered(vec![self.node.clone()]),
            Axis::Child => buffered(self.node.children()),
            Axis::Attribute => buffered(self.node.attributes()),
            Axis::Namespace => {
                if self.node.kind() == NodeKind::Element {
                    buffered(self.node.namespaces())
                } else {
                    AxisState::Done
                }
            }
            Axis::Parent => buffered(self.node.parent().into_iter().collect()),
            Axis::Ancestor => AxisState::Ancestors {
                current: self.node.parent(),
            },
            Axis::AncestorOrSelf => AxisState::Ancestors {
                current: Some(self.node.clone()),
            },
            Axis::Descendant => {
                let mut stack = Vec::new();
                push_children(&mut stack, &self.node);
                AxisState::Walk { stack }
            }
            Axis::DescendantOrSelf => AxisState::Walk {
                stack: vec![self.node.clone()],
            },
            Axis::FollowingSibling => {
                let (sibs, idx) = self.siblings();
                buffered(sibs.into_iter().skip(idx + 1).collect())
            }
            Axis::PrecedingSibling => {
                let (sibs, idx) = self.siblings();
                buffered(sibs.into_iter().take(idx).rev().collect())
            }
            Axis::Following => {
                // subtrees after the context node, nearest first, in document order
                let mut roots: Vec<N> = Vec::new();
                let mut cur = self.node.clone();
                if is_attribute_like(&cur)
                    && let Some(owner) = cur.parent()
                {
                    roots.extend(owner.children());
                    cur = owner;
                }
                loop {
                    let Some(parent) = cur.parent() else { break };
                    let sibs = parent.children();
                    if let Some(idx) = sibs.iter().position(|s| s == &cur) {
                        roots.extend(sibs.into_iter().skip(idx + 1));
                    }
                    cur = parent;
                }
                roots.reverse();
                AxisState::Walk { stack: roots }
            }
            Axis::Preceding => buffered(self.preceding()),
        }
    }

    fn next_candidate(&mut self) -> Option<N> {
        if matches!(self.state, AxisState::Init) {
            self.state = self.init_state();
        }
        match &mut self.state {
            AxisState::Buffered { items, idx } => {
                let n = items.get(*idx)?.clone();
                *idx += 1;
                Some(n)
            }
            AxisState::Walk { stack } => {
                let n = stack.pop()?;
                push_children(stack, &n);
                Some(n)
            }
            AxisState::Ancestors { current } => {
                let n = current.take()?;
                *current = n.parent();
                Some(n)
            }
            AxisState::Init | AxisState::Done => None,
        }
    }

    fn matches(&self, n: &N) -> bool {
        match self.test {
            NodeTest::Kind(ty) => item_matches(&XdmItem::Node(n.clone()), ty, self.ev.static_ctx.schema.as_ref()),
            NodeTest::Name(name_test) => {
                let principal = match self.axis.principal_kind() {
                    XmlTypeCode::Attribute => NodeKind::Attribute,
                    XmlTypeCode::Namespace => NodeKind::Namespace,
                    _ => NodeKind::Element,
                };
                if n.kind() != principal {
                    return false;
                }
                let Some(q) = n.name() else {
                    return false;
                };
                match name_test {
                    NameTest::Any => true,
                    NameTest::Name(expected) => q.local == expected.local && q.ns_uri == expected.ns_uri,
                    NameTest::Namespace(uri) => q.ns_uri.as_deref() == Some(uri.as_str()),
                    NameTest::Local(local) => &q.local == local,
                }
            }
        }
    }
}

impl<'a, N: 'static + XdmNode> SequenceCursor<'a, N> for AxisCursor<'a, N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        while let Some(n) = self.next_candidate() {
            if self.matches(&n) {
                return Some(Ok(XdmItem::Node(n)));
            }
        }
        self.state = AxisState::Done;
        None
    }

    fn reset(&mut self) {
        self.state = AxisState::Init;
    }

    fn boxed_clone(&self) -> BoxedCursor<'a, N> {
        Box::new(AxisCursor {
            ev: self.ev.clone(),
            node: self.node.clone(),
            axis: self.axis,
            test: self.test,
            state: self.state.clone(),
        })
    }
}

/// What a [`CardinalityCursor`] does to every item that passes the count check.
#[derive(Clone, Copy)]
pub(super) enum Conversion<'a> {
    /// `treat as`: items must already match; failures are `XPDY0050`.
    Treat(&'a SequenceType),
    /// `cast as`: atomize and convert; failures are `XPTY0004`.
    Cast { target: &'a SequenceType, literal: bool },
}

impl<'a> Conversion<'a> {
    fn ty(self) -> &'a SequenceType {
        match self {
            Conversion::Treat(ty) => ty,
            Conversion::Cast { target, .. } => target,
        }
    }

    fn error(&self, msg: String) -> Error {
        let code = match self {
            Conversion::Treat(_) => ErrorCode::XPDY0050,
            Conversion::Cast { .. } => ErrorCode::XPTY0004,
        };
        Error::from_code(code, msg)
    }
}

/// Enforces the destination cardinality while converting lazily: a second
/// item is rejected as soon as it appears, an empty source once the input is
/// exhausted.
pub(super) struct CardinalityCursor<'a, N> {
    ev: Evaluator<'a, N>,
    input: BoxedCursor<'a, N>,
    conversion: Conversion<'a>,
    pending: VecDeque<XdmAtomicValue>,
    count: usize,
    finished: bool,
}

impl<'a, N: 'static + XdmNode> CardinalityCursor<'a, N> {
    pub(super) fn new(ev: Evaluator<'a, N>, input: BoxedCursor<'a, N>, conversion: Conversion<'a>) -> Self {
        Self {
            ev,
            input,
            conversion,
            pending: VecDeque::new(),
            count: 0,
            finished: false,
        }
    }

    fn fail(&mut self, msg: String) -> Option<XdmItemResult<N>> {
        self.finished = true;
        Some(Err(self.conversion.error(msg)))
    }

    fn next_source(&mut self) -> Option<XdmItemResult<N>> {
        if let Some(a) = self.pending.pop_front() {
            return Some(Ok(XdmItem::Atomic(a)));
        }
        self.input.next_item()
    }
}

impl<'a, N: 'static + XdmNode> SequenceCursor<'a, N> for CardinalityCursor<'a, N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.finished {
            return None;
        }
        loop {
            let ty = self.conversion.ty();
            let item = match self.next_source() {
                Some(Ok(item)) => item,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    if self.count == 0 && !ty.accepts_count(0) {
                        let msg = format!("an empty sequence is not allowed for {ty}");
                        return self.fail(msg);
                    }
                    return None;
                }
            };
            if let (Conversion::Cast { .. }, XdmItem::Node(n)) = (&self.conversion, &item) {
                self.pending.extend(n.typed_value());
                continue;
            }
            self.count += 1;
            if !ty.accepts_count(self.count) {
                let msg = format!("a sequence of more than {} item(s) is not allowed for {ty}", self.count - 1);
                return self.fail(msg);
            }
            return match self.conversion {
                Conversion::Treat(ty) => {
                    if item_matches(&item, ty, self.ev.static_ctx.schema.as_ref()) {
                        Some(Ok(item))
                    } else {
                        let msg = format!("item does not match {ty}");
                        self.fail(msg)
                    }
                }
                Conversion::Cast { target, literal } => {
                    let XdmItem::Atomic(v) = item else {
                        return None;
                    };
                    match cast_atomic(&v, target.type_code, literal, self.ev.static_ctx) {
                        Ok(cast) => Some(Ok(XdmItem::Atomic(cast))),
                        Err(e) => {
                            self.finished = true;
                            Some(Err(e))
                        }
                    }
                }
            };
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.pending.clear();
        self.count = 0;
        self.finished = false;
    }

    fn boxed_clone(&self) -> BoxedCursor<'a, N> {
        Box::new(CardinalityCursor {
            ev: self.ev.clone(),
            input: self.input.boxed_clone(),
            conversion: self.conversion,
            pending: self.pending.clone(),
            count: self.count,
            finished: self.finished,
        })
    }
}

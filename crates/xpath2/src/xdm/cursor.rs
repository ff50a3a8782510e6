//! Restartable sequence cursors.
//!
//! Every expression evaluates to a [`SequenceCursor`] rather than a one-shot
//! iterator: predicates reset a cursor to re-run it per context item, and
//! `last()` forks a cursor with [`SequenceCursor::boxed_clone`] to count ahead
//! without consuming the original.

use std::sync::Arc;

use crate::engine::runtime::Error;
use crate::xdm::{XdmItem, XdmSequence};

pub type XdmItemResult<N> = Result<XdmItem<N>, Error>;

pub type BoxedCursor<'a, N> = Box<dyn SequenceCursor<'a, N> + 'a>;

pub trait SequenceCursor<'a, N>: 'a {
    /// Advance and return the next item, `None` once exhausted.
    fn next_item(&mut self) -> Option<XdmItemResult<N>>;

    /// Rewind to the first item.
    fn reset(&mut self);

    /// Fork the cursor at its current position.
    fn boxed_clone(&self) -> BoxedCursor<'a, N>;

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

/// Cursor over a shared, already materialized sequence.
pub struct VecCursor<N> {
    items: Arc<[XdmItem<N>]>,
    pos: usize,
}

impl<N> VecCursor<N> {
    pub fn new(items: XdmSequence<N>) -> Self {
        Self {
            items: items.into(),
            pos: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn single(item: XdmItem<N>) -> Self {
        Self::new(vec![item])
    }
}

impl<N> Clone for VecCursor<N> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            pos: self.pos,
        }
    }
}

impl<'a, N: Clone + 'a> SequenceCursor<'a, N> for VecCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        let item = self.items.get(self.pos)?.clone();
        self.pos += 1;
        Some(Ok(item))
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn boxed_clone(&self) -> BoxedCursor<'a, N> {
        Box::new(self.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.items.len() - self.pos;
        (rem, Some(rem))
    }
}

/// Concatenation of several cursors (the `,` operator).
pub struct ChainCursor<'a, N> {
    parts: Vec<BoxedCursor<'a, N>>,
    idx: usize,
}

impl<'a, N> ChainCursor<'a, N> {
    pub fn new(parts: Vec<BoxedCursor<'a, N>>) -> Self {
        Self { parts, idx: 0 }
    }
}

impl<'a, N: 'a> SequenceCursor<'a, N> for ChainCursor<'a, N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        while let Some(part) = self.parts.get_mut(self.idx) {
            if let Some(item) = part.next_item() {
                return Some(item);
            }
            self.idx += 1;
        }
        None
    }

    fn reset(&mut self) {
        for p in &mut self.parts {
            p.reset();
        }
        self.idx = 0;
    }

    fn boxed_clone(&self) -> BoxedCursor<'a, N> {
        Box::new(ChainCursor {
            parts: self.parts.iter().map(|p| p.boxed_clone()).collect(),
            idx: self.idx,
        })
    }
}

/// Owned, iterable handle over a cursor.
pub struct XdmSequenceStream<'a, N> {
    cursor: BoxedCursor<'a, N>,
}

impl<'a, N: Clone + 'a> XdmSequenceStream<'a, N> {
    pub fn new(cursor: BoxedCursor<'a, N>) -> Self {
        Self { cursor }
    }

    pub fn from_vec(items: XdmSequence<N>) -> Self {
        Self::new(Box::new(VecCursor::new(items)))
    }

    pub fn cursor(self) -> BoxedCursor<'a, N> {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// Drain the remaining items into a vector, stopping at the first error.
    pub fn materialize(self) -> Result<XdmSequence<N>, Error> {
        self.collect()
    }
}

impl<'a, N: 'a> Clone for XdmSequenceStream<'a, N> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.boxed_clone(),
        }
    }
}

impl<'a, N: 'a> Iterator for XdmSequenceStream<'a, N> {
    type Item = XdmItemResult<N>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_item()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.cursor.size_hint()
    }
}

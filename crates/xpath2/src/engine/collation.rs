//! String collations addressable by URI.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::canonical_combining_class;

use crate::engine::runtime::{DynamicContext, Error, ErrorCode, StaticContext};

pub use crate::consts::{CODEPOINT_URI, SIMPLE_ACCENT_URI, SIMPLE_CASE_ACCENT_URI, SIMPLE_CASE_URI};

/// Orders strings and, for substring matching, maps them to comparison keys.
///
/// Two strings compare equal exactly when their keys are equal.
pub trait Collation: Send + Sync {
    fn uri(&self) -> &str;

    fn key(&self, s: &str) -> String {
        s.to_string()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        self.key(a).cmp(&self.key(b))
    }
}

/// Unicode codepoint order.
pub struct CodepointCollation;

impl Collation for CodepointCollation {
    fn uri(&self) -> &str {
        CODEPOINT_URI
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

/// Codepoint order over a folded form of the string: lower-cased, stripped of
/// combining marks after canonical decomposition, or both.
pub struct FoldingCollation {
    uri: &'static str,
    fold_case: bool,
    strip_accents: bool,
}

impl FoldingCollation {
    pub const CASE: Self = Self {
        uri: SIMPLE_CASE_URI,
        fold_case: true,
        strip_accents: false,
    };
    pub const ACCENT: Self = Self {
        uri: SIMPLE_ACCENT_URI,
        fold_case: false,
        strip_accents: true,
    };
    pub const CASE_ACCENT: Self = Self {
        uri: SIMPLE_CASE_ACCENT_URI,
        fold_case: true,
        strip_accents: true,
    };
}

impl Collation for FoldingCollation {
    fn uri(&self) -> &str {
        self.uri
    }

    fn key(&self, s: &str) -> String {
        let base: String = if self.strip_accents {
            s.nfd().filter(|&ch| canonical_combining_class(ch) == 0).collect()
        } else {
            s.to_string()
        };
        if self.fold_case { base.to_lowercase() } else { base }
    }
}

pub struct CollationRegistry {
    by_uri: HashMap<String, Arc<dyn Collation>>,
}

impl Default for CollationRegistry {
    /// The codepoint collation plus the three folding collations.
    fn default() -> Self {
        let builtin: [Arc<dyn Collation>; 4] = [
            Arc::new(CodepointCollation),
            Arc::new(FoldingCollation::CASE),
            Arc::new(FoldingCollation::ACCENT),
            Arc::new(FoldingCollation::CASE_ACCENT),
        ];
        let mut reg = Self { by_uri: HashMap::new() };
        for c in builtin {
            reg.insert(c);
        }
        reg
    }
}

impl CollationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn Collation>> {
        self.by_uri.get(uri).cloned()
    }

    /// Register (or replace) the collation under its own URI.
    pub fn insert(&mut self, collation: Arc<dyn Collation>) {
        self.by_uri.insert(collation.uri().to_string(), collation);
    }
}

/// Pick the collation for an operation. An explicit URI wins over the dynamic
/// default, which wins over the static default; with none of them set the
/// codepoint collation applies.
pub fn resolve_collation<N>(
    dyn_ctx: &DynamicContext<N>,
    static_ctx: &StaticContext,
    uri: Option<&str>,
) -> Result<Arc<dyn Collation>, Error> {
    let Some(wanted) = uri
        .or(dyn_ctx.default_collation.as_deref())
        .or(static_ctx.default_collation.as_deref())
    else {
        return Ok(Arc::new(CodepointCollation));
    };
    dyn_ctx
        .collations
        .get(wanted)
        .ok_or_else(|| Error::from_code(ErrorCode::FOCH0002, format!("unknown collation URI: {wanted}")))
}

//! Compiling expression text into reusable executables.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use crate::engine::evaluator::Evaluator;
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, StaticContext};
use crate::model::XdmNode;
use crate::parser::ast::{Expr, ResultType};
use crate::parser::parse_expression;
use crate::xdm::{XdmItem, XdmSequence, XdmSequenceStream};

/// Default number of compiled expressions a [`Compiler`] keeps.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// A parsed and statically checked expression, bound to the static context it
/// was compiled against. Evaluation never mutates it, so one executable can be
/// shared across threads and evaluated against many dynamic contexts.
#[derive(Debug, Clone)]
pub struct XPathExecutable {
    source: String,
    expr: Expr,
    static_ctx: Arc<StaticContext>,
}

impl XPathExecutable {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_ctx
    }

    /// Static result type of the whole expression.
    pub fn result_type(&self) -> ResultType {
        self.expr.result
    }

    /// Evaluate lazily; items are produced as the stream is pulled.
    pub fn evaluate_stream<'a, N: 'static + Send + Sync + XdmNode>(
        &'a self,
        dyn_ctx: &'a DynamicContext<N>,
    ) -> Result<XdmSequenceStream<'a, N>, Error> {
        Evaluator::new(&self.static_ctx, dyn_ctx)?.evaluate(&self.expr)
    }

    pub fn evaluate<N: 'static + Send + Sync + XdmNode>(
        &self,
        dyn_ctx: &DynamicContext<N>,
    ) -> Result<XdmSequence<N>, Error> {
        self.evaluate_stream(dyn_ctx)?.materialize()
    }

    /// At most one item; a longer result is a type error.
    pub fn evaluate_single<N: 'static + Send + Sync + XdmNode>(
        &self,
        dyn_ctx: &DynamicContext<N>,
    ) -> Result<Option<XdmItem<N>>, Error> {
        let mut stream = self.evaluate_stream(dyn_ctx)?;
        let first = stream.next().transpose()?;
        if stream.next().transpose()?.is_some() {
            return Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("expression '{}' returned more than one item", self.source),
            ));
        }
        Ok(first)
    }
}

/// Compile `expr` against `static_ctx` without caching.
pub fn compile_xpath(expr: &str, static_ctx: &StaticContext) -> Result<XPathExecutable, Error> {
    compile_shared(expr, Arc::new(static_ctx.clone()))
}

fn compile_shared(expr: &str, static_ctx: Arc<StaticContext>) -> Result<XPathExecutable, Error> {
    let parsed = parse_expression(expr, &static_ctx)?;
    tracing::debug!(expr, result = ?parsed.result, "compiled expression");
    Ok(XPathExecutable {
        source: expr.to_string(),
        expr: parsed,
        static_ctx,
    })
}

/// Compiles expressions against one static context and memoizes the results
/// in an LRU cache keyed by expression text.
pub struct Compiler {
    static_ctx: Arc<StaticContext>,
    cache: Option<Mutex<LruCache<String, Arc<XPathExecutable>>>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(StaticContext::default())
    }
}

impl Compiler {
    pub fn new(static_ctx: StaticContext) -> Self {
        Self {
            static_ctx: Arc::new(static_ctx),
            cache: None,
        }
        .with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Resize the cache, dropping what it held. A capacity of zero disables caching.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        self
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_ctx
    }

    pub fn compile(&self, expr: &str) -> Result<Arc<XPathExecutable>, Error> {
        let Some(cache) = &self.cache else {
            return compile_shared(expr, self.static_ctx.clone()).map(Arc::new);
        };
        if let Some(hit) = cache.lock().unwrap_or_else(PoisonError::into_inner).get(expr) {
            tracing::debug!(expr, "compile cache hit");
            return Ok(hit.clone());
        }
        tracing::debug!(expr, "compile cache miss");
        // parse outside the lock; a concurrent miss on the same text just compiles twice
        let compiled = Arc::new(compile_shared(expr, self.static_ctx.clone())?);
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(expr.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Number of cached executables.
    pub fn cached(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |c| c.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

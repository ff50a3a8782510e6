use crate::engine::collation::{CODEPOINT_URI, Collation, CollationRegistry};
use crate::parser::ast::ResultType;
use crate::schema::{BuiltinSchema, SchemaTypeSet};
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};
use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub type Arity = usize;

/// Error type returned by function resolution.
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// No function with the (possibly default-namespace resolved) name exists.
    Unknown(ExpandedName),
    /// Function exists, but not for the requested arity. Provides known arities.
    WrongArity {
        name: ExpandedName,
        available: Vec<Arity>,
    },
}

impl ResolveError {
    pub fn into_error(self) -> Error {
        match self {
            ResolveError::Unknown(name) => {
                Error::from_code(ErrorCode::XPST0017, format!("unknown function {name}"))
            }
            ResolveError::WrongArity { name, available } => {
                let arities: Vec<String> = available.iter().map(ToString::to_string).collect();
                Error::from_code(
                    ErrorCode::XPST0017,
                    format!("function {name} does not accept this number of arguments (expected {})", arities.join(" or ")),
                )
            }
        }
    }
}

/// The focus of an evaluation: context item, position and size.
#[derive(Debug, Clone)]
pub struct Focus<N> {
    pub item: XdmItem<N>,
    /// 1-based
    pub position: usize,
    /// Context size; only computed when the expression asks for `last()`.
    pub size: Option<usize>,
}

pub struct CallCtx<'a, N> {
    pub dyn_ctx: &'a DynamicContext<N>,
    pub static_ctx: &'a StaticContext,
    pub focus: Option<&'a Focus<N>>,
    pub default_collation: Arc<dyn Collation>,
    pub regex: Arc<dyn RegexProvider>,
}

impl<N: Clone> CallCtx<'_, N> {
    pub fn context_item(&self) -> Result<XdmItem<N>, Error> {
        self.focus
            .map(|f| f.item.clone())
            .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context item is undefined"))
    }
}

pub type FunctionImpl<N> =
    Arc<dyn Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error> + Send + Sync>;

pub type FunctionOverload<N> = (Arity, Option<Arity>, FunctionImpl<N>);
pub type FunctionOverloads<N> = Vec<FunctionOverload<N>>;

fn arity_order(a: (Arity, Option<Arity>), b: (Arity, Option<Arity>)) -> core::cmp::Ordering {
    // most specific first: higher min, then smaller max (None treated as infinity)
    b.0.cmp(&a.0).then_with(|| match (a.1, b.1) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => core::cmp::Ordering::Less,
        (None, Some(_)) => core::cmp::Ordering::Greater,
        (None, None) => core::cmp::Ordering::Equal,
    })
}

fn resolve_in<'r, T>(
    table: &'r HashMap<ExpandedName, Vec<(Arity, Option<Arity>, T)>>,
    name: &ExpandedName,
    arity: Arity,
    default_ns: Option<&str>,
) -> Result<&'r T, ResolveError> {
    let effective = match (&name.ns_uri, default_ns) {
        (None, Some(ns)) => ExpandedName::ns(ns, name.local.clone()),
        _ => name.clone(),
    };
    // exact name first, so locally registered no-namespace functions win
    for key in [name, &effective] {
        if let Some(cands) = table.get(key)
            && let Some((_, _, f)) = cands
                .iter()
                .find(|(min, max, _)| arity >= *min && max.is_none_or(|m| arity <= m))
        {
            return Ok(f);
        }
    }
    if let Some(cands) = table.get(&effective) {
        let mut arities: Vec<Arity> = vec![];
        for (min, max, _) in cands {
            match max {
                Some(m) => arities.extend(*min..=*m),
                None => arities.push(*min),
            }
        }
        arities.sort_unstable();
        arities.dedup();
        return Err(ResolveError::WrongArity {
            name: effective,
            available: arities,
        });
    }
    Err(ResolveError::Unknown(effective))
}

/// Callable functions keyed by expanded name, each with one or more arity ranges.
/// A range with no upper bound registers a variadic function.
pub struct FunctionRegistry<N> {
    fns: HashMap<ExpandedName, FunctionOverloads<N>>,
}

impl<N> Default for FunctionRegistry<N> {
    fn default() -> Self {
        Self { fns: HashMap::new() }
    }
}

impl<N> FunctionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function by ExpandedName with an arity range.
    /// If `max_arity` is None, the function is variadic starting at `min_arity`.
    pub fn register_range(
        &mut self,
        name: ExpandedName,
        min_arity: Arity,
        max_arity: Option<Arity>,
        func: FunctionImpl<N>,
    ) {
        let entry = self.fns.entry(name).or_default();
        entry.push((min_arity, max_arity, func));
        entry.sort_by(|a, b| arity_order((a.0, a.1), (b.0, b.1)));
    }

    pub fn register(&mut self, name: ExpandedName, arity: Arity, func: FunctionImpl<N>) {
        self.register_range(name, arity, Some(arity), func);
    }

    /// Register a function in a namespace using ns URI and local name.
    pub fn register_ns<F>(&mut self, ns_uri: &str, local: &str, arity: Arity, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register(ExpandedName::ns(ns_uri, local), arity, Arc::new(f));
    }

    pub fn register_ns_range<F>(&mut self, ns_uri: &str, local: &str, min_arity: Arity, max_arity: Option<Arity>, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register_range(ExpandedName::ns(ns_uri, local), min_arity, max_arity, Arc::new(f));
    }

    pub fn register_ns_variadic<F>(&mut self, ns_uri: &str, local: &str, min_arity: Arity, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register_range(ExpandedName::ns(ns_uri, local), min_arity, None, Arc::new(f));
    }

    /// Register a function without a namespace.
    pub fn register_local<F>(&mut self, local: &str, arity: Arity, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register(ExpandedName::local(local), arity, Arc::new(f));
    }

    /// Resolve a function by name/arity with optional default function namespace fallback.
    pub fn resolve(
        &self,
        name: &ExpandedName,
        arity: Arity,
        default_ns: Option<&str>,
    ) -> Result<&FunctionImpl<N>, ResolveError> {
        resolve_in(&self.fns, name, arity, default_ns)
    }
}

/// Static view of the function library: arity ranges and declared result types,
/// consulted by the parser to type `FunctionCall` nodes and reject bad arities early.
#[derive(Debug, Clone, Default)]
pub struct FunctionSignatures {
    sigs: HashMap<ExpandedName, Vec<(Arity, Option<Arity>, ResultType)>>,
}

impl FunctionSignatures {
    pub fn register(&mut self, name: ExpandedName, min: Arity, max: Option<Arity>, result: ResultType) {
        let entry = self.sigs.entry(name).or_default();
        entry.push((min, max, result));
        entry.sort_by(|a, b| arity_order((a.0, a.1), (b.0, b.1)));
    }

    pub fn resolve(&self, name: &ExpandedName, arity: Arity, default_ns: Option<&str>) -> Result<ResultType, ResolveError> {
        resolve_in(&self.sigs, name, arity, default_ns).copied()
    }

    pub fn contains(&self, name: &ExpandedName) -> bool {
        self.sigs.contains_key(name)
    }
}

pub trait RegexProvider: Send + Sync {
    fn matches(&self, pattern: &str, flags: &str, text: &str) -> Result<bool, Error>;
    fn replace(&self, pattern: &str, flags: &str, text: &str, replacement: &str) -> Result<String, Error>;
    fn tokenize(&self, pattern: &str, flags: &str, text: &str) -> Result<Vec<String>, Error>;
}

/// Backreference-capable regex provider based on fancy-regex (backtracking engine).
pub struct FancyRegexProvider;

impl FancyRegexProvider {
    fn build_with_flags(pattern: &str, flags: &str) -> Result<fancy_regex::Regex, Error> {
        let mut builder = fancy_regex::RegexBuilder::new(pattern);
        for ch in flags.chars() {
            match ch {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.verbose_mode(true);
                }
                _ => {
                    return Err(Error::from_code(
                        ErrorCode::FORX0001,
                        format!("unsupported regex flag: {ch}"),
                    ));
                }
            }
        }
        builder.build().map_err(|e| {
            Error::from_code(ErrorCode::FORX0002, "invalid regex pattern")
                .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
        })
    }
}

/// XPath replacement strings allow `$n` and `\$`/`\\` only; translate them into the
/// `${n}` template syntax fancy-regex expands.
fn translate_replacement(replacement: &str, groups: usize) -> Result<String, Error> {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(e @ ('\\' | '$')) => {
                    if e == '$' {
                        out.push_str("$$");
                    } else {
                        out.push('\\');
                    }
                }
                _ => {
                    return Err(Error::from_code(ErrorCode::FORX0004, "invalid escape in replacement string"));
                }
            },
            '$' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    // longest group number that exists wins
                    let mut candidate = digits.clone();
                    candidate.push(d);
                    if !digits.is_empty() && candidate.parse::<usize>().is_ok_and(|n| n > groups) {
                        break;
                    }
                    digits = candidate;
                    chars.next();
                }
                if digits.is_empty() {
                    return Err(Error::from_code(ErrorCode::FORX0004, "dangling $ in replacement string"));
                }
                out.push_str("${");
                out.push_str(&digits);
                out.push('}');
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn regex_eval_error(e: fancy_regex::Error) -> Error {
    Error::from_code(ErrorCode::FORX0002, "regex evaluation error")
        .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
}

impl RegexProvider for FancyRegexProvider {
    fn matches(&self, pattern: &str, flags: &str, text: &str) -> Result<bool, Error> {
        let re = Self::build_with_flags(pattern, flags)?;
        re.is_match(text).map_err(regex_eval_error)
    }

    fn replace(&self, pattern: &str, flags: &str, text: &str, replacement: &str) -> Result<String, Error> {
        let re = Self::build_with_flags(pattern, flags)?;
        if re.is_match("").map_err(regex_eval_error)? {
            return Err(Error::from_code(
                ErrorCode::FORX0003,
                "pattern matches zero-length string",
            ));
        }
        let template = translate_replacement(replacement, re.captures_len().saturating_sub(1))?;
        let mut out = String::new();
        let mut last = 0;
        for caps in re.captures_iter(text) {
            let caps = caps.map_err(regex_eval_error)?;
            let Some(m) = caps.get(0) else { continue };
            out.push_str(&text[last..m.start()]);
            fancy_regex::Expander::default().append_expansion(&mut out, &template, &caps);
            last = m.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn tokenize(&self, pattern: &str, flags: &str, text: &str) -> Result<Vec<String>, Error> {
        let re = Self::build_with_flags(pattern, flags)?;
        if re.is_match("").map_err(regex_eval_error)? {
            return Err(Error::from_code(
                ErrorCode::FORX0003,
                "pattern matches zero-length string",
            ));
        }
        if text.is_empty() {
            return Ok(Vec::new());
        }
        re.split(text)
            .map(|part| part.map(str::to_string).map_err(regex_eval_error))
            .collect()
    }
}

macro_rules! error_codes {
    ($($code:ident => $doc:literal,)+) => {
        /// Every W3C error code this crate raises.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorCode {
            $(#[doc = $doc] $code,)+
            /// A code outside the `err:` namespace.
            Unknown,
        }

        impl ErrorCode {
            /// Local part of the code, e.g. `XPTY0004`.
            pub fn local(&self) -> &'static str {
                match self {
                    $(ErrorCode::$code => stringify!($code),)+
                    ErrorCode::Unknown => "UNKNOWN",
                }
            }

            /// Prefixed form, e.g. `err:XPTY0004`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ErrorCode::$code => concat!("err:", stringify!($code)),)+
                    ErrorCode::Unknown => "err:UNKNOWN",
                }
            }

            pub fn from_code(s: &str) -> Self {
                let local = s.strip_prefix("err:").unwrap_or(s);
                match local {
                    $(stringify!($code) => ErrorCode::$code,)+
                    _ => ErrorCode::Unknown,
                }
            }
        }
    };
}

error_codes! {
    FOAR0001 => "division by zero",
    FOAR0002 => "numeric operation overflow/underflow",
    FOCA0001 => "input value too large for decimal",
    FOCA0002 => "invalid lexical value",
    FOCA0003 => "input value too large for integer",
    FOCA0005 => "NaN supplied as float/double value",
    FOCH0001 => "code point not valid",
    FOCH0002 => "unsupported collation",
    FOCH0003 => "unsupported normalization form",
    FODC0002 => "error retrieving resource (default collection undefined)",
    FODT0001 => "overflow/underflow in date/time operation",
    FODT0002 => "overflow/underflow in duration operation",
    FOER0000 => "unidentified error",
    FONS0004 => "no namespace found for prefix",
    FONS0005 => "base-uri not defined in the static context",
    FORG0001 => "invalid value for cast/constructor",
    FORG0002 => "invalid argument to fn:resolve-uri()",
    FORG0003 => "fn:zero-or-one called with a sequence containing more than one item",
    FORG0004 => "fn:one-or-more called with a sequence containing no items",
    FORG0005 => "fn:exactly-one called with a sequence containing zero or more than one item",
    FORG0006 => "invalid argument type",
    FORX0001 => "invalid regular expression flags",
    FORX0002 => "invalid regular expression",
    FORX0003 => "regular expression matches zero-length string",
    FORX0004 => "invalid replacement string",
    XPDY0002 => "context item is undefined",
    XPDY0050 => "treat as: dynamic type does not match",
    XPST0003 => "syntax error",
    XPST0008 => "undeclared variable",
    XPST0017 => "unknown function or wrong arity",
    XPST0051 => "unknown atomic type",
    XPST0080 => "abstract type used as cast target",
    XPST0081 => "unbound namespace prefix",
    XPTY0004 => "type error",
    XPTY0018 => "path step mixes nodes and atomic values",
    XPTY0019 => "path step applied to a non-node",
    XPTY0020 => "axis step context item is not a node",
}

impl ErrorCode {
    /// Returns the QName (ExpandedName) for this code.
    /// Namespace: http://www.w3.org/2005/xqt-errors
    pub fn qname(&self) -> ExpandedName {
        ExpandedName::ns(ERR_NS, self.local())
    }
}

/// Namespace URI used for W3C-defined XPath/XQuery error codes (xqt-errors).
pub use crate::consts::ERR_NS;

/// 1-based line/column of the offending input, for lexer and parser errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    pub position: Option<SourcePosition>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            position: None,
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    /// Human-readable code (`err:LOCAL` or `Q{ns}local`).
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else {
            self.code.to_string()
        }
    }

    pub fn with_source(mut self, source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Re-label a lower-level type error with a function's own error code,
    /// keeping the original as the source.
    pub fn relabel(self, code: ErrorCode) -> Self {
        if self.code_enum() == code {
            return self;
        }
        let message = self.message.clone();
        Error::from_code(code, message).with_source(Some(Arc::new(self) as Arc<dyn std::error::Error + Send + Sync>))
    }

    /// Parse an error code string (`err:FOER0000` or `Q{ns}local`) into an ExpandedName.
    pub fn parse_code(s: &str) -> ExpandedName {
        if let Some(rest) = s.strip_prefix("err:") {
            return ExpandedName::ns(ERR_NS, rest);
        }
        if let Some((ns, local)) = s
            .strip_prefix('Q')
            .and_then(|t| t.strip_prefix('{'))
            .and_then(|t| t.split_once('}'))
        {
            return ExpandedName::ns(ns, local);
        }
        ExpandedName::local(s)
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(e: fancy_regex::Error) -> Self {
        Error::from_code(ErrorCode::FORX0002, "regex error")
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::from_code(ErrorCode::FORG0002, format!("invalid URI: {e}"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())?;
        if let Some(p) = &self.position {
            write!(f, " at line {}, column {}", p.line, p.column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

impl NamespaceBindings {
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct StaticContext {
    pub base_uri: Option<String>,
    pub default_function_namespace: Option<String>,
    pub default_element_namespace: Option<String>,
    pub default_collation: Option<String>,
    pub namespaces: NamespaceBindings,
    pub in_scope_variables: HashSet<ExpandedName>,
    pub schema: Arc<dyn SchemaTypeSet>,
    pub functions: Arc<FunctionSignatures>,
    /// Read `24:00:00` as the last instant of the same day instead of the first
    /// instant of the next day.
    pub end_of_day_midnight: bool,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        for (p, uri) in [
            ("xml", crate::consts::XML_URI),
            ("xs", crate::consts::XS),
            ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ("fn", crate::consts::FNS),
            ("err", ERR_NS),
        ] {
            ns.by_prefix.insert(p.to_string(), uri.to_string());
        }
        Self {
            base_uri: None,
            default_function_namespace: Some(crate::consts::FNS.to_string()),
            default_element_namespace: None,
            default_collation: Some(CODEPOINT_URI.to_string()),
            namespaces: ns,
            in_scope_variables: HashSet::new(),
            schema: Arc::new(BuiltinSchema),
            functions: crate::engine::functions::default_function_signatures(),
            end_of_day_midnight: false,
        }
    }
}

/// Builder for `StaticContext`: explicit namespace registrations and default
/// settings while preserving the implicit `xml` binding.
pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContextBuilder {
    /// The resulting `StaticContext` is captured by the compiled expression; a different
    /// context at evaluation time has no effect on name resolution or typing.
    pub fn new() -> Self {
        Self {
            ctx: StaticContext::default(),
        }
    }

    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.ctx.base_uri = Some(uri.into());
        self
    }

    pub fn with_default_function_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_function_namespace = Some(uri.into());
        self
    }

    pub fn with_default_element_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_element_namespace = Some(uri.into());
        self
    }

    pub fn with_default_collation(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_collation = Some(uri.into());
        self
    }

    /// Register a namespace prefix. The reserved `xml` prefix cannot be rebound.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p == "xml" {
            return self;
        }
        self.ctx.namespaces.by_prefix.insert(p, uri.into());
        self
    }

    /// Register an in-scope variable that may be referenced without being bound locally.
    pub fn with_variable(mut self, name: ExpandedName) -> Self {
        self.ctx.in_scope_variables.insert(name);
        self
    }

    pub fn with_schema(mut self, schema: Arc<dyn SchemaTypeSet>) -> Self {
        self.ctx.schema = schema;
        self
    }

    pub fn with_function_signatures(mut self, sigs: Arc<FunctionSignatures>) -> Self {
        self.ctx.functions = sigs;
        self
    }

    pub fn with_end_of_day_midnight(mut self, enabled: bool) -> Self {
        self.ctx.end_of_day_midnight = enabled;
        self
    }

    pub fn build(self) -> StaticContext {
        self.ctx
    }
}

#[derive(Clone)]
pub struct DynamicContext<N> {
    pub context_item: Option<XdmItem<N>>,
    pub variables: HashMap<ExpandedName, XdmSequence<N>>,
    pub default_collation: Option<String>,
    pub functions: Arc<FunctionRegistry<N>>,
    pub collations: Arc<CollationRegistry>,
    pub regex: Option<Arc<dyn RegexProvider>>,
    pub default_collection: Option<XdmSequence<N>>,
    pub now: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub timezone_override: Option<chrono::FixedOffset>,
}

impl<N: 'static + Send + Sync + crate::model::XdmNode> Default for DynamicContext<N> {
    fn default() -> Self {
        Self {
            context_item: None,
            variables: HashMap::new(),
            default_collation: None,
            functions: crate::engine::functions::default_function_registry::<N>(),
            collations: Arc::new(CollationRegistry::default()),
            regex: None,
            default_collection: None,
            now: None,
            timezone_override: None,
        }
    }
}

impl<N> DynamicContext<N> {
    /// Current instant, fixed when the host supplied one.
    pub fn now(&self) -> chrono::DateTime<chrono::FixedOffset> {
        let now = self.now.unwrap_or_else(|| chrono::Local::now().fixed_offset());
        match self.timezone_override {
            Some(tz) => now.with_timezone(&tz),
            None => now,
        }
    }

    pub fn implicit_timezone(&self) -> chrono::FixedOffset {
        self.timezone_override.unwrap_or_else(|| *self.now().offset())
    }
}

pub struct DynamicContextBuilder<N> {
    ctx: DynamicContext<N>,
}

impl<N: 'static + Send + Sync + crate::model::XdmNode> Default for DynamicContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: 'static + Send + Sync + crate::model::XdmNode> DynamicContextBuilder<N> {
    pub fn new() -> Self {
        Self {
            ctx: DynamicContext::default(),
        }
    }

    pub fn with_context_item(mut self, item: impl Into<XdmItem<N>>) -> Self {
        self.ctx.context_item = Some(item.into());
        self
    }

    pub fn with_variable(mut self, name: ExpandedName, value: impl Into<XdmSequence<N>>) -> Self {
        self.ctx.variables.insert(name, value.into());
        self
    }

    pub fn with_default_collation(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_collation = Some(uri.into());
        self
    }

    pub fn with_functions(mut self, reg: Arc<FunctionRegistry<N>>) -> Self {
        self.ctx.functions = reg;
        self
    }

    pub fn with_collations(mut self, reg: Arc<CollationRegistry>) -> Self {
        self.ctx.collations = reg;
        self
    }

    pub fn with_regex(mut self, provider: Arc<dyn RegexProvider>) -> Self {
        self.ctx.regex = Some(provider);
        self
    }

    pub fn with_default_collection(mut self, items: impl Into<XdmSequence<N>>) -> Self {
        self.ctx.default_collection = Some(items.into());
        self
    }

    /// Fix 'now' for deterministic date/time functions.
    pub fn with_now(mut self, now: chrono::DateTime<chrono::FixedOffset>) -> Self {
        self.ctx.now = Some(now);
        self
    }

    /// Override the implicit timezone (offset in minutes).
    pub fn with_timezone(mut self, offset_minutes: i32) -> Self {
        if let Some(tz) = chrono::FixedOffset::east_opt(offset_minutes * 60) {
            self.ctx.timezone_override = Some(tz);
        }
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        self.ctx
    }
}

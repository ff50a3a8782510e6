//! The built-in `fn:` library.
//!
//! Every function is registered twice from one table: the implementation goes
//! into a [`FunctionRegistry`] and the arity range plus static result type into
//! [`FunctionSignatures`], which the parser consults before evaluation.

use crate::consts::FNS;
use crate::engine::runtime::{FunctionRegistry, FunctionSignatures};
use crate::model::XdmNode;
use crate::parser::ast::ResultType;
use crate::xdm::ExpandedName;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

pub mod boolean;
mod common;
pub mod context;
pub mod diagnostics;
pub mod numeric;
pub mod qnames;
pub mod regex;
pub mod sequences;
pub mod strings;

fn register_default_functions<N: 'static + Send + Sync + XdmNode>(
    reg: Option<&mut FunctionRegistry<N>>,
    sigs: Option<&mut FunctionSignatures>,
) {
    let mut reg = reg;
    let mut sigs = sigs;
    macro_rules! reg_ns {
        ($local:expr, $arity:expr, $result:expr, $func:expr $(,)?) => {{
            if let Some(s) = sigs.as_mut() {
                s.register(ExpandedName::ns(FNS, $local), $arity, Some($arity), $result);
            }
            if let Some(r) = reg.as_mut() {
                r.register_ns(FNS, $local, $arity, $func);
            }
        }};
    }
    macro_rules! reg_ns_range {
        ($local:expr, $min:expr, $max:expr, $result:expr, $func:expr $(,)?) => {{
            if let Some(s) = sigs.as_mut() {
                s.register(ExpandedName::ns(FNS, $local), $min, $max, $result);
            }
            if let Some(r) = reg.as_mut() {
                r.register_ns_range(FNS, $local, $min, $max, $func);
            }
        }};
    }
    macro_rules! reg_ns_variadic {
        ($local:expr, $min:expr, $result:expr, $func:expr $(,)?) => {{
            if let Some(s) = sigs.as_mut() {
                s.register(ExpandedName::ns(FNS, $local), $min, None, $result);
            }
            if let Some(r) = reg.as_mut() {
                r.register_ns_variadic(FNS, $local, $min, $func);
            }
        }};
    }

    // ===== Accessors and booleans =====
    reg_ns!("true", 0, ResultType::Boolean, boolean::fn_true::<N>);
    reg_ns!("false", 0, ResultType::Boolean, boolean::fn_false::<N>);
    reg_ns!("not", 1, ResultType::Boolean, boolean::not_fn::<N>);
    reg_ns!("boolean", 1, ResultType::Boolean, boolean::boolean_fn::<N>);
    reg_ns_range!("data", 0, Some(1), ResultType::Any, boolean::data_fn::<N>);
    reg_ns_range!("string", 0, Some(1), ResultType::String, boolean::string_fn::<N>);
    reg_ns_range!("number", 0, Some(1), ResultType::Number, boolean::number_fn::<N>);

    // ===== Context =====
    reg_ns!("position", 0, ResultType::Number, context::position_fn::<N>);
    reg_ns!("last", 0, ResultType::Number, context::last_fn::<N>);
    reg_ns!("current-dateTime", 0, ResultType::DateTime, context::current_date_time_fn::<N>);
    reg_ns!("current-date", 0, ResultType::DateTime, context::current_date_fn::<N>);
    reg_ns!("current-time", 0, ResultType::DateTime, context::current_time_fn::<N>);
    reg_ns!("implicit-timezone", 0, ResultType::Duration, context::implicit_timezone_fn::<N>);
    reg_ns!("default-collation", 0, ResultType::String, context::default_collation_fn::<N>);
    reg_ns!("static-base-uri", 0, ResultType::AnyUri, context::static_base_uri_fn::<N>);
    reg_ns_range!("collection", 0, Some(1), ResultType::NodeSet, context::collection_fn::<N>);

    // ===== Numeric =====
    reg_ns!("abs", 1, ResultType::Number, numeric::abs_fn::<N>);
    reg_ns!("ceiling", 1, ResultType::Number, numeric::ceiling_fn::<N>);
    reg_ns!("floor", 1, ResultType::Number, numeric::floor_fn::<N>);
    reg_ns!("round", 1, ResultType::Number, numeric::round_fn::<N>);
    reg_ns_range!("round-half-to-even", 1, Some(2), ResultType::Number, numeric::round_half_to_even_fn::<N>);
    reg_ns_range!("sum", 1, Some(2), ResultType::Any, numeric::sum_fn::<N>);
    reg_ns!("avg", 1, ResultType::Any, numeric::avg_fn::<N>);
    reg_ns_range!("min", 1, Some(2), ResultType::Any, numeric::min_fn::<N>);
    reg_ns_range!("max", 1, Some(2), ResultType::Any, numeric::max_fn::<N>);
    reg_ns!("count", 1, ResultType::Number, numeric::count_fn::<N>);

    // ===== Strings =====
    reg_ns_variadic!("concat", 2, ResultType::String, strings::concat_fn::<N>);
    reg_ns!("string-join", 2, ResultType::String, strings::string_join_fn::<N>);
    reg_ns_range!("substring", 2, Some(3), ResultType::String, strings::substring_fn::<N>);
    reg_ns_range!("string-length", 0, Some(1), ResultType::Number, strings::string_length_fn::<N>);
    reg_ns!("upper-case", 1, ResultType::String, strings::upper_case_fn::<N>);
    reg_ns!("lower-case", 1, ResultType::String, strings::lower_case_fn::<N>);
    reg_ns_range!("contains", 2, Some(3), ResultType::Boolean, strings::contains_fn::<N>);
    reg_ns_range!("starts-with", 2, Some(3), ResultType::Boolean, strings::starts_with_fn::<N>);
    reg_ns_range!("ends-with", 2, Some(3), ResultType::Boolean, strings::ends_with_fn::<N>);
    reg_ns_range!("substring-before", 2, Some(3), ResultType::String, strings::substring_before_fn::<N>);
    reg_ns_range!("substring-after", 2, Some(3), ResultType::String, strings::substring_after_fn::<N>);
    reg_ns_range!("normalize-space", 0, Some(1), ResultType::String, strings::normalize_space_fn::<N>);
    reg_ns_range!("normalize-unicode", 1, Some(2), ResultType::String, strings::normalize_unicode_fn::<N>);
    reg_ns!("translate", 3, ResultType::String, strings::translate_fn::<N>);
    reg_ns_range!("compare", 2, Some(3), ResultType::Number, strings::compare_fn::<N>);
    reg_ns!("codepoints-to-string", 1, ResultType::String, strings::codepoints_to_string_fn::<N>);
    reg_ns!("string-to-codepoints", 1, ResultType::Any, strings::string_to_codepoints_fn::<N>);
    reg_ns!("encode-for-uri", 1, ResultType::String, strings::encode_for_uri_fn::<N>);
    reg_ns_range!("resolve-uri", 1, Some(2), ResultType::AnyUri, strings::resolve_uri_fn::<N>);

    // ===== Regex =====
    reg_ns_range!("matches", 2, Some(3), ResultType::Boolean, regex::matches_fn::<N>);
    reg_ns_range!("replace", 3, Some(4), ResultType::String, regex::replace_fn::<N>);
    reg_ns_range!("tokenize", 2, Some(3), ResultType::Any, regex::tokenize_fn::<N>);

    // ===== Sequences =====
    reg_ns!("empty", 1, ResultType::Boolean, sequences::empty_fn::<N>);
    reg_ns!("exists", 1, ResultType::Boolean, sequences::exists_fn::<N>);
    reg_ns_range!("distinct-values", 1, Some(2), ResultType::Any, sequences::distinct_values_fn::<N>);
    reg_ns_range!("index-of", 2, Some(3), ResultType::Any, sequences::index_of_fn::<N>);
    reg_ns!("insert-before", 3, ResultType::Any, sequences::insert_before_fn::<N>);
    reg_ns!("remove", 2, ResultType::Any, sequences::remove_fn::<N>);
    reg_ns!("reverse", 1, ResultType::Any, sequences::reverse_fn::<N>);
    reg_ns_range!("subsequence", 2, Some(3), ResultType::Any, sequences::subsequence_fn::<N>);
    reg_ns!("unordered", 1, ResultType::Any, sequences::unordered_fn::<N>);
    reg_ns!("zero-or-one", 1, ResultType::Any, sequences::zero_or_one_fn::<N>);
    reg_ns!("one-or-more", 1, ResultType::Any, sequences::one_or_more_fn::<N>);
    reg_ns!("exactly-one", 1, ResultType::Any, sequences::exactly_one_fn::<N>);
    reg_ns_range!("deep-equal", 2, Some(3), ResultType::Boolean, sequences::deep_equal_fn::<N>);

    // ===== Nodes and QNames =====
    reg_ns_range!("name", 0, Some(1), ResultType::String, qnames::name_fn::<N>);
    reg_ns_range!("local-name", 0, Some(1), ResultType::String, qnames::local_name_fn::<N>);
    reg_ns_range!("namespace-uri", 0, Some(1), ResultType::AnyUri, qnames::namespace_uri_fn::<N>);
    reg_ns_range!("root", 0, Some(1), ResultType::Navigator, qnames::root_fn::<N>);
    reg_ns_range!("node-name", 0, Some(1), ResultType::QName, qnames::node_name_fn::<N>);
    reg_ns!("QName", 2, ResultType::QName, qnames::qname_fn::<N>);
    reg_ns!("local-name-from-QName", 1, ResultType::String, qnames::local_name_from_qname_fn::<N>);
    reg_ns!("namespace-uri-from-QName", 1, ResultType::AnyUri, qnames::namespace_uri_from_qname_fn::<N>);

    // ===== Diagnostics =====
    reg_ns_range!("error", 0, Some(3), ResultType::Any, diagnostics::error_fn::<N>);
    reg_ns!("trace", 2, ResultType::Any, diagnostics::trace_fn::<N>);
}

/// The default library for node type `N`, built once per type and shared.
pub fn default_function_registry<N: 'static + Send + Sync + XdmNode>() -> Arc<FunctionRegistry<N>> {
    static CACHE: OnceLock<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>> = OnceLock::new();
    let map = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    // a poisoned cache only means another thread panicked mid-insert; the map is still usable
    let mut guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let type_id = TypeId::of::<N>();
    if let Some(existing) = guard
        .get(&type_id)
        .and_then(|b| b.downcast_ref::<Arc<FunctionRegistry<N>>>())
    {
        return existing.clone();
    }

    let mut reg = FunctionRegistry::new();
    register_default_functions(Some(&mut reg), None);
    let arc = Arc::new(reg);
    guard.insert(type_id, Box::new(arc.clone()));
    arc
}

/// Arity ranges and result types of the default library.
pub fn default_function_signatures() -> Arc<FunctionSignatures> {
    static SIGS: OnceLock<Arc<FunctionSignatures>> = OnceLock::new();
    SIGS.get_or_init(|| {
        let mut sigs = FunctionSignatures::default();
        register_default_functions::<crate::simple_node::SimpleNode>(None, Some(&mut sigs));
        Arc::new(sigs)
    })
    .clone()
}

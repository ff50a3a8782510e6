use std::sync::Arc;

use rstest::rstest;
use xpath2::{Compiler, ErrorCode, StaticContextBuilder};

mod common;
use common::*;

#[rstest]
fn repeated_compiles_hit_the_cache() {
    let compiler = Compiler::default();
    assert_eq!(compiler.cached(), 0);
    let first = compiler.compile("1 + 2").unwrap();
    let second = compiler.compile("1 + 2").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(compiler.cached(), 1);
    let other = compiler.compile("1 + 3").unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(compiler.cached(), 2);
    assert_eq!(as_integers(&first.evaluate(&empty_ctx()).unwrap()), vec![3]);
}

#[rstest]
fn failed_compiles_are_not_cached() {
    let compiler = Compiler::default();
    let err = compiler.compile("1 +").unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    assert_eq!(compiler.cached(), 0);
}

#[rstest]
fn least_recently_used_entries_are_evicted() {
    let compiler = Compiler::default().with_cache_capacity(2);
    let a = compiler.compile("'a'").unwrap();
    compiler.compile("'b'").unwrap();
    // touch 'a' so 'b' is the eviction candidate
    assert!(Arc::ptr_eq(&a, &compiler.compile("'a'").unwrap()));
    compiler.compile("'c'").unwrap();
    assert_eq!(compiler.cached(), 2);
    assert!(Arc::ptr_eq(&a, &compiler.compile("'a'").unwrap()));
}

#[rstest]
fn zero_capacity_disables_caching() {
    let compiler = Compiler::default().with_cache_capacity(0);
    let first = compiler.compile("1").unwrap();
    let second = compiler.compile("1").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(compiler.cached(), 0);
}

#[rstest]
fn clear_cache_empties_it() {
    let compiler = Compiler::default();
    let first = compiler.compile("true()").unwrap();
    compiler.compile("false()").unwrap();
    compiler.clear_cache();
    assert_eq!(compiler.cached(), 0);
    assert!(!Arc::ptr_eq(&first, &compiler.compile("true()").unwrap()));
}

#[rstest]
fn compiled_executables_carry_their_static_context() {
    let sc = StaticContextBuilder::new().with_namespace("p", "urn:p").build();
    let compiler = Compiler::new(sc);
    let exe = compiler.compile("namespace-uri-from-QName(xs:QName('p:x'))").unwrap();
    assert_eq!(exe.source(), "namespace-uri-from-QName(xs:QName('p:x'))");
    assert_eq!(as_string(&exe.evaluate(&empty_ctx()).unwrap()), "urn:p");
    assert_eq!(compiler.static_context().namespaces.resolve("p"), Some("urn:p"));
}

#[rstest]
fn executables_are_reusable_across_contexts() {
    let compiler = Compiler::default();
    let exe = compiler.compile("count(//book)").unwrap();
    let lib = library();
    assert_eq!(as_integers(&exe.evaluate(&doc_ctx(&lib)).unwrap()), vec![3]);
    let other = xpath2::simple_doc().child(xpath2::elem("book")).build();
    assert_eq!(as_integers(&exe.evaluate(&doc_ctx(&other)).unwrap()), vec![1]);
}

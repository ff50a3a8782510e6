//! Helpers shared by the integration tests.
#![allow(dead_code)]

use xpath2::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, SimpleNode, StaticContext, XdmAtomicValue, XdmItem,
    attr, comment, compile_xpath, elem, pi, simple_doc, text,
};

pub type Item = XdmItem<SimpleNode>;

pub fn empty_ctx() -> DynamicContext<SimpleNode> {
    DynamicContextBuilder::<SimpleNode>::new().build()
}

pub fn doc_ctx(doc: &SimpleNode) -> DynamicContext<SimpleNode> {
    DynamicContextBuilder::<SimpleNode>::new()
        .with_context_item(XdmItem::Node(doc.clone()))
        .build()
}

pub fn try_eval_in(expr: &str, ctx: &DynamicContext<SimpleNode>) -> Result<Vec<Item>, Error> {
    compile_xpath(expr, &StaticContext::default())?.evaluate(ctx)
}

pub fn try_eval(expr: &str) -> Result<Vec<Item>, Error> {
    try_eval_in(expr, &empty_ctx())
}

pub fn eval(expr: &str) -> Vec<Item> {
    try_eval(expr).unwrap_or_else(|e| panic!("'{expr}' failed: {e}"))
}

pub fn eval_in(expr: &str, ctx: &DynamicContext<SimpleNode>) -> Vec<Item> {
    try_eval_in(expr, ctx).unwrap_or_else(|e| panic!("'{expr}' failed: {e}"))
}

/// Error code of an expression that must fail (at compile or run time).
pub fn err_code(expr: &str) -> ErrorCode {
    err_code_in(expr, &empty_ctx())
}

pub fn err_code_in(expr: &str, ctx: &DynamicContext<SimpleNode>) -> ErrorCode {
    match try_eval_in(expr, ctx) {
        Ok(v) => panic!("'{expr}' should fail, got {v:?}"),
        Err(e) => e.code_enum(),
    }
}

pub fn atomics(items: &[Item]) -> Vec<XdmAtomicValue> {
    items
        .iter()
        .map(|i| match i {
            XdmItem::Atomic(a) => a.clone(),
            XdmItem::Node(n) => panic!("expected an atomic value, got {n:?}"),
        })
        .collect()
}

pub fn single(items: &[Item]) -> XdmAtomicValue {
    match atomics(items).as_slice() {
        [a] => a.clone(),
        other => panic!("expected one atomic value, got {other:?}"),
    }
}

pub fn as_bool(items: &[Item]) -> bool {
    match single(items) {
        XdmAtomicValue::Boolean(b) => b,
        other => panic!("expected xs:boolean, got {other:?}"),
    }
}

/// Canonical string forms of every item, space separated.
pub fn as_string(items: &[Item]) -> String {
    atomics(items).iter().map(XdmAtomicValue::string_value).collect::<Vec<_>>().join(" ")
}

pub fn as_integers(items: &[Item]) -> Vec<i64> {
    atomics(items)
        .iter()
        .map(|a| match a {
            XdmAtomicValue::Integer(i) => *i,
            other => panic!("expected xs:integer, got {other:?}"),
        })
        .collect()
}

/// ```text
/// <library id="lib">
///   <book id="b1" year="1999"><title>Alpha</title><price>10</price></book>
///   <book id="b2" year="2005"><title>Beta</title><price>25.5</price></book>
///   <!--note-->
///   <book id="b3" year="2012"><title>Gamma</title><price>7</price></book>
///   <?target data?>
///   <magazine><title>Delta</title></magazine>
/// </library>
/// ```
pub fn library() -> SimpleNode {
    let book = |id: &str, year: &str, title: &str, price: &str| {
        elem("book")
            .attr(attr("id", id))
            .attr(attr("year", year))
            .child(elem("title").child(text(title)))
            .child(elem("price").child(text(price)))
    };
    simple_doc()
        .child(
            elem("library")
                .attr(attr("id", "lib"))
                .child(book("b1", "1999", "Alpha", "10"))
                .child(book("b2", "2005", "Beta", "25.5"))
                .child(comment("note"))
                .child(book("b3", "2012", "Gamma", "7"))
                .child(pi("target", "data"))
                .child(elem("magazine").child(elem("title").child(text("Delta")))),
        )
        .build()
}

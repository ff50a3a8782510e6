use rstest::{fixture, rstest};
use xpath2::{
    DynamicContextBuilder, ErrorCode, SimpleNode, StaticContextBuilder, XdmAtomicValue, XdmItem, XdmNode,
    compile_xpath, elem, ns, simple_doc, text,
};

mod common;
use common::*;

#[fixture]
fn doc() -> SimpleNode {
    library()
}

fn run(doc: &SimpleNode, expr: &str) -> Vec<Item> {
    eval_in(expr, &doc_ctx(doc))
}

fn count(doc: &SimpleNode, expr: &str) -> i64 {
    as_integers(&run(doc, &format!("count({expr})")))[0]
}

fn text_of(doc: &SimpleNode, expr: &str) -> String {
    as_string(&run(doc, expr))
}

#[rstest]
fn basic_selection(doc: SimpleNode) {
    assert_eq!(count(&doc, "//book"), 3);
    assert_eq!(text_of(&doc, "string(//book[2]/title)"), "Beta");
    assert_eq!(text_of(&doc, "string(//book[last()]/@id)"), "b3");
    assert_eq!(count(&doc, "//book[@year > 2000]"), 2);
    assert_eq!(text_of(&doc, "sum(//price)"), "42.5");
    assert_eq!(count(&doc, "/library/book"), 3);
    assert_eq!(count(&doc, "/library/nothing"), 0);
}

#[rstest]
#[case::all_children("/library/node()", 6)]
#[case::elements("//*", 12)]
#[case::element_test("//element()", 12)]
#[case::named_element_test("//element(title)", 4)]
#[case::comments("//comment()", 1)]
#[case::pis("//processing-instruction()", 1)]
#[case::named_pi("//processing-instruction('target')", 1)]
#[case::other_pi("//processing-instruction(other)", 0)]
#[case::texts("//text()", 7)]
#[case::attributes("//@*", 7)]
#[case::attribute_test("//attribute(year)", 3)]
#[case::documents("/self::document-node()", 1)]
fn kind_tests(doc: SimpleNode, #[case] expr: &str, #[case] expected: i64) {
    assert_eq!(count(&doc, expr), expected, "{expr}");
}

#[rstest]
#[case::preceding_sibling_nearest("string(//book[3]/preceding-sibling::*[1]/@id)", "b2")]
#[case::preceding_sibling_farthest("string(//book[3]/preceding-sibling::*[last()]/@id)", "b1")]
#[case::ancestor_nearest("name((//title)[1]/ancestor::*[1])", "book")]
#[case::ancestor_farthest("name((//title)[1]/ancestor::*[last()])", "library")]
#[case::parent("string(//price[. = 7]/../@id)", "b3")]
#[case::parent_axis("name(//magazine/title/parent::*)", "magazine")]
#[case::following_sibling("string(//book[1]/following-sibling::book[1]/@id)", "b2")]
#[case::self_axis("string(//*[self::magazine]/title)", "Delta")]
#[case::descendant("string(/library/descendant::title[4])", "Delta")]
#[case::attribute_axis("string(//book[2]/attribute::year)", "2005")]
fn axes(doc: SimpleNode, #[case] expr: &str, #[case] expected: &str) {
    assert_eq!(text_of(&doc, expr), expected, "{expr}");
}

#[rstest]
#[case::following_sibling("//book[1]/following-sibling::*", 3)]
#[case::following("(//book)[1]/following::book", 2)]
#[case::preceding("(//book)[3]/preceding::title", 2)]
#[case::ancestors("(//title)[1]/ancestor::*", 2)]
#[case::ancestor_or_self("(//title)[1]/ancestor-or-self::node()", 4)]
#[case::descendant_or_self_skips_attributes("/library/descendant-or-self::node()[self::attribute()]", 0)]
#[case::descendants("/library/descendant::title", 4)]
#[case::parents_deduplicated("//book/..", 1)]
#[case::preceding_excludes_ancestors("(//title)[1]/preceding::*", 0)]
fn axis_counts(doc: SimpleNode, #[case] expr: &str, #[case] expected: i64) {
    assert_eq!(count(&doc, expr), expected, "{expr}");
}

#[rstest]
fn reverse_axis_results_are_in_document_order(doc: SimpleNode) {
    assert_eq!(
        text_of(&doc, "for $b in //book[3]/preceding-sibling::book return string($b/@id)"),
        "b1 b2"
    );
}

#[rstest]
fn set_operators(doc: SimpleNode) {
    assert_eq!(count(&doc, "//book | //magazine"), 4);
    assert_eq!(count(&doc, "//book union //book"), 3);
    assert_eq!(text_of(&doc, "name((//magazine | //book[1])[1])"), "book");
    assert_eq!(count(&doc, "//book intersect //book[@year > 2000]"), 2);
    assert_eq!(text_of(&doc, "string((//book except //book[1])[1]/@id)"), "b2");
    assert_eq!(count(&doc, "(//book, //book)"), 6);
    assert_eq!(err_code_in("//book | (1, 2)", &doc_ctx(&doc)), ErrorCode::XPTY0004);
}

#[rstest]
fn positional_predicates(doc: SimpleNode) {
    assert_eq!(text_of(&doc, "string(//book[position() = 2]/@id)"), "b2");
    assert_eq!(count(&doc, "//book[2.5]"), 0);
    assert_eq!(count(&doc, "//book[position() > 1][1]"), 1);
    assert_eq!(text_of(&doc, "string(//book[position() > 1][1]/@id)"), "b2");
    assert_eq!(text_of(&doc, "string((//title)[last() - 1])"), "Gamma");
}

#[rstest]
fn filter_expressions_over_atomics() {
    assert_eq!(as_integers(&eval("(1 to 10)[. mod 2 = 0]")), vec![2, 4, 6, 8, 10]);
    assert_eq!(as_integers(&eval("(1 to 10)[3]")), vec![3]);
    assert_eq!(as_integers(&eval("(1 to 5)[last()]")), vec![5]);
    assert_eq!(as_integers(&eval("(5, 6, 7)[position() < 3]")), vec![5, 6]);
    assert!(eval("(1, 2)[5]").is_empty());
}

#[rstest]
fn paths_may_end_in_atomic_values(doc: SimpleNode) {
    assert_eq!(text_of(&doc, "//book/string(@id)"), "b1 b2 b3");
    assert_eq!(text_of(&doc, "//book/@year/xs:integer(.)"), "1999 2005 2012");
}

#[rstest]
fn path_errors(doc: SimpleNode) {
    let ctx = doc_ctx(&doc);
    assert_eq!(err_code_in("//book/(1, @id)", &ctx), ErrorCode::XPTY0018);
    assert_eq!(err_code_in("(1, 2)/x", &ctx), ErrorCode::XPTY0019);
    assert_eq!(err_code("/"), ErrorCode::XPDY0002);
    assert_eq!(err_code("child::x"), ErrorCode::XPDY0002);
    assert_eq!(err_code("."), ErrorCode::XPDY0002);
}

#[rstest]
fn atomic_context_item_is_not_a_node() {
    let ctx = DynamicContextBuilder::<SimpleNode>::new()
        .with_context_item(XdmAtomicValue::Integer(1))
        .build();
    assert_eq!(err_code_in("x", &ctx), ErrorCode::XPTY0020);
    assert_eq!(as_integers(&eval_in(". + 1", &ctx)), vec![2]);
}

#[rstest]
fn root_must_be_a_document() {
    let detached = elem("a").child(elem("b")).build();
    let ctx = DynamicContextBuilder::<SimpleNode>::new()
        .with_context_item(XdmItem::Node(detached.children()[0].clone()))
        .build();
    assert_eq!(err_code_in("/", &ctx), ErrorCode::XPDY0050);
    assert_eq!(as_integers(&eval_in("count(..)", &ctx)), vec![1]);
}

#[rstest]
fn relative_paths_use_the_context_node(doc: SimpleNode) {
    let library = doc.children()[0].clone();
    let ctx = DynamicContextBuilder::<SimpleNode>::new()
        .with_context_item(XdmItem::Node(library))
        .build();
    assert_eq!(as_integers(&eval_in("count(book)", &ctx)), vec![3]);
    assert_eq!(as_string(&eval_in("string(@id)", &ctx)), "lib");
    assert_eq!(as_integers(&eval_in("count(/library)", &ctx)), vec![1]);
}

#[rstest]
fn namespaced_name_tests() {
    let doc = simple_doc()
        .child(
            elem("root")
                .child(elem("p:item").namespace(ns("p", "urn:p")).child(text("one")))
                .child(elem("q:item").namespace(ns("q", "urn:q")).child(text("two")))
                .child(elem("item").child(text("three"))),
        )
        .build();
    let sc = StaticContextBuilder::new().with_namespace("x", "urn:p").build();
    let ctx = doc_ctx(&doc);
    let eval_ns = |expr: &str| {
        compile_xpath(expr, &sc)
            .and_then(|exe| exe.evaluate(&ctx))
            .unwrap_or_else(|e| panic!("'{expr}' failed: {e}"))
    };
    assert_eq!(as_string(&eval_ns("string(//x:item)")), "one");
    assert_eq!(as_integers(&eval_ns("count(//item)")), vec![1]);
    assert_eq!(as_integers(&eval_ns("count(//*:item)")), vec![3]);
    assert_eq!(as_integers(&eval_ns("count(//x:*)")), vec![1]);
    assert_eq!(as_string(&eval_ns("namespace-uri(//*:item[2])")), "urn:q");
}

#[rstest]
fn default_element_namespace_applies_to_unprefixed_names() {
    let doc = simple_doc()
        .child(elem("p:item").namespace(ns("p", "urn:p")).child(text("x")))
        .build();
    let sc = StaticContextBuilder::new().with_default_element_namespace("urn:p").build();
    let items = compile_xpath("string(/item)", &sc).unwrap().evaluate(&doc_ctx(&doc)).unwrap();
    assert_eq!(as_string(&items), "x");
}

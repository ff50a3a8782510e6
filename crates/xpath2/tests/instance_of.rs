use rstest::rstest;
use xpath2::ErrorCode;

mod common;
use common::*;

#[rstest]
#[case::two_vs_one("(1, 2) instance of xs:integer", false)]
#[case::two_vs_optional("(1, 2) instance of xs:integer?", false)]
#[case::two_vs_plus("(1, 2) instance of xs:integer+", true)]
#[case::two_vs_star("(1, 2) instance of xs:integer*", true)]
#[case::empty_vs_one("() instance of xs:integer", false)]
#[case::empty_vs_optional("() instance of xs:integer?", true)]
#[case::empty_vs_plus("() instance of xs:integer+", false)]
#[case::empty_sequence("() instance of empty-sequence()", true)]
#[case::not_empty("1 instance of empty-sequence()", false)]
fn occurrence_indicators(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
#[case::integer_is_decimal("1 instance of xs:decimal", true)]
#[case::decimal_not_integer("1.5 instance of xs:integer", false)]
#[case::double("1e0 instance of xs:double", true)]
#[case::string("'a' instance of xs:string", true)]
#[case::any_atomic("'a' instance of xs:anyAtomicType", true)]
#[case::item("'a' instance of item()", true)]
#[case::mixed_sequence("(1, 'a') instance of xs:integer+", false)]
#[case::division_result("(4 div 2) instance of xs:decimal", true)]
#[case::short_is_int("xs:short(3) instance of xs:int", true)]
#[case::integer_not_int("3 instance of xs:int", false)]
#[case::untyped("xs:untypedAtomic('x') instance of xs:string", false)]
#[case::ym_duration("xs:yearMonthDuration('P1Y') instance of xs:duration", true)]
#[case::atomic_not_node("1 instance of node()", false)]
fn atomic_types(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
#[case::element("//book[1] instance of element()", true)]
#[case::named_element("//book[1] instance of element(book)", true)]
#[case::wrong_name("//book[1] instance of element(magazine)", false)]
#[case::any_name("//book[1] instance of element(*)", true)]
#[case::attribute("//book[1]/@id instance of attribute(id)", true)]
#[case::attribute_not_element("//book[1]/@id instance of element()", false)]
#[case::nodes("//book instance of element()+", true)]
#[case::document("(/) instance of document-node()", true)]
#[case::document_element("(/) instance of document-node(element(library))", true)]
#[case::document_wrong_element("(/) instance of document-node(element(book))", false)]
#[case::comment("//comment() instance of comment()", true)]
#[case::pi("//processing-instruction() instance of processing-instruction(target)", true)]
#[case::text("//title/text() instance of text()+", true)]
#[case::node_not_atomic("//book[1] instance of xs:anyAtomicType", false)]
fn node_types(#[case] expr: &str, #[case] expected: bool) {
    let doc = library();
    assert_eq!(as_bool(&eval_in(expr, &doc_ctx(&doc))), expected, "{expr}");
}

#[rstest]
fn treat_as_passes_matching_values_through() {
    assert_eq!(as_integers(&eval("(1, 2) treat as xs:integer+")), vec![1, 2]);
    assert_eq!(as_integers(&eval("5 treat as xs:decimal")), vec![5]);
    assert!(eval("() treat as xs:string?").is_empty());
}

#[rstest]
#[case::wrong_type("'a' treat as xs:integer")]
#[case::too_many("(1, 2) treat as xs:integer")]
#[case::empty("() treat as xs:integer")]
#[case::atomic_as_node("1 treat as node()")]
fn treat_as_failures(#[case] expr: &str) {
    assert_eq!(err_code(expr), ErrorCode::XPDY0050, "{expr}");
}

#[rstest]
fn treat_as_on_nodes() {
    let doc = library();
    let ctx = doc_ctx(&doc);
    assert_eq!(as_integers(&eval_in("count(//book treat as element(book)+)", &ctx)), vec![3]);
    assert_eq!(err_code_in("//book treat as element(magazine)+", &ctx), ErrorCode::XPDY0050);
}

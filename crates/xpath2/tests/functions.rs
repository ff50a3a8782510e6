use rstest::rstest;
use xpath2::consts::{CODEPOINT_URI, SIMPLE_ACCENT_URI, SIMPLE_CASE_URI};
use xpath2::{
    DynamicContextBuilder, ErrorCode, SimpleNode, XdmAtomicValue, XdmItem, elem, ns, simple_doc, text,
};

mod common;
use common::*;

#[rstest]
#[case::concat("concat('a', (), 1, 'b')", "a1b")]
#[case::string_join("string-join(('a', 'b', 'c'), '-')", "a-b-c")]
#[case::string_join_empty("string-join((), '-')", "")]
#[case::substring_tail("substring('motor car', 6)", " car")]
#[case::substring_middle("substring('metadata', 4, 3)", "ada")]
#[case::substring_rounds("substring('12345', 1.5, 2.6)", "234")]
#[case::substring_before_start("substring('12345', 0, 3)", "12")]
#[case::substring_nan("substring('12345', 0 div 0e0, 3)", "")]
#[case::substring_infinite("substring('12345', -42, 1 div 0e0)", "12345")]
#[case::substring_empty("substring((), 1)", "")]
#[case::upper("upper-case('abCd')", "ABCD")]
#[case::lower("lower-case('ABc')", "abc")]
#[case::before("substring-before('tattoo', 'attoo')", "t")]
#[case::before_missing("substring-before('abc', 'x')", "")]
#[case::after("substring-after('tattoo', 'tat')", "too")]
#[case::after_empty_needle("substring-after('abc', '')", "abc")]
#[case::normalize_space("normalize-space('  a \t b  ')", "a b")]
#[case::translate("translate('bar', 'abc', 'ABC')", "BAr")]
#[case::translate_removes("translate('--aaa--', 'abc-', 'ABC')", "AAA")]
#[case::codepoints("codepoints-to-string((72, 105))", "Hi")]
#[case::encode_for_uri("encode-for-uri('a b/c~d')", "a%20b%2Fc~d")]
#[case::resolve_uri("resolve-uri('b/c', 'http://x.org/a/')", "http://x.org/a/b/c")]
#[case::resolve_absolute("resolve-uri('http://y.org/z', 'http://x.org/a/')", "http://y.org/z")]
fn string_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn string_lengths_count_characters() {
    assert_eq!(as_integers(&eval("string-length('héllo')")), vec![5]);
    assert_eq!(as_integers(&eval("string-length(())")), vec![0]);
    assert_eq!(as_integers(&eval("string-to-codepoints('Hi')")), vec![72, 105]);
    assert!(eval("string-to-codepoints('')").is_empty());
}

#[rstest]
fn normalize_unicode_forms() {
    assert_eq!(
        as_integers(&eval("string-length(normalize-unicode(codepoints-to-string((101, 769))))")),
        vec![1]
    );
    assert_eq!(
        as_integers(&eval("string-length(normalize-unicode(codepoints-to-string(233), 'NFD'))")),
        vec![2]
    );
    assert_eq!(err_code("normalize-unicode('a', 'XYZ')"), ErrorCode::FOCH0003);
}

#[rstest]
#[case::contains("contains('tattoo', 't')", true)]
#[case::contains_empty("contains('abc', ())", true)]
#[case::contains_missing("contains('abc', 'd')", false)]
#[case::starts_with("starts-with('tattoo', 'tat')", true)]
#[case::ends_with("ends-with('tattoo', 'too')", true)]
#[case::codepoint_is_case_sensitive("starts-with('Hello', 'HE')", false)]
fn substring_matching(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn collations_change_string_matching() {
    assert!(as_bool(&eval(&format!("starts-with('Hello', 'HE', '{SIMPLE_CASE_URI}')"))));
    assert!(as_bool(&eval(&format!("contains('CAFÉ', 'fé', '{SIMPLE_CASE_URI}')"))));
    assert!(as_bool(&eval(&format!("ends-with('café', 'e', '{SIMPLE_ACCENT_URI}')"))));
    assert_eq!(as_integers(&eval(&format!("compare('abc', 'ABC', '{SIMPLE_CASE_URI}')"))), vec![0]);
    assert_eq!(as_integers(&eval(&format!("compare('a', 'b', '{CODEPOINT_URI}')"))), vec![-1]);
    assert_eq!(
        as_string(&eval(&format!("substring-after('Hello World', 'o w', '{SIMPLE_CASE_URI}')"))),
        "orld"
    );
    assert_eq!(err_code("compare('a', 'b', 'urn:nope')"), ErrorCode::FOCH0002);
}

#[rstest]
fn compare_orders_and_handles_empty() {
    assert_eq!(as_integers(&eval("compare('b', 'a')")), vec![1]);
    assert_eq!(as_integers(&eval("compare('a', 'a')")), vec![0]);
    assert!(eval("compare((), 'a')").is_empty());
}

#[rstest]
fn string_function_errors() {
    assert_eq!(err_code("codepoints-to-string(0)"), ErrorCode::FOCH0001);
    assert_eq!(err_code("codepoints-to-string('a')"), ErrorCode::XPTY0004);
    assert_eq!(err_code("resolve-uri('x')"), ErrorCode::FONS0005);
}

#[rstest]
#[case::anchored("matches('abracadabra', '^a.*a$')", true)]
#[case::unanchored("matches('abracadabra', 'cad')", true)]
#[case::no_match("matches('abc', '^b')", false)]
#[case::case_flag("matches('Hello', 'hello', 'i')", true)]
#[case::back_reference("matches('abab', '^(ab)\\1$')", true)]
fn regex_matching(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
#[case::literal("replace('abracadabra', 'bra', '*')", "a*cada*")]
#[case::group("replace('abc', '(b)', '[$1]')", "a[b]c")]
#[case::whole_match("replace('abc', 'b', '$0$0')", "abbc")]
#[case::escaped_dollar("replace('abc', 'b', '\\$')", "a$c")]
#[case::case_insensitive("replace('aAa', 'a', 'x', 'i')", "xxx")]
fn regex_replace(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn regex_tokenize() {
    assert_eq!(as_string(&eval("string-join(tokenize('a, b,  c', ',\\s*'), '|')")), "a|b|c");
    assert!(eval("tokenize('', ',')").is_empty());
    assert_eq!(as_integers(&eval("count(tokenize('a,,b', ','))")), vec![3]);
}

#[rstest]
#[case::bad_flag("matches('a', 'a', 'q')", ErrorCode::FORX0001)]
#[case::bad_pattern("matches('a', '(')", ErrorCode::FORX0002)]
#[case::zero_length_replace("replace('abc', 'x*', '-')", ErrorCode::FORX0003)]
#[case::zero_length_tokenize("tokenize('abc', 'x?')", ErrorCode::FORX0003)]
#[case::dangling_dollar("replace('abc', 'b', '$')", ErrorCode::FORX0004)]
fn regex_errors(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(err_code(expr), code, "{expr}");
}

#[rstest]
#[case::distinct("distinct-values((1, 2, 1.0, 'a', 'a', 2e0))", "1 2 a")]
#[case::insert_middle("insert-before((1, 2, 3), 2, 9)", "1 9 2 3")]
#[case::insert_front("insert-before((1, 2), 0, 9)", "9 1 2")]
#[case::insert_end("insert-before((1, 2), 10, 9)", "1 2 9")]
#[case::remove("remove((1, 2, 3), 2)", "1 3")]
#[case::remove_out_of_range("remove((1, 2), 5)", "1 2")]
#[case::reverse("reverse((1, 2, 3))", "3 2 1")]
#[case::subsequence("subsequence((1, 2, 3, 4, 5), 2, 3)", "2 3 4")]
#[case::subsequence_tail("subsequence((1, 2, 3), 2)", "2 3")]
#[case::subsequence_from_zero("subsequence((1, 2, 3), 0)", "1 2 3")]
#[case::unordered("unordered((3, 1))", "3 1")]
#[case::zero_or_one("zero-or-one(5)", "5")]
#[case::one_or_more("one-or-more((1, 2))", "1 2")]
#[case::exactly_one("exactly-one('x')", "x")]
fn sequence_functions(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn index_of_and_distinct_values_edge_cases() {
    assert_eq!(as_integers(&eval("index-of((10, 20, 10), 10)")), vec![1, 3]);
    assert!(eval("index-of(('a', 'b'), 1)").is_empty());
    assert!(eval("index-of((0e0 div 0), 0e0 div 0)").is_empty());
    assert_eq!(as_integers(&eval("count(distinct-values((0e0 div 0, 0e0 div 0)))")), vec![1]);
    assert_eq!(
        as_integers(&eval(&format!("count(distinct-values(('a', 'A'), '{SIMPLE_CASE_URI}'))"))),
        vec![1]
    );
}

#[rstest]
#[case::zero_or_one("zero-or-one((1, 2))", ErrorCode::FORG0003)]
#[case::one_or_more("one-or-more(())", ErrorCode::FORG0004)]
#[case::exactly_one_many("exactly-one((1, 2))", ErrorCode::FORG0005)]
#[case::exactly_one_none("exactly-one(())", ErrorCode::FORG0005)]
fn cardinality_functions(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(err_code(expr), code, "{expr}");
}

#[rstest]
fn empty_and_exists() {
    assert!(as_bool(&eval("empty(())")));
    assert!(!as_bool(&eval("empty((1))")));
    assert!(as_bool(&eval("exists(0)")));
}

#[rstest]
fn deep_equal_compares_structure() {
    assert!(as_bool(&eval("deep-equal((1, 'a'), (1.0, 'a'))")));
    assert!(!as_bool(&eval("deep-equal((1, 2), (2, 1))")));
    assert!(!as_bool(&eval("deep-equal(1, '1')")));
    assert!(as_bool(&eval("deep-equal(0e0 div 0, 0e0 div 0)")));
    let doc = library();
    let ctx = doc_ctx(&doc);
    assert!(as_bool(&eval_in("deep-equal(//book[1], //book[1])", &ctx)));
    assert!(!as_bool(&eval_in("deep-equal(//book[1], //book[2])", &ctx)));
    assert!(as_bool(&eval_in("deep-equal(//title[. = 'Alpha'], //book[1]/title)", &ctx)));
}

#[rstest]
#[case::min_numbers("min((3, 1, 2))", "1")]
#[case::max_mixed("max((1, 2.5, 3))", "3")]
#[case::max_strings("max(('b', 'c', 'a'))", "c")]
#[case::min_strings("min(('b', 'a'))", "a")]
#[case::max_nan("max((1, 0e0 div 0))", "NaN")]
#[case::min_dates("min((xs:date('2024-01-02'), xs:date('2023-12-31')))", "2023-12-31")]
fn min_and_max(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn min_and_max_edge_cases() {
    assert!(eval("max(())").is_empty());
    assert_eq!(err_code("max((1, 'a'))"), ErrorCode::FORG0006);
    assert_eq!(as_string(&eval("sum((), 'none')")), "none");
    let doc = library();
    assert_eq!(as_string(&eval_in("max(//price)", &doc_ctx(&doc))), "25.5");
}

#[rstest]
fn accessors_and_conversions() {
    assert_eq!(single(&eval("number('12')")), XdmAtomicValue::Double(12.0));
    assert_eq!(as_string(&eval("number('x')")), "NaN");
    assert_eq!(as_string(&eval("string(12.50)")), "12.5");
    assert_eq!(as_string(&eval("string(())")), "");
    assert!(!as_bool(&eval("boolean(())")));
    assert!(as_bool(&eval("not(())")));
    assert!(as_bool(&eval("boolean('false')")));

    let doc = library();
    let ctx = doc_ctx(&doc);
    assert_eq!(
        single(&eval_in("data(//book[1]/@year)", &ctx)),
        XdmAtomicValue::UntypedAtomic("1999".into())
    );
    assert_eq!(as_string(&eval_in("//book[1]/title/string()", &ctx)), "Alpha");
    assert_eq!(as_integers(&eval_in("count(//title[string-length() = 4])", &ctx)), vec![1]);
    assert_eq!(as_string(&eval_in("//book[2]/price/number()", &ctx)), "25.5");
    assert_eq!(as_string(&eval_in("normalize-space(//magazine)", &ctx)), "Delta");
}

#[rstest]
fn node_names() {
    let doc = library();
    let ctx = doc_ctx(&doc);
    assert_eq!(as_string(&eval_in("name(//book[1])", &ctx)), "book");
    assert_eq!(as_string(&eval_in("name(//book[1]/@year)", &ctx)), "year");
    assert_eq!(as_string(&eval_in("name(/)", &ctx)), "");
    assert_eq!(as_string(&eval_in("local-name(//comment())", &ctx)), "");
    assert_eq!(as_string(&eval_in("namespace-uri(//book[1])", &ctx)), "");
    assert!(eval_in("node-name(//comment())", &ctx).is_empty());
    assert_eq!(as_string(&eval_in("//magazine/name()", &ctx)), "magazine");
    assert!(as_bool(&eval_in("root((//title)[1]) is (/)", &ctx)));
    assert!(eval_in("root(())", &ctx).is_empty());
}

#[rstest]
fn prefixed_node_names() {
    let doc = simple_doc()
        .child(elem("p:item").namespace(ns("p", "urn:p")).child(text("x")))
        .build();
    let ctx = doc_ctx(&doc);
    assert_eq!(as_string(&eval_in("name(/*)", &ctx)), "p:item");
    assert_eq!(as_string(&eval_in("local-name(/*)", &ctx)), "item");
    assert_eq!(as_string(&eval_in("namespace-uri(/*)", &ctx)), "urn:p");
    assert_eq!(as_string(&eval_in("local-name-from-QName(node-name(/*))", &ctx)), "item");
    assert_eq!(as_string(&eval_in("namespace-uri-from-QName(node-name(/*))", &ctx)), "urn:p");
}

#[rstest]
fn qname_constructor() {
    assert_eq!(as_string(&eval("local-name-from-QName(QName('urn:x', 'p:a'))")), "a");
    assert_eq!(as_string(&eval("namespace-uri-from-QName(QName('urn:x', 'p:a'))")), "urn:x");
    assert_eq!(as_string(&eval("namespace-uri-from-QName(QName('', 'a'))")), "");
    assert!(as_bool(&eval("QName('urn:x', 'p:a') eq QName('urn:x', 'q:a')")));
    assert!(eval("local-name-from-QName(())").is_empty());
    assert_eq!(err_code("QName('', 'p:a')"), ErrorCode::FOCA0002);
    assert_eq!(err_code("QName('urn:x', '1a')"), ErrorCode::FOCA0002);
    assert_eq!(err_code("local-name-from-QName('a')"), ErrorCode::XPTY0004);
}

#[rstest]
fn focus_functions() {
    assert_eq!(as_integers(&eval("(5, 6, 7)[position() = last()]")), vec![7]);
    assert_eq!(as_integers(&eval("(5, 6, 7)[position() = 2]")), vec![6]);
    assert_eq!(as_integers(&eval("for $x in (1, 2) return (7, 8)[last()]")), vec![8, 8]);
    assert_eq!(err_code("position()"), ErrorCode::XPDY0002);
    assert_eq!(err_code("last()"), ErrorCode::XPDY0002);
}

#[rstest]
fn current_date_and_time_come_from_the_context() {
    let now = chrono::DateTime::parse_from_rfc3339("2024-05-06T07:08:09+02:00").unwrap();
    let ctx = DynamicContextBuilder::<SimpleNode>::new().with_now(now).build();
    assert_eq!(as_string(&eval_in("current-date()", &ctx)), "2024-05-06+02:00");
    assert_eq!(as_string(&eval_in("current-time()", &ctx)), "07:08:09+02:00");
    assert_eq!(as_string(&eval_in("current-dateTime()", &ctx)), "2024-05-06T07:08:09+02:00");
    assert_eq!(as_string(&eval_in("implicit-timezone()", &ctx)), "PT2H");
    assert!(as_bool(&eval_in("current-dateTime() eq current-dateTime()", &ctx)));
}

#[rstest]
fn implicit_timezone_override() {
    let ctx = DynamicContextBuilder::<SimpleNode>::new().with_timezone(-300).build();
    assert_eq!(as_string(&eval_in("implicit-timezone()", &ctx)), "-PT5H");
    assert!(as_bool(&eval_in(
        "xs:dateTime('2024-01-01T12:00:00') eq xs:dateTime('2024-01-01T17:00:00Z')",
        &ctx
    )));
}

#[rstest]
fn static_context_functions() {
    assert_eq!(as_string(&eval("default-collation()")), CODEPOINT_URI);
    assert!(eval("static-base-uri()").is_empty());
    let ctx = DynamicContextBuilder::<SimpleNode>::new()
        .with_default_collation(SIMPLE_CASE_URI)
        .build();
    assert_eq!(as_string(&eval_in("default-collation()", &ctx)), SIMPLE_CASE_URI);
    assert!(as_bool(&eval_in("'abc' eq 'ABC'", &ctx)));
}

#[rstest]
fn default_collection() {
    let items: Vec<Item> = vec![
        XdmItem::Atomic(XdmAtomicValue::Integer(1)),
        XdmItem::Atomic(XdmAtomicValue::Integer(2)),
    ];
    let ctx = DynamicContextBuilder::<SimpleNode>::new().with_default_collection(items).build();
    assert_eq!(as_integers(&eval_in("collection()", &ctx)), vec![1, 2]);
    assert_eq!(err_code_in("collection('urn:other')", &ctx), ErrorCode::FODC0002);
    assert_eq!(err_code("collection()"), ErrorCode::FODC0002);
}

#[rstest]
fn error_function_raises_the_given_code() {
    assert_eq!(err_code("error()"), ErrorCode::FOER0000);
    assert_eq!(
        err_code("error(QName('http://www.w3.org/2005/xqt-errors', 'FORG0001'), 'bad')"),
        ErrorCode::FORG0001
    );
    let err = try_eval("error(QName('urn:app', 'E1'), 'custom failure', ('a', 1))").unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::Unknown);
    assert_eq!(err.format_code(), "Q{urn:app}E1");
    let shown = err.to_string();
    assert!(shown.contains("custom failure"), "{shown}");
    assert!(shown.contains("[a, 1]"), "{shown}");
    assert_eq!(err_code("error('E1')"), ErrorCode::XPTY0004);
}

#[rstest]
fn trace_returns_its_input() {
    assert_eq!(as_integers(&eval("trace((1, 2), 'values')")), vec![1, 2]);
    assert!(eval("trace((), 'nothing')").is_empty());
}

#[rstest]
#[case::unknown_function("frobnicate(1)", ErrorCode::XPST0017)]
#[case::wrong_arity("substring('a')", ErrorCode::XPST0017)]
#[case::too_many("true(1)", ErrorCode::XPST0017)]
fn static_function_resolution(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(err_code(expr), code, "{expr}");
}

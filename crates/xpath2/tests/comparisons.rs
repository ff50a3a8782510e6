use rstest::rstest;
use xpath2::ErrorCode;

mod common;
use common::*;

#[rstest]
#[case::existential_eq("(1, 2) = (2, 3)", true)]
#[case::existential_ne("(1, 2) != (1, 2)", true)]
#[case::no_pair("(1, 2) = (3, 4)", false)]
#[case::empty_side("() = 1", false)]
#[case::empty_ne("() != ()", false)]
#[case::mixed_numeric("1 = 1.0", true)]
#[case::double_vs_integer("2.5e0 > 2", true)]
#[case::string_order("'abc' < 'abd'", true)]
#[case::incomparable_pair_skipped("(1, 'a') = 'a'", true)]
#[case::incomparable_only("1 = 'a'", false)]
fn general_comparisons(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
#[case::eq("1 eq 1", true)]
#[case::ne("1 ne 2", true)]
#[case::lt("1 lt 2", true)]
#[case::le("2 le 2", true)]
#[case::gt("'b' gt 'a'", true)]
#[case::ge("1.5 ge 2", false)]
#[case::decimal_vs_double("0.5 eq 5e-1", true)]
#[case::boolean_order("false() lt true()", true)]
#[case::boolean_vs_number("true() eq 1", true)]
fn value_comparisons(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn value_comparison_on_empty_is_empty() {
    assert!(eval("() eq 1").is_empty());
    assert!(eval("1 lt ()").is_empty());
}

#[rstest]
#[case::sequence_left("(1, 2) eq 1")]
#[case::sequence_right("1 eq (1, 2)")]
#[case::number_vs_string("1 eq \"1\"")]
#[case::untyped_vs_number("xs:untypedAtomic('10') eq 10")]
#[case::date_vs_string("xs:date('2024-01-01') eq '2024-01-01'")]
#[case::qname_order("xs:QName('xs:a') lt xs:QName('xs:b')")]
fn value_comparison_type_errors(#[case] expr: &str) {
    assert_eq!(err_code(expr), ErrorCode::XPTY0004, "{expr}");
}

#[rstest]
#[case::general_untyped_number("xs:untypedAtomic('10') = 10", true)]
#[case::general_untyped_string("xs:untypedAtomic('10') = '10'", true)]
#[case::general_untyped_untyped("xs:untypedAtomic('10') = xs:untypedAtomic('10.0')", false)]
#[case::value_untyped_string("xs:untypedAtomic('10') eq '10'", true)]
#[case::general_untyped_date("xs:untypedAtomic('2024-05-01') = xs:date('2024-05-01')", true)]
fn untyped_operands_adopt_the_other_type(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn untyped_that_does_not_parse_as_number_fails() {
    assert_eq!(err_code("xs:untypedAtomic('ten') = 10"), ErrorCode::FORG0001);
}

#[rstest]
fn attributes_compare_as_untyped() {
    let doc = library();
    let ctx = doc_ctx(&doc);
    assert_eq!(as_string(&eval_in("string(//book[@id = 'b2']/title)", &ctx)), "Beta");
    assert_eq!(as_integers(&eval_in("count(//book[@year > 2000])", &ctx)), vec![2]);
    assert!(as_bool(&eval_in("//price = 7", &ctx)));
    assert!(as_bool(&eval_in("//book[1]/@year eq '1999'", &ctx)));
}

#[rstest]
#[case::nan_eq("number('x') = number('x')", false)]
#[case::nan_ne("0e0 div 0 ne 0e0 div 0", true)]
#[case::nan_lt("0e0 div 0 lt 1", false)]
fn nan_is_unordered(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
#[case::same_instant(
    "xs:dateTime('2024-01-01T12:00:00Z') eq xs:dateTime('2024-01-01T14:00:00+02:00')",
    true
)]
#[case::date_order("xs:date('2024-01-01') lt xs:date('2024-01-02')", true)]
#[case::time_order("xs:time('23:00:00') gt xs:time('01:00:00')", true)]
#[case::ym_equal("xs:yearMonthDuration('P12M') eq xs:yearMonthDuration('P1Y')", true)]
#[case::duration_families("xs:duration('P1Y') eq xs:yearMonthDuration('P12M')", true)]
#[case::dt_order("xs:dayTimeDuration('PT90M') gt xs:dayTimeDuration('PT1H')", true)]
#[case::g_year("xs:gYear('2024') eq xs:gYear('2024')", true)]
fn temporal_comparisons(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
fn node_comparisons() {
    let doc = library();
    let ctx = doc_ctx(&doc);
    assert!(as_bool(&eval_in("//book[1] << //book[2]", &ctx)));
    assert!(as_bool(&eval_in("//book[3] >> //book[1]", &ctx)));
    assert!(as_bool(&eval_in("//book[1] is (//book)[1]", &ctx)));
    assert!(!as_bool(&eval_in("//book[1] is //book[2]", &ctx)));
    assert!(eval_in("() is //book[1]", &ctx).is_empty());
    assert_eq!(err_code_in("//book is //book[1]", &ctx), ErrorCode::XPTY0004);
}

#[rstest]
fn logical_operators_use_effective_boolean_value() {
    assert!(as_bool(&eval("1 and 'x'")));
    assert!(!as_bool(&eval("0 or ''")));
    assert!(as_bool(&eval("() or (1, 2) = 2")));
    assert!(!as_bool(&eval("not(true()) and error()")));
    assert!(as_bool(&eval("true() or error()")));
}

#[rstest]
fn quantified_expressions() {
    assert!(as_bool(&eval("some $x in (1, 2, 3) satisfies $x > 2")));
    assert!(!as_bool(&eval("every $x in (1, 2, 3) satisfies $x > 2")));
    assert!(as_bool(&eval("every $x in () satisfies $x > 2")));
    assert!(as_bool(&eval("some $x in (1, 2), $y in (2, 3) satisfies $x = $y")));
}

#[rstest]
fn conditional_expression() {
    assert_eq!(as_string(&eval("if (1 > 2) then 'a' else 'b'")), "b");
    assert_eq!(as_string(&eval("if (()) then 'a' else 'b'")), "b");
    assert_eq!(as_string(&eval("if ('x') then 'a' else error()")), "a");
}

#[rstest]
fn effective_boolean_value_errors() {
    assert_eq!(err_code("if ((1, 2)) then 1 else 0"), ErrorCode::FORG0006);
    assert_eq!(err_code("boolean(xs:date('2024-01-01'))"), ErrorCode::FORG0006);
}

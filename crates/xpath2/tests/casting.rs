use rstest::rstest;
use xpath2::{ErrorCode, StaticContextBuilder, XdmAtomicValue, compile_xpath};

mod common;
use common::*;

#[rstest]
fn empty_cast_follows_the_occurrence_indicator() {
    assert!(eval("() cast as xs:integer?").is_empty());
    assert_eq!(err_code("() cast as xs:integer"), ErrorCode::XPTY0004);
    assert_eq!(err_code("(1, 2) cast as xs:integer?"), ErrorCode::XPTY0004);
}

#[rstest]
#[case::trimmed_integer("' 42 ' cast as xs:integer", "42")]
#[case::truncates("3.7 cast as xs:integer", "3")]
#[case::truncates_negative("-3.7 cast as xs:integer", "-3")]
#[case::boolean_to_integer("true() cast as xs:integer", "1")]
#[case::string_to_boolean("'1' cast as xs:boolean", "true")]
#[case::number_to_boolean("0 cast as xs:boolean", "false")]
#[case::double_string("1.5e0 cast as xs:string", "1.5")]
#[case::double_exponent("1e7 cast as xs:string", "1.0E7")]
#[case::decimal_string("12.50 cast as xs:string", "12.5")]
#[case::float_constructor("xs:float('1.5')", "1.5")]
#[case::untyped_constructor("xs:untypedAtomic(5)", "5")]
#[case::any_uri_collapses("xs:anyURI(' http://x ')", "http://x")]
#[case::token_collapses("'  a   b ' cast as xs:token", "a b")]
#[case::date_time_to_date("xs:dateTime('2024-05-06T07:08:09Z') cast as xs:date", "2024-05-06Z")]
#[case::date_to_date_time("xs:date('2024-05-06') cast as xs:dateTime", "2024-05-06T00:00:00")]
#[case::date_to_g_year_month("xs:date('2024-05-06') cast as xs:gYearMonth", "2024-05")]
#[case::hex_upper("xs:hexBinary('0fA1')", "0FA1")]
#[case::hex_to_base64("xs:hexBinary('0FA1') cast as xs:base64Binary", "D6E=")]
#[case::duration_to_ym("xs:duration('P1Y2M3DT4H') cast as xs:yearMonthDuration", "P1Y2M")]
#[case::duration_to_dt("xs:duration('P1Y2M3DT4H') cast as xs:dayTimeDuration", "P3DT4H")]
#[case::lexical_qname("'xs:string' cast as xs:QName", "xs:string")]
fn successful_casts(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(as_string(&eval(expr)), expected, "{expr}");
}

#[rstest]
#[case::not_a_number("'abc' cast as xs:integer", ErrorCode::FORG0001)]
#[case::decimal_string_to_integer("'1.5' cast as xs:integer", ErrorCode::FORG0001)]
#[case::exponent_to_decimal("xs:decimal('1e3')", ErrorCode::FORG0001)]
#[case::bad_boolean("'yes' cast as xs:boolean", ErrorCode::FORG0001)]
#[case::byte_range("300 cast as xs:byte", ErrorCode::FORG0001)]
#[case::positive_integer("0 cast as xs:positiveInteger", ErrorCode::FORG0001)]
#[case::huge_integer("xs:integer('99999999999999999999999')", ErrorCode::FOCA0003)]
#[case::infinity_to_integer("xs:double('INF') cast as xs:integer", ErrorCode::FOCA0002)]
#[case::nan_to_decimal("xs:double('NaN') cast as xs:decimal", ErrorCode::FOCA0002)]
#[case::bad_date("xs:date('2024-02-30')", ErrorCode::FORG0001)]
#[case::date_to_time("xs:date('2024-05-06') cast as xs:time", ErrorCode::XPTY0004)]
#[case::g_year_to_date("xs:gYear('2024') cast as xs:date", ErrorCode::XPTY0004)]
#[case::boolean_to_date("true() cast as xs:date", ErrorCode::XPTY0004)]
#[case::computed_qname("concat('xs:', 'a') cast as xs:QName", ErrorCode::XPTY0004)]
#[case::unbound_qname_prefix("'zz:a' cast as xs:QName", ErrorCode::FONS0004)]
#[case::bad_ncname("'1x' cast as xs:NCName", ErrorCode::FORG0001)]
fn failing_casts(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(err_code(expr), code, "{expr}");
}

#[rstest]
#[case::valid("'12' castable as xs:integer", true)]
#[case::invalid("'x' castable as xs:integer", false)]
#[case::empty_required("() castable as xs:integer", false)]
#[case::empty_optional("() castable as xs:integer?", true)]
#[case::two_items("(1, 2) castable as xs:integer", false)]
#[case::language("'en-US' castable as xs:language", true)]
#[case::ncname("'1x' castable as xs:NCName", false)]
#[case::date("'2024-13-01' castable as xs:date", false)]
fn castable(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(as_bool(&eval(expr)), expected, "{expr}");
}

#[rstest]
#[case::division("(1 div 0) castable as xs:integer", ErrorCode::FOAR0001)]
#[case::inner_constructor("xs:integer('x') castable as xs:integer", ErrorCode::FORG0001)]
#[case::missing_focus(". castable as xs:integer", ErrorCode::XPDY0002)]
#[case::function_argument("exactly-one(()) castable as xs:string", ErrorCode::FORG0005)]
fn castable_does_not_hide_operand_errors(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(err_code(expr), code, "{expr}");
}

#[rstest]
fn nodes_are_atomized_before_casting() {
    let doc = library();
    let ctx = doc_ctx(&doc);
    assert_eq!(as_integers(&eval_in("//book[1]/@year cast as xs:integer", &ctx)), vec![1999]);
    assert_eq!(as_integers(&eval_in("xs:integer(//book[3]/@year) + 1", &ctx)), vec![2013]);
    assert_eq!(
        single(&eval_in("xs:decimal(//book[2]/price)", &ctx)),
        XdmAtomicValue::Decimal("25.5".parse().unwrap())
    );
}

#[rstest]
fn midnight_rolls_over_by_default() {
    assert_eq!(as_string(&eval("xs:dateTime('2024-01-31T24:00:00')")), "2024-02-01T00:00:00");
    assert_eq!(as_string(&eval("xs:time('24:00:00')")), "00:00:00");
}

#[rstest]
fn midnight_stays_on_the_same_day_when_configured() {
    let sc = StaticContextBuilder::new().with_end_of_day_midnight(true).build();
    let eval_with = |expr: &str| {
        compile_xpath(expr, &sc)
            .and_then(|exe| exe.evaluate(&empty_ctx()))
            .unwrap_or_else(|e| panic!("'{expr}' failed: {e}"))
    };
    assert_eq!(
        as_string(&eval_with("xs:dateTime('2024-01-31T24:00:00')")),
        "2024-01-31T23:59:59.999999999"
    );
    assert_eq!(as_string(&eval_with("xs:time('24:00:00')")), "23:59:59.999999999");
}

#[rstest]
fn constructor_functions_accept_empty() {
    assert!(eval("xs:integer(())").is_empty());
    assert!(eval("xs:date(())").is_empty());
}

#[rstest]
fn derived_integer_types_keep_their_type() {
    assert_eq!(single(&eval("xs:short('12')")), XdmAtomicValue::Short(12));
    assert_eq!(single(&eval("xs:unsignedByte(255)")), XdmAtomicValue::UnsignedByte(255));
    assert!(as_bool(&eval("xs:short('12') instance of xs:integer")));
}

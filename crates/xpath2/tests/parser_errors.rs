use rstest::rstest;
use xpath2::{Error, ErrorCode, StaticContext, parse_expression};

fn parse_err(input: &str) -> Error {
    match parse_expression(input, &StaticContext::default()) {
        Ok(ast) => panic!("'{input}' should not parse, got {ast:?}"),
        Err(e) => e,
    }
}

#[rstest]
#[case::dangling_operator("1 +")]
#[case::unclosed_paren("(1, 2")]
#[case::unclosed_predicate("a[1")]
#[case::missing_return("for $x in 1 to 3")]
#[case::missing_else("if (1) then 2")]
#[case::empty("")]
#[case::stray_bracket("]")]
fn syntax_errors(#[case] input: &str) {
    let err = parse_err(input);
    assert_eq!(err.code_enum(), ErrorCode::XPST0003, "{err}");
    assert!(err.position.is_some(), "{err}");
}

#[rstest]
fn syntax_error_points_at_offending_token() {
    let err = parse_err("1 + )");
    let pos = err.position.unwrap();
    assert_eq!((pos.line, pos.column), (1, 5));
    assert!(err.to_string().contains("err:XPST0003"), "{err}");
    assert!(err.to_string().contains("line 1, column 5"), "{err}");
}

#[rstest]
fn recovery_collects_several_diagnostics() {
    let err = parse_err("1 +, 2 *, 3");
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    assert_eq!(err.message.matches("(line ").count(), 2, "{}", err.message);
    let pos = err.position.unwrap();
    assert_eq!((pos.line, pos.column), (1, 4));
}

#[rstest]
fn recovery_gives_up_after_a_few_errors() {
    let err = parse_err("1 +, 2 +, 3 +, 4 +, 5 +, 6 +");
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    let reported = err.message.matches("(line ").count();
    assert!((2..=4).contains(&reported), "{}", err.message);
}

#[rstest]
#[case::unbound_prefix("foo:bar", ErrorCode::XPST0081)]
#[case::unbound_prefix_in_function("q:f(1)", ErrorCode::XPST0081)]
#[case::unknown_function("no-such-function(1)", ErrorCode::XPST0017)]
#[case::wrong_arity("substring()", ErrorCode::XPST0017)]
#[case::undeclared_variable("$missing + 1", ErrorCode::XPST0008)]
#[case::unknown_cast_type("1 cast as xs:nope", ErrorCode::XPST0051)]
#[case::unknown_sequence_type("1 instance of xs:nope", ErrorCode::XPST0051)]
#[case::abstract_cast_target("1 cast as xs:anyAtomicType", ErrorCode::XPST0080)]
#[case::abstract_notation("'a' cast as xs:NOTATION", ErrorCode::XPST0080)]
#[case::unknown_constructor("xs:nope('1')", ErrorCode::XPST0017)]
fn static_errors(#[case] input: &str, #[case] code: ErrorCode) {
    let err = parse_err(input);
    assert_eq!(err.code_enum(), code, "{err}");
    assert!(err.position.is_some(), "{err}");
}

#[rstest]
fn lexical_errors_surface_from_the_parser() {
    let err = parse_err("1 + 'open");
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    let pos = err.position.unwrap();
    assert_eq!((pos.line, pos.column), (1, 5));
}

#[rstest]
fn variable_bound_by_for_is_out_of_scope_afterwards() {
    let err = parse_err("(for $x in 1 return $x), $x");
    assert_eq!(err.code_enum(), ErrorCode::XPST0008);
}

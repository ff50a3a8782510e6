use rstest::rstest;
use rust_decimal::Decimal;
use xpath2::ErrorCode;
use xpath2::parser::lexer::{LexMode, Lexer};
use xpath2::parser::token::{Token, TokenKind, TokenValue};

fn tokens(input: &str) -> Vec<Token> {
    Lexer::tokenize(input).unwrap_or_else(|e| panic!("failed to tokenize '{input}': {e}"))
}

fn kinds(input: &str) -> Vec<TokenKind> {
    tokens(input).into_iter().map(|t| t.kind).collect()
}

#[rstest]
#[case::instanceof2("instanceof2")]
#[case::div2("div2")]
#[case::divisor("divisor")]
#[case::modulo("modulo")]
#[case::order("order")]
#[case::castle("castle")]
fn keyword_prefixed_names_stay_one_name(#[case] input: &str) {
    let toks = tokens(input);
    assert_eq!(toks.len(), 2, "{toks:?}");
    assert_eq!(toks[0].kind, TokenKind::QName);
    assert_eq!(toks[0].text(), Some(input));
    assert_eq!(toks[1].kind, TokenKind::EndOfInput);
}

#[rstest]
fn word_operators_follow_operands() {
    assert_eq!(
        kinds("a div b mod c idiv d"),
        vec![
            TokenKind::QName,
            TokenKind::Div,
            TokenKind::QName,
            TokenKind::Mod,
            TokenKind::QName,
            TokenKind::IDiv,
            TokenKind::QName,
            TokenKind::EndOfInput
        ]
    );
}

#[rstest]
fn same_word_is_name_or_operator_by_position() {
    // `div div div`: name, operator, name
    assert_eq!(
        kinds("div div div"),
        vec![TokenKind::QName, TokenKind::Div, TokenKind::QName, TokenKind::EndOfInput]
    );
}

#[rstest]
fn two_word_operators() {
    assert_eq!(
        kinds("1 instance of xs:integer"),
        vec![TokenKind::IntegerLiteral, TokenKind::InstanceOf, TokenKind::QName, TokenKind::EndOfInput]
    );
    assert_eq!(
        kinds("$a cast as xs:date?"),
        vec![
            TokenKind::VarName,
            TokenKind::CastAs,
            TokenKind::QName,
            TokenKind::OccurrenceOptional,
            TokenKind::EndOfInput
        ]
    );
    assert_eq!(
        kinds("$a treat as node()+"),
        vec![
            TokenKind::VarName,
            TokenKind::TreatAs,
            TokenKind::KindKeyword,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::OccurrenceOneOrMore,
            TokenKind::EndOfInput
        ]
    );
}

#[rstest]
#[case::integer("42", TokenKind::IntegerLiteral)]
#[case::decimal("4.2", TokenKind::DecimalLiteral)]
#[case::leading_dot(".5", TokenKind::DecimalLiteral)]
#[case::trailing_dot("5.", TokenKind::DecimalLiteral)]
#[case::double("4.2e1", TokenKind::DoubleLiteral)]
#[case::double_no_dot("1E-3", TokenKind::DoubleLiteral)]
fn numeric_literal_classification(#[case] input: &str, #[case] kind: TokenKind) {
    assert_eq!(tokens(input)[0].kind, kind);
}

#[rstest]
fn decimal_literals_keep_their_value() {
    for input in ["1.0", "1.00"] {
        let toks = tokens(input);
        assert_eq!(toks[0].value, TokenValue::Decimal(Decimal::ONE), "{input}");
    }
}

#[rstest]
fn string_literal_escapes_and_line_endings() {
    let toks = tokens("'it''s'");
    assert_eq!(toks[0].text(), Some("it's"));
    let toks = tokens("\"say \"\"hi\"\"\"");
    assert_eq!(toks[0].text(), Some("say \"hi\""));
    let toks = tokens("'a\r\nb\rc'");
    assert_eq!(toks[0].text(), Some("a\nb\nc"));
}

#[rstest]
fn nested_comments_are_skipped() {
    assert_eq!(
        kinds("1 (: outer (: inner :) still outer :) + 2"),
        vec![TokenKind::IntegerLiteral, TokenKind::Plus, TokenKind::IntegerLiteral, TokenKind::EndOfInput]
    );
}

#[rstest]
fn axis_and_wildcard_forms() {
    assert_eq!(
        kinds("child::x/@*/p:*/*:y"),
        vec![
            TokenKind::AxisName,
            TokenKind::QName,
            TokenKind::Slash,
            TokenKind::At,
            TokenKind::Wildcard,
            TokenKind::Slash,
            TokenKind::PrefixWildcard,
            TokenKind::Slash,
            TokenKind::LocalWildcard,
            TokenKind::EndOfInput
        ]
    );
}

#[rstest]
fn names_before_parens_are_functions_or_kind_tests() {
    assert_eq!(
        kinds("count(text())"),
        vec![
            TokenKind::FunctionName,
            TokenKind::LParen,
            TokenKind::KindKeyword,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::RParen,
            TokenKind::EndOfInput
        ]
    );
}

#[rstest]
fn quantifier_and_for_keywords_need_a_variable() {
    assert_eq!(kinds("for")[0], TokenKind::QName);
    assert_eq!(kinds("for $x")[0], TokenKind::For);
    assert_eq!(kinds("some $x")[0], TokenKind::Some);
    assert_eq!(kinds("every")[0], TokenKind::QName);
}

#[rstest]
fn tokens_carry_line_and_column() {
    let toks = tokens("1 +\n  foo");
    let foo = &toks[2];
    assert_eq!((foo.line, foo.column), (2, 3));
}

#[rstest]
fn pull_interface_tracks_mode() {
    let mut lx = Lexer::new("$x + 1");
    assert_eq!(lx.mode(), LexMode::Default);
    assert!(lx.advance().unwrap());
    assert_eq!(lx.token(), TokenKind::VarName);
    assert_eq!(lx.mode(), LexMode::Operator);
    assert!(lx.advance().unwrap());
    assert_eq!(lx.token(), TokenKind::Plus);
    assert_eq!(lx.mode(), LexMode::Default);
    assert!(lx.advance().unwrap());
    assert_eq!(lx.value(), &TokenValue::Integer(1));
    assert!(!lx.advance().unwrap());
    assert_eq!(lx.token(), TokenKind::EndOfInput);
}

#[rstest]
#[case::unterminated_string("'abc", 1, 1)]
#[case::unterminated_comment("1 (: never closed", 1, 3)]
#[case::number_then_name("12abc", 1, 1)]
#[case::operator_glued_to_digit("1 div2", 1, 3)]
#[case::bad_character("1 # 2", 1, 3)]
fn lexical_errors_report_position(#[case] input: &str, #[case] line: usize, #[case] column: usize) {
    let err = Lexer::tokenize(input).expect_err("lexing should fail");
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    let pos = err.position.expect("lexical errors carry a position");
    assert_eq!((pos.line, pos.column), (line, column), "{err}");
}

#[rstest]
fn unterminated_string_on_later_line() {
    let err = Lexer::tokenize("1,\n  \"open").unwrap_err();
    let pos = err.position.unwrap();
    assert_eq!((pos.line, pos.column), (2, 3));
}

#[rstest]
fn overflowing_double_literal_is_rejected() {
    let err = Lexer::tokenize("1e400").unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
}

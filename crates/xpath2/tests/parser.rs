use rstest::rstest;
use rust_decimal::Decimal;
use xpath2::consts::{FNS, XS};
use xpath2::parser::ast::{
    ArithOp, Axis, BinaryOp, Coercion, CompOp, Expr, ExprKind, NameTest, NodeTest, ResultType, SetOp,
};
use xpath2::parser::lexer::Lexer;
use xpath2::parser::token::TokenKind;
use xpath2::xdm::{Cardinality, XmlTypeCode};
use xpath2::{ExpandedName, StaticContext, StaticContextBuilder, XdmAtomicValue, parse_expression};

fn parse(input: &str) -> Expr {
    parse_expression(input, &StaticContext::default()).unwrap_or_else(|e| panic!("failed to parse '{input}': {e}"))
}

fn binary(expr: &Expr) -> (BinaryOp, Coercion, &Expr, &Expr) {
    match &expr.kind {
        ExprKind::Binary {
            op,
            strategy,
            left,
            right,
        } => (*op, *strategy, left, right),
        other => panic!("expected a binary expression, got {other:?}"),
    }
}

fn literal(expr: &Expr) -> &XdmAtomicValue {
    match &expr.kind {
        ExprKind::Literal(v) => v,
        other => panic!("expected a literal, got {other:?}"),
    }
}

#[rstest]
fn multiplication_binds_tighter_than_addition() {
    let ast = parse("2 + 3 * 4");
    let (op, strategy, left, right) = binary(&ast);
    assert_eq!(op, BinaryOp::Arithmetic(ArithOp::Add));
    assert_eq!(strategy, Coercion::Singleton);
    assert_eq!(literal(left), &XdmAtomicValue::Integer(2));
    let (inner, _, l, r) = binary(right);
    assert_eq!(inner, BinaryOp::Arithmetic(ArithOp::Mul));
    assert_eq!(literal(l), &XdmAtomicValue::Integer(3));
    assert_eq!(literal(r), &XdmAtomicValue::Integer(4));
    assert_eq!(ast.result, ResultType::Number);
}

#[rstest]
fn additive_operators_associate_left() {
    let ast = parse("10 - 4 - 3");
    let (op, _, left, right) = binary(&ast);
    assert_eq!(op, BinaryOp::Arithmetic(ArithOp::Sub));
    assert_eq!(literal(right), &XdmAtomicValue::Integer(3));
    let (inner, _, _, _) = binary(left);
    assert_eq!(inner, BinaryOp::Arithmetic(ArithOp::Sub));
}

#[rstest]
#[case::general("1 = 2", BinaryOp::GeneralComparison(CompOp::Eq), Coercion::Atomized)]
#[case::value("1 eq 2", BinaryOp::ValueComparison(CompOp::Eq), Coercion::Singleton)]
#[case::and("1 and 2", BinaryOp::And, Coercion::Plain)]
#[case::or("1 or 2", BinaryOp::Or, Coercion::Plain)]
#[case::union("a | b", BinaryOp::Set(SetOp::Union), Coercion::Ordered)]
#[case::except("a except b", BinaryOp::Set(SetOp::Except), Coercion::Ordered)]
fn operators_carry_their_coercion(#[case] input: &str, #[case] op: BinaryOp, #[case] strategy: Coercion) {
    let ast = parse(input);
    let (got_op, got_strategy, _, _) = binary(&ast);
    assert_eq!(got_op, op);
    assert_eq!(got_strategy, strategy);
}

#[rstest]
fn and_binds_tighter_than_or() {
    let ast = parse("1 or 2 and 3");
    let (op, _, _, right) = binary(&ast);
    assert_eq!(op, BinaryOp::Or);
    assert_eq!(binary(right).0, BinaryOp::And);
}

#[rstest]
#[case::one_zero("1.0")]
#[case::one_zero_zero("1.00")]
fn decimal_literals_equal_one(#[case] input: &str) {
    let ast = parse(input);
    assert_eq!(literal(&ast), &XdmAtomicValue::Decimal(Decimal::ONE));
    assert_eq!(ast.result, ResultType::Number);
}

#[rstest]
#[case::integer("17")]
#[case::decimal("2.5")]
#[case::double("1.5E3")]
#[case::string("'text'")]
fn literals_survive_reserialization(#[case] input: &str) {
    let first = literal(&parse(input)).clone();
    let text = match &first {
        XdmAtomicValue::String(s) => format!("'{s}'"),
        XdmAtomicValue::Double(d) => format!("{d:E}"),
        other => other.string_value(),
    };
    assert_eq!(literal(&parse(&text)), &first, "{input} -> {text}");
}

#[rstest]
#[case::subtract("1-2", ArithOp::Sub, XdmAtomicValue::Integer(1))]
#[case::subtract_reversed("3-1", ArithOp::Sub, XdmAtomicValue::Integer(3))]
#[case::decimal_subtract("1.5-1", ArithOp::Sub, XdmAtomicValue::Decimal(Decimal::new(15, 1)))]
#[case::double_subtract("1e2-1", ArithOp::Sub, XdmAtomicValue::Double(100.0))]
#[case::negated_operand("1--2", ArithOp::Sub, XdmAtomicValue::Integer(1))]
#[case::multiply("2*3", ArithOp::Mul, XdmAtomicValue::Integer(2))]
#[case::decimal_add("1.5+1", ArithOp::Add, XdmAtomicValue::Decimal(Decimal::new(15, 1)))]
fn numeric_literal_directly_followed_by_operator(
    #[case] input: &str,
    #[case] expected: ArithOp,
    #[case] left_value: XdmAtomicValue,
) {
    let ast = parse(input);
    let (op, _, left, _) = binary(&ast);
    assert_eq!(op, BinaryOp::Arithmetic(expected), "{input}");
    assert_eq!(literal(left), &left_value, "{input}");
}

/// Rebuild the expression from its tokens, separated by single spaces.
fn respaced(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut prev_end = 0;
    for tok in Lexer::tokenize(input).unwrap() {
        if tok.kind == TokenKind::EndOfInput {
            break;
        }
        // text the lexer consumed without a token of its own, such as `$`
        let gap: String = chars[prev_end..tok.start].iter().collect();
        for piece in [gap.trim().to_string(), chars[tok.start..tok.start + tok.len].iter().collect()] {
            if !piece.is_empty() {
                out.push_str(&piece);
                out.push(' ');
            }
        }
        prev_end = tok.start + tok.len;
    }
    out.trim_end().to_string()
}

#[rstest]
#[case::subtraction("1-2")]
#[case::double_minus("1--2")]
#[case::decimal_sum("1.5+1*2")]
#[case::filtered_path("//book[@year > 2000]/title")]
#[case::axes("child::a/attribute::b | ancestor-or-self::node()")]
#[case::parent_attribute("../@id")]
#[case::for_return("for $b in //book return string($b/@id)")]
#[case::quantified("some $x in (1, 2) satisfies $x eq 2")]
#[case::conditional("if (count(a) gt 1) then 'many' else 'few'")]
#[case::range_predicate("(1 to 5)[. mod 2 = 1]")]
#[case::set_ops("a union b except c intersect d")]
#[case::escaped_quote("concat('it''s', \"x\")")]
#[case::castable("'5' castable as xs:integer?")]
#[case::kind_tests("a/text() | processing-instruction('x') | comment()")]
#[case::wildcards("*:a/xs:*/*")]
fn expressions_survive_reserialization(#[case] input: &str) {
    let first = parse(input);
    let text = respaced(input);
    assert_eq!(parse(&text), first, "{input} -> {text}");
}

#[rstest]
fn double_slash_expands_to_descendant_or_self() {
    let ast = parse("//x");
    let ExprKind::Path(steps) = &ast.kind else {
        panic!("expected a path, got {:?}", ast.kind);
    };
    assert_eq!(steps.len(), 3);
    assert!(matches!(steps[0].kind, ExprKind::Root));
    assert!(matches!(
        steps[1].kind,
        ExprKind::AxisStep {
            axis: Axis::DescendantOrSelf,
            ..
        }
    ));
    let ExprKind::AxisStep { axis, test, .. } = &steps[2].kind else {
        panic!("expected an axis step");
    };
    assert_eq!(*axis, Axis::Child);
    assert_eq!(test, &NodeTest::Name(NameTest::Name(ExpandedName::local("x"))));
    assert_eq!(ast.result, ResultType::NodeSet);
}

#[rstest]
fn lone_slash_is_root() {
    assert!(matches!(parse("/").kind, ExprKind::Root));
}

#[rstest]
fn single_relative_step_is_not_wrapped() {
    let ast = parse("@id");
    let ExprKind::AxisStep { axis, predicates, .. } = &ast.kind else {
        panic!("expected an axis step, got {:?}", ast.kind);
    };
    assert_eq!(*axis, Axis::Attribute);
    assert!(predicates.is_empty());
}

#[rstest]
fn predicates_record_last_usage() {
    let ast = parse("item[last()][1]");
    let ExprKind::AxisStep { predicates, .. } = &ast.kind else {
        panic!("expected an axis step");
    };
    assert_eq!(predicates.len(), 2);
    assert!(predicates[0].uses_last);
    assert!(!predicates[1].uses_last);
}

#[rstest]
fn function_names_resolve_to_the_fn_namespace() {
    let ast = parse("count((1, 2))");
    let ExprKind::FunctionCall { name, args } = &ast.kind else {
        panic!("expected a function call");
    };
    assert_eq!(name, &ExpandedName::ns(FNS, "count"));
    assert_eq!(args.len(), 1);
    assert_eq!(ast.result, ResultType::Number);
}

#[rstest]
fn constructor_functions_become_literal_casts() {
    let ast = parse("xs:date('2024-01-01')");
    let ExprKind::Cast { target, literal, .. } = &ast.kind else {
        panic!("expected a cast, got {:?}", ast.kind);
    };
    assert!(*literal);
    assert_eq!(target.type_code, XmlTypeCode::Date);
    assert_eq!(target.cardinality, Cardinality::ZeroOrOne);
}

#[rstest]
fn cast_of_a_path_is_not_literal() {
    let ast = parse("@d cast as xs:date");
    let ExprKind::Cast { literal, target, .. } = &ast.kind else {
        panic!("expected a cast");
    };
    assert!(!*literal);
    assert_eq!(target.cardinality, Cardinality::One);
    assert_eq!(ast.result, ResultType::DateTime);
}

#[rstest]
fn for_binds_its_variable() {
    let ast = parse("for $i in 1 to 3 return $i * 2");
    let ExprKind::For { var, in_expr, body } = &ast.kind else {
        panic!("expected for");
    };
    assert_eq!(var, &ExpandedName::local("i"));
    assert!(matches!(in_expr.kind, ExprKind::Range { .. }));
    assert_eq!(binary(body).0, BinaryOp::Arithmetic(ArithOp::Mul));
}

#[rstest]
fn multi_variable_for_nests() {
    let ast = parse("for $a in (1, 2), $b in ($a, 3) return $a + $b");
    let ExprKind::For { body, .. } = &ast.kind else {
        panic!("expected for");
    };
    assert!(matches!(body.kind, ExprKind::For { .. }));
}

#[rstest]
fn declared_variables_and_prefixes_resolve() {
    let ctx = StaticContextBuilder::new()
        .with_namespace("my", "urn:my")
        .with_variable(ExpandedName::ns("urn:my", "v"))
        .build();
    let ast = parse_expression("$my:v/my:item", &ctx).unwrap();
    let ExprKind::Path(steps) = &ast.kind else {
        panic!("expected a path");
    };
    assert_eq!(steps[0].kind, ExprKind::VarRef(ExpandedName::ns("urn:my", "v")));
    let ExprKind::AxisStep { test, .. } = &steps[1].kind else {
        panic!("expected an axis step");
    };
    assert_eq!(test, &NodeTest::Name(NameTest::Name(ExpandedName::ns("urn:my", "item"))));
}

#[rstest]
fn instance_of_parses_sequence_type() {
    let ast = parse("(1, 2) instance of xs:integer+");
    let ExprKind::InstanceOf { ty, .. } = &ast.kind else {
        panic!("expected instance of");
    };
    assert_eq!(ty.type_code, XmlTypeCode::Integer);
    assert_eq!(ty.cardinality, Cardinality::OneOrMore);
    assert_eq!(ast.result, ResultType::Boolean);
}

#[rstest]
fn top_level_sequence() {
    let ast = parse("1, 'a', 2.5");
    let ExprKind::Sequence(items) = &ast.kind else {
        panic!("expected a sequence");
    };
    assert_eq!(items.len(), 3);
}

#[rstest]
fn xs_prefix_is_prebound() {
    let ast = parse("xs:integer('1')");
    assert!(matches!(ast.kind, ExprKind::Cast { .. }));
    assert!(StaticContext::default().namespaces.resolve("xs") == Some(XS));
}

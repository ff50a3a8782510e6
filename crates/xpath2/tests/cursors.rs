use rstest::rstest;
use xpath2::{ErrorCode, StaticContext, XdmAtomicValue, XdmItem, compile_xpath};

mod common;
use common::*;

fn ints(items: impl IntoIterator<Item = Result<Item, xpath2::Error>>) -> Vec<i64> {
    let items: Vec<Item> = items.into_iter().collect::<Result<_, _>>().unwrap();
    as_integers(&items)
}

#[rstest]
fn streams_are_pulled_lazily() {
    let exe = compile_xpath("1 to 9223372036854775807", &StaticContext::default()).unwrap();
    let ctx = empty_ctx();
    let stream = exe.evaluate_stream(&ctx).unwrap();
    assert_eq!(ints(stream.take(3)), vec![1, 2, 3]);
}

#[rstest]
fn streams_restart_on_reset() {
    let exe = compile_xpath("for $i in 1 to 5 return $i * 10", &StaticContext::default()).unwrap();
    let ctx = empty_ctx();
    let mut stream = exe.evaluate_stream(&ctx).unwrap();
    assert_eq!(ints(stream.by_ref().take(2)), vec![10, 20]);
    stream.reset();
    assert_eq!(ints(stream), vec![10, 20, 30, 40, 50]);
}

#[rstest]
fn cloned_streams_continue_independently() {
    let exe = compile_xpath("(1, 2, 3, 4)", &StaticContext::default()).unwrap();
    let ctx = empty_ctx();
    let mut stream = exe.evaluate_stream(&ctx).unwrap();
    assert!(stream.next().is_some());
    let fork = stream.clone();
    assert_eq!(ints(stream), vec![2, 3, 4]);
    assert_eq!(ints(fork), vec![2, 3, 4]);
}

#[rstest]
fn errors_surface_when_their_item_is_pulled() {
    let exe = compile_xpath("for $i in (1, 2, 0) return 10 idiv $i", &StaticContext::default()).unwrap();
    let ctx = empty_ctx();
    let mut stream = exe.evaluate_stream(&ctx).unwrap();
    assert_eq!(ints(stream.by_ref().take(2)), vec![10, 5]);
    let err = stream.next().unwrap().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOAR0001);
    assert_eq!(exe.evaluate(&ctx).unwrap_err().code_enum(), ErrorCode::FOAR0001);
}

#[rstest]
fn filtered_node_streams() {
    let doc = library();
    let ctx = doc_ctx(&doc);
    let exe = compile_xpath("//book[@year > 2000]/title", &StaticContext::default()).unwrap();
    let titles: Vec<String> = exe
        .evaluate_stream(&ctx)
        .unwrap()
        .map(|item| match item.unwrap() {
            XdmItem::Node(n) => xpath2::XdmNode::string_value(&n),
            other => panic!("expected a node, got {other:?}"),
        })
        .collect();
    assert_eq!(titles, vec!["Beta", "Gamma"]);
}

#[rstest]
#[case::one("1 + 1", Some(2))]
#[case::none("()", None)]
#[case::filtered("(1 to 10)[. = 7]", Some(7))]
fn evaluate_single_returns_at_most_one(#[case] expr: &str, #[case] expected: Option<i64>) {
    let exe = compile_xpath(expr, &StaticContext::default()).unwrap();
    let got = exe.evaluate_single(&empty_ctx()).unwrap();
    let got = got.map(|item| match item {
        XdmItem::Atomic(XdmAtomicValue::Integer(i)) => i,
        other => panic!("expected an integer, got {other:?}"),
    });
    assert_eq!(got, expected, "{expr}");
}

#[rstest]
fn evaluate_single_rejects_longer_results() {
    let exe = compile_xpath("(1, 2)", &StaticContext::default()).unwrap();
    let err = exe.evaluate_single(&empty_ctx()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

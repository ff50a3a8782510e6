//! Evaluates the expressions given on the command line (or a few samples)
//! against a small in-memory document and prints the results.

use xpath2::{
    DynamicContextBuilder, SimpleNode, StaticContextBuilder, XdmItem, XdmNode, attr, comment, compile_xpath, elem,
    simple_doc, text,
};

fn sample_document() -> SimpleNode {
    simple_doc()
        .child(
            elem("inventory")
                .attr(attr("site", "north"))
                .child(comment("restocked monthly"))
                .child(
                    elem("part")
                        .attr(attr("sku", "A-100"))
                        .child(elem("name").child(text("bolt")))
                        .child(elem("qty").child(text("120"))),
                )
                .child(
                    elem("part")
                        .attr(attr("sku", "B-220"))
                        .child(elem("name").child(text("washer")))
                        .child(elem("qty").child(text("15"))),
                ),
        )
        .build()
}

fn render(item: &XdmItem<SimpleNode>) -> String {
    match item {
        XdmItem::Atomic(a) => format!("{} ({})", a.string_value(), a.type_code()),
        XdmItem::Node(n) => format!("{:?} node: {:?}", n.kind(), n.string_value()),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let queries: Vec<String> = if args.is_empty() {
        [
            "sum(//qty)",
            "//part[qty < 20]/name/string()",
            "for $p in //part return concat($p/@sku, '=', $p/qty * 2)",
            "xs:date('2024-02-28') + xs:dayTimeDuration('P2D')",
            "//part[1] << //part[2]",
            "1 + ",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    } else {
        args
    };

    let sc = StaticContextBuilder::new().build();
    let ctx = DynamicContextBuilder::<SimpleNode>::new()
        .with_context_item(XdmItem::Node(sample_document()))
        .build();

    for q in &queries {
        println!("{q}");
        match compile_xpath(q, &sc).and_then(|exe| exe.evaluate(&ctx)) {
            Ok(items) if items.is_empty() => println!("  => ()"),
            Ok(items) => {
                for item in &items {
                    println!("  => {}", render(item));
                }
            }
            Err(e) => println!("  !! {e}"),
        }
    }
}

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use xpath2::{
    Compiler, DynamicContextBuilder, SimpleNode, StaticContext, XdmItem, attr, compile_xpath, elem,
    parse_expression, simple_doc, text,
};

fn sample_queries() -> Vec<&'static str> {
    vec![
        "1 + 2 * 3 idiv 4",
        "upper-case(concat('Lorem ipsum ', 'dolor sit amet'))",
        "/catalog/shelf/book[@genre = 'sf'][position() < 5]/@isbn",
        "for $n in 1 to 200 return $n * $n",
        "sum(//book/price) div count(//book)",
        "some $b in //book satisfies $b/@year cast as xs:integer lt 1950",
        "//book[contains(title, 'Vol 1')]/following-sibling::book[1]/title",
    ]
}

/// `shelves` shelves of `per_shelf` books each.
fn build_catalog(shelves: usize, per_shelf: usize) -> SimpleNode {
    let genres = ["sf", "crime", "poetry"];
    let mut catalog = elem("catalog");
    for s in 0..shelves {
        let mut shelf = elem("shelf").attr(attr("no", &s.to_string()));
        for b in 0..per_shelf {
            let n = s * per_shelf + b;
            shelf = shelf.child(
                elem("book")
                    .attr(attr("isbn", &format!("isbn-{n:05}")))
                    .attr(attr("genre", genres[n % genres.len()]))
                    .attr(attr("year", &(1900 + n % 120).to_string()))
                    .child(elem("title").child(text(&format!("Vol {n}"))))
                    .child(elem("price").child(text(&format!("{}.{}", 5 + n % 40, n % 100)))),
            );
        }
        catalog = catalog.child(shelf);
    }
    simple_doc().child(catalog).build()
}

fn benchmark_parser(c: &mut Criterion) {
    let queries = sample_queries();
    let sc = StaticContext::default();
    c.bench_function("parser/parse_expression", |b| {
        b.iter(|| {
            for q in &queries {
                let ast = parse_expression(black_box(q), &sc).expect("parse failure");
                black_box(ast);
            }
        })
    });
}

fn benchmark_compiler(c: &mut Criterion) {
    let queries = sample_queries();
    let sc = StaticContext::default();
    c.bench_function("compiler/compile_xpath", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(compile_xpath(black_box(q), &sc).expect("compile failure"));
            }
        })
    });
    let cached = Compiler::default();
    c.bench_function("compiler/cached", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(cached.compile(black_box(q)).expect("compile failure"));
            }
        })
    });
}

fn benchmark_evaluator(c: &mut Criterion) {
    let compiler = Compiler::default();
    let compiled: Vec<_> = sample_queries()
        .into_iter()
        .map(|q| (q, compiler.compile(q).expect("compile failure")))
        .collect();
    for size in [10usize, 50] {
        let document = build_catalog(size, 20);
        let ctx = DynamicContextBuilder::<SimpleNode>::new()
            .with_context_item(XdmItem::Node(document))
            .build();
        let mut group = c.benchmark_group(format!("evaluator/{size}x20"));
        for (i, (query, exe)) in compiled.iter().enumerate() {
            group.bench_with_input(BenchmarkId::new(format!("q{i}"), query), exe, |b, exe| {
                b.iter(|| {
                    let result = exe.evaluate(black_box(&ctx)).expect("eval failure");
                    black_box(result.len());
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, benchmark_parser, benchmark_compiler, benchmark_evaluator);
criterion_main!(benches);

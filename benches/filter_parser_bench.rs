use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use filter_dispatcher::lexer::Lexer;
use filter_dispatcher::{FilterParser, OrderByParser, TokenKind};
use std::hint::black_box;

const FILTERS: [(&str, &str); 4] = [
    ("simple", "name eq 'Open'"),
    ("medium", "name eq 'Open' and age gt 2 and active"),
    (
        "complex",
        "(name eq 'Release Plan' or startswith(name, 'Ver')) and not (age in (1, 2, 3, 4, 5)) or active eq false",
    ),
    (
        "escaped",
        "name eq 'O''Brien' or name eq 'D''Angelo' or name eq 'L''Oreal'",
    ),
];

fn create_parser() -> FilterParser {
    let mut parser = FilterParser::new();
    parser
        .add_field::<String>("name")
        .expect("register name")
        .supports(TokenKind::STRING_FUNCTION)
        .use_upper_case();
    parser.add_field::<i64>("age").expect("register age");
    parser.add_field::<bool>("active").expect("register active");
    parser
}

fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for (name, filter) in FILTERS {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &filter, |b, &filter| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(filter)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

fn benchmark_filter_parser(c: &mut Criterion) {
    let parser = create_parser();
    let mut group = c.benchmark_group("filter_parser_performance");

    for (name, filter) in FILTERS {
        group.bench_with_input(BenchmarkId::new("parse", name), &filter, |b, &filter| {
            b.iter(|| match parser.parse(black_box(filter)) {
                Ok(result) => black_box(result),
                Err(e) => panic!("parse failed: {}", e),
            })
        });
    }

    group.finish();
}

fn benchmark_order_by(c: &mut Criterion) {
    let mut parser = OrderByParser::new();
    for field in ["name", "age", "created"] {
        parser.add_field(field).expect("register order-by field");
    }
    let order_by = "name desc, age asc, created";

    c.bench_function("order_by_parse", |b| {
        b.iter(|| black_box(parser.parse(black_box(order_by))))
    });
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_filter_parser,
    benchmark_order_by
);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sqlembed::baseline::{BaselineFormatter, StandardFormatter};
use sqlembed::{format_document, format_string, normalize, DocumentKind, FormatConfig, Mode};

fn load_test_file(path: &str) -> String {
    let content =
        std::fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e));
    // Golden test files use a sentinel to separate input/expected; take only input
    match content.find(")))))__SQLEMBED_OUTPUT__(((((") {
        Some(pos) => content[..pos].to_string(),
        None => content,
    }
}

fn bench_format_small(c: &mut Criterion) {
    let sql = "select a, b, c from my_table where x = 1 and y > 2 order by a\n";
    let mode = Mode::default();
    c.bench_function("format_small", |b| {
        b.iter(|| format_string(black_box(sql), black_box(&mode)).unwrap())
    });
}

fn bench_format_pipeline(c: &mut Criterion) {
    let sql = load_test_file("tests/data/unformatted/103_demo_pipeline.sql");
    let mode = Mode::default();
    c.bench_function("format_pipeline", |b| {
        b.iter(|| format_string(black_box(&sql), black_box(&mode)).unwrap())
    });
}

/// Baseline alone versus baseline plus the structural passes.
fn bench_normalizer_overhead(c: &mut Criterion) {
    let sql = load_test_file("tests/data/unformatted/103_demo_pipeline.sql");
    let config = FormatConfig::default();

    let mut group = c.benchmark_group("normalizer_overhead");
    group.bench_function("baseline_only", |b| {
        b.iter(|| StandardFormatter.format(black_box(&sql), black_box(&config)).unwrap())
    });
    group.bench_function("baseline_and_passes", |b| {
        b.iter(|| normalize(black_box(&sql), black_box(&config)).unwrap())
    });
    group.finish();
}

fn bench_python_document(c: &mut Criterion) {
    let source = load_test_file("tests/data/python/200_marked_strings.py").repeat(50);
    let mode = Mode::default();
    c.bench_function("python_document", |b| {
        b.iter(|| format_document(black_box(&source), DocumentKind::Host, black_box(&mode)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_format_small,
    bench_format_pipeline,
    bench_normalizer_overhead,
    bench_python_document,
);
criterion_main!(benches);

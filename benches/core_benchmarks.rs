use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crawlcore::{blocking, text};

fn benchmark_text_clean(c: &mut Criterion) {
    let raw = "<p>Rust is a <b>systems</b> programming language!!! Visit https://example.com for more.</p>".repeat(20);

    c.bench_function("text_clean", |b| {
        b.iter(|| black_box(text::clean(black_box(&raw))))
    });
}

fn benchmark_extract_keywords(c: &mut Criterion) {
    let cleaned = "rust is a systems programming language focused on safety speed and concurrency \
        the borrow checker enforces memory safety without a garbage collector"
        .repeat(10);
    let corpus: Vec<String> = vec![cleaned.clone(), cleaned.clone()];

    c.bench_function("extract_keywords", |b| {
        b.iter(|| black_box(text::extract_keywords(black_box(&cleaned), 10, black_box(&corpus))))
    });
}

fn benchmark_blocking_detect(c: &mut Criterion) {
    let body = "Please complete the CAPTCHA to continue, we have detected unusual traffic from your IP address.";

    c.bench_function("blocking_detect", |b| {
        b.iter(|| black_box(blocking::detect(black_box(body), black_box(403), black_box("https://example.com/"))))
    });
}

criterion_group!(benches, benchmark_text_clean, benchmark_extract_keywords, benchmark_blocking_detect);
criterion_main!(benches);

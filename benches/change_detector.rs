//! Change detector benchmark suite.
//!
//! Benchmarks snapshot comparison over generated documents:
//! - Document sizes: 1k, 10k, 50k elements
//! - Cases: identical markup, one appended element, every tenth element changed
//!
//! Run with: cargo bench --bench change_detector
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use page_fuzzer::{ChangeDetector, DomDelta, JsErrorEntry, SessionId, Snapshot, SnapshotId};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const ELEMENT_COUNTS: &[usize] = &[1_000, 10_000, 50_000];

// ============================================================================
// Fixtures
// ============================================================================

fn document(elements: usize, changed_every: Option<usize>) -> String {
    let mut dom = String::from("<html><head></head><body>\n");
    for i in 0..elements {
        let marker = match changed_every {
            Some(n) if i % n == 0 => "changed",
            _ => "field",
        };
        dom.push_str(&format!(
            "<div class=\"row\"><label for=\"f{i}\">{marker} {i}</label><input id=\"f{i}\" name=\"{marker}{i}\"></div>\n"
        ));
    }
    dom.push_str("</body></html>");
    dom
}

fn snapshot(session_id: SessionId, dom: String) -> Snapshot {
    Snapshot {
        id: SnapshotId::generate(),
        session_id,
        timestamp: 0.0,
        url: "https://bench.test/form".to_string(),
        dom,
        console: Vec::new(),
        js_errors: Vec::new(),
    }
}

// ============================================================================
// Benchmark: DOM Delta
// ============================================================================

fn bench_dom_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("dom_delta");

    for &count in ELEMENT_COUNTS {
        let pre = document(count, None);
        let appended = format!("{pre}<div class=\"flash\">Error: invalid input</div>");
        let scattered = document(count, Some(10));

        group.throughput(Throughput::Bytes(pre.len() as u64));

        group.bench_with_input(BenchmarkId::new("identical", count), &pre, |b, pre| {
            let post = pre.clone();
            b.iter(|| DomDelta::compute(black_box(pre), black_box(&post)));
        });

        group.bench_with_input(BenchmarkId::new("appended", count), &pre, |b, pre| {
            b.iter(|| DomDelta::compute(black_box(pre), black_box(&appended)));
        });

        group.bench_with_input(BenchmarkId::new("scattered", count), &pre, |b, pre| {
            b.iter(|| DomDelta::compute(black_box(pre), black_box(&scattered)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Full Diff
// ============================================================================

fn bench_diff(c: &mut Criterion) {
    let detector = ChangeDetector::default();
    let mut group = c.benchmark_group("diff");
    group.sample_size(20);

    for &count in ELEMENT_COUNTS {
        let session_id = SessionId::next();
        let pre = snapshot(session_id, document(count, None));
        let mut post = snapshot(session_id, document(count, Some(10)));
        post.js_errors.push(JsErrorEntry::now("SyntaxError: Unexpected token '<'"));

        group.bench_with_input(BenchmarkId::new("anomalous", count), &count, |b, _| {
            b.iter(|| detector.diff(black_box(&pre), black_box(&post), false));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dom_delta, bench_diff);
criterion_main!(benches);

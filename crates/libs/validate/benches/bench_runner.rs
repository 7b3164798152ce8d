//! Report Submission Benchmark
//!
//! Measures the cost of raising reports through reporters into one runner:
//! 1. Single-threaded submission of distinct reports
//! 2. Repeated reports folded into the first occurrence
//! 3. Concurrent submission from several threads
//!
//! Run with: cargo bench -p remotemedia-validate --bench bench_runner

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use remotemedia_validate::{ids, Reporter, Runner, ValidateConfig};
use std::sync::Arc;

fn quiet_runner(details: &str) -> Arc<Runner> {
    let config = ValidateConfig {
        reporting_details: Some(details.to_string()),
        outputs: Vec::new(),
        ..Default::default()
    };
    Arc::new(Runner::new(&config).expect("runner"))
}

fn bench_distinct_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("distinct_reports");

    for count in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let runner = quiet_runner("monitor");
                for i in 0..count {
                    let reporter = Reporter::new(format!("pad{}", i), &runner);
                    let report = reporter
                        .report(ids::BUFFER_IS_OUT_OF_SEGMENT.as_str(), "late")
                        .expect("report");
                    black_box(report);
                }
                runner.count_reports()
            });
        });
    }

    group.finish();
}

fn bench_repeated_reports(c: &mut Criterion) {
    c.bench_function("repeated_reports_1000", |b| {
        b.iter(|| {
            let runner = quiet_runner("synthetic");
            let reporter = Reporter::new("decoder", &runner);
            for _ in 0..1000 {
                black_box(
                    reporter
                        .report(ids::WRONG_FLOW_RETURN.as_str(), "not-negotiated")
                        .expect("report"),
                );
            }
            runner.count_reports()
        });
    });
}

fn bench_concurrent_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reports");

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((threads * 250) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let runner = quiet_runner("monitor");
                std::thread::scope(|scope| {
                    for t in 0..threads {
                        let runner = Arc::clone(&runner);
                        scope.spawn(move || {
                            for i in 0..250 {
                                let reporter = Reporter::new(format!("pad{}-{}", t, i), &runner);
                                black_box(
                                    reporter
                                        .report(ids::EVENT_HAS_WRONG_SEQNUM.as_str(), "seqnum")
                                        .expect("report"),
                                );
                            }
                        });
                    }
                });
                runner.count_reports()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_distinct_reports,
    bench_repeated_reports,
    bench_concurrent_reports
);
criterion_main!(benches);

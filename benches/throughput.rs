//! Throughput benchmarks

use cliprobe_core::core::classifier::classify;
use cliprobe_core::core::window::OutputWindow;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

fn pane_capture(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("> neighbor table\r\n| 0x{i:04x} | -52 | -55 | Done\r\n"))
        .collect()
}

fn classifier_benchmark(c: &mut Criterion) {
    let window = pane_capture(64);

    let mut group = c.benchmark_group("classifier");
    group.throughput(Throughput::Bytes(window.len() as u64));

    group.bench_function("token_hit", |b| {
        b.iter(|| black_box(classify(black_box(&window), "0x003f")));
    });

    group.bench_function("token_miss", |b| {
        b.iter(|| black_box(classify(black_box(&window), "leader")));
    });

    group.finish();
}

fn window_benchmark(c: &mut Criterion) {
    let capture = pane_capture(16);

    let mut group = c.benchmark_group("window");

    for captures in [8usize, 64, 256] {
        let mut window = OutputWindow::new();
        for _ in 0..captures {
            window.record_command("neighbor table");
            window.append_capture(&capture);
        }
        group.throughput(Throughput::Bytes(window.len() as u64));
        group.bench_function(format!("since_last_command_{captures}"), |b| {
            b.iter(|| black_box(window.window_since_last_command().len()));
        });
    }

    group.finish();
}

criterion_group!(benches, classifier_benchmark, window_benchmark);
criterion_main!(benches);

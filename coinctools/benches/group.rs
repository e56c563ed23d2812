#[allow(unused_imports)]
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use coinctools::group::EventGrouper;
use coinctools::{window, BUFFER_CAPACITY};

mod common;

fn group_buffer(c: &mut Criterion) {
    let tags = common::load_test_data(BUFFER_CAPACITY);

    c.bench_function("group 100k", |b| { b.iter( || {
        let mut g = EventGrouper::new(black_box(100));
        let mut written = 0u64;
        g.process_with(&tags, |e| if e.accepted { written += 1 });
        written
    })});
}

fn estimate_window(c: &mut Criterion) {
    let tags = common::load_test_data(BUFFER_CAPACITY);

    c.bench_function("estimate window 100k", |b| { b.iter( || {
        window::estimate(&tags, black_box(Some(1)))
    })});
}

criterion_group!(benches, group_buffer, estimate_window);
criterion_main!(benches);

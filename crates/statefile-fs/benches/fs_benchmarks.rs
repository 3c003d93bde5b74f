use criterion::{Criterion, black_box, criterion_group, criterion_main};
use statefile_fs::{OpenMode, exclusive_open, inspect, munge};
use std::fs;
use tempfile::tempdir;

fn exclusive_open_benchmark(c: &mut Criterion) {
    c.bench_function("lock::exclusive_open (uncontended)", |b| {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter");
        fs::write(&path, "0").unwrap();

        b.iter(|| {
            exclusive_open(black_box(&path), 0o660, OpenMode::ReadWriteExisting, None, |fh| {
                let current: u64 = fh.read_all()?.trim().parse().unwrap_or(0);
                fh.replace_contents((current + 1).to_string().as_bytes())
            })
            .unwrap();
        })
    });
}

fn inspect_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let file = dir.path().join("target");
    fs::write(&file, "x").unwrap();

    c.bench_function("inspect::stat", |b| {
        b.iter(|| inspect::stat(black_box(&file)).unwrap())
    });
    c.bench_function("inspect::lstat", |b| {
        b.iter(|| inspect::lstat(black_box(&file)).unwrap())
    });
}

fn munge_benchmark(c: &mut Criterion) {
    c.bench_function("path_list::munge", |b| {
        b.iter(|| munge(black_box(Some("/etc/agent:modules:../site"))).unwrap())
    });
}

criterion_group!(
    benches,
    exclusive_open_benchmark,
    inspect_benchmark,
    munge_benchmark
);
criterion_main!(benches);

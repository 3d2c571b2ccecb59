use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fgate_storage::Storage;
use futures::TryStreamExt;
use std::hint::black_box;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Benchmark: Path Resolution & Confinement
// ============================================================================

fn bench_path_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_resolution");

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let storage = rt.block_on(async {
        let storage = Storage::builder().root(temp.path()).connect().await.unwrap();
        storage.mkdir("foo/bar", "baz").await.unwrap();
        storage
    });

    group.bench_function("existing_nested", |b| {
        b.iter(|| black_box(storage.resolve("foo/bar/baz").unwrap()));
    });

    group.bench_function("missing_leaf", |b| {
        b.iter(|| black_box(storage.resolve("foo/bar/baz/new/file.dat").unwrap()));
    });

    group.bench_function("dot_segments", |b| {
        b.iter(|| black_box(storage.resolve(r"./foo\..\foo//bar/./baz").unwrap()));
    });

    group.bench_function("rejected_escape", |b| {
        b.iter(|| black_box(storage.resolve("foo/../../etc/passwd").is_err()));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Streaming Reads
// ============================================================================

fn bench_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();

    let sizes = [("64KB", 64 * 1024), ("1MB", 1024 * 1024), ("16MB", 16 * 1024 * 1024)];

    for (name, size) in sizes {
        let data: Vec<u8> = (0..size).map(|i| u8::try_from(i % 256).unwrap()).collect();
        let storage = rt.block_on(async {
            let storage = Storage::builder().root(temp.path()).connect().await.unwrap();
            storage.upload("bench", name, &data).await.unwrap();
            storage
        });
        let path = format!("bench/{name}");

        group.throughput(Throughput::Bytes(u64::try_from(size).unwrap_or(u64::MAX)));

        group.bench_with_input(BenchmarkId::new("full", name), &path, |b, path| {
            b.to_async(&rt).iter(|| async {
                let read = storage.open(path, None).await.unwrap();
                let total = read
                    .body
                    .try_fold(0usize, |acc, chunk| async move { Ok(acc + chunk.len()) })
                    .await
                    .unwrap();
                black_box(total)
            });
        });

        group.bench_with_input(BenchmarkId::new("tail_half", name), &path, |b, path| {
            let spec = format!("bytes={}-", size / 2);
            b.to_async(&rt).iter(|| async {
                let read = storage.open(path, Some(&spec)).await.unwrap();
                let total = read
                    .body
                    .try_fold(0usize, |acc, chunk| async move { Ok(acc + chunk.len()) })
                    .await
                    .unwrap();
                black_box(total)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_path_resolution, bench_streaming);
criterion_main!(benches);

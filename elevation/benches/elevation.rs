use criterion::{black_box, criterion_group, criterion_main, Criterion};
use elevation::{
    decode, estimate_within_tile, BulkLoad, InterpolationMethod, MemoryStore, NeighborSource,
    PointFileStore, Resolution, Spacing, TileStore,
};
use tempfile::TempDir;

const SRTM3_SAMPLES: usize = 1201;
const SRTM3_SIZE: usize = SRTM3_SAMPLES * SRTM3_SAMPLES * 2;

/// Synthetic SRTM3 tile with a simple elevation gradient.
fn gradient_tile() -> Vec<u8> {
    let mut data = vec![0u8; SRTM3_SIZE];
    for row in 0..SRTM3_SAMPLES {
        for col in 0..SRTM3_SAMPLES {
            let elev = ((row + col) % 4000) as i16;
            let offset = (row * SRTM3_SAMPLES + col) * 2;
            data[offset..offset + 2].copy_from_slice(&elev.to_be_bytes());
        }
    }
    data
}

fn bench_decode(c: &mut Criterion) {
    let data = gradient_tile();

    c.bench_function("decode_srtm3", |b| {
        b.iter(|| black_box(decode(black_box(&data), 35, 138).unwrap()));
    });
}

fn bench_within_tile(c: &mut Criterion) {
    let data = gradient_tile();

    c.bench_function("estimate_within_tile", |b| {
        b.iter(|| {
            black_box(
                estimate_within_tile(
                    &data,
                    Resolution::Srtm3,
                    35,
                    138,
                    black_box(35.3606),
                    black_box(138.7274),
                )
                .unwrap(),
            )
        });
    });
}

fn bench_memory_store(c: &mut Criterion) {
    let records = decode(&gradient_tile(), 35, 138).unwrap();
    let store = MemoryStore::from_records(records).unwrap();
    let service = elevation::ElevationService::new(
        std::sync::Arc::new(store),
        elevation::QueryConfig {
            spacing: Spacing::SRTM3,
            ..Default::default()
        },
    );

    for method in [
        InterpolationMethod::Nearest,
        InterpolationMethod::Bilinear,
        InterpolationMethod::Bicubic,
    ] {
        c.bench_function(&format!("memory_{}", method), |b| {
            b.iter(|| {
                black_box(
                    service
                        .point_elevation(black_box(35.3606), black_box(138.7274), method)
                        .unwrap(),
                )
            });
        });
    }
}

fn bench_point_file(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let mut store = PointFileStore::open_or_create(tmp.path().join("points.bin")).unwrap();
    store.load(&decode(&gradient_tile(), 35, 138).unwrap()).unwrap();

    c.bench_function("point_file_sixteen_neighbors", |b| {
        b.iter(|| {
            black_box(
                store
                    .sixteen_neighbors(black_box(35.3606), black_box(138.7274), Spacing::SRTM3)
                    .unwrap(),
            )
        });
    });
}

fn bench_tile_store(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("N35E138.hgt"), gradient_tile()).unwrap();
    let store = TileStore::new(tmp.path(), 10);

    // Warm the cache
    let _ = store.nearest(35.5, 138.5);

    c.bench_function("tile_store_four_neighbors_cached", |b| {
        b.iter(|| {
            black_box(
                store
                    .four_neighbors(black_box(35.3606), black_box(138.7274), Spacing::SRTM3)
                    .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_within_tile,
    bench_memory_store,
    bench_point_file,
    bench_tile_store,
);
criterion_main!(benches);

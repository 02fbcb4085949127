use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use ndarray::{Array, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use pca_classify::{Classifier, DimensionSelection, Label, NearestNeighbor, PNorm, Pca};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

// Data of shape (n_features, n_observations), seeded for reproducibility.
fn generate_data(n_features: usize, n_observations: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array::random_using((n_features, n_observations), Uniform::new(0., 10.), &mut rng)
}

fn bench_pca_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("PCA_solve");

    let selections = [
        ("count", DimensionSelection::FixedCount(5)),
        ("variability", DimensionSelection::FixedVariability(0.9)),
        ("auto", DimensionSelection::Auto),
    ];

    for &(n_features, n_observations) in [(50, 100), (100, 500), (200, 100)].iter() {
        let data = generate_data(n_features, n_observations, 42);
        group.throughput(Throughput::Elements((n_features * n_observations) as u64));
        for (name, selection) in selections {
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}x{}", n_features, n_observations)),
                &data,
                |b, data_matrix| {
                    b.iter_batched(
                        || Pca::with_selection(selection).unwrap(),
                        |mut pca| pca.solve(data_matrix.view()).unwrap(),
                        BatchSize::SmallInput,
                    );
                },
            );
        }
    }
    group.finish();
}

fn bench_pca_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("PCA_project");

    let train = generate_data(100, 400, 7);
    let queries = generate_data(100, 1000, 8);
    let mut pca = Pca::with_dimensions(10).unwrap();
    pca.solve(train.view()).unwrap();

    group.throughput(Throughput::Elements(queries.ncols() as u64));
    group.bench_function("forward_100x1000_to_10", |b| {
        b.iter(|| pca.project(black_box(queries.view()), false).unwrap());
    });
    group.finish();
}

fn bench_nearest_neighbor_test(c: &mut Criterion) {
    let mut group = c.benchmark_group("NearestNeighbor_test");

    for &(n_features, n_training) in [(10, 1000), (50, 1000), (10, 5000)].iter() {
        let train = generate_data(n_features, n_training, 1);
        let labels: Vec<Label> = (0..n_training).map(|i| (i % 10) as Label).collect();
        let queries = generate_data(n_features, 500, 2);

        for (name, metric) in [("euclidean", PNorm::euclidean()), ("manhattan", PNorm::manhattan())] {
            let mut nn = NearestNeighbor::with_metric(metric);
            nn.train(train.view(), &labels).unwrap();

            group.throughput(Throughput::Elements(queries.ncols() as u64));
            group.bench_with_input(
                BenchmarkId::new(name, format!("f{}_m{}", n_features, n_training)),
                &queries,
                |b, query_matrix| {
                    b.iter(|| nn.test(black_box(query_matrix.view())).unwrap());
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_pca_solve, bench_pca_project, bench_nearest_neighbor_test);
criterion_main!(benches);

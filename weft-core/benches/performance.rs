use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_core::filter::PackageFilter;
use weft_core::graph::DependencyGraph;
use weft_core::package::Package;

fn generate_packages(count: usize, deps_per_package: usize) -> Vec<Package> {
    (0..count)
        .map(|i| {
            let deps: Vec<String> = (0..deps_per_package.min(i))
                .map(|j| format!("package-{}", i - 1 - j))
                .collect();
            Package::new(
                format!("package-{}", i),
                format!("/ws/packages/package-{}", i),
                "1.0.0",
            )
            .with_workspace_dependencies(deps)
        })
        .collect()
}

fn benchmark_graph_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_construction");

    for count in [100, 500, 1000, 5000] {
        let packages = generate_packages(count, 3);
        group.bench_function(format!("{}_packages", count), |b| {
            b.iter(|| black_box(DependencyGraph::new(packages.clone())));
        });
    }

    group.finish();
}

fn benchmark_parallel_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_batches");

    for count in [100, 500, 1000, 5000] {
        let graph = DependencyGraph::new(generate_packages(count, 3));
        group.bench_function(format!("{}_packages", count), |b| {
            b.iter(|| black_box(graph.parallel_batches().map(|batches| batches.len())));
        });
    }

    group.finish();
}

fn benchmark_transitive_dependents(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_dependents");

    for count in [100, 1000, 5000] {
        let graph = DependencyGraph::new(generate_packages(count, 2));
        group.bench_function(format!("{}_packages", count), |b| {
            b.iter(|| black_box(graph.transitive_dependents("package-0").len()));
        });
    }

    group.finish();
}

fn benchmark_filter_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_chain");

    for count in [100, 1000, 5000] {
        let packages: Vec<Arc<Package>> = generate_packages(count, 0).into_iter().map(Arc::new).collect();
        let filter = PackageFilter::new()
            .with_scope("package-1*, package-2*")
            .with_ignore(["*-19?"]);
        group.bench_function(format!("{}_packages", count), |b| {
            b.iter(|| black_box(filter.apply(packages.clone(), None).map(|p| p.len())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_graph_construction,
    benchmark_parallel_batches,
    benchmark_transitive_dependents,
    benchmark_filter_chain
);
criterion_main!(benches);

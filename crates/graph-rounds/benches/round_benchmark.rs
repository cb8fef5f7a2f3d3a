//! Benchmarks for round execution on the local executor
//!
//! Run with: `cargo bench -p graph-rounds`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use graph_rounds::algorithms::ComponentRule;
use graph_rounds::{
    encode_vertex, ConnectedComponents, GraphKind, LocalExecutor, ObjectLocation, ObjectStore,
    RoundConfig, RoundDriver, RoundExecutor, RoundRequest, RoundRule, Search, Vertex,
};
use tokio::runtime::Runtime;

/// Undirected `side x side` grid as adjacency records
fn grid(side: u64) -> Vec<String> {
    let id = |row: u64, col: u64| row * side + col + 1;
    let mut records = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        for col in 0..side {
            let mut neighbours = Vec::new();
            if row > 0 {
                neighbours.push(id(row - 1, col));
            }
            if col > 0 {
                neighbours.push(id(row, col - 1));
            }
            if col + 1 < side {
                neighbours.push(id(row, col + 1));
            }
            if row + 1 < side {
                neighbours.push(id(row + 1, col));
            }
            records.push(encode_vertex(&Vertex::<()>::undirected(id(row, col), &neighbours)));
        }
    }
    records
}

async fn load(records: &[String], config: &RoundConfig) -> (Arc<LocalExecutor>, ObjectLocation) {
    let executor = Arc::new(LocalExecutor::in_memory(config));
    let input = ObjectLocation::new("input");
    executor
        .store()
        .put(&input, records.to_vec())
        .await
        .expect("Failed to store input");
    (executor, input)
}

/// One component-label round at different task counts
fn bench_single_round(c: &mut Criterion) {
    let runtime = Runtime::new().expect("Failed to build runtime");
    let records = grid(64);
    let mut group = c.benchmark_group("component_round");
    group.throughput(Throughput::Elements(records.len() as u64));

    for tasks in [1, 2, 4, 8] {
        let config = RoundConfig::default().with_parallelism(tasks);
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |bench, &tasks| {
            bench.to_async(&runtime).iter(|| async {
                let (executor, input) = load(&records, &config).await;
                let request = RoundRequest {
                    run_id: "bench".to_string(),
                    round: 1,
                    rule: Arc::new(RoundRule::ComponentLabelUndirected(ComponentRule::new(
                        GraphKind::Undirected,
                    ))),
                    input,
                    task_count: tasks,
                };
                black_box(executor.execute(request).await.expect("round"))
            });
        });
    }

    group.finish();
}

/// Whole runs to convergence
fn bench_full_runs(c: &mut Criterion) {
    let runtime = Runtime::new().expect("Failed to build runtime");
    let records = grid(24);
    let config = RoundConfig::default().with_parallelism(4);
    let mut group = c.benchmark_group("full_run");
    group.sample_size(20);

    group.bench_function("search", |bench| {
        bench.to_async(&runtime).iter(|| async {
            let (executor, input) = load(&records, &config).await;
            let driver = RoundDriver::new(executor, config.clone());
            black_box(
                driver
                    .run_iteration(&Search::new(1u64, GraphKind::Undirected), input)
                    .await
                    .expect("run"),
            )
        });
    });

    group.bench_function("components", |bench| {
        bench.to_async(&runtime).iter(|| async {
            let (executor, input) = load(&records, &config).await;
            let driver = RoundDriver::new(executor, config.clone());
            black_box(
                driver
                    .run_iteration(&ConnectedComponents::new(GraphKind::Undirected), input)
                    .await
                    .expect("run"),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_round, bench_full_runs);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use network::{NetworkAnalyzer, SocialGraph};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sociogram_core::model::{AggregationPolicy, EntityId};

fn classroom(students: u32, nominations_each: usize, seed: u64) -> SocialGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = SocialGraph::new(true);
    for id in 0..students {
        graph.add_node(EntityId(id), format!("student-{id}"));
    }
    for from in 0..students {
        for _ in 0..nominations_each {
            let to = rng.gen_range(0..students);
            let weight = rng.gen_range(1..=5) as f64;
            graph.add_edge(EntityId(from), EntityId(to), "friend", weight, AggregationPolicy::Sum);
        }
    }
    graph
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let analyzer = NetworkAnalyzer::default();
    let mut group = c.benchmark_group("analyze");
    for students in [30u32, 120, 500] {
        let graph = classroom(students, 3, 7);
        group.bench_with_input(BenchmarkId::from_parameter(students), &graph, |b, graph| {
            b.iter(|| analyzer.analyze(black_box(graph)))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

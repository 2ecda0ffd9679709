use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use crossgraph::config::{RankingConfig, TraversalConfig};
use crossgraph::graph::adjacency::AdjacencyIndex;
use crossgraph::graph::pathfinding::{PathFinder, PathOptions};
use crossgraph::graph::ranking::{ImportanceRanker, RankCandidate};
use crossgraph::graph::traversal::{TraversalDirection, TraversalEngine, TraversalOptions};
use crossgraph::types::{Dependency, DependencyKind, Symbol, SymbolId, SymbolKind};

/// `layers` layers of `width` symbols; every symbol calls two symbols of
/// the next layer.
fn layered_graph(layers: usize, width: usize) -> AdjacencyIndex {
    let id = |layer: usize, i: usize| (layer * width + i + 1) as SymbolId;
    let symbols = (0..layers)
        .flat_map(|l| (0..width).map(move |i| (l, i)))
        .map(|(l, i)| Symbol {
            id: id(l, i),
            file_id: l as i64 + 1,
            name: format!("layer{l}_fn{i}"),
            qualified_name: None,
            kind: SymbolKind::Function,
            file_path: format!("src/layer{l}.ts"),
            exported: true,
            signature: None,
            description: None,
        })
        .collect();
    let mut deps = Vec::new();
    for l in 0..layers.saturating_sub(1) {
        for i in 0..width {
            for j in [i, (i + 1) % width] {
                deps.push(Dependency::new(id(l, i), id(l + 1, j), DependencyKind::Calls, None));
            }
        }
    }
    AdjacencyIndex::from_parts(symbols, deps, Vec::new())
}

fn bench_traversal(c: &mut Criterion) {
    let index = layered_graph(12, 20);
    let config = TraversalConfig::default();
    let mut group = c.benchmark_group("transitive_dependencies");
    for depth in [3u32, 6, 9] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                TraversalEngine::new(&index, &config).walk(
                    TraversalDirection::Dependencies,
                    black_box(1),
                    &TraversalOptions::with_max_depth(depth),
                )
            })
        });
    }
    group.finish();
}

fn bench_shortest_path(c: &mut Criterion) {
    let index = layered_graph(50, 40);
    let config = TraversalConfig::default();
    let last = (50 * 40) as SymbolId;
    c.bench_function("shortest_path_layered", |b| {
        b.iter(|| {
            PathFinder::new(&index, &config).shortest_path(
                black_box(1),
                black_box(last),
                &PathOptions::default(),
            )
        })
    });
}

fn bench_ranking(c: &mut Criterion) {
    let index = layered_graph(20, 25);
    let candidates: Vec<RankCandidate> = index
        .symbol_ids()
        .iter()
        .filter_map(|id| index.get_symbol(*id).cloned())
        .map(RankCandidate::from)
        .collect();
    let config = RankingConfig::default();
    c.bench_function("rank_500_symbols", |b| {
        b.iter(|| {
            let ranker = ImportanceRanker::new(&index, &config).unwrap();
            ranker.rank_symbols(black_box(&candidates))
        })
    });
}

criterion_group!(benches, bench_traversal, bench_shortest_path, bench_ranking);
criterion_main!(benches);

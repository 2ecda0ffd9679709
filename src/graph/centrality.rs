//! Whole-graph centrality signals, computed once per batch.
//!
//! All four signals are max-normalized to `[0, 1]`:
//! - betweenness: Brandes, directed and unweighted
//! - degree: `in_weight * in + out`
//! - eigenvector-style: damped power iteration where a node inherits
//!   importance from the nodes that depend on it
//! - closeness: `reachable / sum(distance)` over forward BFS

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::adjacency::{AdjacencyIndex, EdgeFilter};
use crate::types::SymbolId;

/// Compact, deduplicated adjacency over dense indices.
#[derive(Debug, Clone, Default)]
pub struct CentralityGraph {
    ids: Vec<SymbolId>,
    position: HashMap<SymbolId, usize>,
    out: Vec<Vec<usize>>,
    inc: Vec<Vec<usize>>,
}

impl CentralityGraph {
    /// Build from an index, keeping edges `filter` admits. Self-loops and
    /// parallel edges are dropped.
    pub fn from_index(index: &AdjacencyIndex, filter: &EdgeFilter) -> Self {
        let ids = index.all_node_ids();
        let position: HashMap<SymbolId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut out = vec![Vec::new(); ids.len()];
        let mut inc = vec![Vec::new(); ids.len()];
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        for (from_pos, &id) in ids.iter().enumerate() {
            for edge in index.outgoing(id).iter().filter(|e| filter.allows(e.kind)) {
                let Some(&to_pos) = position.get(&edge.to_symbol_id) else {
                    continue;
                };
                if to_pos == from_pos || !seen.insert((from_pos, to_pos)) {
                    continue;
                }
                out[from_pos].push(to_pos);
                inc[to_pos].push(from_pos);
            }
        }
        Self { ids, position, out, inc }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Normalized signals for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CentralitySignals {
    pub betweenness: f64,
    pub degree: f64,
    pub eigenvector: f64,
    pub closeness: f64,
}

/// Parameters of [`CentralityScores::compute`].
#[derive(Debug, Clone, Copy)]
pub struct CentralityParams {
    pub in_degree_weight: f64,
    pub alpha: f64,
    pub iterations: usize,
    pub tolerance: f64,
}

/// Signals for every node of a [`CentralityGraph`].
#[derive(Debug, Clone, Default)]
pub struct CentralityScores {
    position: HashMap<SymbolId, usize>,
    betweenness: Vec<f64>,
    degree: Vec<f64>,
    eigenvector: Vec<f64>,
    closeness: Vec<f64>,
}

impl CentralityScores {
    pub fn compute(graph: &CentralityGraph, params: CentralityParams) -> Self {
        let scores = Self {
            position: graph.position.clone(),
            betweenness: max_normalize(betweenness(graph)),
            degree: max_normalize(degree(graph, params.in_degree_weight)),
            eigenvector: max_normalize(damped_power_iteration(
                graph,
                params.alpha,
                params.iterations,
                params.tolerance,
            )),
            closeness: max_normalize(closeness(graph)),
        };
        tracing::debug!(nodes = graph.len(), "centrality computed");
        scores
    }

    /// Signals for `id`; all zero for a symbol outside the graph.
    pub fn get(&self, id: SymbolId) -> CentralitySignals {
        match self.position.get(&id) {
            Some(&i) => CentralitySignals {
                betweenness: self.betweenness[i],
                degree: self.degree[i],
                eigenvector: self.eigenvector[i],
                closeness: self.closeness[i],
            },
            None => CentralitySignals::default(),
        }
    }
}

fn max_normalize(mut values: Vec<f64>) -> Vec<f64> {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for v in &mut values {
            *v /= max;
        }
    }
    values
}

/// Brandes' algorithm over unit-weight directed edges.
pub fn betweenness(graph: &CentralityGraph) -> Vec<f64> {
    let n = graph.len();
    let mut centrality = vec![0.0; n];
    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0_f64; n];
    let mut dist = vec![-1_i64; n];
    let mut delta = vec![0.0_f64; n];
    let mut queue: VecDeque<usize> = VecDeque::new();

    for s in 0..n {
        stack.clear();
        for p in &mut preds {
            p.clear();
        }
        sigma.iter_mut().for_each(|x| *x = 0.0);
        dist.iter_mut().for_each(|x| *x = -1);
        sigma[s] = 1.0;
        dist[s] = 0;
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &graph.out[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        delta.iter_mut().for_each(|x| *x = 0.0);
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }
    centrality
}

/// Weighted degree favoring heavily-depended-upon nodes.
pub fn degree(graph: &CentralityGraph, in_weight: f64) -> Vec<f64> {
    (0..graph.len())
        .map(|i| in_weight * graph.inc[i].len() as f64 + graph.out[i].len() as f64)
        .collect()
}

/// Each node inherits importance from its dependents: a dependent `u`
/// passes `alpha * x[u] / outdeg(u)` to every node it depends on, on top
/// of a `1 - alpha` baseline. Isolated nodes score zero.
pub fn damped_power_iteration(
    graph: &CentralityGraph,
    alpha: f64,
    iterations: usize,
    tolerance: f64,
) -> Vec<f64> {
    let n = graph.len();
    if n == 0 {
        return Vec::new();
    }
    let mut x = vec![1.0_f64; n];
    for _ in 0..iterations.max(1) {
        let mut next = vec![1.0 - alpha; n];
        for (v, slot) in next.iter_mut().enumerate() {
            for &u in &graph.inc[v] {
                *slot += alpha * x[u] / graph.out[u].len() as f64;
            }
        }
        let diff = next
            .iter()
            .zip(&x)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max);
        x = next;
        if diff < tolerance {
            break;
        }
    }
    for (i, v) in x.iter_mut().enumerate() {
        if graph.inc[i].is_empty() && graph.out[i].is_empty() {
            *v = 0.0;
        }
    }
    x
}

/// `reachable / sum(distance)` over forward BFS; zero for sinks.
pub fn closeness(graph: &CentralityGraph) -> Vec<f64> {
    let n = graph.len();
    let mut dist = vec![usize::MAX; n];
    let mut queue: VecDeque<usize> = VecDeque::new();
    (0..n)
        .map(|s| {
            dist.iter_mut().for_each(|d| *d = usize::MAX);
            dist[s] = 0;
            queue.push_back(s);
            let mut reachable = 0usize;
            let mut total = 0usize;
            while let Some(v) = queue.pop_front() {
                for &w in &graph.out[v] {
                    if dist[w] == usize::MAX {
                        dist[w] = dist[v] + 1;
                        reachable += 1;
                        total += dist[w];
                        queue.push_back(w);
                    }
                }
            }
            if total == 0 {
                0.0
            } else {
                reachable as f64 / total as f64
            }
        })
        .collect()
}

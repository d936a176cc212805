use crate::dependency_graph::DependencyGraph;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SPOF_THRESHOLD: usize = 2;
pub const DEFAULT_CRITICAL_PATH_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglePointOfFailure {
    pub service: String,
    pub in_degree: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPath {
    pub path: Vec<String>,
    /// Sum of mean latencies along the path, in milliseconds.
    pub latency: f64,
}

/// Read-only structural queries over a [`DependencyGraph`].
///
/// All traversals use explicit stacks, and visit nodes and neighbours in
/// service-name order, so results are deterministic and independent of the
/// order in which edges were observed.
pub struct GraphAnalyzer<'a> {
    graph: &'a DependencyGraph,
    order: Vec<NodeIndex>,
    adjacency: Vec<Vec<NodeIndex>>,
}

impl<'a> GraphAnalyzer<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        let order = graph.sorted_indices();
        let mut adjacency = vec![Vec::new(); graph.node_count()];
        for &node in &order {
            adjacency[node.index()] = graph.successors(node);
        }
        Self {
            graph,
            order,
            adjacency,
        }
    }

    /// Every cycle met by a depth-first sweep, each closed back to its first
    /// service (`[A, B, C, A]`). A self-loop yields `[A, A]`.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let node_count = self.adjacency.len();
        let mut visited = vec![false; node_count];
        let mut on_stack = vec![false; node_count];
        let mut cycles = Vec::new();

        for &start in &self.order {
            if visited[start.index()] {
                continue;
            }

            let mut path: Vec<NodeIndex> = vec![start];
            let mut frames: Vec<(NodeIndex, usize)> = vec![(start, 0)];
            visited[start.index()] = true;
            on_stack[start.index()] = true;

            while let Some(frame) = frames.last_mut() {
                let (node, cursor) = *frame;
                let Some(&next) = self.adjacency[node.index()].get(cursor) else {
                    frames.pop();
                    on_stack[node.index()] = false;
                    path.pop();
                    continue;
                };
                frame.1 += 1;

                if on_stack[next.index()] {
                    if let Some(position) = path.iter().position(|&n| n == next) {
                        let mut cycle: Vec<String> = path[position..]
                            .iter()
                            .map(|&n| self.graph.name(n).to_string())
                            .collect();
                        cycle.push(self.graph.name(next).to_string());
                        cycles.push(cycle);
                    }
                } else if !visited[next.index()] {
                    visited[next.index()] = true;
                    on_stack[next.index()] = true;
                    path.push(next);
                    frames.push((next, 0));
                }
            }
        }

        cycles
    }

    /// Services called by more than `threshold` distinct callers, most-called first.
    pub fn find_single_points_of_failure(&self, threshold: usize) -> Vec<SinglePointOfFailure> {
        let mut in_degree = vec![0usize; self.adjacency.len()];
        for neighbors in &self.adjacency {
            for callee in neighbors {
                in_degree[callee.index()] += 1;
            }
        }

        let mut spofs: Vec<SinglePointOfFailure> = self
            .order
            .iter()
            .filter(|node| in_degree[node.index()] > threshold)
            .map(|&node| SinglePointOfFailure {
                service: self.graph.name(node).to_string(),
                in_degree: in_degree[node.index()],
            })
            .collect();

        spofs.sort_by(|a, b| b.in_degree.cmp(&a.in_degree).then_with(|| a.service.cmp(&b.service)));
        spofs
    }

    /// Longest simple dependency chain from each service, ranked by length.
    ///
    /// Among equally long chains from one start the lexicographically
    /// smallest (by service names) wins; across starts, ties in length are
    /// ordered by the same rule. Single-service chains are not reported.
    pub fn critical_paths(&self, top_n: usize) -> Vec<CriticalPath> {
        let mut paths: Vec<Vec<NodeIndex>> = self
            .order
            .iter()
            .map(|&start| self.longest_path_from(start))
            .filter(|path| path.len() > 1)
            .collect();

        paths.sort_by(|a, b| {
            b.len().cmp(&a.len()).then_with(|| {
                let left = a.iter().map(|&n| self.graph.name(n));
                let right = b.iter().map(|&n| self.graph.name(n));
                left.cmp(right)
            })
        });
        paths.truncate(top_n);

        paths
            .into_iter()
            .map(|path| CriticalPath {
                latency: path
                    .windows(2)
                    .map(|pair| self.graph.latency_between(pair[0], pair[1]))
                    .sum(),
                path: path.iter().map(|&n| self.graph.name(n).to_string()).collect(),
            })
            .collect()
    }

    pub fn is_on_critical_path(&self, service: &str, top_n: usize) -> bool {
        self.critical_paths(top_n)
            .iter()
            .any(|path| path.path.iter().any(|s| s == service))
    }

    fn longest_path_from(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut on_path = vec![false; self.adjacency.len()];
        let mut path = vec![start];
        let mut best = path.clone();
        let mut frames: Vec<(NodeIndex, usize)> = vec![(start, 0)];
        on_path[start.index()] = true;

        while let Some(frame) = frames.last_mut() {
            let (node, cursor) = *frame;
            let Some(&next) = self.adjacency[node.index()].get(cursor) else {
                frames.pop();
                on_path[node.index()] = false;
                path.pop();
                continue;
            };
            frame.1 += 1;

            if on_path[next.index()] {
                continue;
            }
            on_path[next.index()] = true;
            path.push(next);
            // Neighbours are explored in name order, so the first chain to reach
            // a new length is the lexicographically smallest of that length.
            if path.len() > best.len() {
                best = path.clone();
            }
            frames.push((next, 0));
        }

        best
    }
}

use std::collections::VecDeque;

use crate::config::MatchStrategy;
use crate::scoring::adjacency::Adjacency;

const UNREACHED: usize = usize::MAX;

/// The estimated notes assigned to one reference note.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub ref_index: usize,
    /// Selection order; the first entry is the primary match
    pub est_indices: Vec<usize>,
    /// Edge quality per entry of `est_indices`
    pub weights: Vec<f64>,
}

/// Run the configured assignment strategy. Output is ordered by reference index.
pub fn assign(
    adjacency: &Adjacency,
    strategy: &MatchStrategy,
    ref_order: Option<&[usize]>,
) -> Vec<Assignment> {
    match strategy {
        MatchStrategy::Maximum => {
            let pairs = maximum_matching(adjacency, ref_order);
            pairs
                .into_iter()
                .map(|(r, e)| Assignment {
                    ref_index: r,
                    est_indices: vec![e],
                    weights: vec![adjacency.edge_weight(r, e).unwrap_or(0.0)],
                })
                .collect()
        }
        MatchStrategy::Weighted => greedy_weighted_matching(adjacency),
        MatchStrategy::Bounded {
            max_matches_per_ref,
            max_matches_per_est,
        } => bounded_matching(adjacency, *max_matches_per_ref, *max_matches_per_est),
    }
}

/// Per-call Hopcroft-Karp state.
struct HopcroftKarp<'a> {
    adjacency: &'a Adjacency,
    order: Vec<usize>,
    pair_ref: Vec<Option<usize>>,
    pair_est: Vec<Option<usize>>,
    dist: Vec<usize>,
    cursor: Vec<usize>,
    /// Length of the shortest augmenting path found by the last BFS
    limit: usize,
}

impl<'a> HopcroftKarp<'a> {
    fn new(adjacency: &'a Adjacency, ref_order: Option<&[usize]>) -> Self {
        let n_ref = adjacency.n_ref();
        let order = match ref_order {
            Some(order) => order.to_vec(),
            None => (0..n_ref).collect(),
        };
        HopcroftKarp {
            adjacency,
            order,
            pair_ref: vec![None; n_ref],
            pair_est: vec![None; adjacency.n_est()],
            dist: vec![UNREACHED; n_ref],
            cursor: vec![0; n_ref],
            limit: UNREACHED,
        }
    }

    /// Layer reference nodes by alternating-path distance from the free ones.
    fn bfs(&mut self) -> bool {
        let adjacency = self.adjacency;
        let mut queue = VecDeque::new();
        for &u in &self.order {
            if self.pair_ref[u].is_none() {
                self.dist[u] = 0;
                queue.push_back(u);
            } else {
                self.dist[u] = UNREACHED;
            }
        }

        self.limit = UNREACHED;
        while let Some(u) = queue.pop_front() {
            if self.dist[u] >= self.limit {
                continue;
            }
            for &v in adjacency.neighbors(u) {
                match self.pair_est[v] {
                    None => {
                        if self.limit == UNREACHED {
                            self.limit = self.dist[u] + 1;
                        }
                    }
                    Some(w) => {
                        if self.dist[w] == UNREACHED {
                            self.dist[w] = self.dist[u] + 1;
                            queue.push_back(w);
                        }
                    }
                }
            }
        }

        self.limit != UNREACHED
    }

    /// Look for a layered augmenting path from `root` and flip it.
    /// Uses an explicit stack so path length is not bounded by the call stack.
    fn augment_from(&mut self, root: usize) -> bool {
        let mut path = vec![root];
        // via[k] is the estimated note linking path[k] to path[k + 1]
        let mut via: Vec<usize> = Vec::new();

        while let Some(&u) = path.last() {
            let end = self.adjacency.edge_range(u).end;
            if self.cursor[u] == end {
                self.dist[u] = UNREACHED;
                path.pop();
                via.pop();
                continue;
            }

            let v = self.adjacency.target(self.cursor[u]);
            self.cursor[u] += 1;
            let next = self.dist[u] + 1;

            match self.pair_est[v] {
                None if next == self.limit => {
                    for (k, &r) in path.iter().enumerate() {
                        let e = via.get(k).copied().unwrap_or(v);
                        self.pair_ref[r] = Some(e);
                        self.pair_est[e] = Some(r);
                    }
                    return true;
                }
                Some(w) if self.dist[w] != UNREACHED && self.dist[w] == next => {
                    via.push(v);
                    path.push(w);
                }
                _ => {}
            }
        }

        false
    }

    fn run(mut self) -> Vec<(usize, usize)> {
        let mut phases = 0usize;
        while self.bfs() {
            for u in 0..self.cursor.len() {
                self.cursor[u] = self.adjacency.edge_range(u).start;
            }

            let mut augmented = 0usize;
            for k in 0..self.order.len() {
                let u = self.order[k];
                if self.pair_ref[u].is_none() && self.augment_from(u) {
                    augmented += 1;
                }
            }
            phases += 1;
            log::trace!(
                "matching phase {}: path length {}, {} augmentations",
                phases,
                self.limit,
                augmented
            );
            if augmented == 0 {
                break;
            }
        }

        let pairs: Vec<(usize, usize)> = self
            .pair_ref
            .iter()
            .enumerate()
            .filter_map(|(r, e)| e.map(|e| (r, e)))
            .collect();
        log::debug!("maximum matching: {} pairs after {} phases", pairs.len(), phases);
        pairs
    }
}

/// Maximum-cardinality 1:1 matching via Hopcroft-Karp.
///
/// Free reference notes are visited in `ref_order` (ascending index when
/// `None`) and neighbours in adjacency order, which fixes every tie-break.
/// Pairs are returned sorted by reference index.
pub fn maximum_matching(adjacency: &Adjacency, ref_order: Option<&[usize]>) -> Vec<(usize, usize)> {
    if adjacency.edge_count() == 0 {
        return Vec::new();
    }
    HopcroftKarp::new(adjacency, ref_order).run()
}

/// Edge ids sorted by descending weight, ties by edge id.
fn edges_by_weight(adjacency: &Adjacency) -> Vec<(usize, usize)> {
    let mut edges: Vec<(usize, usize)> = (0..adjacency.n_ref())
        .flat_map(|r| adjacency.edge_range(r).map(move |e| (r, e)))
        .collect();
    edges.sort_by(|a, b| {
        adjacency
            .weight(b.1)
            .total_cmp(&adjacency.weight(a.1))
            .then(a.1.cmp(&b.1))
    });
    edges
}

/// Greedy 1:1 assignment by descending edge quality.
///
/// Not a globally optimal weighted assignment; a high-quality edge can block
/// two slightly weaker ones.
pub fn greedy_weighted_matching(adjacency: &Adjacency) -> Vec<Assignment> {
    bounded_matching(adjacency, 1, 1)
}

/// Greedy 1:N assignment: edges are taken in descending weight while the
/// reference note has fewer than `max_per_ref` and the estimated note fewer
/// than `max_per_est` selections.
pub fn bounded_matching(
    adjacency: &Adjacency,
    max_per_ref: usize,
    max_per_est: usize,
) -> Vec<Assignment> {
    let mut ref_count = vec![0usize; adjacency.n_ref()];
    let mut est_count = vec![0usize; adjacency.n_est()];
    let mut selected: Vec<Vec<(usize, f64)>> = vec![Vec::new(); adjacency.n_ref()];

    for (r, edge) in edges_by_weight(adjacency) {
        let e = adjacency.target(edge);
        if ref_count[r] >= max_per_ref || est_count[e] >= max_per_est {
            continue;
        }
        ref_count[r] += 1;
        est_count[e] += 1;
        selected[r].push((e, adjacency.weight(edge)));
    }

    let assignments: Vec<Assignment> = selected
        .into_iter()
        .enumerate()
        .filter(|(_, picks)| !picks.is_empty())
        .map(|(r, picks)| Assignment {
            ref_index: r,
            est_indices: picks.iter().map(|p| p.0).collect(),
            weights: picks.iter().map(|p| p.1).collect(),
        })
        .collect();
    log::debug!(
        "greedy matching ({}:{}): {} reference notes assigned",
        max_per_ref,
        max_per_est,
        assignments.len()
    );
    assignments
}

//! Tour optimizer over a travel-time matrix.
//!
//! Every constraint is reduced to one closed tour through a depot:
//!
//! - closed loop: the start (default 0) is the depot;
//! - open path with a forced start: the start is the depot and every edge
//!   back into it is free, so the return trip costs nothing;
//! - open path without a start: a synthetic depot is appended with free edges
//!   to and from every node, and removed from the result.
//!
//! The search is a cheapest-arc construction followed by first-improvement
//! local search (2-opt and or-opt) driven by guided local search penalties.
//! Scan order is fixed, so the only source of variance is where the deadline
//! cuts the search.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::matrix::TravelTimeMatrix;
use crate::traits::TourSolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourShape {
    /// Return to the first stop at the end.
    Closed,
    /// Stop at the last site.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TourConstraint {
    pub shape: TourShape,
    /// Index the tour must start from.
    pub start: Option<usize>,
}

impl TourConstraint {
    pub fn closed() -> Self {
        Self {
            shape: TourShape::Closed,
            start: None,
        }
    }

    pub fn open() -> Self {
        Self {
            shape: TourShape::Open,
            start: None,
        }
    }

    pub fn starting_at(mut self, index: usize) -> Self {
        self.start = Some(index);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.shape == TourShape::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Fewer than three nodes; the order is fixed.
    Trivial,
    /// Search stopped on its own.
    Converged,
    /// Deadline reached; best tour so far returned.
    TimeLimit,
    /// Input was malformed; identity order returned.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TourSolution {
    pub tour: Vec<usize>,
    pub total_cost: i64,
    pub status: SolveStatus,
}

impl TourSolution {
    fn fallback(n: usize) -> Self {
        Self {
            tour: (0..n).collect(),
            total_cost: 0,
            status: SolveStatus::Fallback,
        }
    }
}

/// Longest budget honored; larger ones are clamped.
pub const MAX_TIME_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline `budget` from now, with the budget clamped to [`MAX_TIME_BUDGET`].
pub fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget.min(MAX_TIME_BUDGET)).unwrap_or(now)
}

/// Solves with the default engine and a wall-clock budget.
pub fn solve(matrix: &TravelTimeMatrix, constraint: &TourConstraint, time_budget: Duration) -> TourSolution {
    GuidedLocalSearch::default().solve(matrix, constraint, deadline_after(time_budget))
}

/// Cheapest-arc tour without any improvement. This is the baseline the
/// search never does worse than.
pub fn greedy(matrix: &TravelTimeMatrix, constraint: &TourConstraint) -> TourSolution {
    if let Some(solution) = degenerate(matrix, constraint) {
        return solution;
    }
    let graph = SearchGraph::augment(matrix, constraint);
    let tour = graph.strip(cheapest_arc(&graph));
    let total_cost = tour_cost(matrix, &tour, constraint.shape);
    TourSolution {
        tour,
        total_cost,
        status: SolveStatus::Converged,
    }
}

/// Cost of visiting `tour` in order; closed tours include the return edge.
pub fn tour_cost(matrix: &TravelTimeMatrix, tour: &[usize], shape: TourShape) -> i64 {
    let path: i64 = tour.windows(2).map(|pair| matrix.get(pair[0], pair[1])).sum();
    match (shape, tour.first(), tour.last()) {
        (TourShape::Closed, Some(&first), Some(&last)) if tour.len() > 1 => {
            path + matrix.get(last, first)
        }
        _ => path,
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Scales the penalty weight against the average edge cost.
    pub alpha: f64,
    /// Penalty rounds without a new best tour before the search stops.
    pub max_stall_iterations: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            max_stall_iterations: 200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuidedLocalSearch {
    pub options: SearchOptions,
}

impl GuidedLocalSearch {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }

    fn search(&self, graph: &SearchGraph, deadline: Instant) -> (Vec<usize>, SolveStatus) {
        let m = graph.size();
        let mut tour = cheapest_arc(graph);
        let mut best = tour.clone();
        let mut best_cost = graph.cycle_cost(&best);
        let mut penalties = Penalties::new(m);
        let mut lambda = 0;
        let mut stall = 0;
        let mut rounds = 0usize;

        loop {
            let outcome = {
                let weights = Weights {
                    graph,
                    penalties: &penalties,
                    lambda,
                };
                local_search(&mut tour, &weights, deadline)
            };
            rounds += 1;

            if graph.is_valid(&tour) {
                let cost = graph.cycle_cost(&tour);
                if cost < best_cost {
                    best.clone_from(&tour);
                    best_cost = cost;
                    stall = 0;
                } else {
                    stall += 1;
                }
            }

            if outcome == Outcome::Interrupted || Instant::now() >= deadline {
                debug!(rounds, best_cost, "search stopped at deadline");
                return (best, SolveStatus::TimeLimit);
            }
            if stall >= self.options.max_stall_iterations {
                debug!(rounds, best_cost, "search stalled");
                return (best, SolveStatus::Converged);
            }
            if lambda == 0 {
                let average = graph.cycle_cost(&tour) as f64 / m as f64;
                lambda = ((self.options.alpha * average) as i64).max(1);
            }
            if !penalties.penalize(&tour, graph) {
                debug!(rounds, best_cost, "no edge left to penalize");
                return (best, SolveStatus::Converged);
            }
        }
    }
}

impl TourSolver for GuidedLocalSearch {
    fn solve(&self, matrix: &TravelTimeMatrix, constraint: &TourConstraint, deadline: Instant) -> TourSolution {
        if let Some(solution) = degenerate(matrix, constraint) {
            return solution;
        }

        let graph = SearchGraph::augment(matrix, constraint);
        let (order, status) = self.search(&graph, deadline);
        let tour = graph.strip(order);
        let total_cost = tour_cost(matrix, &tour, constraint.shape);
        TourSolution {
            tour,
            total_cost,
            status,
        }
    }
}

/// Handles malformed input and sizes below three.
fn degenerate(matrix: &TravelTimeMatrix, constraint: &TourConstraint) -> Option<TourSolution> {
    let n = matrix.size();
    if let Err(reason) = validate(matrix, constraint) {
        warn!(nodes = n, reason, "no feasible tour, falling back to identity order");
        return Some(TourSolution::fallback(n));
    }

    let trivial = |tour: Vec<usize>, total_cost: i64| TourSolution {
        tour,
        total_cost,
        status: SolveStatus::Trivial,
    };
    match n {
        0 => Some(trivial(Vec::new(), 0)),
        1 => Some(trivial(vec![0], 0)),
        2 if constraint.start == Some(1) => Some(trivial(vec![1, 0], matrix.get(1, 0))),
        2 => Some(trivial(vec![0, 1], matrix.get(0, 1))),
        _ => None,
    }
}

fn validate(matrix: &TravelTimeMatrix, constraint: &TourConstraint) -> Result<(), &'static str> {
    if !matrix.is_square() {
        return Err("matrix is not square");
    }
    if matrix.rows().iter().flatten().any(|&cost| cost < 0) {
        return Err("matrix has negative costs");
    }
    if constraint.start.is_some_and(|start| start >= matrix.size()) {
        return Err("start index out of range");
    }
    Ok(())
}

/// Closed-tour view of the problem with an explicit depot.
#[derive(Debug, Clone)]
struct SearchGraph {
    costs: Vec<Vec<i64>>,
    depot: usize,
    synthetic_depot: bool,
}

impl SearchGraph {
    fn augment(matrix: &TravelTimeMatrix, constraint: &TourConstraint) -> Self {
        let n = matrix.size();
        let mut costs = matrix.rows().to_vec();
        match (constraint.shape, constraint.start) {
            (TourShape::Open, None) => {
                for row in costs.iter_mut() {
                    row.push(0);
                }
                costs.push(vec![0; n + 1]);
                Self {
                    costs,
                    depot: n,
                    synthetic_depot: true,
                }
            }
            (TourShape::Open, Some(start)) => {
                for row in costs.iter_mut() {
                    row[start] = 0;
                }
                Self {
                    costs,
                    depot: start,
                    synthetic_depot: false,
                }
            }
            (TourShape::Closed, start) => Self {
                costs,
                depot: start.unwrap_or(0),
                synthetic_depot: false,
            },
        }
    }

    fn size(&self) -> usize {
        self.costs.len()
    }

    fn cost(&self, from: usize, to: usize) -> i64 {
        self.costs[from][to]
    }

    fn cycle_cost(&self, tour: &[usize]) -> i64 {
        let m = tour.len();
        (0..m).map(|k| self.cost(tour[k], tour[(k + 1) % m])).sum()
    }

    /// Complete permutation starting at the depot.
    fn is_valid(&self, tour: &[usize]) -> bool {
        let m = self.size();
        if tour.len() != m || tour.first() != Some(&self.depot) {
            return false;
        }
        let mut seen = vec![false; m];
        tour.iter().all(|&node| node < m && !std::mem::replace(&mut seen[node], true))
    }

    /// Drops the synthetic depot; tours otherwise already start at the depot.
    fn strip(&self, order: Vec<usize>) -> Vec<usize> {
        if self.synthetic_depot {
            order.into_iter().filter(|&node| node != self.depot).collect()
        } else {
            order
        }
    }
}

/// From the depot, always take the cheapest arc to an unvisited node.
/// Ties go to the lowest index.
fn cheapest_arc(graph: &SearchGraph) -> Vec<usize> {
    let m = graph.size();
    let mut visited = vec![false; m];
    let mut tour = Vec::with_capacity(m);
    let mut current = graph.depot;
    visited[current] = true;
    tour.push(current);

    while tour.len() < m {
        let next = (0..m)
            .filter(|&node| !visited[node])
            .min_by_key(|&node| (graph.cost(current, node), node));
        match next {
            Some(node) => {
                visited[node] = true;
                tour.push(node);
                current = node;
            }
            None => break,
        }
    }
    tour
}

/// Edge penalties for guided local search, directed.
#[derive(Debug, Clone)]
struct Penalties {
    counts: Vec<Vec<i64>>,
}

impl Penalties {
    fn new(m: usize) -> Self {
        Self {
            counts: vec![vec![0; m]; m],
        }
    }

    fn get(&self, from: usize, to: usize) -> i64 {
        self.counts[from][to]
    }

    /// Penalizes the tour edges with the highest utility `cost / (1 + p)`.
    /// Returns false when every edge is free.
    fn penalize(&mut self, tour: &[usize], graph: &SearchGraph) -> bool {
        let m = tour.len();
        let edges: Vec<(usize, usize, f64)> = (0..m)
            .map(|k| {
                let (a, b) = (tour[k], tour[(k + 1) % m]);
                (a, b, graph.cost(a, b) as f64 / (1 + self.get(a, b)) as f64)
            })
            .collect();

        let max_utility = edges.iter().map(|&(_, _, u)| u).fold(0.0, f64::max);
        if max_utility <= 0.0 {
            return false;
        }
        for &(a, b, utility) in &edges {
            if utility == max_utility {
                self.counts[a][b] += 1;
            }
        }
        true
    }
}

/// Augmented edge cost seen by the local search.
struct Weights<'a> {
    graph: &'a SearchGraph,
    penalties: &'a Penalties,
    lambda: i64,
}

impl Weights<'_> {
    fn w(&self, from: usize, to: usize) -> i64 {
        self.graph.cost(from, to) + self.lambda * self.penalties.get(from, to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    LocalOptimum,
    Interrupted,
}

fn local_search(tour: &mut Vec<usize>, weights: &Weights<'_>, deadline: Instant) -> Outcome {
    loop {
        if Instant::now() >= deadline {
            return Outcome::Interrupted;
        }
        if two_opt_move(tour, weights) || or_opt_move(tour, weights) {
            continue;
        }
        return Outcome::LocalOptimum;
    }
}

/// Applies the first improving segment reversal. Position 0 (the depot)
/// never moves. Reversal cost is exact for asymmetric matrices.
fn two_opt_move(tour: &mut [usize], weights: &Weights<'_>) -> bool {
    let m = tour.len();
    if m < 3 {
        return false;
    }

    let mut forward = vec![0i64; m];
    let mut backward = vec![0i64; m];
    for k in 0..m - 1 {
        forward[k + 1] = forward[k] + weights.w(tour[k], tour[k + 1]);
        backward[k + 1] = backward[k] + weights.w(tour[k + 1], tour[k]);
    }

    for i in 1..m - 1 {
        for j in i + 1..m {
            let prev = tour[i - 1];
            let next = tour[(j + 1) % m];
            let before = weights.w(prev, tour[i]) + weights.w(tour[j], next) + forward[j] - forward[i];
            let after = weights.w(prev, tour[j]) + weights.w(tour[i], next) + backward[j] - backward[i];
            if after < before {
                tour[i..=j].reverse();
                return true;
            }
        }
    }
    false
}

/// Applies the first improving relocation of a run of up to three stops.
fn or_opt_move(tour: &mut Vec<usize>, weights: &Weights<'_>) -> bool {
    let m = tour.len();
    for len in 1..=3 {
        if len + 2 > m {
            break;
        }
        for i in 1..=m - len {
            let a = tour[i - 1];
            let s = tour[i];
            let e = tour[i + len - 1];
            let b = tour[(i + len) % m];
            let gain = weights.w(a, s) + weights.w(e, b) - weights.w(a, b);

            for p in 0..m {
                if p + 1 >= i && p < i + len {
                    continue;
                }
                let x = tour[p];
                let y = tour[(p + 1) % m];
                let added = weights.w(x, s) + weights.w(e, y) - weights.w(x, y);
                if added < gain {
                    let segment: Vec<usize> = tour.drain(i..i + len).collect();
                    let at = if p < i { p + 1 } else { p + 1 - len };
                    tour.splice(at..at, segment);
                    return true;
                }
            }
        }
    }
    false
}

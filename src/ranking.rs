use crate::matching::{Edge, Matching, UnsignedInt};
use crate::matrix::WeightMatrix;
use crate::solver::{AssignmentSolver, Direction};
use anyhow::{ensure, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Configuration of one ranking run.
#[derive(Clone, Copy, Debug)]
pub struct RankConfig {
    pub direction: Direction,
    /// When set, a matched edge contributes to the objective only if its
    /// column index lies below this bound. Branching and solving still cover
    /// the full matrix, which lets dummy columns absorb unmatched rows
    /// without distorting the ranking.
    pub column_bound: Option<usize>,
    /// Whether branching also excludes edges whose column lies at or beyond
    /// `column_bound`. With `false`, matchings differing only in dummy
    /// columns are not enumerated separately.
    pub branch_beyond_bound: bool,
}

impl Default for RankConfig {
    fn default() -> RankConfig {
        RankConfig {
            direction: Direction::Maximize,
            column_bound: None,
            branch_beyond_bound: false,
        }
    }
}

/// One entry of the ranked answer list.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedMatching<I: UnsignedInt> {
    pub matching: Matching<I>,
    /// Total of the original weights at the matched cells, restricted to the
    /// configured column bound if any.
    pub value: f64,
}

/// A node of the branch-and-bound search: a region of the solution space,
/// encoded as a weight matrix with locked cells, together with the best
/// complete matching achievable inside the region.
struct Partition<I: UnsignedInt> {
    matrix: WeightMatrix,
    matching: Matching<I>,
    value: f64,
    /// heap key: `value` under MAXIMIZE, `-value` under MINIMIZE
    priority: f64,
}

impl<I: UnsignedInt> PartialEq for Partition<I> {
    fn eq(&self, other: &Self) -> bool {
        self.priority.total_cmp(&other.priority) == Ordering::Equal
    }
}

impl<I: UnsignedInt> Eq for Partition<I> {}

impl<I: UnsignedInt> PartialOrd for Partition<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: UnsignedInt> Ord for Partition<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.total_cmp(&other.priority)
    }
}

/// Largest number of distinct complete matchings for small instances, so the
/// search stops instead of draining an exhausted solution space.
fn distinct_cap(max_dim: usize, requested: usize) -> usize {
    match max_dim {
        1 => 1,
        2 => 2,
        3 => 6,
        4 => 24,
        _ => requested,
    }
}

fn objective_value<I: UnsignedInt>(
    matching: &Matching<I>,
    weights: &WeightMatrix,
    column_bound: Option<usize>,
) -> f64 {
    let mut value = 0.;
    for edge in matching.edges() {
        let row: usize = edge.row.as_();
        let column: usize = edge.column.as_();
        if let Some(bound) = column_bound {
            if column >= bound {
                continue;
            }
        }
        value += weights.at(row, column);
    }
    value
}

///
/// Ranked enumeration of complete matchings by Murty partitioning.
///
/// Repeatedly pops the best partition off a priority queue, emits its
/// matching as the next rank and splits the remainder of its region into
/// disjoint child partitions, one single-best solve per child.
///
pub struct MurtyRanker {
    config: RankConfig,
}

impl MurtyRanker {
    pub fn new(config: RankConfig) -> MurtyRanker {
        MurtyRanker { config }
    }

    /// Returns up to `count` distinct complete matchings of `weights`, best
    /// first. The list is shorter than `count` when fewer matchings exist.
    /// An infeasible root instance yields an empty list, a malformed `count`
    /// or column bound is an error, and solver failures propagate.
    pub fn rank<I, S>(
        &self,
        solver: &mut S,
        weights: &WeightMatrix,
        count: usize,
    ) -> Result<Vec<RankedMatching<I>>>
    where
        I: UnsignedInt,
        S: AssignmentSolver<I>,
    {
        let num_rows = weights.num_rows();
        let num_cols = weights.num_cols();
        ensure!(count > 0, "requested count must be positive");
        if let Some(bound) = self.config.column_bound {
            ensure!(
                bound <= num_cols,
                "column bound {} exceeds {} columns",
                bound,
                num_cols
            );
        }

        // single-cell instance bypasses the partition search; a zero weight
        // keeps its historical reading as "no edge"
        if num_rows == 1 && num_cols == 1 {
            let w = weights.at(0, 0);
            if w == 0. || !w.is_finite() {
                return Ok(Vec::new());
            }
            let mut matching = Matching::with_capacity(1);
            matching.push(Edge {
                row: I::zero(),
                column: I::zero(),
                weight: w,
            });
            let value = objective_value(&matching, weights, self.config.column_bound);
            return Ok(vec![RankedMatching { matching, value }]);
        }

        let kbest = count.min(distinct_cap(num_rows.max(num_cols), count));
        let direction = self.config.direction;

        let root_matching = match solver.solve(weights, direction)? {
            Some(matching) => matching,
            None => return Ok(Vec::new()),
        };
        let mut queue = BinaryHeap::with_capacity(kbest * num_rows);
        queue.push(self.partition(weights.clone(), root_matching, weights));

        let mut ranked: Vec<RankedMatching<I>> = Vec::with_capacity(kbest);
        while ranked.len() < kbest {
            let mut current = match queue.pop() {
                Some(partition) => partition,
                None => break, // solution space exhausted
            };
            trace!(
                "rank {}: value {} pairs {:?}",
                ranked.len(),
                current.value,
                current.matching.pairs()
            );

            // Split the rest of the region: branch e explores "edges 0..e-1
            // mandatory, edge e forbidden", which partitions the remaining
            // solution space without overlap.
            for e in 0..current.matching.len() {
                let edge = current.matching.edges()[e];
                let row: usize = edge.row.as_();
                let column: usize = edge.column.as_();
                if let Some(bound) = self.config.column_bound {
                    if !self.config.branch_beyond_bound && column >= bound {
                        continue;
                    }
                }

                let mut child_matrix = current.matrix.clone();
                child_matrix.lock(row, column);
                if let Some(child_matching) = solver.solve(&child_matrix, direction)? {
                    queue.push(self.partition(child_matrix, child_matching, weights));
                }
                // infeasible children are dropped: that branch is empty

                // force this edge for the remaining sibling branches
                current.matrix.force(row, column, weights.at(row, column));
            }

            ranked.push(RankedMatching {
                matching: current.matching,
                value: current.value,
            });
        }
        Ok(ranked)
    }

    fn partition<I: UnsignedInt>(
        &self,
        matrix: WeightMatrix,
        mut matching: Matching<I>,
        original: &WeightMatrix,
    ) -> Partition<I> {
        matching.sort_by_row();
        let value = objective_value(&matching, original, self.config.column_bound);
        let priority = if self.config.direction.is_maximize() {
            value
        } else {
            -value
        };
        Partition {
            matrix,
            matching,
            value,
            priority,
        }
    }
}

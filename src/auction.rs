use crate::matching::{Edge, Matching, UnsignedInt};
use crate::matrix::WeightMatrix;
use crate::solver::{AssignmentSolver, Direction};
use anyhow::{anyhow as anyhow_error, Result};
use num_traits::AsPrimitive;
use num_iter;
use tracing::trace;

/// Raw row/column ownership state of one auction run.
#[derive(Clone, Debug)]
struct AuctionState<I: UnsignedInt> {
    /// index i gives the column owned by row i, `I::MAX` when unassigned
    row_to_column: Vec<I>,
    /// index j gives the row owning column j, `I::MAX` when unassigned
    column_to_row: Vec<I>,
    /// number of rows without a column
    num_unassigned: I,
    eps: f64,
}

///
/// Forward auction solver over dense weight matrices.
///
/// Rows bid for the columns with the best net profit (weight minus price);
/// prices rise by at least eps per successful bid. Symmetric instances run
/// eps-scaling, asymmetric (rows < columns) instances start directly at the
/// target eps. Forbidden matrix cells contribute no arcs. For integer-valued
/// weights the returned matching is optimal once eps drops below 1/(n + 1).
///
#[derive(Clone)]
pub struct ForwardAuctionSolver<I: UnsignedInt> {
    num_rows: I,
    num_cols: I,
    prices: Vec<f64>,
    // CSR scratch rebuilt from the dense matrix on every solve
    i_starts_stops: Vec<I>,
    j_counts: Vec<I>,
    column_indices: Vec<I>,
    values: Vec<f64>,

    max_iterations: u32,

    pub nits: u32,
    pub nreductions: u32,

    best_bids: Vec<f64>,
    best_bidders: Vec<I>,

    // assignment storage
    unassigned_rows: Vec<I>,
    row_to_assignment_idx: Vec<I>,
}

impl<I: UnsignedInt> ForwardAuctionSolver<I> {
    const REDUCTION_FACTOR: f64 = 0.15;
    const MAX_ITERATIONS: u32 = 100_000;

    pub fn new(row_capacity: usize, column_capacity: usize, arcs_capacity: usize) -> Self {
        Self {
            num_rows: I::zero(),
            num_cols: I::zero(),
            prices: Vec::with_capacity(column_capacity),
            i_starts_stops: Vec::with_capacity(row_capacity + 1),
            j_counts: Vec::with_capacity(row_capacity),
            column_indices: Vec::with_capacity(arcs_capacity),
            values: Vec::with_capacity(arcs_capacity),

            max_iterations: Self::MAX_ITERATIONS,

            nits: 0,
            nreductions: 0,

            best_bids: Vec::with_capacity(column_capacity),
            best_bidders: Vec::with_capacity(column_capacity),

            unassigned_rows: Vec::with_capacity(row_capacity),
            row_to_assignment_idx: Vec::with_capacity(row_capacity),
        }
    }

    /// Rebuilds the CSR scratch from the dense matrix, skipping forbidden
    /// cells. Returns `false` when some row has no open cell, which makes the
    /// instance infeasible without running the auction.
    fn load(&mut self, weights: &WeightMatrix, direction: Direction) -> Result<bool> {
        let num_rows = weights.num_rows();
        let num_cols = weights.num_cols();
        self.num_rows = I::from_usize(num_rows)
            .ok_or_else(|| anyhow_error!("row count {} exceeds index type", num_rows))?;
        self.num_cols = I::from_usize(num_cols)
            .ok_or_else(|| anyhow_error!("column count {} exceeds index type", num_cols))?;

        self.i_starts_stops.clear();
        self.i_starts_stops.push(I::zero());
        self.j_counts.clear();
        self.column_indices.clear();
        self.values.clear();

        let flip = !direction.is_maximize();
        for row in 0..num_rows {
            let mut arcs_in_row = I::zero();
            for column in 0..num_cols {
                let w = weights.at(row, column);
                if !w.is_finite() {
                    continue;
                }
                // column < num_cols which fits the index type
                self.column_indices.push(I::from_usize(column).unwrap());
                self.values.push(if flip { -w } else { w });
                arcs_in_row += I::one();
            }
            if arcs_in_row == I::zero() {
                trace!("row {} has no open cells", row);
                return Ok(false);
            }
            let cumulative_offset = self.i_starts_stops[row]
                .checked_add(&arcs_in_row)
                .ok_or_else(|| anyhow_error!("arc count exceeds index type"))?;
            self.i_starts_stops.push(cumulative_offset);
            self.j_counts.push(arcs_in_row);
        }
        Ok(true)
    }

    fn toleration(&self, max_abs_value: f64) -> f64 {
        1.0 / 2_u64.pow(f64::MANTISSA_DIGITS - (max_abs_value + 1e-7).log2() as u32) as f64
    }

    fn search(&mut self, state: &mut AuctionState<I>) {
        let num_rows_usize: usize = self.num_rows.as_();
        let num_cols_usize: usize = self.num_cols.as_();
        let float_num_rows: f64 = self.num_rows.as_();
        let target_eps = 1.0 / (float_num_rows + 1.0);

        self.nits = 0;
        self.nreductions = 0;

        self.prices.clear();
        self.prices.resize(num_cols_usize, 0.);
        self.best_bids.clear();
        self.best_bids.resize(num_cols_usize, f64::NEG_INFINITY);
        self.best_bidders.clear();
        self.best_bidders.resize(num_cols_usize, I::max_value());

        self.unassigned_rows.clear();
        self.unassigned_rows
            .extend(num_iter::range(I::zero(), self.num_rows));
        self.row_to_assignment_idx.clear();
        self.row_to_assignment_idx
            .extend(num_iter::range(I::zero(), self.num_rows));

        state.row_to_column.clear();
        state.row_to_column.resize(num_rows_usize, I::max_value());
        state.column_to_row.clear();
        state.column_to_row.resize(num_cols_usize, I::max_value());
        state.num_unassigned = self.num_rows;

        // C = max |aij| over all arcs
        let c = self.values.iter().fold(0_f64, |acc, x| acc.max(x.abs()));
        let toleration = self.toleration(c);
        trace!("c: {}, toleration: {:e}", c, toleration);

        // Forward auction alone cannot run eps-scaling on asymmetric
        // instances, so those start from the target eps.
        let start_from_optimal_eps = self.num_rows != self.num_cols;
        state.eps = if start_from_optimal_eps {
            target_eps - f64::EPSILON
        } else {
            (c / 2.0).max(target_eps)
        };

        loop {
            self.bid_and_assign(state);
            self.nits += 1;

            if state.num_unassigned == I::zero() {
                let is_optimal = start_from_optimal_eps
                    || self.ecs_satisfied(state.row_to_column.as_slice(), target_eps, toleration);
                if is_optimal {
                    break;
                }
                if state.eps < target_eps {
                    // terminate, shown to be optimal for eps below 1/n
                    break;
                }

                state.eps *= Self::REDUCTION_FACTOR;
                trace!("REDUCTION: eps {}", state.eps);

                // reset all trackers of rows and columns, keep prices
                state
                    .row_to_column
                    .iter_mut()
                    .for_each(|c_ref| *c_ref = I::max_value());
                state
                    .column_to_row
                    .iter_mut()
                    .for_each(|r_ref| *r_ref = I::max_value());
                state.num_unassigned = self.num_rows;
                let mut range = num_iter::range(I::zero(), self.num_rows);
                self.unassigned_rows
                    .iter_mut()
                    .for_each(|slot| *slot = range.next().unwrap());
                let mut range = num_iter::range(I::zero(), self.num_rows);
                self.row_to_assignment_idx
                    .iter_mut()
                    .for_each(|slot| *slot = range.next().unwrap());

                self.nreductions += 1;
            }

            if self.nits >= self.max_iterations {
                // unresolved contention, reported as infeasible by the caller
                break;
            }

            // Finite prices cannot climb past this bound while a complete
            // matching exists; monopoly bids are infinite and exempt.
            let price_threshold = (float_num_rows + 1.0) * (c + state.eps + 1.0) * 10.0;
            if self
                .prices
                .iter()
                .any(|p| p.is_finite() && *p > price_threshold)
            {
                trace!("price threshold {} exceeded", price_threshold);
                break;
            }
        }
    }

    fn bid_and_assign(&mut self, state: &mut AuctionState<I>) {
        // number of bids to be made
        let num_bidders: usize = state.num_unassigned.as_();
        let mut bidders = vec![I::max_value(); num_bidders];
        let mut columns_bidded = vec![I::max_value(); num_bidders];
        let mut bids = vec![f64::NEG_INFINITY; num_bidders];

        // BIDDING PHASE
        // each unassigned row makes a bid:
        for nbidder in 0..num_bidders {
            let i: I = self.unassigned_rows[nbidder];
            let i_usize: usize = i.as_();
            let num_columns: usize = self.j_counts[i_usize].as_();
            // in flattened index format, the starting index of this row's arcs
            let start: usize = self.i_starts_stops[i_usize].as_();

            let mut jbest = I::zero();
            let mut best_edge_value = f64::NEG_INFINITY;
            // best net profit
            let mut max_profit = f64::NEG_INFINITY;
            // second best net profit
            let mut second_max_profit = f64::NEG_INFINITY;
            for idx in 0..num_columns {
                let glob_idx = start + idx;
                let j: I = self.column_indices[glob_idx];
                let j_usize: usize = j.as_();
                let edge_value = self.values[glob_idx];
                let profit = edge_value - self.prices[j_usize];
                if profit > max_profit {
                    jbest = j;
                    second_max_profit = max_profit;
                    max_profit = profit;
                    best_edge_value = edge_value;
                } else if profit > second_max_profit {
                    second_max_profit = profit;
                }
            }

            // bid high enough to beat the second best alternative
            let bbest = best_edge_value - second_max_profit + state.eps;

            bidders[nbidder] = i;
            bids[nbidder] = bbest;
            columns_bidded[nbidder] = jbest;
        }

        let mut num_successful_bids = 0;

        for n in 0..num_bidders {
            let i = bidders[n];
            let bid_val = bids[n];
            let jbid: usize = columns_bidded[n].as_();
            if bid_val > self.best_bids[jbid] {
                // if beats current best bid for this column
                if self.best_bidders[jbid] == I::max_value() {
                    // if not overwriting existing bid, increment bid counter
                    num_successful_bids += 1;
                }

                self.best_bids[jbid] = bid_val;
                self.best_bidders[jbid] = i;
            }
        }
        trace!("best_bidders {:?}", self.best_bidders);
        trace!("best_bids {:?}", self.best_bids);

        // ASSIGNMENT PHASE
        let mut rows_to_unassign_ctr = I::zero();
        let mut rows_to_assign_ctr = I::zero();
        let mut bid_ctr = 0;

        for j in num_iter::range(I::zero(), self.num_cols) {
            let j_usize: usize = j.as_();
            let i = self.best_bidders[j_usize];
            if i != I::max_value() {
                self.prices[j_usize] = self.best_bids[j_usize];
                let i_usize: usize = i.as_();
                let assignment_idx: I = self.row_to_assignment_idx[i_usize];
                let assignment_idx_usize: usize = assignment_idx.as_();

                // unassign previous owner of the column (if any)
                let prev_i = state.column_to_row[j_usize];
                if prev_i != I::max_value() {
                    rows_to_unassign_ctr += I::one();
                    let prev_i_usize: usize = prev_i.as_();
                    state.row_to_column[prev_i_usize] = I::max_value();

                    // let the old row take the new row's place in the
                    // unassigned list for faster reading
                    self.row_to_assignment_idx[i_usize] = I::max_value();
                    self.row_to_assignment_idx[prev_i_usize] = assignment_idx;
                    self.unassigned_rows[assignment_idx_usize] = prev_i;
                } else {
                    self.unassigned_rows[assignment_idx_usize] = I::max_value();
                    self.row_to_assignment_idx[i_usize] = I::max_value();
                }

                // make new assignment
                rows_to_assign_ctr += I::one();
                state.row_to_column[i_usize] = j;
                state.column_to_row[j_usize] = i;

                // bid has been processed, reset the best bid store
                self.best_bidders[j_usize] = I::max_value();
                self.best_bids[j_usize] = f64::NEG_INFINITY;

                bid_ctr += 1;
                if bid_ctr >= num_successful_bids {
                    break;
                }
            }
        }
        state.num_unassigned += rows_to_unassign_ctr;
        state.num_unassigned -= rows_to_assign_ctr;
        push_all_left(
            &mut self.unassigned_rows,
            &mut self.row_to_assignment_idx,
            state.num_unassigned,
            self.num_rows,
        );

        trace!("row_to_column: {:?}", state.row_to_column);
        trace!("unassigned_rows: {:?}", self.unassigned_rows);
        trace!("prices: {:?}", self.prices);
    }

    /// Returns true if the eps-complementary slackness condition holds:
    /// for all arcs k of a row, max (a_ik - p_k) - eps <= a_ij - p_j + tol,
    /// where j is the row's chosen column.
    fn ecs_satisfied(&self, row_to_column: &[I], eps: f64, toleration: f64) -> bool {
        for i in num_iter::range(I::zero(), self.num_rows) {
            let i_usize: usize = i.as_();
            let num_columns: usize = self.j_counts[i_usize].as_();
            let start: usize = self.i_starts_stops[i_usize].as_();
            let j = row_to_column[i_usize];

            let mut chosen_value = f64::NEG_INFINITY;
            for idx in 0..num_columns {
                let glob_idx = start + idx;
                if self.column_indices[glob_idx] == j {
                    chosen_value = self.values[glob_idx];
                }
            }

            let j_usize: usize = j.as_();
            let lhs = chosen_value - self.prices[j_usize] + toleration;

            for idx in 0..num_columns {
                let glob_idx = start + idx;
                let k: usize = self.column_indices[glob_idx].as_();
                let value = self.values[glob_idx];
                if lhs < value - self.prices[k] - eps {
                    trace!("ECS CONDITION is not met");
                    return false;
                }
            }
        }
        trace!("ECS CONDITION met");
        true
    }
}

impl<I: UnsignedInt> AssignmentSolver<I> for ForwardAuctionSolver<I> {
    fn solve(
        &mut self,
        weights: &WeightMatrix,
        direction: Direction,
    ) -> Result<Option<Matching<I>>, anyhow::Error> {
        if !self.load(weights, direction)? {
            return Ok(None);
        }

        let mut state = AuctionState {
            row_to_column: Vec::with_capacity(weights.num_rows()),
            column_to_row: Vec::with_capacity(weights.num_cols()),
            num_unassigned: self.num_rows,
            eps: f64::NAN,
        };
        self.search(&mut state);

        if state.num_unassigned > I::zero() {
            trace!("auction left {} rows unassigned", state.num_unassigned);
            return Ok(None);
        }

        let mut matching = Matching::with_capacity(weights.num_rows());
        for i in num_iter::range(I::zero(), self.num_rows) {
            let i_usize: usize = i.as_();
            let j = state.row_to_column[i_usize];
            let j_usize: usize = j.as_();
            matching.push(Edge {
                row: i,
                column: j,
                weight: weights.at(i_usize, j_usize),
            });
        }
        Ok(Some(matching))
    }
}

fn push_all_left<I: UnsignedInt>(data: &mut [I], mapper: &mut [I], num_ints: I, size: I) {
    // Given a slice of valid indices and empty slots (I::MAX), arrange so that
    // all valid indices sit at the start. Updates mapper in tandem: the ith
    // entry gives the position of index i inside data. All inplace.
    if num_ints.is_zero() {
        return;
    }

    let mut left_track = I::zero(); // cursor on left hand side of partition
    let mut right_track = num_ints; // cursor on right hand side of partition

    while left_track < num_ints {
        let left_track_usize: usize = left_track.as_();
        if data[left_track_usize] == I::max_value() {
            // empty slot: move the right cursor to the next valid index
            while data[AsPrimitive::<usize>::as_(right_track)] == I::max_value() && right_track < size {
                right_track += I::one();
            }

            let right_track_usize: usize = right_track.as_();
            let i = data[right_track_usize];
            data[left_track_usize] = i;
            data[right_track_usize] = I::max_value();
            mapper[AsPrimitive::<usize>::as_(i)] = left_track;
        }

        left_track += I::one();
    }
}

#[cfg(test)]
mod tests {
    use super::{push_all_left, ForwardAuctionSolver};
    use crate::matrix::{WeightMatrix, FORBIDDEN};
    use crate::solver::{AssignmentSolver, Direction};
    use rand::distributions::{Distribution, Uniform};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn init() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    /// Best achievable total over all complete matchings, by enumeration.
    /// `None` when no complete matching exists.
    fn brute_force_best(weights: &WeightMatrix, direction: Direction) -> Option<f64> {
        fn recurse(
            weights: &WeightMatrix,
            direction: Direction,
            row: usize,
            used: &mut Vec<bool>,
            total: f64,
            best: &mut Option<f64>,
        ) {
            if row == weights.num_rows() {
                let better = match *best {
                    None => true,
                    Some(b) => {
                        if direction.is_maximize() {
                            total > b
                        } else {
                            total < b
                        }
                    }
                };
                if better {
                    *best = Some(total);
                }
                return;
            }
            for c in 0..weights.num_cols() {
                if !used[c] && weights.is_open(row, c) {
                    used[c] = true;
                    recurse(weights, direction, row + 1, used, total + weights.at(row, c), best);
                    used[c] = false;
                }
            }
        }

        let mut best = None;
        let mut used = vec![false; weights.num_cols()];
        recurse(weights, direction, 0, &mut used, 0., &mut best);
        best
    }

    fn solve_total(weights: &WeightMatrix, direction: Direction) -> Option<f64> {
        let mut solver: ForwardAuctionSolver<u32> =
            ForwardAuctionSolver::new(weights.num_rows(), weights.num_cols(), weights.values().len());
        let matching = solver.solve(weights, direction).unwrap()?;
        assert_eq!(matching.len(), weights.num_rows());
        Some(matching.edges().iter().map(|e| e.weight).sum())
    }

    #[test]
    fn test_push_all_left() {
        const NONE: u16 = u16::MAX;
        let mut arr = [NONE, 1, 2, 3, NONE, NONE];
        let mut mapper = [NONE, 1, 2, 3];
        push_all_left::<u16>(&mut arr, &mut mapper, 3, 3);
        assert_eq!(arr, [3, 1, 2, NONE, NONE, NONE]);
    }

    #[test]
    fn finds_optimal_assignment_3x3() {
        init();
        let weights =
            WeightMatrix::from_rows(&[vec![7., 2., 1.], vec![2., 8., 4.], vec![3., 6., 9.]])
                .unwrap();
        let mut solver: ForwardAuctionSolver<u32> = ForwardAuctionSolver::new(3, 3, 9);
        let matching = solver
            .solve(&weights, Direction::Maximize)
            .unwrap()
            .expect("feasible instance");
        assert_eq!(matching.pairs(), [(0, 0), (1, 1), (2, 2)]);
        let total: f64 = matching.edges().iter().map(|e| e.weight).sum();
        assert_eq!(total, 24.);
    }

    #[test]
    fn minimize_picks_cheapest_assignment() {
        init();
        let weights =
            WeightMatrix::from_rows(&[vec![7., 2., 1.], vec![2., 8., 4.], vec![3., 6., 9.]])
                .unwrap();
        let total = solve_total(&weights, Direction::Minimize).expect("feasible instance");
        // two matchings tie at the cheapest total of 9
        assert_eq!(total, 9.);
    }

    #[test]
    fn rectangular_assignment_covers_all_rows() {
        init();
        let weights =
            WeightMatrix::from_rows(&[vec![1., 9., 3., 2.], vec![8., 9., 1., 4.]]).unwrap();
        let mut solver: ForwardAuctionSolver<u32> = ForwardAuctionSolver::new(2, 4, 8);
        let matching = solver
            .solve(&weights, Direction::Maximize)
            .unwrap()
            .expect("feasible instance");
        assert_eq!(matching.pairs(), [(0, 1), (1, 0)]);
    }

    #[test]
    fn forbidden_row_reports_infeasible() {
        init();
        let weights =
            WeightMatrix::from_rows(&[vec![1., 2.], vec![FORBIDDEN, FORBIDDEN]]).unwrap();
        assert!(solve_total(&weights, Direction::Maximize).is_none());
    }

    #[test]
    fn contention_for_single_column_reports_infeasible() {
        init();
        let weights = WeightMatrix::from_rows(&[vec![3., FORBIDDEN], vec![5., FORBIDDEN]]).unwrap();
        assert!(solve_total(&weights, Direction::Maximize).is_none());
    }

    #[test]
    fn overconstrained_columns_report_infeasible() {
        init();
        let weights = WeightMatrix::from_rows(&[
            vec![1., 2., FORBIDDEN],
            vec![2., 1., FORBIDDEN],
            vec![1., 1., FORBIDDEN],
        ])
        .unwrap();
        assert!(solve_total(&weights, Direction::Maximize).is_none());
    }

    #[test]
    fn agrees_with_exhaustive_on_random_integer_matrices() {
        init();
        const SIZE: usize = 5;
        let between = Uniform::from(1..31);
        for seed in 0..6u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let values: Vec<f64> = (0..SIZE * SIZE)
                .map(|_| between.sample(&mut rng) as f64)
                .collect();
            let weights = WeightMatrix::new(SIZE, SIZE, values).unwrap();

            for &direction in &[Direction::Maximize, Direction::Minimize] {
                let expected = brute_force_best(&weights, direction).unwrap();
                let actual = solve_total(&weights, direction).expect("feasible instance");
                assert_eq!(actual, expected, "seed {} {:?}", seed, direction);
            }
        }
    }
}

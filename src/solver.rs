use crate::matching::{Matching, UnsignedInt};
use crate::matrix::WeightMatrix;

/// Optimization sense of an assignment instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    #[inline]
    pub fn is_maximize(self) -> bool {
        matches!(self, Direction::Maximize)
    }
}

///
/// Capability to produce one optimal complete matching for a weight matrix.
///
/// `Ok(Some(matching))` covers every row with a distinct column. `Ok(None)`
/// reports infeasibility: no complete matching exists under the open cells of
/// the matrix. `Err` is reserved for solver failures unrelated to feasibility
/// and aborts any search built on top of the capability.
///
pub trait AssignmentSolver<I: UnsignedInt> {
    fn solve(
        &mut self,
        weights: &WeightMatrix,
        direction: Direction,
    ) -> Result<Option<Matching<I>>, anyhow::Error>;
}

//! M-best ranked solutions of dense rectangular linear assignment problems.
//!
//! The crate splits into the ranked-enumeration engine ([`ranking`]), which
//! produces the best, second best, ... complete matchings of an n×m weight
//! matrix (n ≤ m) by Murty partitioning, and a pluggable single-best solver
//! capability ([`solver`]) with a forward auction implementation
//! ([`auction`]). Each partition of the search costs one single-best solve;
//! forbidden cells are marked with an explicit sentinel so zero weights stay
//! legal.

pub mod auction;
pub mod matching;
pub mod matrix;
pub mod ranking;
pub mod solver;

pub use auction::ForwardAuctionSolver;
pub use matching::{Edge, Matching, UnsignedInt};
pub use matrix::{WeightMatrix, FORBIDDEN};
pub use ranking::{MurtyRanker, RankConfig, RankedMatching};
pub use solver::{AssignmentSolver, Direction};

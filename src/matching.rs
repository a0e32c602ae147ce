use num_traits::{AsPrimitive, FromPrimitive, NumAssign, PrimInt, Unsigned};
use std::fmt::{Debug, Display};

pub trait UnsignedInt:
    PrimInt
    + Unsigned
    + Display
    + Debug
    + AsPrimitive<usize>
    + AsPrimitive<f64>
    + FromPrimitive
    + NumAssign
{
}

impl<T> UnsignedInt for T where
    T: PrimInt
        + Unsigned
        + Display
        + Debug
        + AsPrimitive<usize>
        + AsPrimitive<f64>
        + FromPrimitive
        + NumAssign
{
}

/// One matched (row, column) pair together with the weight in effect for the
/// matrix it was solved on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge<I: UnsignedInt> {
    pub row: I,
    pub column: I,
    pub weight: f64,
}

///
/// Complete one-to-one matching of rows onto distinct columns.
///
/// Canonical order is ascending by row index; solvers are expected to emit
/// edges that way and [`Matching::sort_by_row`] restores it otherwise.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Matching<I>
where
    I: UnsignedInt,
{
    edges: Vec<Edge<I>>,
}

impl<I> Matching<I>
where
    I: UnsignedInt,
{
    pub fn with_capacity(row_capacity: usize) -> Matching<I> {
        Matching {
            edges: Vec::with_capacity(row_capacity),
        }
    }

    pub fn push(&mut self, edge: Edge<I>) {
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[Edge<I>] {
        self.edges.as_slice()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn sort_by_row(&mut self) {
        self.edges.sort_by_key(|e| e.row);
    }

    /// The matched (row, column) pairs, i.e. the identity of this matching.
    pub fn pairs(&self) -> Vec<(I, I)> {
        self.edges.iter().map(|e| (e.row, e.column)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Edge, Matching};

    #[test]
    fn sorts_edges_into_row_order() {
        let mut matching: Matching<u32> = Matching::with_capacity(3);
        matching.push(Edge {
            row: 2,
            column: 0,
            weight: 1.,
        });
        matching.push(Edge {
            row: 0,
            column: 2,
            weight: 2.,
        });
        matching.push(Edge {
            row: 1,
            column: 1,
            weight: 3.,
        });
        matching.sort_by_row();
        assert_eq!(matching.pairs(), [(0, 2), (1, 1), (2, 0)]);
    }
}

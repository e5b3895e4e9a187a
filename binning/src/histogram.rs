use crate::error::BinningError;
use ndarray::{Array1, Array2};
use ndarray_stats::histogram::{Bins, Edges};
use noisy_float::types::N64;
use tracing::warn;

/// One histogram axis. Bins are closed on the left, except the last one
/// which also contains its upper edge.
#[derive(Clone, Debug)]
pub struct Axis {
    bins: Bins<N64>,
    edges: Vec<f64>,
}

impl Axis {
    pub fn new(edges: &[f64]) -> Result<Self, BinningError> {
        let edges = edges
            .iter()
            .map(|&e| {
                N64::try_new(e).ok_or_else(|| BinningError::InvalidEdges(format!("edge {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Sorts and drops repeated edges, so degenerate bins disappear.
        let edges = Edges::from(edges);
        if edges.len() < 2 {
            return Err(BinningError::InvalidEdges(
                "at least two distinct edges are needed".to_owned(),
            ));
        }
        let raw = (0..edges.len()).map(|i| edges[i].raw()).collect();
        Ok(Self {
            bins: Bins::new(edges),
            edges: raw,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn lower_edges(&self) -> Vec<f64> {
        self.edges[..self.edges.len() - 1].to_vec()
    }

    pub fn upper_edges(&self) -> Vec<f64> {
        self.edges[1..].to_vec()
    }

    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    pub fn widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn index_of(&self, value: f64) -> Option<usize> {
        let value = N64::try_new(value)?;
        self.bins.index_of(&value).or_else(|| {
            (value.raw() == self.edges[self.edges.len() - 1]).then(|| self.num_bins() - 1)
        })
    }
}

pub fn histogram1d(values: &[f64], axis: &Axis) -> Array1<u64> {
    let mut counts = Array1::zeros(axis.num_bins());
    let mut outside = 0;
    for &value in values {
        match axis.index_of(value) {
            Some(i) => counts[i] += 1,
            None => outside += 1,
        }
    }
    if outside > 0 {
        warn!("{outside} values outside the binning");
    }
    counts
}

/// Counts indexed by `[x bin, y bin]`.
pub fn histogram2d(x: &[f64], y: &[f64], x_axis: &Axis, y_axis: &Axis) -> Array2<u64> {
    let mut counts = Array2::zeros((x_axis.num_bins(), y_axis.num_bins()));
    let mut outside = 0;
    for (&x, &y) in x.iter().zip(y) {
        match (x_axis.index_of(x), y_axis.index_of(y)) {
            (Some(i), Some(j)) => counts[[i, j]] += 1,
            _ => outside += 1,
        }
    }
    if outside > 0 {
        warn!("{outside} points outside the binning");
    }
    counts
}

pub fn poisson_errors(counts: &[u64]) -> Vec<f64> {
    counts.iter().map(|&n| (n as f64).sqrt()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn last_bin_is_closed() {
        let axis = Axis::new(&[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(axis.index_of(0.0), Some(0));
        assert_eq!(axis.index_of(1.0), Some(1));
        assert_eq!(axis.index_of(2.0), Some(1));
        assert_eq!(axis.index_of(2.5), None);
        assert_eq!(axis.index_of(-0.1), None);
        assert_eq!(axis.index_of(f64::NAN), None);
    }

    #[test]
    fn repeated_edges_collapse() {
        let axis = Axis::new(&[0.0, 1.0, 1.0, 3.0]).unwrap();
        assert_eq!(axis.edges(), &[0.0, 1.0, 3.0]);
        assert_eq!(axis.centers(), vec![0.5, 2.0]);
        assert_eq!(axis.widths(), vec![1.0, 2.0]);
    }

    #[test]
    fn single_edge_rejected() {
        assert!(Axis::new(&[1.0, 1.0]).is_err());
        assert!(Axis::new(&[0.0, f64::NAN]).is_err());
    }

    #[test]
    fn one_and_two_dimensional_counts() {
        let axis = Axis::new(&[0.0, 1.0, 2.0]).unwrap();
        let counts = histogram1d(&[0.1, 0.2, 1.5, 2.0, 7.0], &axis);
        assert_eq!(counts, array![2, 2]);

        let counts = histogram2d(&[0.5, 1.5, 1.5], &[0.5, 0.5, 1.9], &axis, &axis);
        assert_eq!(counts, array![[1, 0], [1, 1]]);
    }
}

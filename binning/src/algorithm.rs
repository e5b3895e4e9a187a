//! Bin-edge construction shared by the time, energy and phase axes.

use crate::error::BinningError;
use std::{fs, path::Path, str::FromStr};
use strum::{Display, EnumString};
use tracing::debug;
use xpol_common::linspace;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BinningAlgorithm {
    /// Linearly spaced edges.
    Lin,
    /// Logarithmically spaced edges.
    Log,
    /// Equal-population edges taken from the data.
    Eqp,
    /// Edges read from a text file.
    File,
}

impl BinningAlgorithm {
    /// Parses an algorithm name given for `option`; unknown names are fatal.
    pub fn parse(option: &'static str, name: &str) -> Result<Self, BinningError> {
        Self::from_str(name).map_err(|_| BinningError::UnsupportedAlgorithm {
            option,
            name: name.to_owned(),
        })
    }
}

/// Everything an algorithm might need to produce edges for one axis.
pub struct EdgeSpec<'a> {
    /// Name of the algorithm option, used in diagnostics.
    pub option: &'static str,
    pub algorithm: BinningAlgorithm,
    pub min: f64,
    pub max: f64,
    pub bins: usize,
    /// Column the equal-population edges are computed from.
    pub values: &'a [f64],
    pub file: Option<&'a Path>,
}

impl EdgeSpec<'_> {
    pub fn edges(&self) -> Result<Vec<f64>, BinningError> {
        let edges = match self.algorithm {
            BinningAlgorithm::Lin => {
                self.check_range()?;
                linspace(self.min, self.max, self.bins + 1)
            }
            BinningAlgorithm::Log => {
                self.check_range()?;
                if self.min <= 0.0 {
                    return Err(BinningError::InvalidOption {
                        option: self.option,
                        reason: format!("LOG binning needs a positive minimum, found {}", self.min),
                    });
                }
                linspace(self.min.log10(), self.max.log10(), self.bins + 1)
                    .into_iter()
                    .map(|x| 10f64.powf(x))
                    .collect()
            }
            BinningAlgorithm::Eqp => {
                self.check_range()?;
                equal_population_edges(self.values, self.min, self.max, self.bins)
                    .ok_or(BinningError::EmptySelection(self.option))?
            }
            BinningAlgorithm::File => {
                let path = self.file.ok_or(BinningError::MissingOption {
                    option: self.option,
                    reason: "FILE binning needs a bin edges file",
                })?;
                read_edges(path)?
            }
        };
        debug!("{} {} edges: {edges:?}", self.option, self.algorithm);
        Ok(edges)
    }

    fn check_range(&self) -> Result<(), BinningError> {
        if self.bins == 0 {
            return Err(BinningError::InvalidOption {
                option: self.option,
                reason: "number of bins must be positive".to_owned(),
            });
        }
        if !(self.min < self.max) {
            return Err(BinningError::InvalidOption {
                option: self.option,
                reason: format!("empty range [{}, {}]", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// Edges splitting the values in `[min, max]` into `bins` groups of equal size.
///
/// Inner edges are the sorted values at positions `floor(i * n / bins)`; the
/// outer edges are `min` and `max`. Returns `None` if no value is in range.
pub fn equal_population_edges(values: &[f64], min: f64, max: f64, bins: usize) -> Option<Vec<f64>> {
    let mut selected = values
        .iter()
        .copied()
        .filter(|v| (min..=max).contains(v))
        .collect::<Vec<_>>();
    if selected.is_empty() {
        return None;
    }
    selected.sort_by(f64::total_cmp);
    let n = selected.len();
    let mut edges = Vec::with_capacity(bins + 1);
    edges.push(min);
    edges.extend((1..bins).map(|i| selected[i * n / bins]));
    edges.push(max);
    Some(edges)
}

/// Whitespace-separated list of numbers.
pub fn read_edges(path: &Path) -> Result<Vec<f64>, BinningError> {
    let text = fs::read_to_string(path).map_err(|source| BinningError::EdgesFile {
        path: path.to_owned(),
        source,
    })?;
    text.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| BinningError::EdgesParse {
                path: path.to_owned(),
                token: token.to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{Axis, histogram1d};
    use assert_approx_eq::assert_approx_eq;

    fn edges_for(algorithm: BinningAlgorithm, values: &[f64]) -> EdgeSpec<'_> {
        EdgeSpec {
            option: "ebinalg",
            algorithm,
            min: 1.0,
            max: 100.0,
            bins: 2,
            values,
            file: None,
        }
    }

    #[test]
    fn parse_known_and_unknown_names() {
        assert_eq!(
            BinningAlgorithm::parse("tbinalg", "LIN").unwrap(),
            BinningAlgorithm::Lin
        );
        assert_eq!(
            BinningAlgorithm::parse("tbinalg", "EQP").unwrap(),
            BinningAlgorithm::Eqp
        );
        assert!(matches!(
            BinningAlgorithm::parse("tbinalg", "CUBIC"),
            Err(BinningError::UnsupportedAlgorithm { option: "tbinalg", .. })
        ));
    }

    #[test]
    fn linear_edges() {
        let edges = edges_for(BinningAlgorithm::Lin, &[]).edges().unwrap();
        assert_eq!(edges, vec![1.0, 50.5, 100.0]);
    }

    #[test]
    fn log_edges_are_powers() {
        let edges = edges_for(BinningAlgorithm::Log, &[]).edges().unwrap();
        assert_eq!(edges.len(), 3);
        assert_approx_eq!(edges[0], 1.0);
        assert_approx_eq!(edges[1], 10.0);
        assert_approx_eq!(edges[2], 100.0);
    }

    #[test]
    fn log_edges_need_positive_minimum() {
        let mut edge_spec = edges_for(BinningAlgorithm::Log, &[]);
        edge_spec.min = 0.0;
        assert!(matches!(
            edge_spec.edges(),
            Err(BinningError::InvalidOption { option: "ebinalg", .. })
        ));
    }

    #[test]
    fn equal_population_inner_edges() {
        let values = (0..10).map(|i| 2.0 + i as f64).collect::<Vec<_>>();
        let edges = equal_population_edges(&values, 1.0, 100.0, 3).unwrap();
        assert_eq!(edges, vec![1.0, 5.0, 8.0, 100.0]);
    }

    #[test]
    fn equal_population_bins_hold_floor_or_ceil_events() {
        let values = (0..103)
            .map(|i| 10.0 * (0.37 * i as f64).sin())
            .collect::<Vec<_>>();
        let edges = equal_population_edges(&values, -10.0, 10.0, 7).unwrap();
        let counts = histogram1d(&values, &Axis::new(&edges).unwrap());
        assert_eq!(counts.sum(), 103);
        for &n in &counts {
            assert!(n == 14 || n == 15, "bin holds {n} events");
        }
    }

    #[test]
    fn equal_population_with_nothing_in_range() {
        let values = [200.0, 300.0];
        assert!(matches!(
            edges_for(BinningAlgorithm::Eqp, &values).edges(),
            Err(BinningError::EmptySelection("ebinalg"))
        ));
    }

    #[test]
    fn file_binning_without_file_is_fatal() {
        assert!(matches!(
            edges_for(BinningAlgorithm::File, &[]).edges(),
            Err(BinningError::MissingOption { option: "ebinalg", .. })
        ));
    }

    #[test]
    fn file_binning_reads_whitespace_separated_values() {
        let path = std::env::temp_dir().join("xpol_binning_edges.txt");
        fs::write(&path, "1.0 2.5\n4\t8.0\n").unwrap();
        let mut edge_spec = edges_for(BinningAlgorithm::File, &[]);
        edge_spec.file = Some(path.as_path());
        let edges = edge_spec.edges().unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(edges, vec![1.0, 2.5, 4.0, 8.0]);
    }

    #[test]
    fn file_binning_rejects_garbage() {
        let path = std::env::temp_dir().join("xpol_binning_bad_edges.txt");
        fs::write(&path, "1.0 two 3.0").unwrap();
        let result = read_edges(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(
            result,
            Err(BinningError::EdgesParse { token, .. }) if token == "two"
        ));
    }
}

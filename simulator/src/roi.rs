//! Region-of-interest model: an insertion-ordered registry of source components.

use crate::source::{SourceComponent, SourceError};
use rand::RngCore;
use std::fmt;
use thiserror::Error;
use tracing::{info, instrument};
use xpol_common::{Degrees, EventList, EventListError, SourceId, Time, irf::ResponseFunctions};

#[derive(Debug, Error)]
pub enum RoiError {
    #[error("ROI model has no sources")]
    Empty,
    #[error("Source {0}: {1}")]
    Source(String, SourceError),
    #[error("Merging event lists: {0}")]
    EventList(#[from] EventListError),
}

#[derive(Clone, Debug)]
pub struct RoiModel {
    ra: Degrees,
    dec: Degrees,
    components: Vec<SourceComponent>,
    next_identifier: SourceId,
}

impl RoiModel {
    pub fn new(ra: Degrees, dec: Degrees) -> Self {
        Self {
            ra,
            dec,
            components: Vec::new(),
            next_identifier: 0,
        }
    }

    pub fn ra(&self) -> Degrees {
        self.ra
    }

    pub fn dec(&self) -> Degrees {
        self.dec
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &SourceComponent> {
        self.components.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SourceComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Registers a component and returns its identifier.
    ///
    /// A component whose name is already present replaces the old one in
    /// place, but still receives a fresh identifier: identifiers are never
    /// reused within a model.
    pub fn add_source(&mut self, mut component: SourceComponent) -> SourceId {
        let identifier = self.next_identifier;
        self.next_identifier += 1;
        component.set_identifier(identifier);
        match self
            .components
            .iter_mut()
            .find(|c| c.name == component.name)
        {
            Some(existing) => *existing = component,
            None => self.components.push(component),
        }
        identifier
    }

    pub fn add_sources(&mut self, components: impl IntoIterator<Item = SourceComponent>) {
        for component in components {
            self.add_source(component);
        }
    }

    /// Latest start among the components.
    pub fn min_time(&self) -> Result<Time, RoiError> {
        self.components
            .iter()
            .map(|c| c.min_time)
            .reduce(f64::max)
            .ok_or(RoiError::Empty)
    }

    /// Earliest end among the components.
    pub fn max_time(&self) -> Result<Time, RoiError> {
        self.components
            .iter()
            .map(|c| c.max_time)
            .reduce(f64::min)
            .ok_or(RoiError::Empty)
    }

    /// Generates every component in insertion order, then merges and
    /// time-sorts the result.
    #[instrument(skip_all, fields(num_sources = self.len()))]
    pub fn rvs_event_list(
        &self,
        irf: ResponseFunctions<'_>,
        times: &[Time],
        rng: &mut dyn RngCore,
    ) -> Result<EventList, RoiError> {
        if self.is_empty() {
            return Err(RoiError::Empty);
        }
        let mut events = EventList::new();
        for component in &self.components {
            let source_events = component
                .sample_events(irf, times, rng)
                .map_err(|e| RoiError::Source(component.name.clone(), e))?;
            info!("{} events from {}", source_events.len(), component.name);
            events.merge(source_events)?;
        }
        events.sort_by_time()?;
        Ok(events)
    }
}

impl fmt::Display for RoiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ROI centered at ({:.4}, {:.4}):", self.ra, self.dec)?;
        for component in &self.components {
            write!(f, "\n- {component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::{point_source, test_irfs};
    use rand::{SeedableRng, rngs::StdRng};
    use xpol_common::{EventColumn, linspace};

    #[test]
    fn identifiers_follow_insertion_order() {
        let mut roi = RoiModel::new(45.0, 45.0);
        assert_eq!(roi.add_source(point_source("a", 1.0)), 0);
        assert_eq!(roi.add_source(point_source("b", 1.0)), 1);
        roi.add_sources([point_source("c", 1.0), point_source("d", 1.0)]);
        let ids = roi
            .components()
            .map(|c| (c.name.as_str(), c.identifier()))
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![("a", Some(0)), ("b", Some(1)), ("c", Some(2)), ("d", Some(3))]
        );
    }

    #[test]
    fn duplicate_name_overwrites_without_reusing_identifiers() {
        let mut roi = RoiModel::new(0.0, 0.0);
        roi.add_source(point_source("a", 1.0));
        roi.add_source(point_source("b", 1.0));
        assert_eq!(roi.add_source(point_source("a", 2.0)), 2);
        assert_eq!(roi.len(), 2);
        assert_eq!(roi.components().next().map(|c| c.name.as_str()), Some("a"));
        assert_eq!(roi.get("a").and_then(|c| c.identifier()), Some(2));
        assert_eq!(roi.get("b").and_then(|c| c.identifier()), Some(1));
    }

    #[test]
    fn validity_window_is_the_intersection() {
        let mut roi = RoiModel::new(0.0, 0.0);
        roi.add_source(point_source("a", 1.0).with_window(0.0, 100.0));
        roi.add_source(point_source("b", 1.0).with_window(20.0, 500.0));
        assert_eq!(roi.min_time().unwrap(), 20.0);
        assert_eq!(roi.max_time().unwrap(), 100.0);
    }

    #[test]
    fn empty_roi_has_no_window() {
        let roi = RoiModel::new(0.0, 0.0);
        assert!(matches!(roi.min_time(), Err(RoiError::Empty)));
        assert!(matches!(roi.max_time(), Err(RoiError::Empty)));
    }

    #[test]
    fn event_list_is_merged_and_sorted() {
        let irf = test_irfs();
        let mut roi = RoiModel::new(45.0, 45.0);
        roi.add_source(point_source("a", 1.0));
        roi.add_source(point_source("b", 0.5));
        let times = linspace(0.0, 10.0, 11);
        let mut rng = StdRng::seed_from_u64(0);
        let events = roi.rvs_event_list(irf.responses(), &times, &mut rng).unwrap();
        let time = events.float_column(EventColumn::Time).unwrap();
        assert!(time.windows(2).all(|w| w[0] <= w[1]));
        let ids = events.int_column(EventColumn::McSrcId).unwrap();
        assert!(ids.contains(&0) && ids.contains(&1));
    }

    #[test]
    fn same_seed_same_events() {
        let irf = test_irfs();
        let mut roi = RoiModel::new(45.0, 45.0);
        roi.add_source(point_source("a", 1.0));
        roi.add_source(point_source("b", 0.5));
        let times = linspace(0.0, 10.0, 11);
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            roi.rvs_event_list(irf.responses(), &times, &mut rng).unwrap()
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42), run(43));
    }

    #[test]
    fn display_lists_components() {
        let mut roi = RoiModel::new(1.0, 2.0);
        roi.add_source(point_source("a", 1.0));
        let text = roi.to_string();
        assert!(text.starts_with("ROI centered at (1.0000, 2.0000):"));
        assert!(text.contains("\n- a (id = 0)"));
    }
}

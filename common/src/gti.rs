use crate::Time;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A contiguous time span during which the detector was observing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoodTimeInterval {
    pub start: Time,
    pub stop: Time,
}

impl GoodTimeInterval {
    pub fn new(start: Time, stop: Time) -> Self {
        Self { start, stop }
    }

    pub fn duration(&self) -> Time {
        self.stop - self.start
    }

    pub fn range(&self) -> Range<Time> {
        self.start..self.stop
    }
}

/// The good-time-interval table attached to an event file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GtiList(Vec<GoodTimeInterval>);

impl GtiList {
    pub fn new(intervals: Vec<GoodTimeInterval>) -> Self {
        Self(intervals)
    }

    pub fn single(start: Time, stop: Time) -> Self {
        Self(vec![GoodTimeInterval::new(start, stop)])
    }

    pub fn iter(&self) -> impl Iterator<Item = &GoodTimeInterval> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sum of the interval durations, i.e. the exposure.
    pub fn total_good_time(&self) -> Time {
        self.0.iter().map(GoodTimeInterval::duration).sum()
    }

    pub fn min_good_time(&self) -> Option<Time> {
        self.0.iter().map(|gti| gti.start).reduce(f64::min)
    }

    pub fn max_good_time(&self) -> Option<Time> {
        self.0.iter().map(|gti| gti.stop).reduce(f64::max)
    }
}

//! Column-oriented table of photon events.
//!
//! Columns are added by name in the causal order in which the simulation
//! produces them. Rows are never addressed individually: every operation
//! acts on whole columns and keeps all of them the same length.

use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::HashSet;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventColumn {
    Time,
    McEnergy,
    Pha,
    Energy,
    McRa,
    McDec,
    Ra,
    Dec,
    PeAngle,
    Phase,
    McSrcId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Float,
    Int,
}

impl EventColumn {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Pha | Self::McSrcId => ColumnKind::Int,
            _ => ColumnKind::Float,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnData {
    Float(Vec<f64>),
    Int(Vec<i64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Float(_) => ColumnKind::Float,
            Self::Int(_) => ColumnKind::Int,
        }
    }

    fn append(&mut self, other: ColumnData) -> Result<(), ColumnKind> {
        match (self, other) {
            (Self::Float(a), Self::Float(mut b)) => a.append(&mut b),
            (Self::Int(a), Self::Int(mut b)) => a.append(&mut b),
            (this, _) => return Err(this.kind()),
        }
        Ok(())
    }

    fn permute(&mut self, order: &[usize]) {
        match self {
            Self::Float(v) => *v = order.iter().map(|&i| v[i]).collect(),
            Self::Int(v) => *v = order.iter().map(|&i| v[i]).collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EventListError {
    #[error("Column {column} has length {found}, expected {expected}")]
    LengthMismatch {
        column: EventColumn,
        expected: usize,
        found: usize,
    },
    #[error("Column {column} must hold {expected:?} values")]
    KindMismatch {
        column: EventColumn,
        expected: ColumnKind,
    },
    #[error("Missing Column {0}")]
    MissingColumn(EventColumn),
    #[error("Cannot merge event lists with different columns: {left:?} != {right:?}")]
    ColumnSetMismatch {
        left: Vec<EventColumn>,
        right: Vec<EventColumn>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct NamedColumn {
    name: EventColumn,
    data: ColumnData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventList {
    columns: Vec<NamedColumn>,
}

/// Deserialized columns go through `set_column`, so a file with ragged
/// or mistyped columns is rejected.
impl<'de> Deserialize<'de> for EventList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut list = Self::new();
        for NamedColumn { name, data } in Vec::<NamedColumn>::deserialize(deserializer)? {
            list.set_column(name, data).map_err(de::Error::custom)?;
        }
        Ok(list)
    }
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events, zero for a table with no columns.
    pub fn len(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = EventColumn> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    pub fn has_column(&self, column: EventColumn) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    /// Adds a column, or replaces it if a column with the same name exists.
    pub fn set_column(
        &mut self,
        column: EventColumn,
        data: ColumnData,
    ) -> Result<(), EventListError> {
        if data.kind() != column.kind() {
            return Err(EventListError::KindMismatch {
                column,
                expected: column.kind(),
            });
        }
        if let Some(other) = self.columns.iter().find(|c| c.name != column) {
            if other.data.len() != data.len() {
                return Err(EventListError::LengthMismatch {
                    column,
                    expected: other.data.len(),
                    found: data.len(),
                });
            }
        }
        match self.columns.iter_mut().find(|c| c.name == column) {
            Some(existing) => existing.data = data,
            None => self.columns.push(NamedColumn { name: column, data }),
        }
        Ok(())
    }

    pub fn set_float_column(
        &mut self,
        column: EventColumn,
        values: Vec<f64>,
    ) -> Result<(), EventListError> {
        self.set_column(column, ColumnData::Float(values))
    }

    pub fn set_int_column(
        &mut self,
        column: EventColumn,
        values: Vec<i64>,
    ) -> Result<(), EventListError> {
        self.set_column(column, ColumnData::Int(values))
    }

    /// Broadcasts a single integer to every row.
    pub fn set_constant_int_column(
        &mut self,
        column: EventColumn,
        value: i64,
    ) -> Result<(), EventListError> {
        self.set_int_column(column, vec![value; self.len()])
    }

    pub fn column(&self, column: EventColumn) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| &c.data)
    }

    pub fn float_column(&self, column: EventColumn) -> Result<&[f64], EventListError> {
        match self.column(column) {
            Some(ColumnData::Float(values)) => Ok(values),
            Some(ColumnData::Int(_)) => Err(EventListError::KindMismatch {
                column,
                expected: ColumnKind::Int,
            }),
            None => Err(EventListError::MissingColumn(column)),
        }
    }

    pub fn int_column(&self, column: EventColumn) -> Result<&[i64], EventListError> {
        match self.column(column) {
            Some(ColumnData::Int(values)) => Ok(values),
            Some(ColumnData::Float(_)) => Err(EventListError::KindMismatch {
                column,
                expected: ColumnKind::Float,
            }),
            None => Err(EventListError::MissingColumn(column)),
        }
    }

    /// Concatenates `other` below `self`, column by column.
    ///
    /// An event list without columns adopts the layout of `other`.
    pub fn merge(&mut self, other: EventList) -> Result<(), EventListError> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.columns.is_empty() {
            return Ok(());
        }
        let left = self.column_names().collect::<HashSet<_>>();
        let right = other.column_names().collect::<HashSet<_>>();
        if left != right {
            return Err(EventListError::ColumnSetMismatch {
                left: self.column_names().collect(),
                right: other.column_names().collect(),
            });
        }
        for NamedColumn { name, data } in other.columns {
            if let Some(existing) = self.columns.iter_mut().find(|c| c.name == name) {
                existing
                    .data
                    .append(data)
                    .map_err(|expected| EventListError::KindMismatch {
                        column: name,
                        expected,
                    })?;
            }
        }
        Ok(())
    }

    /// Reorders every column by ascending TIME.
    ///
    /// The sort is stable, so an already sorted table is left untouched.
    pub fn sort_by_time(&mut self) -> Result<(), EventListError> {
        if self.columns.is_empty() {
            return Ok(());
        }
        let time = self.float_column(EventColumn::Time)?;
        let mut order = (0..time.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| time[a].total_cmp(&time[b]));
        if order.iter().enumerate().all(|(i, &j)| i == j) {
            return Ok(());
        }
        for column in &mut self.columns {
            column.data.permute(&order);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn table(time: Vec<f64>, src: i64) -> EventList {
        let n = time.len();
        let mut list = EventList::new();
        list.set_float_column(EventColumn::Time, time).unwrap();
        list.set_float_column(EventColumn::Energy, vec![1.0; n])
            .unwrap();
        list.set_constant_int_column(EventColumn::McSrcId, src)
            .unwrap();
        list
    }

    #[test]
    fn column_names_round_trip_through_strings() {
        assert_eq!(EventColumn::McEnergy.to_string(), "MC_ENERGY");
        assert_eq!(EventColumn::PeAngle.as_ref(), "PE_ANGLE");
        assert_eq!(
            EventColumn::from_str("MC_SRC_ID").unwrap(),
            EventColumn::McSrcId
        );
    }

    #[test]
    fn set_column_rejects_length_mismatch() {
        let mut list = table(vec![0.0, 1.0, 2.0], 0);
        let result = list.set_float_column(EventColumn::Ra, vec![0.0; 2]);
        assert!(matches!(
            result,
            Err(EventListError::LengthMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn set_column_rejects_wrong_kind() {
        let mut list = EventList::new();
        let result = list.set_float_column(EventColumn::Pha, vec![1.0]);
        assert!(matches!(result, Err(EventListError::KindMismatch { .. })));
    }

    #[test]
    fn merge_concatenates_every_column() {
        let mut a = table(vec![0.0, 5.0], 0);
        let b = table(vec![1.0, 2.0, 3.0], 1);
        a.merge(b).unwrap();
        for name in a.column_names().collect::<Vec<_>>() {
            assert_eq!(a.column(name).unwrap().len(), 5);
        }
        assert_eq!(a.int_column(EventColumn::McSrcId).unwrap(), &[0, 0, 1, 1, 1]);
    }

    #[test]
    fn merge_requires_same_columns() {
        let mut a = table(vec![0.0], 0);
        let mut b = table(vec![1.0], 1);
        b.set_float_column(EventColumn::Ra, vec![10.0]).unwrap();
        assert!(matches!(
            a.merge(b),
            Err(EventListError::ColumnSetMismatch { .. })
        ));
    }

    #[test]
    fn merge_into_empty_adopts_layout() {
        let mut a = EventList::new();
        a.merge(table(vec![1.0, 2.0], 3)).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.num_columns(), 3);
    }

    #[test]
    fn merge_with_zero_row_table_keeps_columns() {
        let mut a = table(vec![], 0);
        a.merge(table(vec![4.0], 1)).unwrap();
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn sort_applies_one_permutation_to_all_columns() {
        let mut list = EventList::new();
        list.set_float_column(EventColumn::Time, vec![3.0, 1.0, 2.0, 0.5])
            .unwrap();
        list.set_int_column(EventColumn::McSrcId, vec![0, 1, 2, 3])
            .unwrap();
        list.sort_by_time().unwrap();
        assert_eq!(
            list.float_column(EventColumn::Time).unwrap(),
            &[0.5, 1.0, 2.0, 3.0]
        );
        assert_eq!(list.int_column(EventColumn::McSrcId).unwrap(), &[3, 1, 2, 0]);
    }

    #[test]
    fn sort_is_idempotent() {
        let mut list = table(vec![2.0, 0.0, 1.0, 1.0], 0);
        list.set_int_column(EventColumn::McSrcId, vec![0, 1, 2, 3])
            .unwrap();
        list.sort_by_time().unwrap();
        let once = list.clone();
        list.sort_by_time().unwrap();
        assert_eq!(once, list);
        // Ties keep their original order.
        assert_eq!(list.int_column(EventColumn::McSrcId).unwrap(), &[1, 2, 3, 0]);
    }

    #[test]
    fn ragged_json_rejected() {
        let json = r#"[
            {"name": "TIME", "data": {"float": [1.0, 2.0]}},
            {"name": "PHA", "data": {"int": [1]}}
        ]"#;
        assert!(serde_json::from_str::<EventList>(json).is_err());
        let json = r#"[{"name": "PHA", "data": {"float": [1.0]}}]"#;
        assert!(serde_json::from_str::<EventList>(json).is_err());
    }

    #[test]
    fn json_round_trip_preserves_order() {
        let list = table(vec![1.0, 2.0], 4);
        let json = serde_json::to_string(&list).unwrap();
        let back: EventList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn sort_without_time_column_fails() {
        let mut list = EventList::new();
        list.set_float_column(EventColumn::Energy, vec![1.0]).unwrap();
        assert!(matches!(
            list.sort_by_time(),
            Err(EventListError::MissingColumn(EventColumn::Time))
        ));
    }
}

//! Column mapping: which uploaded column feeds which target field.
//!
//! - [`proposer`] - Edit-distance proposal of a mapping
//! - [`session`] - Caller-owned state for one upload and its requests
//!
//! A [`Mapping`] keeps one entry per source column, in column order. A
//! target field is claimed by at most one entry; every other column stays
//! unmapped and is later passed through under its own name.

pub mod proposer;
pub mod session;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{MappingError, MappingResult};

pub use proposer::{edit_distance, propose_mapping, rank_candidates, Candidate};
pub use session::{PortfolioSession, RequestTicket};

/// One source column and the target it feeds, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub source: String,
    pub target: Option<String>,
}

/// Source column to target field assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: Vec<MappingEntry>,
}

impl Mapping {
    /// Every column present, none mapped.
    pub fn unmapped<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: columns
                .into_iter()
                .map(|source| MappingEntry {
                    source: source.into(),
                    target: None,
                })
                .collect(),
        }
    }

    pub(crate) fn from_entries(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.entries.iter().any(|e| e.source == column)
    }

    /// Target of the first entry named `column`.
    pub fn target_for(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.source == column)
            .and_then(|e| e.target.as_deref())
    }

    /// Column currently claiming `target`.
    pub fn claimed_by(&self, target: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.target.as_deref() == Some(target))
            .map(|e| e.source.as_str())
    }

    /// Mapped pairs, in column order.
    pub fn mapped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.target.as_deref().map(|t| (e.source.as_str(), t)))
    }

    /// Columns without a target, in column order.
    pub fn unmapped_columns(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.target.is_none())
            .map(|e| e.source.as_str())
            .collect()
    }

    /// No target appears twice.
    pub fn is_exclusive(&self) -> bool {
        let targets: Vec<&str> = self.mapped().map(|(_, t)| t).collect();
        targets
            .iter()
            .enumerate()
            .all(|(i, t)| !targets[i + 1..].contains(t))
    }

    /// Point `column` at `target`.
    ///
    /// Fails if the column is unknown or another column holds the target;
    /// release it from the other column first.
    pub fn assign(&mut self, column: &str, target: &str) -> MappingResult<()> {
        if let Some(owner) = self.claimed_by(target) {
            if owner != column {
                return Err(MappingError::TargetAlreadyClaimed {
                    target: target.to_string(),
                    column: owner.to_string(),
                });
            }
        }
        let entry = self.entry_mut(column)?;
        entry.target = Some(target.to_string());
        Ok(())
    }

    /// Leave `column` unmapped.
    pub fn clear(&mut self, column: &str) -> MappingResult<()> {
        self.entry_mut(column)?.target = None;
        Ok(())
    }

    fn entry_mut(&mut self, column: &str) -> MappingResult<&mut MappingEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.source == column)
            .ok_or_else(|| MappingError::UnknownColumn(column.to_string()))
    }
}

// Serialized as a JSON object `{column: target | null}`.
impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.source, &entry.target)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = Mapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of column names to target names or null")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Mapping, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((source, target)) = access.next_entry::<String, Option<String>>()? {
                    entries.push(MappingEntry { source, target });
                }
                Ok(Mapping { entries })
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

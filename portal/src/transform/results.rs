//! Navigation of the nested score result.
//!
//! Key sets are read in received order at each level. Lookups never fail
//! loudly: a missing key or an unexpected shape gives an empty list or
//! `None`, because time frames may carry different groups.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Contribution, ScoreLeaf, ScoreResult};

impl ScoreResult {
    /// Time frames, as received.
    pub fn time_frames(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Groups of one time frame.
    pub fn groups(&self, time_frame: &str) -> Vec<&str> {
        keys(self.0.get(time_frame))
    }

    /// Items of one group.
    pub fn items(&self, time_frame: &str, group: &str) -> Vec<&str> {
        keys(self.group(time_frame, group))
    }

    /// Leaf at a full key path.
    pub fn leaf(&self, time_frame: &str, group: &str, item: &str) -> Option<ScoreLeaf> {
        let raw = self.group(time_frame, group)?.as_object()?.get(item)?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// Contributions at a full key path.
    pub fn contributions(&self, time_frame: &str, group: &str, item: &str) -> Option<Vec<Contribution>> {
        self.leaf(time_frame, group, item).map(|leaf| leaf.contributions)
    }

    /// Score at a full key path.
    pub fn score(&self, time_frame: &str, group: &str, item: &str) -> Option<f64> {
        self.leaf(time_frame, group, item).map(|leaf| leaf.score)
    }

    fn group(&self, time_frame: &str, group: &str) -> Option<&Value> {
        self.0.get(time_frame)?.as_object()?.get(group)
    }
}

fn keys(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(Value::as_object)
        .map(|object: &Map<String, Value>| object.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

/// A (time frame, group, item) choice for displaying one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSelection {
    pub time_frame: String,
    pub group: String,
    pub item: String,
}

impl ScoreSelection {
    /// First key at every level, if the result is that deep.
    pub fn first(result: &ScoreResult) -> Option<Self> {
        let time_frame = *result.time_frames().first()?;
        let group = *result.groups(time_frame).first()?;
        let item = *result.items(time_frame, group).first()?;
        Some(Self {
            time_frame: time_frame.to_string(),
            group: group.to_string(),
            item: item.to_string(),
        })
    }

    pub fn leaf(&self, result: &ScoreResult) -> Option<ScoreLeaf> {
        result.leaf(&self.time_frame, &self.group, &self.item)
    }
}

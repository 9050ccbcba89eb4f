//! Edit-distance proposal of a column mapping.
//!
//! Greedy and order dependent: columns are handled left to right, each one
//! takes the closest still-unclaimed target if it is close enough. An early
//! column can take a target that a later column matches better; there is no
//! backtracking.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{Mapping, MappingEntry};

/// A target field and its distance to one source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub target: String,
    pub distance: usize,
}

/// Levenshtein distance, case sensitive, counted in characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Targets ordered by ascending distance to `column`.
///
/// Ties keep the order of `targets`.
pub fn rank_candidates<T: AsRef<str>>(column: &str, targets: &[T]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = targets
        .iter()
        .map(|target| Candidate {
            target: target.as_ref().to_string(),
            distance: edit_distance(column, target.as_ref()),
        })
        .collect();
    // sort_by_key is stable
    candidates.sort_by_key(|c| c.distance);
    candidates
}

/// Propose a mapping of `source_columns` onto `target_fields`.
///
/// A column gets its closest unclaimed target when the distance is strictly
/// below `threshold`; that target is then out of the running for the rest
/// of the columns. A non-positive or NaN threshold maps nothing.
pub fn propose_mapping<S, T>(source_columns: &[S], target_fields: &[T], threshold: f64) -> Mapping
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let mut unclaimed: Vec<&str> = Vec::with_capacity(target_fields.len());
    for field in target_fields {
        let field = field.as_ref();
        if !unclaimed.contains(&field) {
            unclaimed.push(field);
        }
    }

    let mut entries = Vec::with_capacity(source_columns.len());
    for column in source_columns {
        let column = column.as_ref();
        let target = closest_unclaimed(column, &unclaimed)
            .filter(|&(_, distance)| accepts(distance, threshold))
            .map(|(idx, _)| unclaimed.remove(idx).to_string());

        entries.push(MappingEntry {
            source: column.to_string(),
            target,
        });
    }

    Mapping::from_entries(entries)
}

/// Index and distance of the top ranked unclaimed target.
fn closest_unclaimed(column: &str, unclaimed: &[&str]) -> Option<(usize, usize)> {
    let best = rank_candidates(column, unclaimed).into_iter().next()?;
    // unclaimed holds each target once
    let idx = unclaimed.iter().position(|target| *target == best.target)?;
    Some((idx, best.distance))
}

fn accepts(distance: usize, threshold: f64) -> bool {
    (distance as f64).partial_cmp(&threshold) == Some(Ordering::Less)
}

//! Previous/next/jump resolution over model values.
//!
//! # Invariants
//! - Targets outside the legal value windows fail before any search.
//! - Directional moves wrap at both ends of the `(system, value)` order.
//! - A jump to a missing value lands on the numerically closest value;
//!   ties go to the larger one.

use crate::model::identifier::{check_range, IdentifierError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Navigation request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Jump,
    Next,
}

impl Direction {
    pub fn offset(self) -> i64 {
        match self {
            Self::Previous => -1,
            Self::Jump => 0,
            Self::Next => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    InvalidIdentifier(IdentifierError),
    /// Directional move from a value that is not stored.
    UnknownIdentifier(i64),
    EmptyDataset,
}

impl Display for NavigationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(err) => write!(f, "{err}"),
            Self::UnknownIdentifier(value) => write!(f, "model value {value} does not exist"),
            Self::EmptyDataset => write!(f, "no models are stored"),
        }
    }
}

impl Error for NavigationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidIdentifier(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IdentifierError> for NavigationError {
    fn from(value: IdentifierError) -> Self {
        Self::InvalidIdentifier(value)
    }
}

/// Resolves `target` moved by `direction` within `ordered`.
///
/// `ordered` must be sorted by `(system id, value)`; it does not need to be
/// sorted by value alone.
pub fn resolve(
    target: i64,
    direction: Direction,
    ordered: &[i64],
) -> Result<i64, NavigationError> {
    check_range(target)?;
    if ordered.is_empty() {
        return Err(NavigationError::EmptyDataset);
    }

    match ordered.iter().position(|value| *value == target) {
        Some(index) => {
            let len = ordered.len() as i64;
            let next = (index as i64 + direction.offset()).rem_euclid(len);
            Ok(ordered[next as usize])
        }
        None if direction == Direction::Jump => {
            let mut sorted = ordered.to_vec();
            sorted.sort_unstable();
            nearest_value(target, &sorted).ok_or(NavigationError::EmptyDataset)
        }
        None => Err(NavigationError::UnknownIdentifier(target)),
    }
}

/// Returns the value in ascending `sorted` closest to `target`, preferring
/// the upper neighbour on ties.
pub fn nearest_value(target: i64, sorted: &[i64]) -> Option<i64> {
    let split = sorted.partition_point(|value| *value <= target);
    let lower = split.checked_sub(1).map(|index| sorted[index]);
    let upper = sorted.get(split).copied();

    match (lower, upper) {
        (Some(lower), Some(upper)) => {
            if target - lower < upper - target {
                Some(lower)
            } else {
                Some(upper)
            }
        }
        (Some(lower), None) => Some(lower),
        (None, upper) => upper,
    }
}

//! Model identifier codec.
//!
//! # Responsibility
//! - Decode a numeric model value into system id, gender and parent flag.
//! - Allocate new values with first-fit placement inside a partition.
//!
//! # Invariants
//! - Parent values live in `[100000, 212000)`, leaf values in
//!   `[1000000, 2120000)`. Nothing else is a model value.
//! - Parent values keep the gender digit at 10^3 and the system at 10^4;
//!   leaf values shift both one decimal place left.
//! - Gender digits other than 0/1 are rejected.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Range;

/// Legal window for parent (system-level) values.
pub const PARENT_RANGE: Range<i64> = 100_000..212_000;
/// Legal window for leaf values.
pub const LEAF_RANGE: Range<i64> = 1_000_000..2_120_000;
/// Value used when no session can be resumed.
pub const DEFAULT_START_VALUE: i64 = 100_000;

const SYSTEM_OFFSET: i64 = 10;

/// Display labels indexed by system id.
pub const BODY_SYSTEMS: [&str; 12] = [
    "骨骼系统",
    "结缔系统",
    "肌肉系统",
    "动脉系统",
    "静脉系统",
    "淋巴系统",
    "神经系统",
    "呼吸系统",
    "消化系统",
    "内分泌系统",
    "泌尿生殖系统",
    "皮肤",
];

/// Returns the display label for `system_id`.
pub fn system_name(system_id: u8) -> Option<&'static str> {
    BODY_SYSTEMS.get(usize::from(system_id)).copied()
}

/// Identifier codec errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Value is outside both legal windows.
    OutOfRange(i64),
    /// Value sits in a legal window but its gender digit is not 0/1.
    InvalidGender { value: i64, digit: i64 },
    /// System id has no label.
    UnknownSystem(u8),
    /// Every slot of the requested partition is taken.
    PartitionExhausted {
        system_id: u8,
        is_parent: bool,
        gender: Gender,
    },
}

impl Display for IdentifierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange(value) => write!(
                f,
                "model value {value} is outside [100000, 212000) and [1000000, 2120000)"
            ),
            Self::InvalidGender { value, digit } => {
                write!(f, "model value {value} carries unsupported gender digit {digit}")
            }
            Self::UnknownSystem(system_id) => write!(f, "unknown system id {system_id}"),
            Self::PartitionExhausted {
                system_id,
                is_parent,
                gender,
            } => write!(
                f,
                "no free value left for system {system_id} (parent={is_parent}, gender={gender})"
            ),
        }
    }
}

impl Error for IdentifierError {}

/// Binary gender encoded in the model value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Digit stored in the value and in `info.sex`.
    pub fn digit(self) -> i64 {
        match self {
            Self::Male => 0,
            Self::Female => 1,
        }
    }

    pub fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(Self::Male),
            1 => Some(Self::Female),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
        }
    }
}

/// Returns `Ok(())` when `value` lies in one of the two legal windows.
///
/// Only the magnitude is checked; the gender digit is not inspected.
pub fn check_range(value: i64) -> Result<(), IdentifierError> {
    if PARENT_RANGE.contains(&value) || LEAF_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(IdentifierError::OutOfRange(value))
    }
}

/// Decoded classification of a model value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub system_id: u8,
    pub is_parent: bool,
    pub gender: Gender,
}

impl Classification {
    /// Builds a classification, rejecting unknown system ids.
    pub fn new(system_id: u8, is_parent: bool, gender: Gender) -> Result<Self, IdentifierError> {
        if system_name(system_id).is_none() {
            return Err(IdentifierError::UnknownSystem(system_id));
        }
        Ok(Self {
            system_id,
            is_parent,
            gender,
        })
    }

    /// Lowest value first-fit allocation may hand out for this partition.
    pub fn base_value(&self) -> i64 {
        let system = i64::from(self.system_id) + SYSTEM_OFFSET;
        if self.is_parent {
            system * 10_000 + self.gender.digit() * 1_000 + 1
        } else {
            system * 100_000 + self.gender.digit() * 10_000
        }
    }

    /// Exclusive upper bound of the partition.
    pub fn end_value(&self) -> i64 {
        let system = i64::from(self.system_id) + SYSTEM_OFFSET;
        if self.is_parent {
            system * 10_000 + (self.gender.digit() + 1) * 1_000
        } else {
            system * 100_000 + (self.gender.digit() + 1) * 10_000
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.base_value()..self.end_value()).contains(&value)
    }
}

/// Validated model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ModelValue(i64);

impl ModelValue {
    /// Validates range and gender digit.
    pub fn new(value: i64) -> Result<Self, IdentifierError> {
        check_range(value)?;
        let digit = (value / gender_divisor(value)) % 10;
        if Gender::from_digit(digit).is_none() {
            return Err(IdentifierError::InvalidGender { value, digit });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_parent(self) -> bool {
        self.0 < LEAF_RANGE.start
    }

    pub fn gender(self) -> Gender {
        match (self.0 / gender_divisor(self.0)) % 10 {
            0 => Gender::Male,
            _ => Gender::Female,
        }
    }

    pub fn system_id(self) -> u8 {
        let divisor = if self.is_parent() { 10_000 } else { 100_000 };
        // Both windows cap the quotient at 21, so the difference fits in u8.
        (self.0 / divisor - SYSTEM_OFFSET) as u8
    }

    pub fn classification(self) -> Classification {
        Classification {
            system_id: self.system_id(),
            is_parent: self.is_parent(),
            gender: self.gender(),
        }
    }

    /// List label: parent values get a trailing space so they line up with
    /// seven-digit leaf values.
    pub fn display_label(self) -> String {
        if self.is_parent() {
            format!("{} ", self.0)
        } else {
            self.0.to_string()
        }
    }
}

impl TryFrom<i64> for ModelValue {
    type Error = IdentifierError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelValue> for i64 {
    fn from(value: ModelValue) -> Self {
        value.0
    }
}

impl Display for ModelValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn gender_divisor(value: i64) -> i64 {
    if value < LEAF_RANGE.start {
        1_000
    } else {
        10_000
    }
}

/// Returns the smallest free value at or above the partition base.
///
/// `existing` may contain values of any partition and in any order; only
/// values inside the partition take part in the scan.
pub fn allocate_first_fit(
    classification: Classification,
    existing: &[i64],
) -> Result<ModelValue, IdentifierError> {
    let mut occupied = existing
        .iter()
        .copied()
        .filter(|value| classification.contains(*value))
        .collect::<Vec<_>>();
    occupied.sort_unstable();
    occupied.dedup();

    let mut candidate = classification.base_value();
    for value in occupied {
        if value == candidate {
            candidate += 1;
        } else if value > candidate {
            break;
        }
    }

    if candidate >= classification.end_value() {
        return Err(IdentifierError::PartitionExhausted {
            system_id: classification.system_id,
            is_parent: classification.is_parent,
            gender: classification.gender,
        });
    }
    ModelValue::new(candidate)
}

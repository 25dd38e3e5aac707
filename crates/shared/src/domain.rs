use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Inclusive age bracket used as the hint for a narrowed re-prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub const MIN_AGE: u8 = 1;
    pub const MAX_AGE: u8 = 100;

    pub fn new(min: u8, max: u8) -> Result<Self, FlowError> {
        if min < Self::MIN_AGE || max > Self::MAX_AGE {
            return Err(FlowError::Validation(format!(
                "age range {min}-{max} is outside {}-{}",
                Self::MIN_AGE,
                Self::MAX_AGE
            )));
        }
        if min > max {
            return Err(FlowError::Validation(format!(
                "age range {min}-{max} is inverted"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, age: u8) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

impl FromStr for AgeRange {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FlowError::Validation("no age range selected".to_string()));
        }
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| FlowError::Validation(format!("malformed age range '{s}'")))?;
        let min = min
            .trim()
            .parse::<u8>()
            .map_err(|_| FlowError::Validation(format!("malformed age range '{s}'")))?;
        let max = max
            .trim()
            .parse::<u8>()
            .map_err(|_| FlowError::Validation(format!("malformed age range '{s}'")))?;
        Self::new(min, max)
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// The fixed registry of overlay panels in the single-page flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalId {
    FirstSuccess,
    SecondSuccess,
    AnotherChance,
    Thanks,
}

impl ModalId {
    pub const ALL: [ModalId; 4] = [
        ModalId::FirstSuccess,
        ModalId::SecondSuccess,
        ModalId::AnotherChance,
        ModalId::Thanks,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ModalId::FirstSuccess => "first_success",
            ModalId::SecondSuccess => "second_success",
            ModalId::AnotherChance => "another_chance",
            ModalId::Thanks => "thanks",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_range() {
        let range: AgeRange = "25-34".parse().expect("parse");
        assert_eq!(range, AgeRange { min: 25, max: 34 });
        assert!(range.contains(25));
        assert!(range.contains(34));
        assert!(!range.contains(35));
        assert_eq!(range.to_string(), "25-34");
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let range: AgeRange = " 18 - 35 ".parse().expect("parse");
        assert_eq!(range, AgeRange { min: 18, max: 35 });
    }

    #[test]
    fn rejects_empty_selection() {
        let err = "".parse::<AgeRange>().unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }

    #[test]
    fn rejects_malformed_and_inverted_ranges() {
        assert!("25".parse::<AgeRange>().is_err());
        assert!("a-b".parse::<AgeRange>().is_err());
        assert!("34-25".parse::<AgeRange>().is_err());
        assert!("0-10".parse::<AgeRange>().is_err());
        assert!("90-101".parse::<AgeRange>().is_err());
    }
}

//! Postal index number (pincode).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Pincode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PincodeError {
    #[error("pincode cannot be empty")]
    Empty,
    #[error("pincode must contain only digits")]
    NonDigit,
    #[error("pincode must be exactly {expected} digits (got {actual})")]
    WrongLength { expected: usize, actual: usize },
}

/// A six-digit Indian postal code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Pincode(String);

impl Pincode {
    /// Number of digits in a pincode.
    pub const DIGITS: usize = 6;

    /// Parse a pincode, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, has non-digit characters, or is
    /// not exactly six digits long.
    pub fn parse(s: &str) -> Result<Self, PincodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PincodeError::Empty);
        }
        if !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(PincodeError::NonDigit);
        }
        if trimmed.len() != Self::DIGITS {
            return Err(PincodeError::WrongLength {
                expected: Self::DIGITS,
                actual: trimmed.len(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Strip everything but digits from form input and cap it at six digits.
    #[must_use]
    pub fn sanitize_input(raw: &str) -> String {
        raw.chars()
            .filter(char::is_ascii_digit)
            .take(Self::DIGITS)
            .collect()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Pincode {
    type Err = PincodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pincode {
    type Error = PincodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pincode> for String {
    fn from(pincode: Pincode) -> Self {
        pincode.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(Pincode::parse(" 413512 ").unwrap().as_str(), "413512");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Pincode::parse(""), Err(PincodeError::Empty));
        assert_eq!(Pincode::parse("41a512"), Err(PincodeError::NonDigit));
        assert_eq!(
            Pincode::parse("4135"),
            Err(PincodeError::WrongLength {
                expected: 6,
                actual: 4
            })
        );
    }

    #[test]
    fn test_sanitize_input() {
        assert_eq!(Pincode::sanitize_input("41-35 12 99"), "413512");
        assert_eq!(Pincode::sanitize_input("abc"), "");
    }
}

//! Mobile phone number type.
//!
//! The phone number doubles as the external key of a customer's remote
//! profile document, so every code path must derive that key the same way:
//! the bare ten national digits, no country code, no separators.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains something other than digits and separators.
    #[error("phone number contains an invalid character: {0:?}")]
    InvalidCharacter(char),
    /// The number does not have the expected digit count.
    #[error("enter a valid {expected}-digit mobile number (got {actual} digits)")]
    WrongLength {
        /// Expected number of national digits.
        expected: usize,
        /// Digits found after stripping prefixes.
        actual: usize,
    },
}

/// An Indian mobile number.
///
/// ## Accepted input
///
/// - Ten national digits: `9876543210`
/// - With country code: `+919876543210`, `91 98765 43210`
/// - With trunk prefix: `09876543210`
/// - Spaces, dashes and parentheses are ignored
///
/// ## Examples
///
/// ```
/// use krushi_sarthi_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+91 98765-43210").unwrap();
/// assert_eq!(phone.profile_key(), "9876543210");
/// assert_eq!(phone.e164(), "+919876543210");
///
/// assert!(PhoneNumber::parse("").is_err());
/// assert!(PhoneNumber::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Number of national digits in a mobile number.
    pub const NATIONAL_DIGITS: usize = 10;

    /// Country calling code used for E.164 formatting.
    pub const COUNTRY_CODE: &'static str = "91";

    /// Parse a `PhoneNumber` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Contains characters other than digits, spaces, dashes, parentheses or a leading `+`
    /// - Does not reduce to exactly ten national digits
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut digits = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' => {}
                '+' if i == 0 => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        let prefixed = if digits.len() == Self::NATIONAL_DIGITS + Self::COUNTRY_CODE.len() {
            digits.strip_prefix(Self::COUNTRY_CODE)
        } else if digits.len() == Self::NATIONAL_DIGITS + 1 {
            digits.strip_prefix('0')
        } else {
            None
        };
        let national = prefixed.unwrap_or(&digits);

        if national.len() != Self::NATIONAL_DIGITS {
            return Err(PhoneError::WrongLength {
                expected: Self::NATIONAL_DIGITS,
                actual: national.len(),
            });
        }

        Ok(Self(national.to_owned()))
    }

    /// The canonical key of the customer's remote profile document.
    #[must_use]
    pub fn profile_key(&self) -> &str {
        &self.0
    }

    /// The number in E.164 form, as OTP providers expect it.
    #[must_use]
    pub fn e164(&self) -> String {
        format!("+{}{}", Self::COUNTRY_CODE, self.0)
    }

    /// Consumes the `PhoneNumber` and returns the national digits.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! Delivery address record.
//!
//! Addresses are stored verbatim in the customer's remote profile document, so
//! the record itself is permissive (every field a plain string) and the rules
//! live in [`Address::validate`]. The phone field is the profile document key.

use serde::{Deserialize, Serialize};

use crate::types::{PhoneError, PhoneNumber, Pincode, PincodeError};

/// The only country this deployment delivers to.
pub const DELIVERY_COUNTRY: &str = "India";

/// Two-letter state codes returned by the postal lookup, mapped to full names.
const STATE_BY_CODE: &[(&str, &str)] = &[
    ("AP", "Andhra Pradesh"),
    ("AR", "Arunachal Pradesh"),
    ("AS", "Assam"),
    ("BR", "Bihar"),
    ("CG", "Chhattisgarh"),
    ("GA", "Goa"),
    ("GJ", "Gujarat"),
    ("HR", "Haryana"),
    ("HP", "Himachal Pradesh"),
    ("JK", "Jammu and Kashmir"),
    ("JH", "Jharkhand"),
    ("KA", "Karnataka"),
    ("KL", "Kerala"),
    ("MP", "Madhya Pradesh"),
    ("MH", "Maharashtra"),
    ("MN", "Manipur"),
    ("ML", "Meghalaya"),
    ("MZ", "Mizoram"),
    ("NL", "Nagaland"),
    ("OR", "Orissa"),
    ("PB", "Punjab"),
    ("RJ", "Rajasthan"),
    ("SK", "Sikkim"),
    ("TN", "Tamil Nadu"),
    ("TR", "Tripura"),
    ("UK", "Uttarakhand"),
    ("UP", "Uttar Pradesh"),
    ("WB", "West Bengal"),
    ("AN", "Andaman and Nicobar Islands"),
    ("CH", "Chandigarh"),
    ("DH", "Dadra and Nagar Haveli"),
    ("DD", "Daman and Diu"),
    ("DL", "Delhi"),
    ("LD", "Lakshadweep"),
    ("PY", "Pondicherry"),
];

/// Full state name for a two-letter code (case-insensitive).
#[must_use]
pub fn state_name_for_code(code: &str) -> Option<&'static str> {
    let code = code.trim();
    STATE_BY_CODE
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

/// Validation failures for an address. All are user-actionable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Phone number missing")]
    MissingPhone,
    #[error("Invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),
    #[error("Please fill in the {0} field")]
    MissingField(&'static str),
    #[error("Please enter a valid pincode: {0}")]
    InvalidPincode(#[from] PincodeError),
}

/// City, district and state for a pincode, as reported by the postal lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalDetails {
    pub city: String,
    pub district: String,
    pub state_code: String,
}

impl PostalDetails {
    /// The state's full name, or the raw code when it is not in the table.
    #[must_use]
    pub fn state_name(&self) -> String {
        state_name_for_code(&self.state_code)
            .map_or_else(|| self.state_code.trim().to_uppercase(), str::to_owned)
    }

    /// Hint shown under the pincode field after a successful lookup.
    #[must_use]
    pub fn hint(&self) -> String {
        let state = self.state_name();
        if self.city.is_empty() || self.district.is_empty() || state.is_empty() {
            "Pincode found".to_string()
        } else {
            format!("{}, {}, {state}", self.city, self.district)
        }
    }
}

/// A delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub name: String,
    pub phone: String,
    pub flat: String,
    pub street: String,
    pub landmark: String,
    pub city: String,
    pub district: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            flat: String::new(),
            street: String::new(),
            landmark: String::new(),
            city: String::new(),
            district: String::new(),
            state: String::new(),
            pincode: String::new(),
            country: DELIVERY_COUNTRY.to_string(),
        }
    }
}

impl Address {
    /// An empty address pre-filled with a verified phone number.
    #[must_use]
    pub fn for_phone(phone: &PhoneNumber) -> Self {
        Self {
            phone: phone.profile_key().to_owned(),
            ..Self::default()
        }
    }

    /// Trim every field, keep only pincode digits and force the delivery country.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_owned(),
            phone: PhoneNumber::parse(&self.phone)
                .map_or_else(|_| self.phone.trim().to_owned(), PhoneNumber::into_inner),
            flat: self.flat.trim().to_owned(),
            street: self.street.trim().to_owned(),
            landmark: self.landmark.trim().to_owned(),
            city: self.city.trim().to_owned(),
            district: self.district.trim().to_owned(),
            state: self.state.trim().to_owned(),
            pincode: Pincode::sanitize_input(&self.pincode),
            country: DELIVERY_COUNTRY.to_owned(),
        }
    }

    fn required_fields(&self) -> [(&'static str, &str); 7] {
        [
            ("name", &self.name),
            ("flat", &self.flat),
            ("street", &self.street),
            ("city", &self.city),
            ("district", &self.district),
            ("state", &self.state),
            ("country", &self.country),
        ]
    }

    /// Check that the address can be saved and delivered to.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: missing or malformed phone, a blank
    /// required field, or a pincode that is not six digits.
    pub fn validate(&self) -> Result<(), AddressError> {
        self.phone_number()?;
        if let Some((field, _)) = self
            .required_fields()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
        {
            return Err(AddressError::MissingField(field));
        }
        Pincode::parse(&self.pincode)?;
        Ok(())
    }

    /// Whether every required field is filled and the pincode is valid.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// The parsed phone number, which keys the remote profile document.
    ///
    /// # Errors
    ///
    /// Returns an error if the phone is blank or malformed.
    pub fn phone_number(&self) -> Result<PhoneNumber, AddressError> {
        if self.phone.trim().is_empty() {
            return Err(AddressError::MissingPhone);
        }
        Ok(PhoneNumber::parse(&self.phone)?)
    }

    /// Merge a postal lookup result; blank lookup fields keep the current value.
    pub fn apply_postal_details(&mut self, pincode: &Pincode, details: &PostalDetails) {
        self.pincode = pincode.as_str().to_owned();
        if !details.city.trim().is_empty() {
            self.city = details.city.trim().to_owned();
        }
        if !details.district.trim().is_empty() {
            self.district = details.district.trim().to_owned();
        }
        let state = details.state_name();
        if !state.is_empty() {
            self.state = state;
        }
        self.country = DELIVERY_COUNTRY.to_owned();
    }

    /// Multi-line rendering for confirmation views.
    #[must_use]
    pub fn display_lines(&self) -> Vec<String> {
        [
            ("Name", &self.name),
            ("Phone", &self.phone),
            ("Flat", &self.flat),
            ("Street", &self.street),
            ("City", &self.city),
            ("District", &self.district),
            ("State", &self.state),
            ("Pincode", &self.pincode),
            ("Landmark", &self.landmark),
            ("Country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{label}: {value}"))
        .collect()
    }
}

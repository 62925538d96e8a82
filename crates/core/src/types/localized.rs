//! Localized catalog text.

use serde::{Deserialize, Serialize};

/// Display languages supported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Mr,
    Hi,
}

impl Locale {
    /// All supported locales, English first.
    pub const ALL: [Self; 3] = [Self::En, Self::Mr, Self::Hi];
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "mr" => Ok(Self::Mr),
            "hi" => Ok(Self::Hi),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

/// Text with an English value and optional Marathi and Hindi translations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct LocalizedText {
    pub en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hi: Option<String>,
}

impl LocalizedText {
    /// English-only text.
    #[must_use]
    pub fn en(text: impl Into<String>) -> Self {
        Self {
            en: text.into(),
            mr: None,
            hi: None,
        }
    }

    /// Text for `locale`, falling back to English when the translation is
    /// missing or blank.
    #[must_use]
    pub fn get(&self, locale: Locale) -> &str {
        let translated = match locale {
            Locale::En => None,
            Locale::Mr => self.mr.as_deref(),
            Locale::Hi => self.hi.as_deref(),
        };
        translated
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(&self.en)
    }

    /// The raw value stored for `locale`, without fallback.
    #[must_use]
    pub fn raw(&self, locale: Locale) -> Option<&str> {
        match locale {
            Locale::En => Some(self.en.as_str()),
            Locale::Mr => self.mr.as_deref(),
            Locale::Hi => self.hi.as_deref(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_get_falls_back_to_english() {
        let text = LocalizedText {
            en: "Neem Oil".to_string(),
            mr: Some("कडुनिंब तेल".to_string()),
            hi: Some("  ".to_string()),
        };
        assert_eq!(text.get(Locale::Mr), "कडुनिंब तेल");
        assert_eq!(text.get(Locale::Hi), "Neem Oil");
        assert_eq!(text.get(Locale::En), "Neem Oil");
    }

    #[test]
    fn test_missing_translations_are_not_serialized() {
        let json = serde_json::to_value(LocalizedText::en("1kg")).unwrap();
        assert_eq!(json, serde_json::json!({ "en": "1kg" }));
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("MR".parse::<Locale>(), Ok(Locale::Mr));
        assert!("fr".parse::<Locale>().is_err());
    }
}

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Language and region pair used to pick resource configurations
///
/// Empty strings mean "any", like in the resource table itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Locale {
    language: String,
    country: String,
}

impl Locale {
    pub fn new(language: impl Into<String>, country: impl Into<String>) -> Locale {
        Locale {
            language: language.into(),
            country: country.into(),
        }
    }

    /// `en-US`, the locale used when the caller does not pick one
    pub fn en_us() -> Locale {
        Locale::new("en", "US")
    }

    #[inline]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[inline]
    pub fn country(&self) -> &str {
        &self.country
    }

    /// How well a configuration locale `target` fits this preferred locale
    ///
    /// - 3: language and region are equal
    /// - 2: same language, `target` has no region
    /// - 1: `target` has no language or no region (a default config)
    /// - 0: mismatch
    pub fn match_level(&self, target: &Locale) -> i32 {
        if self.language == target.language {
            if self.country == target.country {
                3
            } else if target.country.is_empty() {
                2
            } else {
                0
            }
        } else if target.country.is_empty() || target.language.is_empty() {
            1
        } else {
            0
        }
    }
}

/// Match level of an optional preferred locale, `-1` without a preference
#[inline]
pub fn match_level(preferred: Option<&Locale>, target: &Locale) -> i32 {
    preferred.map_or(-1, |locale| locale.match_level(target))
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.country.is_empty() {
            write!(f, "{}", self.language)
        } else {
            write!(f, "{}-{}", self.language, self.country)
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    /// Accepts `en`, `en-US`, `en_US` and `en-rUS`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(['-', '_']);

        let language = parts.next().unwrap_or_default();
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("invalid locale language: {:?}", s));
        }

        let country = parts.next().unwrap_or_default();
        let country = match country.strip_prefix('r') {
            Some(rest) if rest.len() == 2 => rest,
            _ => country,
        };

        if parts.next().is_some() || !country.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid locale region: {:?}", s));
        }

        Ok(Locale::new(
            language.to_ascii_lowercase(),
            country.to_ascii_uppercase(),
        ))
    }
}

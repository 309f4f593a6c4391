//! # Locale Codes
//!
//! Two-letter language codes, `Accept-Language` parsing and the typed
//! mapping from a base attribute name to its per-locale column.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized two-letter, lower-case language code (e.g. `en`, `uk`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocaleCode(String);

impl LocaleCode {
    /// Normalize a raw candidate: trim, lower-case, keep the first two
    /// characters. Returns `None` when fewer than two letters remain.
    pub fn normalize(raw: &str) -> Option<Self> {
        let prefix: String = raw.trim().chars().take(2).collect();
        let prefix = prefix.to_lowercase();
        if prefix.chars().count() == 2 && prefix.chars().all(|c| c.is_ascii_lowercase()) {
            Some(Self(prefix))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LocaleCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LocaleCode::normalize(&value).ok_or_else(|| format!("invalid locale code '{value}'"))
    }
}

impl From<LocaleCode> for String {
    fn from(code: LocaleCode) -> Self {
        code.0
    }
}

/// Parse an `Accept-Language` header into candidate codes, best first.
///
/// Entries are deduplicated by their two-letter prefix (the highest weight
/// wins) and ordered by weight, ties keeping header order. Malformed
/// segments are skipped.
pub fn parse_accept_language(header: &str) -> Vec<LocaleCode> {
    let mut weighted: Vec<(LocaleCode, f32)> = Vec::new();

    for segment in header.split(',') {
        let mut parts = segment.split(';');
        let tag = parts.next().unwrap_or_default().trim();
        if tag.is_empty() || tag == "*" {
            continue;
        }

        let weight = match quality(parts) {
            Some(q) => q,
            None => continue,
        };

        let Some(code) = LocaleCode::normalize(tag) else {
            continue;
        };

        match weighted.iter_mut().find(|(existing, _)| *existing == code) {
            Some((_, w)) if weight > *w => *w = weight,
            Some(_) => {}
            None => weighted.push((code, weight)),
        }
    }

    // sort_by is stable, so equal weights keep header order
    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    weighted.into_iter().map(|(code, _)| code).collect()
}

/// Extract the `q=` weight from the parameters of one segment.
/// Missing weight means 1.0; unparsable or non-positive weights reject the segment.
fn quality<'a>(params: impl Iterator<Item = &'a str>) -> Option<f32> {
    for param in params {
        let param = param.trim();
        if let Some(value) = param.strip_prefix("q=").or_else(|| param.strip_prefix("Q=")) {
            let q: f32 = value.trim().parse().ok()?;
            return (q.is_finite() && q > 0.0).then_some(q.min(1.0));
        }
    }
    Some(1.0)
}

/// Locales that have dedicated columns for localized reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedLocale {
    Uk,
    En,
    Ru,
}

impl SupportedLocale {
    pub const ALL: [SupportedLocale; 3] = [SupportedLocale::Uk, SupportedLocale::En, SupportedLocale::Ru];

    pub fn code(&self) -> &'static str {
        match self {
            SupportedLocale::Uk => "uk",
            SupportedLocale::En => "en",
            SupportedLocale::Ru => "ru",
        }
    }
}

impl TryFrom<&LocaleCode> for SupportedLocale {
    type Error = LocaleCode;

    fn try_from(code: &LocaleCode) -> Result<Self, Self::Error> {
        match code.as_str() {
            "uk" => Ok(SupportedLocale::Uk),
            "en" => Ok(SupportedLocale::En),
            "ru" => Ok(SupportedLocale::Ru),
            _ => Err(code.clone()),
        }
    }
}

/// Concrete column name for a localized attribute: `name` + `En` → `name_en`
pub fn localized_field(base: &str, locale: SupportedLocale) -> String {
    format!("{}_{}", base, locale.code())
}

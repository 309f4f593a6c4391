//! # Locale Resolution
//!
//! Decides which language applies to a request. Candidate sources are
//! tried in a fixed priority order. Every source may hold a weighted list
//! in `Accept-Language` syntax (`fr,uk` or `fr;q=0.9,uk;q=0.2`); its codes
//! are tried best first and the first enabled code wins:
//!
//! ```text
//!  1. POST `lang`            (body field)
//!  2. GET  `lang`            (query parameter)
//!  3. principal preference   (bearer token / login)
//!  4. session `lang`         (web only)
//!  5. cookie `lang`          (web only)
//!  6. Accept-Language        (weighted, best first)
//!  7. configured default     (always enabled)
//! ```

use crate::catalog::LanguageCatalog;
use crate::error::LocaleError;
use crate::locale::{parse_accept_language, LocaleCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Name of the request parameter, session key and cookie carrying the locale
pub const LOCALE_PARAM: &str = "lang";

/// Raw locale signals extracted from one request
#[derive(Debug, Clone, Default)]
pub struct LocaleSignals {
    pub post_param: Option<String>,
    pub query_param: Option<String>,
    pub principal_language: Option<String>,
    pub session_locale: Option<String>,
    pub cookie_locale: Option<String>,
    pub accept_language: Option<String>,
}

/// Which source produced the resolved locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocaleSource {
    PostParam,
    QueryParam,
    Principal,
    Session,
    Cookie,
    AcceptLanguage,
    Default,
}

/// Outcome of resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocale {
    pub code: LocaleCode,
    pub source: LocaleSource,
}

pub struct LocaleResolver {
    catalog: Arc<LanguageCatalog>,
    default: LocaleCode,
}

impl LocaleResolver {
    pub fn new(catalog: Arc<LanguageCatalog>, default: LocaleCode) -> Self {
        Self { catalog, default }
    }

    pub fn default_locale(&self) -> &LocaleCode {
        &self.default
    }

    pub fn catalog(&self) -> &Arc<LanguageCatalog> {
        &self.catalog
    }

    /// Startup check: the fallback must itself be an enabled language
    pub async fn ensure_default_enabled(&self) -> Result<(), LocaleError> {
        if self.catalog.is_enabled(&self.default).await? {
            Ok(())
        } else {
            Err(LocaleError::DefaultNotEnabled {
                code: self.default.to_string(),
            })
        }
    }

    /// Resolve the locale for one request. API requests skip session and cookie.
    #[instrument(skip(self, signals))]
    pub async fn resolve(
        &self,
        signals: &LocaleSignals,
        is_api: bool,
    ) -> Result<ResolvedLocale, LocaleError> {
        let enabled = self.catalog.enabled_codes().await?;
        let weighted = |raw: &Option<String>| {
            raw.as_deref().map(parse_accept_language).unwrap_or_default()
        };

        let mut candidates: Vec<(LocaleSource, Vec<LocaleCode>)> = vec![
            (LocaleSource::PostParam, weighted(&signals.post_param)),
            (LocaleSource::QueryParam, weighted(&signals.query_param)),
            (LocaleSource::Principal, weighted(&signals.principal_language)),
        ];
        if !is_api {
            candidates.push((LocaleSource::Session, weighted(&signals.session_locale)));
            candidates.push((LocaleSource::Cookie, weighted(&signals.cookie_locale)));
        }
        candidates.push((LocaleSource::AcceptLanguage, weighted(&signals.accept_language)));

        let found = candidates
            .into_iter()
            .flat_map(|(source, codes)| codes.into_iter().map(move |code| (source, code)))
            .find(|(_, code)| enabled.contains(code));

        let resolved = match found {
            Some((source, code)) => ResolvedLocale { code, source },
            None => ResolvedLocale {
                code: self.default.clone(),
                source: LocaleSource::Default,
            },
        };

        debug!(locale = %resolved.code, source = ?resolved.source, "Resolved locale");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryLanguageStore, LanguageEntry};

    fn code(raw: &str) -> LocaleCode {
        LocaleCode::normalize(raw).unwrap()
    }

    /// Enabled set {uk, en}, default en
    fn resolver() -> LocaleResolver {
        let catalog = LanguageCatalog::new(Arc::new(InMemoryLanguageStore::seeded()));
        LocaleResolver::new(Arc::new(catalog), code("en"))
    }

    fn all_conflicting() -> LocaleSignals {
        LocaleSignals {
            post_param: None,
            query_param: None,
            principal_language: Some("en".into()),
            session_locale: Some("en".into()),
            cookie_locale: Some("en".into()),
            accept_language: Some("en-US,en;q=0.9".into()),
        }
    }

    #[tokio::test]
    async fn test_explicit_param_beats_every_other_signal() {
        let resolver = resolver();
        for is_api in [false, true] {
            let signals = LocaleSignals {
                query_param: Some("uk".into()),
                ..all_conflicting()
            };
            let resolved = resolver.resolve(&signals, is_api).await.unwrap();
            assert_eq!(resolved.code, code("uk"));
            assert_eq!(resolved.source, LocaleSource::QueryParam);
        }
    }

    #[tokio::test]
    async fn test_post_param_beats_query_param() {
        let signals = LocaleSignals {
            post_param: Some("en".into()),
            query_param: Some("uk".into()),
            ..Default::default()
        };
        let resolved = resolver().resolve(&signals, false).await.unwrap();
        assert_eq!(resolved.source, LocaleSource::PostParam);
        assert_eq!(resolved.code, code("en"));
    }

    #[tokio::test]
    async fn test_weighted_list_in_any_source() {
        let resolver = resolver();

        let signals = LocaleSignals {
            query_param: Some("fr,uk".into()),
            accept_language: Some("en".into()),
            ..Default::default()
        };
        let resolved = resolver.resolve(&signals, true).await.unwrap();
        assert_eq!(resolved.code, code("uk"));
        assert_eq!(resolved.source, LocaleSource::QueryParam);

        let signals = LocaleSignals {
            post_param: Some("fr;q=0.9,uk;q=0.2".into()),
            ..Default::default()
        };
        let resolved = resolver.resolve(&signals, true).await.unwrap();
        assert_eq!(resolved.code, code("uk"));
        assert_eq!(resolved.source, LocaleSource::PostParam);

        // A list with no enabled code falls through to the next source
        let signals = LocaleSignals {
            cookie_locale: Some("fr,de".into()),
            accept_language: Some("uk".into()),
            ..Default::default()
        };
        let resolved = resolver.resolve(&signals, false).await.unwrap();
        assert_eq!(resolved.source, LocaleSource::AcceptLanguage);
    }

    #[tokio::test]
    async fn test_disabled_param_falls_through() {
        let signals = LocaleSignals {
            query_param: Some("ru".into()),
            principal_language: Some("uk".into()),
            ..Default::default()
        };
        let resolved = resolver().resolve(&signals, true).await.unwrap();
        assert_eq!(resolved.code, code("uk"));
        assert_eq!(resolved.source, LocaleSource::Principal);
    }

    #[tokio::test]
    async fn test_api_requests_skip_session_and_cookie() {
        let signals = LocaleSignals {
            session_locale: Some("uk".into()),
            cookie_locale: Some("uk".into()),
            ..Default::default()
        };
        let resolver = resolver();

        let web = resolver.resolve(&signals, false).await.unwrap();
        assert_eq!(web.code, code("uk"));
        assert_eq!(web.source, LocaleSource::Session);

        let api = resolver.resolve(&signals, true).await.unwrap();
        assert_eq!(api.code, code("en"));
        assert_eq!(api.source, LocaleSource::Default);
    }

    #[tokio::test]
    async fn test_cookie_used_when_session_empty() {
        let signals = LocaleSignals {
            cookie_locale: Some("uk".into()),
            accept_language: Some("en".into()),
            ..Default::default()
        };
        let resolved = resolver().resolve(&signals, false).await.unwrap();
        assert_eq!(resolved.source, LocaleSource::Cookie);
    }

    #[tokio::test]
    async fn test_accept_language_highest_matching_weight() {
        let signals = LocaleSignals {
            accept_language: Some("fr;q=0.5,en;q=0.9".into()),
            ..Default::default()
        };
        let resolved = resolver().resolve(&signals, true).await.unwrap();
        assert_eq!(resolved.code, code("en"));
        assert_eq!(resolved.source, LocaleSource::AcceptLanguage);
    }

    #[tokio::test]
    async fn test_accept_language_skips_unknown_codes() {
        let signals = LocaleSignals {
            accept_language: Some("de,fr;q=0.9,uk;q=0.2".into()),
            ..Default::default()
        };
        let resolved = resolver().resolve(&signals, true).await.unwrap();
        assert_eq!(resolved.code, code("uk"));
    }

    #[tokio::test]
    async fn test_nothing_matches_returns_default() {
        let signals = LocaleSignals {
            query_param: Some("x".into()),
            accept_language: Some(";;garbage,,q=1".into()),
            ..Default::default()
        };
        let resolver = resolver();
        let resolved = resolver.resolve(&signals, false).await.unwrap();
        assert_eq!(resolved.code, code("en"));
        assert_eq!(resolved.source, LocaleSource::Default);
        assert!(resolver.ensure_default_enabled().await.is_ok());
    }

    #[tokio::test]
    async fn test_default_must_be_enabled() {
        let store = InMemoryLanguageStore::new(vec![LanguageEntry::new(
            "uk", "Укр", "Українська", true, 1,
        )]);
        let catalog = Arc::new(LanguageCatalog::new(Arc::new(store)));
        let resolver = LocaleResolver::new(catalog, code("en"));

        assert!(matches!(
            resolver.ensure_default_enabled().await,
            Err(LocaleError::DefaultNotEnabled { .. })
        ));
    }
}

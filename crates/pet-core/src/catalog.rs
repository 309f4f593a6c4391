//! # Language Catalog
//!
//! Read-mostly cached view over the `languages` reference table.
//! The enabled set is cached for a fixed TTL, so a language toggled
//! out of band becomes visible within one TTL window.

use crate::error::LocaleError;
use crate::locale::LocaleCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default cache lifetime for the enabled-language set
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(3600);

/// A row of the language reference table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    /// Two-letter code, primary key
    pub code: String,
    pub short_name: String,
    pub full_name: String,
    pub is_enabled: bool,
    /// Display and resolution priority, ascending
    pub order: i32,
}

impl LanguageEntry {
    pub fn new(
        code: impl Into<String>,
        short_name: impl Into<String>,
        full_name: impl Into<String>,
        is_enabled: bool,
        order: i32,
    ) -> Self {
        Self {
            code: code.into(),
            short_name: short_name.into(),
            full_name: full_name.into(),
            is_enabled,
            order,
        }
    }
}

/// Port over the language reference table
#[async_trait]
pub trait LanguageStore: Send + Sync {
    /// All rows, in any order
    async fn list_languages(&self) -> Result<Vec<LanguageEntry>, LocaleError>;

    /// Admin operation: toggle a language
    async fn set_enabled(&self, code: &str, enabled: bool) -> Result<LanguageEntry, LocaleError>;
}

/// In-memory language table
#[derive(Default)]
pub struct InMemoryLanguageStore {
    rows: RwLock<Vec<LanguageEntry>>,
}

impl InMemoryLanguageStore {
    pub fn new(rows: Vec<LanguageEntry>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Store with the stock seed: Ukrainian and English enabled, Russian disabled
    pub fn seeded() -> Self {
        Self::new(vec![
            LanguageEntry::new("uk", "Укр", "Українська", true, 1),
            LanguageEntry::new("en", "Eng", "English", true, 2),
            LanguageEntry::new("ru", "Рус", "Русский", false, 3),
        ])
    }
}

#[async_trait]
impl LanguageStore for InMemoryLanguageStore {
    async fn list_languages(&self) -> Result<Vec<LanguageEntry>, LocaleError> {
        Ok(self.rows.read().await.clone())
    }

    async fn set_enabled(&self, code: &str, enabled: bool) -> Result<LanguageEntry, LocaleError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|row| row.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| LocaleError::UnknownLanguage {
                code: code.to_string(),
            })?;
        row.is_enabled = enabled;
        Ok(row.clone())
    }
}

#[derive(Clone)]
struct CachedLanguages {
    entries: Arc<[LanguageEntry]>,
    codes: Arc<[LocaleCode]>,
    loaded_at: Instant,
}

/// TTL-cached view of the enabled languages
pub struct LanguageCatalog {
    store: Arc<dyn LanguageStore>,
    ttl: Duration,
    cache: RwLock<Option<CachedLanguages>>,
}

impl LanguageCatalog {
    pub fn new(store: Arc<dyn LanguageStore>) -> Self {
        Self::with_ttl(store, DEFAULT_CATALOG_TTL)
    }

    pub fn with_ttl(store: Arc<dyn LanguageStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Enabled codes, lower-cased, ordered by `order` ascending, deduplicated
    pub async fn enabled_codes(&self) -> Result<Arc<[LocaleCode]>, LocaleError> {
        Ok(self.cached().await?.codes)
    }

    /// Enabled entries in display order
    pub async fn enabled_languages(&self) -> Result<Arc<[LanguageEntry]>, LocaleError> {
        Ok(self.cached().await?.entries)
    }

    pub async fn is_enabled(&self, code: &LocaleCode) -> Result<bool, LocaleError> {
        Ok(self.enabled_codes().await?.contains(code))
    }

    /// Toggle a language through the store and drop the cache
    pub async fn set_enabled(&self, code: &str, enabled: bool) -> Result<LanguageEntry, LocaleError> {
        let entry = self.store.set_enabled(code, enabled).await?;
        self.invalidate().await;
        Ok(entry)
    }

    /// Forget the cached set; the next read reloads from the store
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn cached(&self) -> Result<CachedLanguages, LocaleError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.clone());
            }
        }

        // Two callers may reload at once; the result is identical either way.
        let fresh = self.load().await?;
        *self.cache.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    async fn load(&self) -> Result<CachedLanguages, LocaleError> {
        let mut rows = self.store.list_languages().await?;
        rows.retain(|row| row.is_enabled);
        rows.sort_by_key(|row| row.order);

        let mut codes: Vec<LocaleCode> = Vec::with_capacity(rows.len());
        for row in &rows {
            match LocaleCode::normalize(&row.code) {
                Some(code) if !codes.contains(&code) => codes.push(code),
                Some(_) => {}
                None => warn!(code = %row.code, "Skipping language with invalid code"),
            }
        }

        debug!(count = codes.len(), "Loaded enabled languages");

        Ok(CachedLanguages {
            entries: rows.into(),
            codes: codes.into(),
            loaded_at: Instant::now(),
        })
    }
}

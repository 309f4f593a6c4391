//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the locale pipeline, payment drivers, order reconciler and
//! the storage adapters behind them.

use crate::drivers;
use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use pet_core::{
    DriverRegistry, InMemoryLanguageStore, InMemoryOrderStore, InMemoryUserStore,
    LanguageCatalog, LanguageStore, LocaleCode, LocalePersistence, LocaleResolver, OrderStore,
    PaymentOrderReconciler, Principal, Role, UserId, UserStore, DEFAULT_SESSION_TTL,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for callbacks
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Locale used when no request signal matches
    pub default_locale: String,
    /// How long the enabled-language list is cached
    pub language_cache_ttl: Duration,
    /// Payment driver configuration file
    pub payment_config: PathBuf,
    /// Lifetime of a web session after its last change
    pub session_ttl: Duration,
    /// Secret for the encrypted session cookie (at least 64 bytes).
    /// Without one a random key is used and sessions end on restart.
    pub session_key: Option<String>,
    /// Register the fixed development tokens (`SEED_DEV_USERS=1`)
    pub seed_dev_users: bool,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            default_locale: std::env::var("DEFAULT_LOCALE").unwrap_or_else(|_| "en".to_string()),
            language_cache_ttl: std::env::var("LANGUAGE_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(pet_core::catalog::DEFAULT_CATALOG_TTL),
            payment_config: std::env::var("PAYMENT_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config/payment.toml")),
            session_ttl: std::env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SESSION_TTL),
            session_key: std::env::var("SESSION_KEY").ok().filter(|k| !k.is_empty()),
            seed_dev_users: is_enabled_flag(std::env::var("SEED_DEV_USERS").ok().as_deref()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            default_locale: "en".to_string(),
            language_cache_ttl: pet_core::catalog::DEFAULT_CATALOG_TTL,
            payment_config: PathBuf::from("config/payment.toml"),
            session_ttl: DEFAULT_SESSION_TTL,
            session_key: None,
            seed_dev_users: false,
        }
    }
}

fn is_enabled_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Storage adapters the application runs on
#[derive(Clone)]
pub struct Stores {
    pub languages: Arc<dyn LanguageStore>,
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// Process-local stores with the seeded language table
    pub fn in_memory(users: Arc<dyn UserStore>) -> Self {
        Self {
            languages: Arc::new(InMemoryLanguageStore::seeded()),
            users,
            orders: Arc::new(InMemoryOrderStore::new()),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Enabled-language cache
    pub catalog: Arc<LanguageCatalog>,
    /// Per-request locale selection
    pub resolver: Arc<LocaleResolver>,
    /// Session / cookie / profile write-back
    pub persistence: Arc<LocalePersistence>,
    pub users: Arc<dyn UserStore>,
    /// Encrypts the session cookie
    pub session_key: Key,
    /// Payment driver registry
    pub drivers: Arc<DriverRegistry>,
    /// Order lifecycle
    pub reconciler: Arc<PaymentOrderReconciler>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create the production state: in-memory stores, drivers from config
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let users = Arc::new(InMemoryUserStore::new());
        if config.seed_dev_users {
            if config.is_production() {
                warn!("SEED_DEV_USERS is set in production; fixed development tokens are active");
            }
            seed_dev_users(&users).await;
        }

        let settings = drivers::load_payment_settings(&config)?;
        let registry = drivers::build_registry(settings);

        Self::assemble(config, Stores::in_memory(users), registry).await
    }

    /// Wire state from explicit parts and run startup checks
    pub async fn assemble(
        config: AppConfig,
        stores: Stores,
        drivers: DriverRegistry,
    ) -> anyhow::Result<Self> {
        let default_locale = LocaleCode::normalize(&config.default_locale)
            .with_context(|| format!("DEFAULT_LOCALE '{}' is not a language code", config.default_locale))?;

        let catalog = Arc::new(LanguageCatalog::with_ttl(
            stores.languages.clone(),
            config.language_cache_ttl,
        ));
        let resolver = Arc::new(LocaleResolver::new(catalog.clone(), default_locale));
        resolver
            .ensure_default_enabled()
            .await
            .context("Default locale check failed")?;

        drivers
            .validate()
            .map_err(|e| anyhow::anyhow!("Failed to initialize payment drivers: {}", e))?;
        if drivers.driver_names().is_empty() {
            warn!("No payment drivers configured; payment endpoints will reject requests");
        }

        let session_key = match config.session_key.as_deref() {
            Some(secret) => Key::try_from(secret.as_bytes())
                .map_err(|e| anyhow::anyhow!("SESSION_KEY must be at least 64 bytes: {e}"))?,
            None => {
                if config.is_production() {
                    warn!("SESSION_KEY not set; using a random key, sessions end on restart");
                }
                Key::try_generate().context("Failed to generate a session key")?
            }
        };

        Ok(Self {
            persistence: Arc::new(LocalePersistence::new(stores.users.clone(), config.session_ttl)),
            reconciler: Arc::new(PaymentOrderReconciler::new(stores.orders)),
            catalog,
            resolver,
            users: stores.users,
            session_key,
            drivers: Arc::new(drivers),
            config,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.session_key.clone()
    }
}

/// Development accounts so the API is usable without an identity provider
async fn seed_dev_users(users: &InMemoryUserStore) {
    users
        .insert(Principal::new(UserId(1), "owner@petcare.local"), "dev-owner-token")
        .await;
    users
        .insert(
            Principal::new(UserId(2), "admin@petcare.local").with_role(Role::Admin),
            "dev-admin-token",
        )
        .await;
    info!("Seeded development users (tokens: dev-owner-token, dev-admin-token)");
}

//! # Locale Persistence
//!
//! Writes a resolved locale back to where the next request will find it:
//! the session and a long-lived cookie for web requests, and the user's
//! profile for any authenticated request. Profile writes are best-effort;
//! failures are logged and never fail the request.

use crate::locale::LocaleCode;
use crate::principal::{Principal, UserStore};
use crate::resolver::{ResolvedLocale, LOCALE_PARAM};
use crate::session::SessionData;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifetime of the locale cookie (one year)
pub const LOCALE_COOKIE_MAX_AGE: Duration = Duration::from_secs(525_600 * 60);

/// A cookie to attach to the outgoing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleCookie {
    pub name: &'static str,
    pub value: LocaleCode,
    pub max_age: Duration,
}

impl LocaleCookie {
    pub fn new(value: LocaleCode) -> Self {
        Self {
            name: LOCALE_PARAM,
            value,
            max_age: LOCALE_COOKIE_MAX_AGE,
        }
    }
}

/// Who the locale should be persisted for
#[derive(Debug, Clone, Default)]
pub struct LocaleTarget {
    pub session: Option<SessionData>,
    pub principal: Option<Principal>,
}

/// What `apply` did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleEffects {
    pub session_written: bool,
    pub cookie: Option<LocaleCookie>,
    pub profile_updated: bool,
}

pub struct LocalePersistence {
    users: Arc<dyn UserStore>,
    session_ttl: Duration,
}

impl LocalePersistence {
    pub fn new(users: Arc<dyn UserStore>, session_ttl: Duration) -> Self {
        Self { users, session_ttl }
    }

    pub async fn apply(
        &self,
        resolved: &ResolvedLocale,
        target: &mut LocaleTarget,
        is_api: bool,
    ) -> LocaleEffects {
        let mut effects = LocaleEffects::default();
        let code = &resolved.code;

        if !is_api {
            if let Some(session) = target.session.as_mut() {
                session.insert(LOCALE_PARAM, code.as_str(), self.session_ttl, Utc::now());
                effects.session_written = session.is_changed();
            }
            effects.cookie = Some(LocaleCookie::new(code.clone()));
        }

        if let Some(principal) = &target.principal {
            if principal.language_code.as_ref() != Some(code) {
                match self.users.update_language(principal.id, code).await {
                    Ok(()) => {
                        debug!(user_id = %principal.id, locale = %code, "Updated user language");
                        effects.profile_updated = true;
                    }
                    Err(e) => {
                        warn!(user_id = %principal.id, error = %e, "Failed to persist user language")
                    }
                }
            }
        }

        effects
    }
}

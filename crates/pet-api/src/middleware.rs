//! # Locale Middleware
//!
//! Runs in front of every route. Identifies the caller, gathers the locale
//! signals of the request, resolves the locale, writes it back to session,
//! cookie and profile, and exposes the result to handlers through request
//! extensions:
//!
//! - `ResolvedLocale` - always present
//! - `Principal` - present when a valid bearer token was sent
//!
//! The response carries `Content-Language` plus any cookies to set. Web
//! session state lives in an encrypted cookie, so nothing is kept on the
//! server per visitor.

use crate::error::{locale_error_to_response, unauthorized, validation_error, ApiError};
use crate::extract::{bearer_token, body_fields};
use crate::state::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, PrivateCookieJar, SameSite};
use chrono::Utc;
use pet_core::{LocaleCookie, LocaleSignals, LocaleTarget, Principal, ResolvedLocale, SessionData, LOCALE_PARAM};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Cookie carrying the encrypted session state for web requests
pub const SESSION_COOKIE: &str = "petcare_session";

/// Largest POST body buffered while looking for a `lang` field
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

/// API requests never touch session or cookie state
pub fn is_api_request(path: &str, headers: &HeaderMap) -> bool {
    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));
    path == "/api" || path.starts_with("/api/") || wants_json
}

pub async fn resolve_locale(
    State(state): State<AppState>,
    cookies: CookieJar,
    sessions: PrivateCookieJar,
    request: Request,
    next: Next,
) -> Response {
    match prepare(&state, &cookies, &sessions, request).await {
        Ok(prepared) => finish(prepared, sessions, next).await,
        Err(rejection) => rejection.into_response(),
    }
}

struct Prepared {
    request: Request,
    resolved: ResolvedLocale,
    session: Option<SessionData>,
    session_ttl: Duration,
    locale_cookie: Option<LocaleCookie>,
}

async fn prepare(
    state: &AppState,
    cookies: &CookieJar,
    sessions: &PrivateCookieJar,
    request: Request,
) -> Result<Prepared, ApiError> {
    let (mut parts, body) = request.into_parts();
    let is_api = is_api_request(parts.uri.path(), &parts.headers);

    let mut principal = match bearer_token(&parts.headers) {
        Some(token) => state
            .users
            .find_by_token(token)
            .await
            .map_err(locale_error_to_response)?,
        None => None,
    };

    let now = Utc::now();
    let session = (!is_api).then(|| {
        sessions
            .get(SESSION_COOKIE)
            .and_then(|cookie| SessionData::decode(cookie.value(), now))
            .unwrap_or_else(|| SessionData::new(state.config.session_ttl, now))
    });

    // POST bodies are buffered so `lang` can be read and the handler still sees the body
    let (post_param, body) = if parts.method == Method::POST {
        let bytes = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| validation_error("body", format!("unreadable request body: {e}")))?;
        let fields = body_fields(&parts.headers, &bytes).await;
        (fields.get(LOCALE_PARAM).cloned(), Body::from(bytes))
    } else {
        (None, body)
    };

    let signals = LocaleSignals {
        post_param,
        query_param: Query::<LangQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.lang),
        principal_language: principal
            .as_ref()
            .and_then(|p| p.language_code.as_ref())
            .map(|code| code.to_string()),
        session_locale: session
            .as_ref()
            .and_then(|s| s.get(LOCALE_PARAM))
            .map(String::from),
        cookie_locale: if is_api {
            None
        } else {
            cookies.get(LOCALE_PARAM).map(|c| c.value().to_string())
        },
        accept_language: parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };

    let resolved = state
        .resolver
        .resolve(&signals, is_api)
        .await
        .map_err(locale_error_to_response)?;

    let mut target = LocaleTarget {
        session,
        principal: principal.clone(),
    };
    let effects = state.persistence.apply(&resolved, &mut target, is_api).await;
    if effects.profile_updated {
        if let Some(principal) = principal.as_mut() {
            principal.language_code = Some(resolved.code.clone());
        }
    }

    debug!(
        locale = %resolved.code,
        source = ?resolved.source,
        is_api,
        authenticated = principal.is_some(),
        "Request locale"
    );

    parts.extensions.insert(resolved.clone());
    if let Some(principal) = principal {
        parts.extensions.insert(principal);
    }

    Ok(Prepared {
        request: Request::from_parts(parts, body),
        resolved,
        session: target.session,
        session_ttl: state.config.session_ttl,
        locale_cookie: effects.cookie,
    })
}

async fn finish(prepared: Prepared, sessions: PrivateCookieJar, next: Next) -> Response {
    let mut response = next.run(prepared.request).await;

    if let Ok(value) = HeaderValue::from_str(prepared.resolved.code.as_str()) {
        response.headers_mut().insert(header::CONTENT_LANGUAGE, value);
    }

    let mut cookies = CookieJar::new();
    if let Some(locale) = prepared.locale_cookie {
        cookies = cookies.add(
            Cookie::build((locale.name, locale.value.to_string()))
                .path("/")
                .same_site(SameSite::Lax)
                .max_age(max_age(locale.max_age)),
        );
    }

    // Only changed sessions are re-issued; the TTL runs from the last change
    let mut sessions = sessions;
    if let Some(encoded) = prepared
        .session
        .filter(SessionData::is_changed)
        .and_then(|session| session.encode())
    {
        sessions = sessions.add(
            Cookie::build((SESSION_COOKIE, encoded))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(max_age(prepared.session_ttl)),
        );
    }

    (sessions, cookies, response).into_response()
}

fn max_age(duration: Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}

/// Extractor for routes that require a bearer-authenticated caller
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_api_request() {
        let none = HeaderMap::new();
        assert!(is_api_request("/api/languages", &none));
        assert!(is_api_request("/api", &none));
        assert!(!is_api_request("/apiary", &none));
        assert!(!is_api_request("/health", &none));

        let mut json = HeaderMap::new();
        json.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/plain"));
        assert!(is_api_request("/health", &json));
    }
}

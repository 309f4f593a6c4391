//! Request parsing helpers shared by the locale middleware and the
//! provider callback endpoints. Cookies go through axum-extra jars.

use axum::{
    body::{Body, Bytes},
    extract::{Form, FromRequest, Json},
    http::{header, HeaderMap, Method, Request},
};
use std::collections::HashMap;

/// Flat string fields of a form or JSON object body. Other bodies yield
/// nothing; JSON scalars are kept in their textual form.
pub async fn body_fields(headers: &HeaderMap, body: &Bytes) -> HashMap<String, String> {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).cloned() else {
        return HashMap::new();
    };
    let rebuild = || {
        Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, content_type.clone())
            .body(Body::from(body.clone()))
            .ok()
    };

    if let Some(request) = rebuild() {
        if let Ok(Json(object)) =
            Json::<serde_json::Map<String, serde_json::Value>>::from_request(request, &()).await
        {
            return object
                .into_iter()
                .filter_map(|(key, value)| scalar_text(value).map(|text| (key, text)))
                .collect();
        }
    }

    if let Some(request) = rebuild() {
        if let Ok(Form(fields)) = Form::<HashMap<String, String>>::from_request(request, &()).await {
            return fields;
        }
    }

    HashMap::new()
}

fn scalar_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Request headers as a lower-cased name → value map (non-UTF-8 values dropped)
pub fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[tokio::test]
    async fn test_body_fields_form_and_json() {
        let form = headers(&[(header::CONTENT_TYPE, "application/x-www-form-urlencoded")]);
        let fields = body_fields(&form, &Bytes::from_static(b"lang=uk&data=abc%3D%3D")).await;
        assert_eq!(fields.get("lang").map(String::as_str), Some("uk"));
        assert_eq!(fields.get("data").map(String::as_str), Some("abc=="));

        let json = headers(&[(header::CONTENT_TYPE, "application/json")]);
        let fields = body_fields(&json, &Bytes::from_static(br#"{"lang":"en","amount":150.5,"x":{}}"#)).await;
        assert_eq!(fields.get("lang").map(String::as_str), Some("en"));
        assert_eq!(fields.get("amount").map(String::as_str), Some("150.5"));
        assert!(!fields.contains_key("x"));

        let text = headers(&[(header::CONTENT_TYPE, "text/plain")]);
        assert!(body_fields(&text, &Bytes::from_static(b"lang=uk")).await.is_empty());
        assert!(body_fields(&HeaderMap::new(), &Bytes::from_static(b"lang=uk")).await.is_empty());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer abc")])), Some("abc"));
        assert_eq!(bearer_token(&headers(&[(header::AUTHORIZATION, "bearer abc")])), Some("abc"));
        assert_eq!(bearer_token(&headers(&[(header::AUTHORIZATION, "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer ")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}

//! # Request Handlers
//!
//! Axum request handlers for the languages, user and payment APIs.

use crate::error::{
    forbidden, locale_error_to_response, payment_error_to_response, validation_error, ApiError,
    ErrorResponse,
};
use crate::extract::{body_fields, header_map};
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use pet_core::{
    Capability, CreateOrder, Currency, LanguageEntry, LocaleCode, Order, OrderId, PaymentRequest,
    PaymentStatus, ProviderPayload, RawCallback, ResolvedLocale, Role,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create payment request
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Amount in major units ("150.50" or 150.5)
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Driver name (optional, defaults to the configured driver)
    #[serde(default)]
    pub pay_system: Option<String>,
    /// Existing pending order to pay again (optional)
    #[serde(default, alias = "orderId")]
    pub order_id: Option<String>,
    /// ISO currency code (optional, defaults to UAH)
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Create payment response
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub success: bool,
    /// What the client needs to complete payment at the provider
    pub payment: ProviderPayload,
    #[serde(rename = "orderId")]
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct PaymentResultQuery {
    #[serde(rename = "orderId", alias = "order_id")]
    pub order_id: Option<String>,
}

/// Order as shown on the payment result page
#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            amount: order.amount,
            currency: order.currency,
            status: order.payment_status,
            paid_at: order.paid_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResultResponse {
    pub success: bool,
    pub order: OrderSummary,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub success: bool,
    pub languages: Vec<LanguageEntry>,
    pub current: LocaleCode,
}

#[derive(Debug, Deserialize)]
pub struct ToggleLanguageRequest {
    pub is_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: u64,
    pub email: String,
    pub language_code: Option<LocaleCode>,
    pub roles: Vec<Role>,
    pub locale: ResolvedLocale,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "petcare",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Enabled languages in display order
pub async fn list_languages(
    State(state): State<AppState>,
    Extension(locale): Extension<ResolvedLocale>,
) -> Result<Json<LanguagesResponse>, ApiError> {
    let languages = state
        .catalog
        .enabled_languages()
        .await
        .map_err(locale_error_to_response)?;

    Ok(Json(LanguagesResponse {
        success: true,
        languages: languages.to_vec(),
        current: locale.code,
    }))
}

/// Enable or disable a language (admin)
#[instrument(skip_all, fields(user_id = %user.id, code = %code))]
pub async fn toggle_language(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(code): Path<String>,
    Json(request): Json<ToggleLanguageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !user.can(Capability::ManageLanguages) {
        return Err(forbidden());
    }

    let is_default = LocaleCode::normalize(&code).as_ref() == Some(state.resolver.default_locale());
    if is_default && !request.is_enabled {
        return Err(validation_error("is_enabled", "the default language cannot be disabled"));
    }

    let entry = state
        .catalog
        .set_enabled(&code, request.is_enabled)
        .await
        .map_err(locale_error_to_response)?;

    info!(code = %entry.code, enabled = entry.is_enabled, "Language toggled");

    Ok(Json(serde_json::json!({
        "success": true,
        "language": entry
    })))
}

/// Current user and the locale chosen for this request
pub async fn current_user(
    AuthenticatedUser(user): AuthenticatedUser,
    Extension(locale): Extension<ResolvedLocale>,
) -> Json<UserResponse> {
    Json(UserResponse {
        id: user.id.0,
        email: user.email,
        language_code: user.language_code,
        roles: user.roles.into_iter().collect(),
        locale,
    })
}

/// Create (or reuse) an order and start a payment for it
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_payment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
    let Json(request) = body.map_err(|e| validation_error("body", e.body_text()))?;

    let amount = request
        .amount
        .ok_or_else(|| validation_error("amount", "The amount field is required."))?;

    let currency = match request.currency.as_deref() {
        Some(code) => Currency::from_str(code).map_err(payment_error_to_response)?,
        None => Currency::default(),
    };

    let order_id = request
        .order_id
        .as_deref()
        .map(OrderId::parse)
        .transpose()
        .map_err(payment_error_to_response)?;

    let (pay_system, driver) = state
        .drivers
        .resolve(request.pay_system.as_deref())
        .map_err(payment_error_to_response)?;

    let order = state
        .reconciler
        .create_or_get_order(CreateOrder {
            user_id: user.id,
            order_id,
            amount,
            currency,
            pay_system,
            description: request.description,
        })
        .await
        .map_err(payment_error_to_response)?;

    let payment = driver
        .create_payment(&PaymentRequest::for_order(&order))
        .await
        .map_err(payment_error_to_response)?;

    info!(order_id = %order.order_id, driver = driver.driver_name(), "Payment created");

    Ok(Json(CreatePaymentResponse {
        success: true,
        payment,
        order_id: order.order_id,
    }))
}

/// Provider callback for a named driver
#[instrument(skip_all)]
pub async fn driver_callback(
    State(state): State<AppState>,
    Path(driver): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    process_callback(&state, &driver, &headers, body).await
}

/// Provider callback for the default driver
#[instrument(skip_all)]
pub async fn default_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    let driver = state
        .drivers
        .default_driver_name()
        .map(String::from)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("No default payment driver configured", "unknown_driver")),
            )
        })?;
    process_callback(&state, &driver, &headers, body).await
}

/// Shared callback flow: verify, normalize, reconcile
async fn process_callback(
    state: &AppState,
    driver_name: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    let driver = state
        .drivers
        .get_driver(driver_name)
        .map_err(payment_error_to_response)?;

    let callback = RawCallback {
        fields: body_fields(headers, &body).await,
        headers: header_map(headers),
        body: body.to_vec(),
    };

    let outcome = driver
        .handle_callback(&callback)
        .map_err(payment_error_to_response)?;

    info!(
        driver = driver.driver_name(),
        order_id = %outcome.order_id,
        status = %outcome.payment_status,
        "Payment callback received"
    );

    state
        .reconciler
        .apply_callback(&outcome)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(CallbackResponse { success: true }))
}

/// Payment result for the order owner (or staff)
pub async fn payment_result(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaymentResultQuery>,
) -> Result<Json<PaymentResultResponse>, ApiError> {
    let order_id = query
        .order_id
        .as_deref()
        .ok_or_else(|| validation_error("orderId", "The orderId field is required."))
        .and_then(|raw| OrderId::parse(raw).map_err(|_| validation_error("orderId", "invalid order id")))?;

    let order = state
        .reconciler
        .order_for_user(&order_id, &user)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(PaymentResultResponse {
        success: order.payment_status == PaymentStatus::Success,
        order: order.into(),
    }))
}

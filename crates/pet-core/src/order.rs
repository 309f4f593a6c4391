//! # Order Types
//!
//! Orders, payment statuses and currencies for the payment flow.
//! Orders are never deleted; they form the financial audit trail.

use crate::error::{PaymentError, PaymentResult};
use crate::principal::UserId;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a public order id (matches the unique column width)
pub const MAX_ORDER_ID_LEN: usize = 64;

/// Largest amount a single order may carry, in major units
pub const MAX_ORDER_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    UAH,
    USD,
    EUR,
    GBP,
    PLN,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::UAH => "UAH",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::PLN => "PLN",
        }
    }

    /// Convert a decimal amount to the smallest currency unit (kopiyka, cents)
    pub fn to_minor_units(&self, amount: Decimal) -> Option<i64> {
        amount.checked_mul(Decimal::ONE_HUNDRED)?.round().to_i64()
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::UAH
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UAH" => Ok(Currency::UAH),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "PLN" => Ok(Currency::PLN),
            other => Err(PaymentError::validation(
                "currency",
                format!("unsupported currency '{other}'"),
            )),
        }
    }
}

/// Payment status of an order
///
/// `Pending` is the only non-terminal state; an order moves forward out of
/// it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Fail,
    Cancel,
    Refund,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Fail => "fail",
            PaymentStatus::Cancel => "cancel",
            PaymentStatus::Refund => "refund",
            PaymentStatus::Expired => "expired",
        }
    }

    /// Any status other than `Pending`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "success" => Ok(PaymentStatus::Success),
            "fail" => Ok(PaymentStatus::Fail),
            "cancel" => Ok(PaymentStatus::Cancel),
            "refund" => Ok(PaymentStatus::Refund),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(PaymentError::validation(
                "payment_status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// Public-facing opaque order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh id: `ORD-<YYYYMMDD>-<HHMMSS>-<6 random alphanumerics>`
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        Self(format!("ORD-{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), suffix))
    }

    /// Validate a client- or provider-supplied id
    pub fn parse(raw: &str) -> PaymentResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PaymentError::validation("order_id", "must not be empty"));
        }
        if trimmed.len() > MAX_ORDER_ID_LEN {
            return Err(PaymentError::validation(
                "order_id",
                format!("must be at most {MAX_ORDER_ID_LEN} characters"),
            ));
        }
        if !trimmed.chars().all(|c| c.is_ascii_graphic()) {
            return Err(PaymentError::validation(
                "order_id",
                "must contain printable ASCII only",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wrap a value already known to be valid (storage rows, tests)
    pub fn from_trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payment order owned by a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Storage id
    pub id: u64,

    /// Owner, immutable after creation
    pub user_id: UserId,

    /// Public order id, unique and immutable
    pub order_id: OrderId,

    pub amount: Decimal,

    pub currency: Currency,

    /// Driver name used for the last payment attempt
    pub pay_system: String,

    pub payment_status: PaymentStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Set exactly once, when the order reaches `Success`
    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new pending order (storage id is assigned on insert)
    pub fn pending(
        user_id: UserId,
        order_id: OrderId,
        amount: Decimal,
        currency: Currency,
        pay_system: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let description = Some(format!("Payment for Order #{}", order_id));
        Self {
            id: 0,
            user_id,
            order_id,
            amount,
            currency,
            pay_system: pay_system.into(),
            payment_status: PaymentStatus::Pending,
            description,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: override the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.payment_status == PaymentStatus::Pending
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Success
    }
}

/// Mutable fields that may be re-targeted while an order is pending
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub amount: Decimal,
    pub currency: Currency,
    pub pay_system: String,
    pub description: Option<String>,
}

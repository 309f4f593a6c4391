//! # pet-api
//!
//! HTTP API layer for the petcare backend.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Per-request locale resolution middleware
//! - REST endpoints for languages, the current user and payments
//! - Callback endpoints for payment providers
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/languages` | Enabled languages |
//! | PATCH | `/api/languages/{code}` | Toggle a language (admin) |
//! | GET | `/api/user` | Current user |
//! | POST | `/api/payments` | Start a payment |
//! | GET | `/api/payments/result` | Payment result |
//! | POST | `/api/payments/{driver}/callback` | Provider callback |
//! | POST | `/api/payments/handle` | Default-driver callback |

pub mod drivers;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState, Stores};

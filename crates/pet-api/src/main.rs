//! # Petcare API
//!
//! Backend for the pet registry: locale-aware API and payments.
//!
//! ## Usage
//!
//! ```bash
//! # Provider credentials (or point PAYMENT_CONFIG at a TOML file)
//! export LIQPAY_PUBLIC_KEY=sandbox_i...
//! export LIQPAY_PRIVATE_KEY=sandbox_...
//!
//! # Run the server
//! petcare
//! ```

use pet_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Print banner
    print_banner();

    // Initialize application state
    let state = AppState::new().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Default locale: {}", state.resolver.default_locale());
    info!("Payment drivers: {:?}", state.drivers.driver_names());

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("🐾 Petcare API starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("💳 Payments: POST http://{}/api/payments", addr);
        info!("🔔 Callbacks: POST http://{}/api/payments/{{driver}}/callback", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  🐾 Petcare API 🐾
  ━━━━━━━━━━━━━━━━━━━━━━━
  Pet registry backend
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}

//! JobGenie upgrade server
//!
//! Axum-based server exposing the premium upgrade checkout flow as JSON
//! render directives for the frontend.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upgrade_core::{CheckoutOrchestrator, MemorySessionStore, PaymentGateway, PlanCatalog};
use upgrade_payments::{DisabledGateway, StripeGateway};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize payments
    let gateway: Arc<dyn PaymentGateway> = match config.stripe_secret_key.as_deref() {
        Some(secret_key) => {
            let stripe = StripeGateway::new(
                secret_key,
                &config.currency,
                &config.brand,
                config.checkout.gateway_timeout,
            )?;
            tracing::info!("✓ Stripe configured (currency: {})", stripe.currency_code());
            Arc::new(stripe)
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - paid plans cannot be purchased");
            tracing::warn!("  Set STRIPE_SECRET_KEY in .env");
            Arc::new(DisabledGateway)
        }
    };

    let catalog = Arc::new(PlanCatalog::jobgenie());
    tracing::info!("Loaded {} plans:", catalog.list_plans().len());
    for plan in catalog.list_plans() {
        tracing::info!("  • {} ({}, {} minor units)", plan.name, plan.id, plan.price_minor_units);
    }

    let orchestrator = CheckoutOrchestrator::new(
        catalog,
        Arc::new(MemorySessionStore::new()),
        gateway,
        config.checkout.clone(),
    );
    let app = routes::router(AppState::new(orchestrator));

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 upgrade server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health              - Health check");
    tracing::info!("  GET    /api/plans           - Plan catalog");
    tracing::info!("  GET    /api/upgrade?page=   - Navigation signal");
    tracing::info!("  GET    /api/upgrade/state   - Current step");
    tracing::info!("  POST   /api/upgrade/select  - Choose a plan");
    tracing::info!("  POST   /api/upgrade/exit    - Leave confirmation");
    tracing::info!("  DELETE /api/upgrade         - End session");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

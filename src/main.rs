use loanlink::config::{Config, StorageBackend};
use loanlink::domain::ports::{CheckoutGatewayRef, IdentityVerifierRef, Stores};
use loanlink::infrastructure::in_memory::in_memory_stores;
use loanlink::infrastructure::jwt::JwtVerifier;
use loanlink::infrastructure::stripe::StripeGateway;
use loanlink::interfaces::http::{AppState, router};
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().into_diagnostic()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("loanlink={},info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().into_diagnostic()?;

    let stores = open_stores(config.storage_backend()).await?;

    let gateway: CheckoutGatewayRef = Arc::new(
        StripeGateway::new(
            &config.stripe_api_base,
            config.stripe_secret_key().into_diagnostic()?,
            config.gateway_timeout(),
        )
        .into_diagnostic()?,
    );
    let verifier: IdentityVerifierRef =
        Arc::new(JwtVerifier::new(config.jwt_secret().into_diagnostic()?));

    let state = AppState::new(stores, gateway, verifier, config.checkout_settings());
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .into_diagnostic()?;
    info!(addr = %listener.local_addr().into_diagnostic()?, "loanlink listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .into_diagnostic()?;

    Ok(())
}

async fn open_stores(backend: StorageBackend) -> Result<Stores> {
    match backend {
        StorageBackend::InMemory { warning } => {
            if let Some(warning) = warning {
                eprintln!("{warning}");
            }
            Ok(in_memory_stores())
        }
        #[cfg(feature = "storage-mongodb")]
        StorageBackend::MongoDb { uri, database } => {
            let store = loanlink::infrastructure::mongo::MongoStore::connect(&uri, &database)
                .await
                .into_diagnostic()?;
            info!(database = %database, "connected to MongoDB");
            Ok(store.stores())
        }
    }
}

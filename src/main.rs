use std::sync::Arc;

use anyhow::Context;
use case_companion::app::AppContext;
use case_companion::config::AppConfig;
use case_companion::onboarding::LocalInviteResolver;
use case_companion::store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;
    let store_path = config.profile_store_path();
    let backend = JsonFileStore::open(&store_path)
        .await
        .with_context(|| format!("opening profile store at {}", store_path.display()))?;

    eprintln!("📁 Case Companion v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Profile store: {}", store_path.display());
    eprintln!(
        "   Ingestion: first stage after {}ms, then every {}ms",
        config.ingestion.first_stage_delay.as_millis(),
        config.ingestion.stage_interval.as_millis()
    );

    let ctx = AppContext::new(
        &config,
        Arc::new(backend),
        Arc::new(LocalInviteResolver::demo()),
    )
    .await?;

    let profile = ctx.profile.read().await;
    eprintln!(
        "   Onboarded: {} (landing on {})",
        profile.is_onboarded,
        ctx.navigator.location()
    );
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status", config.port);
    eprintln!("   Ingestion WS: ws://0.0.0.0:{}/ws/ingestion\n", config.port);

    let app = ctx.router();
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!(port = config.port, "Case Companion server started");
    axum::serve(listener, app).await?;

    Ok(())
}

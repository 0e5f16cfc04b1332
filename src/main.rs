use ai_email_assistant::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting AI email assistant");

    let config = AppConfig::from_env()?;
    config.log_summary();

    ai_email_assistant::web::serve(config).await?;
    Ok(())
}

use anyhow::Context;
use checkpoint_mentor::app;
use checkpoint_mentor::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;

    eprintln!("🧭 Checkpoint Mentor v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.mentor.model);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Commit strategy: {:?}", config.mentor.commit_strategy);
    eprintln!("   Chat API: http://0.0.0.0:{}/api/chat", config.port);
    eprintln!("   Student API: http://0.0.0.0:{}/api/student\n", config.port);

    let router = app::build(&config).await?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Mentor API listening on {}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

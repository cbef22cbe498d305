use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use profile_site_server::{
    build_router,
    config::Config,
    db::Database,
    services::{
        mailer::{Mailer, SmtpMailer},
        storage::ImageStore,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profile_site_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    // Ensure upload directory exists
    let images = ImageStore::new(&config.upload_dir);
    images.init().await?;
    tracing::info!(path = %config.upload_dir, "Upload directory ready");

    // Initialize database
    let db = Database::connect_with_retry(
        &config.database_url,
        config.database_connect_attempts,
        config.database_connect_delay,
    )
    .await?;
    db.run_migrations().await?;
    tracing::info!("Connected to database");

    let mailer = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Email sending configured");
            Some(Arc::new(SmtpMailer::new(smtp)?) as Arc<dyn Mailer>)
        }
        None => {
            tracing::info!("Email sending not configured");
            None
        }
    };

    if config.expose_reset_token {
        tracing::warn!("EXPOSE_RESET_TOKEN is on: reset tokens may be returned in API responses. Never enable this in production");
    }

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        images,
        mailer,
    };

    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

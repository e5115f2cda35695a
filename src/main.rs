use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use barbell::{
    api,
    config::Settings,
    notifications::{EmailNotifier, LogMailer, Mailer, NotificationManager, SmtpMailer},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barbell=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; PayHere credentials have no usable default
    let settings = Settings::new().map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        e
    })?;

    tracing::info!(
        "Starting Barbell server on {}:{} ({})",
        settings.server.host,
        settings.server.port,
        settings.server.environment
    );
    if settings.payhere.sandbox {
        tracing::info!("PayHere sandbox mode");
    }

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Email notifications; fall back to logging when SMTP is off or misconfigured
    let mailer: Arc<dyn Mailer> = if settings.email.enabled {
        match SmtpMailer::new(&settings.email) {
            Ok(smtp) => {
                tracing::info!("SMTP email enabled via {}", settings.email.smtp_host);
                Arc::new(smtp)
            }
            Err(e) => {
                tracing::warn!("SMTP configuration invalid ({}); emails will only be logged", e);
                Arc::new(LogMailer)
            }
        }
    } else {
        tracing::info!("SMTP email disabled; emails will only be logged");
        Arc::new(LogMailer)
    };

    let notifications = Arc::new(NotificationManager::new());
    notifications.register(Arc::new(EmailNotifier::new(mailer))).await;

    let service_context = Arc::new(ServiceContext::new(db_pool.clone(), &settings, notifications));

    match service_context.auth_service.cleanup_expired_sessions().await {
        Ok(removed) if removed > 0 => tracing::info!("Removed {} expired sessions", removed),
        Ok(_) => {}
        Err(e) => tracing::warn!("Session cleanup failed: {}", e),
    }

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}

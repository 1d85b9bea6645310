use std::{sync::Arc, time::Duration};

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{
    api,
    config::Settings,
    payments::{MercadoPagoClient, PaymentGateway},
    service::{idempotency::spawn_retention_task, ServiceContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting storefront payments on {}:{}", settings.server.host, settings.server.port);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let service_context = Arc::new(ServiceContext::sqlite(db_pool, &settings));

    // Missing credentials leave the payment functions answering with a
    // configuration error instead of keeping the server down.
    let gateway: Option<Arc<dyn PaymentGateway>> =
        match settings.gateway.resolve(&settings.server.base_url) {
            Ok(credentials) => {
                tracing::info!("Payment gateway configured for {} environment", credentials.environment);
                match MercadoPagoClient::new(
                    credentials,
                    settings.gateway.api_base.clone(),
                    Duration::from_secs(settings.gateway.timeout_secs),
                ) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        tracing::error!("Failed to build gateway client: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Payment gateway disabled: {}", e);
                None
            }
        };

    if settings.gateway.webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured, notification signatures are not checked");
    }

    spawn_retention_task(
        service_context.idempotency_repo.clone(),
        Duration::from_secs(settings.idempotency.cleanup_interval_secs),
    );

    let app = api::create_app(service_context, gateway, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use event_log::{EventLog, PostgresEventLog};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracking_service::{handlers, AppState, Config, ImageStore, TrackingService};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tracking service");

    let config = Config::from_env().map_err(|e| {
        io::Error::new(io::ErrorKind::Other, format!("Invalid configuration: {}", e))
    })?;

    // Initialize database
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            io::Error::new(io::ErrorKind::Other, "Database connection failed")
        })?;
    tracing::info!("Successfully connected to database");

    let event_log = PostgresEventLog::new(pool);
    event_log.migrate().await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        io::Error::new(io::ErrorKind::Other, "Migration failed")
    })?;
    let event_log: Arc<dyn EventLog> = Arc::new(event_log);

    if let Err(e) = std::fs::create_dir_all(&config.tracking.upload_dir) {
        tracing::warn!(
            upload_dir = %config.tracking.upload_dir,
            "Failed to create upload directory: {}", e
        );
    }

    let state = web::Data::new(AppState {
        tracker: TrackingService::new(
            event_log,
            Duration::from_secs(config.tracking.dedup_window_secs),
        ),
        images: ImageStore::new(&config.tracking.upload_dir),
    });

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!("Starting HTTP server on {}", addr);

    let allowed_origins = config.cors.allowed_origins.clone();
    HttpServer::new(move || {
        // Build CORS configuration
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .configure(handlers::register_routes)
    })
    .bind(&addr)?
    .run()
    .await
}

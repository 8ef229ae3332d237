use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use kindred::config::{CodeBackend, LoggingSettings, MatchBackend, ProfileBackend, Settings};
use kindred::core::{MatchEngine, ScoringEngine};
use kindred::error::{handle_json_payload_error, handle_query_payload_error, KindredError};
use kindred::routes::{self, AppState};
use kindred::services::{
    AppwriteProfileStore, InMemoryMatchStore, InMemoryProfileStore, MatchStore, MemoryCodeStore,
    PostgresMatchStore, ProfileStore, RedisCodeStore, VerificationCodeStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize logging. RUST_LOG wins, then LOG_LEVEL, then the config file.
fn init_tracing(logging: &LoggingSettings) {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

async fn build_profile_store(settings: &Settings) -> Result<Arc<dyn ProfileStore>, KindredError> {
    match settings.profiles.backend {
        ProfileBackend::Memory => {
            let store = match &settings.profiles.seed_file {
                Some(path) => InMemoryProfileStore::from_seed_file(path)?,
                None => InMemoryProfileStore::new(),
            };
            info!("Using in-memory profile store ({} profiles)", store.len());
            Ok(Arc::new(store))
        }
        ProfileBackend::Appwrite => {
            let appwrite = settings
                .profiles
                .appwrite
                .clone()
                .ok_or_else(|| KindredError::Internal("profiles.appwrite is not configured".to_string()))?;

            let store = AppwriteProfileStore::new(
                appwrite.endpoint,
                appwrite.api_key,
                appwrite.project_id,
                appwrite.database_id,
                appwrite.collection_id,
                Duration::from_secs(appwrite.request_timeout_secs),
            )?;
            info!("Using Appwrite profile store");
            Ok(Arc::new(store))
        }
    }
}

async fn build_match_store(settings: &Settings) -> Result<Arc<dyn MatchStore>, KindredError> {
    match settings.database.backend {
        MatchBackend::Memory => {
            info!("Using in-memory match store");
            Ok(Arc::new(InMemoryMatchStore::new()))
        }
        MatchBackend::Postgres => {
            let db = &settings.database;
            let url = db
                .url
                .as_deref()
                .ok_or_else(|| KindredError::Internal("database.url or DATABASE_URL must be set".to_string()))?;

            let store = PostgresMatchStore::connect(
                url,
                db.max_connections,
                db.min_connections,
                Duration::from_secs(db.acquire_timeout_secs),
            )
            .await?;
            info!("PostgreSQL match store initialized (max: {} connections)", db.max_connections);
            Ok(Arc::new(store))
        }
    }
}

async fn build_code_store(settings: &Settings) -> Result<Arc<dyn VerificationCodeStore>, KindredError> {
    let verification = &settings.verification;
    let ttl = Duration::from_secs(verification.ttl_secs);

    match verification.backend {
        CodeBackend::Memory => {
            info!("Using in-memory verification codes (TTL: {}s)", verification.ttl_secs);
            Ok(Arc::new(MemoryCodeStore::new(verification.capacity, ttl)))
        }
        CodeBackend::Redis => {
            let url = verification.redis_url.as_deref().ok_or_else(|| {
                KindredError::Internal("verification.redis_url or REDIS_URL must be set".to_string())
            })?;
            let store = RedisCodeStore::connect(url, ttl).await?;
            info!("Using Redis verification codes (TTL: {}s)", verification.ttl_secs);
            Ok(Arc::new(store))
        }
    }
}

async fn build_state(settings: &Settings) -> Result<AppState, KindredError> {
    let weights = settings
        .scoring
        .weights
        .category_weights()
        .map_err(|e| KindredError::Internal(e.to_string()))?;

    let engine = MatchEngine::new(
        build_profile_store(settings).await?,
        build_match_store(settings).await?,
        ScoringEngine::new(weights),
        settings.matching.engine_options(),
    );
    info!("Match engine initialized with weights: {:?}", weights);

    Ok(AppState {
        engine: Arc::new(engine),
        codes: build_code_store(settings).await?,
    })
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_tracing(&settings.logging);
    info!("Starting Kindred match engine...");

    let app_state = build_state(&settings).await.map_err(|e| {
        error!("Failed to initialize backends: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{} ({} workers)", host, port, workers);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}

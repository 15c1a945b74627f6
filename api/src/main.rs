use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use api::config::{AppConfig, StorageBackend};
use api::{AppState, router};
use application::{SeedService, Storage, SystemClock};
use infrastructure::{FirebaseConfig, FirebaseStorage, InMemoryStorage};

// Application entry point
#[tokio::main]
async fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // --- Dependency Injection ---
    // 1. Create the storage backend
    let storage: Arc<dyn Storage> = match &config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage.");
            Arc::new(InMemoryStorage::new())
        }
        StorageBackend::Firebase {
            database_url,
            auth_token,
            timeout,
        } => {
            info!(host = database_url.host_str().unwrap_or_default(), "Using Firebase storage.");
            let firebase_config = FirebaseConfig {
                database_url: database_url.clone(),
                auth_token: auth_token.clone(),
                timeout: *timeout,
            };
            match FirebaseStorage::new(firebase_config, Arc::new(SystemClock)) {
                Ok(storage) => Arc::new(storage),
                Err(e) => {
                    error!("Failed to initialize Firebase storage: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    // 2. Seed the admin account and, if enabled, the sample catalog
    let seed_service = SeedService::new(storage.clone());
    if let Err(e) = seed_service
        .ensure_admin(&config.admin_username, &config.admin_password)
        .await
    {
        error!("Failed to seed admin account: {}", e);
        std::process::exit(1);
    }
    if config.seed_sample_listings {
        if let Err(e) = seed_service.seed_sample_listings().await {
            error!("Failed to seed sample listings: {}", e);
            std::process::exit(1);
        }
    }

    // 3. Create the application state and routes
    let app = router(AppState::new(storage));
    info!("API routes configured.");

    // --- Server Startup ---
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server starting on {}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

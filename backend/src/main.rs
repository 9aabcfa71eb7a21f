use backend::api::{self, AppState};
use backend::store;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tandem::config::{ensure_variant_file, OrchestratorConfig};
use tandem::pool::{EnginePool, ProcessEngineFactory};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenv::dotenv().ok();

    let cfg = OrchestratorConfig::from_env();
    if let Err(e) = ensure_variant_file(&cfg.variant_file) {
        tracing::warn!("[BACKEND] could not write variant file: {}", e);
    }

    // Database connection
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:tandem.db".to_string());

    let options = SqliteConnectOptions::from_str(&database_url)
        .expect("Invalid database URL")
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .expect("Failed to connect to database");

    store::init_schema(&pool)
        .await
        .expect("Failed to initialize database schema");

    // Process-wide engine pool
    let engines = EnginePool::new(
        ProcessEngineFactory { engine_path: cfg.engine_path.clone() },
        cfg.pool.clone(),
    );

    let state = AppState {
        db: pool,
        engines,
        cfg,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let addr: SocketAddr = bind.parse().expect("Invalid BIND_ADDR");

    let app = api::router(state);
    tracing::info!("[BACKEND] API listening on {}", addr);
    let listener = TcpListener::bind(addr).await.expect("bind failed");
    axum::serve(listener, app).await.expect("server failed");
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use atelier_backend::auth::tokens::TokenService;
use atelier_backend::config::AppConfig;
use atelier_backend::db::{self, PgPool};
use atelier_backend::files::LocalFiles;
use atelier_backend::imagegen::OpenAiImages;
use atelier_backend::routes;
use atelier_backend::state::AppState;
use atelier_backend::store::PgStore;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config);

    tracing::info!(
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        app_url = %config.app_url,
        environment = %config.environment,
        image_api_configured = config.openai_api_key.is_some(),
        "loaded backend configuration"
    );

    let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
    run_migrations(&pool)?;

    let files = LocalFiles::new(&config.storage_root);
    files.ensure_layout().await?;

    let tokens = TokenService::from_config(&config);
    let images = Arc::new(OpenAiImages::from_config(&config));
    let store = Arc::new(PgStore::new(pool));

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(config, store, Arc::new(files), images, tokens);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let default_filter = if config.is_development() {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

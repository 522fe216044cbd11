use payfast_gateway::api::{self, AppState};
use payfast_gateway::config::Config;
use payfast_gateway::database::{InMemoryTransactionStore, TransactionStore};
use payfast_gateway::payments::providers::PayfastProvider;
use payfast_gateway::payments::{PaymentAcquirer, TransactionProcessor};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn TransactionStore>, Box<dyn std::error::Error>> {
    match &config.database {
        #[cfg(feature = "database")]
        Some(database) => {
            use payfast_gateway::database::{health_check, init_pool, PoolConfig, TransactionRepository};

            let pool = init_pool(
                &database.url,
                Some(PoolConfig {
                    max_connections: database.max_connections,
                    ..Default::default()
                }),
            )
            .await?;
            health_check(&pool).await?;
            Ok(Arc::new(TransactionRepository::new(pool)))
        }
        #[cfg(not(feature = "database"))]
        Some(_) => {
            tracing::warn!("DATABASE_URL set but the database feature is disabled; using in-memory store");
            Ok(Arc::new(InMemoryTransactionStore::new()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; transactions are kept in memory");
            Ok(Arc::new(InMemoryTransactionStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting PayFast gateway");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("PayFast environment: {}", config.payfast.environment);

    let store = build_store(&config).await?;
    let provider = PayfastProvider::new(config.payfast.clone())?;
    tracing::info!("PayFast form action URL: {}", provider.form_action_url());

    let processor = Arc::new(TransactionProcessor::new(Arc::new(provider), store));
    let app = api::router(AppState {
        environment: config.server.environment.clone(),
        processor,
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

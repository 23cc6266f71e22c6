use logctl::api::{self, ApiState};
use logctl::chatlog::ChatLogRepo;
use logctl::config::Config;
use logctl::orchestrator::Orchestrator;
use logctl::db;
use logctl::region::{RegionConfigRepo, RegionSessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = Config::from_env()?;

    tracing::info!(
        default_region = %cfg.default_region,
        admin_addr = ?cfg.admin_addr,
        migrate_on_startup = cfg.migrate_on_startup,
        "logctl starting"
    );

    let catalog_pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&catalog_pool).await?;
    }

    let region_config = RegionConfigRepo::new(catalog_pool.clone());
    let region = RegionSessionManager::new(region_config.clone());
    let chatlog = ChatLogRepo::new(catalog_pool.clone());

    if let Err(e) = region.connect(&cfg.default_region).await {
        tracing::warn!(region = %cfg.default_region, error = %e, "default region not connected at startup");
    }

    let orchestrator = Orchestrator::new(region.clone(), chatlog, cfg.clone());
    let api_state = ApiState {
        orchestrator,
        region,
        region_config,
    };

    let app = api::router(api_state);
    let addr = cfg.admin_addr.clone().unwrap_or_else(|| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

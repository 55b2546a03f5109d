mod error;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use diarist_core::config::DiaristConfig;
use diarist_core::controller::SessionController;
use diarist_core::llm::LlmService;
use diarist_core::storage::{create_backend, Storage};
use tokio::sync::Mutex;

pub type Controller = SessionController<Arc<Storage>, Arc<LlmService>>;

pub struct AppState {
    /// Held for the whole read-mutate-reply span of every command.
    pub controller: Mutex<Controller>,
    pub storage: Arc<Storage>,
    pub llm: Arc<LlmService>,
    pub config: DiaristConfig,
}

impl AppState {
    pub fn new(storage: Storage, llm: LlmService, config: DiaristConfig) -> Self {
        let storage = Arc::new(storage);
        let llm = Arc::new(llm);
        let controller = SessionController::new(
            Arc::clone(&storage),
            Arc::clone(&llm),
            config.session.clone(),
        );
        Self {
            controller: Mutex::new(controller),
            storage,
            llm,
            config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diarist_web=info,diarist_core=info".into()),
        )
        .init();

    let config = DiaristConfig::load(None).unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        DiaristConfig::default_config()
    });

    let storage = create_backend(&config).context("failed to open diary storage")?;
    let llm = LlmService::from_config(&config.llm).context("failed to configure the model")?;
    tracing::info!(
        backend = storage.backend_name(),
        location = %storage.location().display(),
        model = llm.model(),
        "diarist-web starting"
    );

    let state = Arc::new(AppState::new(storage, llm, config.clone()));

    let app = routes::router()
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    tracing::info!("diarist-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

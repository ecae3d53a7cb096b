use std::sync::Arc;

use leadbridge_agent::Toolkit;
use leadbridge_core::config::AppConfig;
use leadbridge_odoo::GatewayError;
use thiserror::Error;
use tracing::info;

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub toolkit: Arc<Toolkit>,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState::new(self.toolkit.clone(), &self.config)
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Backend(#[from] GatewayError),
}

/// Connects the backend session once; every request reuses it.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        odoo_url = %config.odoo.url,
        database = %config.odoo.database,
        mock_backend = config.odoo.mock,
        "starting application bootstrap"
    );
    let toolkit = Toolkit::from_config(&config).await?;
    info!(
        event_name = "system.bootstrap.ready",
        llm_available = toolkit.llm_available(),
        "backend session established"
    );

    Ok(Application { config, toolkit: Arc::new(toolkit) })
}

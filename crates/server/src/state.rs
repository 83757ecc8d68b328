use std::sync::Arc;

use resow_core::{
    Authenticator, Config, Pipeline, SanitizedConfig, Scheduler, Store, TorznabClient,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    store: Arc<Store>,
    pipeline: Arc<Pipeline>,
    torznab: Arc<TorznabClient>,
    scheduler: Option<Arc<Scheduler>>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        store: Arc<Store>,
        pipeline: Arc<Pipeline>,
        torznab: Arc<TorznabClient>,
        scheduler: Option<Arc<Scheduler>>,
    ) -> Self {
        Self {
            config,
            authenticator,
            store,
            pipeline,
            torznab,
            scheduler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        self.config.sanitized()
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn torznab(&self) -> &Arc<TorznabClient> {
        &self.torznab
    }

    pub fn scheduler(&self) -> Option<&Arc<Scheduler>> {
        self.scheduler.as_ref()
    }
}

use crate::config::Config;
use crate::controller::ItemController;
use crate::metrics::{Metrics, RequestObserver};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ItemController>,
    pub metrics: Arc<Metrics>,
    pub observers: Arc<Vec<Arc<dyn RequestObserver>>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State with the process metrics registered as the first request observer
    pub fn new(config: Config, controller: ItemController) -> Self {
        Self::with_observers(config, controller, Vec::new())
    }

    pub fn with_observers(
        config: Config,
        controller: ItemController,
        extra: Vec<Arc<dyn RequestObserver>>,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let mut observers: Vec<Arc<dyn RequestObserver>> = vec![metrics.clone()];
        observers.extend(extra);
        Self {
            controller: Arc::new(controller),
            metrics,
            observers: Arc::new(observers),
            config: Arc::new(config),
        }
    }
}

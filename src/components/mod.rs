use crate::config::Config;
use crate::error::DashResult;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

pub mod calendar_layout;
pub mod google_calendar;
pub mod metrics;
pub mod poller;
pub mod providers;

pub use poller::DashboardPoller;
pub use providers::Providers;

/// Component trait that all components must implement
#[async_trait]
pub trait Component: Send + Sync + Any {
    /// Get the name of the component
    fn name(&self) -> &'static str;

    /// Initialize the component
    async fn init(&self, config: Arc<Config>, providers: Providers) -> DashResult<()>;

    /// Shutdown the component
    async fn shutdown(&self) -> DashResult<()>;

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Manager for all components
pub struct ComponentManager {
    components: Vec<Box<dyn Component>>,
    config: Arc<Config>,
}

impl fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentManager")
            .field("components", &self.components.iter().map(|c| c.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ComponentManager {
    /// Create a new component manager
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            components: Vec::new(),
            config,
        }
    }

    /// Register a component
    pub fn register<T: Component + 'static>(&mut self, component: T) {
        info!("Registering component: {}", component.name());
        self.components.push(Box::new(component));
    }

    /// Initialize every enabled component
    pub async fn init_all(&self, providers: Providers) -> DashResult<()> {
        for component in &self.components {
            if !self.config.is_component_enabled(component.name()) {
                info!("Component {} is disabled, skipping", component.name());
                continue;
            }

            info!("Initializing component: {}", component.name());
            if let Err(e) = component.init(Arc::clone(&self.config), providers.clone()).await {
                // Log error but continue with other components
                error!("Error initializing component {}: {:?}", component.name(), e);
            }
        }

        Ok(())
    }

    /// Shutdown all components
    pub async fn shutdown_all(&self) -> DashResult<()> {
        info!("Shutting down all components");

        for component in &self.components {
            info!("Shutting down component: {}", component.name());
            if let Err(e) = component.shutdown().await {
                error!("Error shutting down component {}: {:?}", component.name(), e);
            }
        }

        Ok(())
    }

    /// Get a component by name
    pub fn get_component_by_name(&self, name: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// Get a component by name and concrete type
    pub fn get<T: Component>(&self, name: &str) -> Option<&T> {
        self.get_component_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        inits: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    #[async_trait]
    impl Component for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn init(&self, _config: Arc<Config>, _providers: Providers) -> DashResult<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&self) -> DashResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn test_disabled_component_is_skipped() {
        let manager = {
            let mut manager = ComponentManager::new(Arc::new(Config::default()));
            manager.register(Counter::default());
            manager
        };

        manager.init_all(Providers::default()).await.unwrap();
        manager.shutdown_all().await.unwrap();

        let counter = manager.get::<Counter>("counter").unwrap();
        assert_eq!(counter.inits.load(Ordering::SeqCst), 0);
        assert_eq!(counter.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enabled_component_is_initialized() {
        let mut config = Config::default();
        config.components.insert("counter".to_string(), true);

        let mut manager = ComponentManager::new(Arc::new(config));
        manager.register(Counter::default());
        manager.init_all(Providers::default()).await.unwrap();

        let counter = manager.get::<Counter>("counter").unwrap();
        assert_eq!(counter.inits.load(Ordering::SeqCst), 1);
        assert!(manager.get_component_by_name("missing").is_none());
    }
}

//! Lazily built, explicitly invalidated API client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::DeploymentError;
use crate::client::{ClientConfig, ClientFactory, TgsApi};
use crate::settings::Settings;

/// A client bound to the configuration it was built from.
pub struct ClientHandle {
    config: ClientConfig,
    api: Arc<dyn TgsApi>,
    generation: u64,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("base_url", &self.config.base_url)
            .field("api_header", &self.config.api_header)
            .field("authenticated", &self.config.token.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}

impl ClientHandle {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &dyn TgsApi {
        self.api.as_ref()
    }

    /// Distinct for every handle the cache has built.
    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Holds at most one [`ClientHandle`].
///
/// The slot stays locked while a handle is being built, so callers either
/// see the previous complete handle, wait for the new one, or build it
/// themselves. Never a partial one.
#[derive(Debug, Default)]
pub struct ClientCache {
    slot: Mutex<Option<Arc<ClientHandle>>>,
    builds: AtomicU64,
}

impl ClientCache {
    pub async fn get_or_build(
        &self,
        settings: &Settings,
        factory: &dyn ClientFactory,
    ) -> Result<Arc<ClientHandle>, DeploymentError> {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let snapshot = settings.snapshot().await?;
        let config = ClientConfig::from_settings(&snapshot);
        let api = factory.build(&config)?;
        let generation = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            generation,
            base_url = %config.base_url,
            api = %config.api_header,
            "Built TGS client"
        );

        let handle = Arc::new(ClientHandle {
            config,
            api,
            generation,
        });
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    pub async fn invalidate(&self) {
        if let Some(handle) = self.slot.lock().await.take() {
            debug!(generation = handle.generation, "Discarded cached TGS client");
        }
    }
}

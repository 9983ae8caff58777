//! Connection state for the configured TGS deployment.
//!
//! A [`Deployment`] owns the stored settings, the cached API client built
//! from them, and the token lifecycle. Every write that affects how the
//! server is reached goes through here so the cached client never outlives
//! the settings it was built from.

mod auth;
mod cache;
mod dispatch;
#[cfg(test)]
pub(crate) mod testing;

pub use cache::{ClientCache, ClientHandle};
pub use dispatch::{Operation, Response};

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::client::{describe, ApiError, ClientFactory};
use crate::settings::{Settings, SettingsError};

/// Failures of deployment operations.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no TGS credentials are configured")]
    MissingCredentials,
}

impl DeploymentError {
    /// Message shown to the user in chat.
    pub fn user_message(&self) -> String {
        match self {
            DeploymentError::Api(e) => describe(e),
            DeploymentError::MissingCredentials => "Error: No TGS credentials are configured. \
                An owner needs to run `/tgs4 account` and follow the steps sent by DM."
                .to_string(),
            DeploymentError::Settings(e) => {
                format!("There was an error accessing the TGS settings: {}", e)
            }
        }
    }
}

/// The single TGS deployment this bot talks to.
pub struct Deployment {
    settings: Settings,
    factory: Arc<dyn ClientFactory>,
    cache: ClientCache,
    auth_lock: Mutex<()>,
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Deployment {
    pub fn new(settings: Settings, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            settings,
            factory,
            cache: ClientCache::default(),
            auth_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The cached client, building it from the current settings if needed.
    pub async fn client(&self) -> Result<Arc<ClientHandle>, DeploymentError> {
        self.cache.get_or_build(&self.settings, self.factory.as_ref()).await
    }

    /// Drop the cached client so the next call rebuilds it.
    pub async fn reload(&self) {
        self.cache.invalidate().await;
    }

    /// Point at a new host, and a new port when one was given.
    ///
    /// The stored token belonged to the old server and is discarded.
    pub async fn set_host(&self, host: &str, port: Option<u16>) -> Result<(), DeploymentError> {
        let _guard = self.forget_token().await?;
        self.settings.set_host(host).await?;
        if let Some(port) = port {
            self.settings.set_port(port).await?;
        }
        self.reload().await;
        info!(host, ?port, "TGS host updated");
        Ok(())
    }

    pub async fn set_port(&self, port: u16) -> Result<(), DeploymentError> {
        let _guard = self.forget_token().await?;
        self.settings.set_port(port).await?;
        self.reload().await;
        info!(port, "TGS port updated");
        Ok(())
    }

    pub async fn set_api(&self, api: &str) -> Result<(), DeploymentError> {
        self.settings.set_api(api).await?;
        self.reload().await;
        info!(api, "TGS API name updated");
        Ok(())
    }

    pub async fn set_api_version(&self, version: &str) -> Result<(), DeploymentError> {
        self.settings.set_api_version(version).await?;
        self.reload().await;
        info!(version, "TGS API version updated");
        Ok(())
    }

    pub async fn set_user_agent(&self, agent: &str) -> Result<(), DeploymentError> {
        self.settings.set_user_agent(agent).await?;
        self.reload().await;
        info!(agent, "TGS user agent updated");
        Ok(())
    }

    pub async fn set_username(&self, username: &str) -> Result<(), DeploymentError> {
        let _guard = self.forget_token().await?;
        self.settings.set_username(username).await?;
        self.reload().await;
        info!(username, "TGS username updated");
        Ok(())
    }

    pub async fn set_password(&self, password: &str) -> Result<(), DeploymentError> {
        let _guard = self.forget_token().await?;
        self.settings.set_password(password).await?;
        self.reload().await;
        info!("TGS password updated");
        Ok(())
    }

    pub async fn set_owner_guild(&self, guild_id: u64) -> Result<(), DeploymentError> {
        self.settings.set_owner_guild_id(guild_id).await?;
        info!(guild_id, "TGS owner guild recorded");
        Ok(())
    }

    /// Discard the token and cached client ahead of a change of target.
    ///
    /// The returned guard holds off token requests until the caller has
    /// written the new target, so no token is issued for a half-applied
    /// change. If a write then fails, the deployment is left without a
    /// token rather than with one for the old server.
    async fn forget_token(&self) -> Result<MutexGuard<'_, ()>, DeploymentError> {
        let guard = self.auth_lock.lock().await;
        self.settings.clear_auth_token().await?;
        self.reload().await;
        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;

    use super::testing::{deployment_with_credentials, FakeServer};
    use super::*;
    use crate::settings::{KeyValueStore, MemoryStore};

    /// Memory store that refuses to write the port.
    #[derive(Default)]
    struct PortlessStore(MemoryStore);

    #[async_trait]
    impl KeyValueStore for PortlessStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
            if key == "tgs_port" {
                return Err(std::io::Error::other("read-only").into());
            }
            self.0.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), SettingsError> {
            self.0.remove(key).await
        }
    }

    #[tokio::test]
    async fn failed_port_write_still_drops_the_old_token_and_client() {
        let server = FakeServer::new();
        let deployment = Deployment::new(
            Settings::new(Arc::new(PortlessStore::default())),
            Arc::new(server.clone()),
        );
        let settings = deployment.settings();
        settings.set_auth_token("old-server-token").await.unwrap();
        let before = deployment.client().await.unwrap();

        let result = deployment.set_host("http://10.9.9.9", Some(5000)).await;

        assert!(matches!(result, Err(DeploymentError::Settings(_))));
        assert_eq!(settings.auth_token().await.unwrap(), None);
        let after = deployment.client().await.unwrap();
        assert_ne!(before.generation(), after.generation());
        assert_eq!(after.config().base_url, "http://10.9.9.9:8080");
        assert_eq!(after.config().token, None);
    }

    #[tokio::test]
    async fn connectivity_writes_rebuild_the_client() {
        let server = FakeServer::new();
        let deployment = deployment_with_credentials(&server).await;

        let mut previous = deployment.client().await.unwrap().generation();
        for step in 0..7 {
            match step {
                0 => deployment.set_host("http://10.0.0.5", None).await.unwrap(),
                1 => deployment.set_port(5000).await.unwrap(),
                2 => deployment.set_api("Other.Api").await.unwrap(),
                3 => deployment.set_api_version("9.0.0").await.unwrap(),
                4 => deployment.set_user_agent("agent").await.unwrap(),
                5 => deployment.set_username("someone").await.unwrap(),
                _ => deployment.set_password("secret").await.unwrap(),
            }
            let current = deployment.client().await.unwrap().generation();
            assert_ne!(previous, current, "step {} reused the cached client", step);
            previous = current;
        }
    }

    #[tokio::test]
    async fn host_and_credential_changes_clear_the_token() {
        let server = FakeServer::new();
        let deployment = deployment_with_credentials(&server).await;
        let settings = deployment.settings();

        settings.set_auth_token("old").await.unwrap();
        deployment.set_host("http://10.0.0.5", Some(5000)).await.unwrap();
        assert_eq!(settings.auth_token().await.unwrap(), None);

        settings.set_auth_token("old").await.unwrap();
        deployment.set_username("other").await.unwrap();
        assert_eq!(settings.auth_token().await.unwrap(), None);

        settings.set_auth_token("old").await.unwrap();
        deployment.set_password("other").await.unwrap();
        assert_eq!(settings.auth_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn header_changes_keep_the_token() {
        let server = FakeServer::new();
        let deployment = deployment_with_credentials(&server).await;
        let settings = deployment.settings();

        settings.set_auth_token("kept").await.unwrap();
        deployment.set_api_version("9.0.0").await.unwrap();
        deployment.set_user_agent("agent").await.unwrap();

        assert_eq!(settings.auth_token().await.unwrap().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn host_without_port_keeps_the_stored_port() {
        let server = FakeServer::new();
        let deployment = deployment_with_credentials(&server).await;

        deployment.set_port(5000).await.unwrap();
        deployment.set_host("http://10.0.0.5", None).await.unwrap();

        let snapshot = deployment.settings().snapshot().await.unwrap();
        assert_eq!(snapshot.base_url(), "http://10.0.0.5:5000");
    }

    #[test]
    fn missing_credentials_has_its_own_message() {
        let message = DeploymentError::MissingCredentials.user_message();
        assert!(message.contains("/tgs4 account"));
        assert!(!message.starts_with("ERROR"));
    }
}

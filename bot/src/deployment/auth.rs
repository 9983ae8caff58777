//! Bearer token lifecycle.

use tracing::{debug, info};

use super::{Deployment, DeploymentError};
use crate::client::ClientConfig;

impl Deployment {
    /// Exchange the stored credentials for a new token.
    ///
    /// On success the token is stored and the cached client is dropped so
    /// the next call picks the token up. On failure the stored token is
    /// left as it was.
    pub async fn authenticate(&self) -> Result<(), DeploymentError> {
        let _guard = self.auth_lock.lock().await;
        self.issue_token().await
    }

    /// Replace the token the caller saw rejected.
    ///
    /// If another task already swapped the stored token out while this one
    /// waited for the lock, nothing is requested.
    pub(super) async fn reauthenticate(&self, observed: Option<&str>) -> Result<(), DeploymentError> {
        let _guard = self.auth_lock.lock().await;
        let current = self.settings.auth_token().await?;
        if current.as_deref() != observed {
            debug!("Token already refreshed by another call");
            return Ok(());
        }
        self.issue_token().await
    }

    async fn issue_token(&self) -> Result<(), DeploymentError> {
        let snapshot = self.settings.snapshot().await?;
        let (username, password) = snapshot
            .credentials()
            .ok_or(DeploymentError::MissingCredentials)?;

        let config = ClientConfig::from_settings(&snapshot).without_token();
        let api = self.factory.build(&config)?;

        info!(username, base_url = %config.base_url, "Requesting TGS token");
        let token = api.create_token(username, password).await?;

        self.settings.set_auth_token(&token.bearer).await?;
        self.cache.invalidate().await;
        info!(expires_at = ?token.expires_at, "Authenticated with TGS");
        Ok(())
    }
}

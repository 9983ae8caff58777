//! Persisted deployment settings for the TGS connection.

#[cfg(test)]
mod memory;
mod store;

#[cfg(test)]
pub use memory::MemoryStore;
pub use store::{JsonFileStore, KeyValueStore};

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "http://127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_API: &str = "Tgstation.Server.Api";
pub const DEFAULT_API_VERSION: &str = "8.3.0";
pub const DEFAULT_USER_AGENT: &str = "tgstation-server-discord-bot";

/// Registered and dynamic ports only.
pub const PORT_RANGE: RangeInclusive<u16> = 1024..=65535;

/// Errors raised by the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode settings: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("stored value for `{key}` is invalid: {source}")]
    Invalid {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Keys of the persisted deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Host,
    Port,
    Api,
    ApiVersion,
    UserAgent,
    Username,
    Password,
    AuthToken,
    OwnerGuildId,
}

impl SettingKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            SettingKey::Host => "tgs_host",
            SettingKey::Port => "tgs_port",
            SettingKey::Api => "tgs_api",
            SettingKey::ApiVersion => "tgs_api_version",
            SettingKey::UserAgent => "tgs_user_agent",
            SettingKey::Username => "tgs_username",
            SettingKey::Password => "tgs_password",
            SettingKey::AuthToken => "tgs_auth_token",
            SettingKey::OwnerGuildId => "owner_guild_id",
        }
    }
}

/// A point-in-time view of every deployment setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    pub host: String,
    pub port: u16,
    pub api: String,
    pub api_version: String,
    pub user_agent: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_token: Option<String>,
    pub owner_guild_id: Option<u64>,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api: DEFAULT_API.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            username: None,
            password: None,
            auth_token: None,
            owner_guild_id: None,
        }
    }
}

impl DeploymentSettings {
    /// Server URL as `host:port`.
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value of the `Api` header, `name/version`.
    pub fn api_header(&self) -> String {
        format!("{}/{}", self.api, self.api_version)
    }

    /// Username and password, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Typed access to the deployment record held in a [`KeyValueStore`].
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

impl Settings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn get<T: DeserializeOwned>(&self, key: SettingKey) -> Result<Option<T>, SettingsError> {
        match self.store.get(key.as_str()).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| SettingsError::Invalid {
                    key: key.as_str(),
                    source,
                }),
        }
    }

    async fn set<T: Serialize>(&self, key: SettingKey, value: &T) -> Result<(), SettingsError> {
        let value = serde_json::to_value(value).map_err(SettingsError::Encode)?;
        self.store.set(key.as_str(), value).await
    }

    async fn clear(&self, key: SettingKey) -> Result<(), SettingsError> {
        self.store.remove(key.as_str()).await
    }

    /// Read every field, filling in defaults for anything never stored.
    pub async fn snapshot(&self) -> Result<DeploymentSettings, SettingsError> {
        let defaults = DeploymentSettings::default();
        Ok(DeploymentSettings {
            host: self.get(SettingKey::Host).await?.unwrap_or(defaults.host),
            port: self.get(SettingKey::Port).await?.unwrap_or(defaults.port),
            api: self.get(SettingKey::Api).await?.unwrap_or(defaults.api),
            api_version: self
                .get(SettingKey::ApiVersion)
                .await?
                .unwrap_or(defaults.api_version),
            user_agent: self
                .get(SettingKey::UserAgent)
                .await?
                .unwrap_or(defaults.user_agent),
            username: self.get(SettingKey::Username).await?,
            password: self.get(SettingKey::Password).await?,
            auth_token: self.get(SettingKey::AuthToken).await?,
            owner_guild_id: self.get(SettingKey::OwnerGuildId).await?,
        })
    }

    pub async fn auth_token(&self) -> Result<Option<String>, SettingsError> {
        self.get(SettingKey::AuthToken).await
    }

    pub async fn owner_guild_id(&self) -> Result<Option<u64>, SettingsError> {
        self.get(SettingKey::OwnerGuildId).await
    }

    pub async fn set_host(&self, host: &str) -> Result<(), SettingsError> {
        self.set(SettingKey::Host, &host).await
    }

    pub async fn set_port(&self, port: u16) -> Result<(), SettingsError> {
        self.set(SettingKey::Port, &port).await
    }

    pub async fn set_api(&self, api: &str) -> Result<(), SettingsError> {
        self.set(SettingKey::Api, &api).await
    }

    pub async fn set_api_version(&self, version: &str) -> Result<(), SettingsError> {
        self.set(SettingKey::ApiVersion, &version).await
    }

    pub async fn set_user_agent(&self, agent: &str) -> Result<(), SettingsError> {
        self.set(SettingKey::UserAgent, &agent).await
    }

    pub async fn set_username(&self, username: &str) -> Result<(), SettingsError> {
        self.set(SettingKey::Username, &username).await
    }

    pub async fn set_password(&self, password: &str) -> Result<(), SettingsError> {
        self.set(SettingKey::Password, &password).await
    }

    pub async fn set_auth_token(&self, token: &str) -> Result<(), SettingsError> {
        self.set(SettingKey::AuthToken, &token).await
    }

    pub async fn clear_auth_token(&self) -> Result<(), SettingsError> {
        self.clear(SettingKey::AuthToken).await
    }

    pub async fn set_owner_guild_id(&self, guild_id: u64) -> Result<(), SettingsError> {
        self.set(SettingKey::OwnerGuildId, &guild_id).await
    }
}

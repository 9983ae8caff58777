//! HTTP client for the tgstation-server REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::DeploymentSettings;

/// Header carrying the `name/version` API identifier.
pub const API_HEADER: &str = "api";

/// Failure of a single API request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("server responded with {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("failed to reach the server: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to parse the server response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("the configured {name} is not a valid header value")]
    InvalidHeader { name: &'static str },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

/// Everything needed to talk to one server, derived from the stored settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_header: String,
    pub user_agent: String,
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn from_settings(settings: &DeploymentSettings) -> Self {
        Self {
            base_url: settings.base_url(),
            api_header: settings.api_header(),
            user_agent: settings.user_agent.clone(),
            token: settings.auth_token.clone(),
        }
    }

    /// Same server, no bearer token. Used to request a new token.
    pub fn without_token(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }
}

/// Server information returned by the home endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInformation {
    pub version: Option<String>,
    pub api_version: Option<String>,
    pub dm_api_version: Option<String>,
    pub minimum_password_length: Option<u32>,
    pub instance_limit: Option<u32>,
    pub user_limit: Option<u32>,
    pub user_group_limit: Option<u32>,
    #[serde(default)]
    pub valid_instance_paths: Vec<String>,
    #[serde(default)]
    pub windows_host: bool,
    #[serde(default)]
    pub update_in_progress: bool,
}

impl std::fmt::Display for ServerInformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn or_unknown<T: std::fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "unknown".to_string(), ToString::to_string)
        }

        writeln!(f, "**TGS Server Info**")?;
        writeln!(f, "**Version:** `{}`", or_unknown(&self.version))?;
        writeln!(f, "**API Version:** `{}`", or_unknown(&self.api_version))?;
        writeln!(f, "**DMAPI Version:** `{}`", or_unknown(&self.dm_api_version))?;
        writeln!(f, "**Host OS:** {}", if self.windows_host { "Windows" } else { "Linux" })?;
        writeln!(f, "**Instance Limit:** {}", or_unknown(&self.instance_limit))?;
        writeln!(f, "**User Limit:** {}", or_unknown(&self.user_limit))?;
        writeln!(
            f,
            "**Minimum Password Length:** {}",
            or_unknown(&self.minimum_password_length)
        )?;
        if !self.valid_instance_paths.is_empty() {
            writeln!(
                f,
                "**Valid Instance Paths:** {}",
                self.valid_instance_paths
                    .iter()
                    .map(|p| format!("`{}`", p))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
        }
        if self.update_in_progress {
            writeln!(f, "⚠️ A server update is in progress.")?;
        }
        Ok(())
    }
}

/// Bearer token issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub bearer: String,
    pub expires_at: Option<String>,
}

/// Error body returned by the server alongside failure statuses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorMessageResponse {
    message: Option<String>,
    additional_data: Option<String>,
}

/// Remote operations the bot performs against the server.
#[async_trait]
pub trait TgsApi: Send + Sync {
    /// Fetch general server information.
    async fn server_info(&self) -> Result<ServerInformation, ApiError>;

    /// Exchange a username and password for a bearer token.
    async fn create_token(&self, username: &str, password: &str)
        -> Result<TokenResponse, ApiError>;
}

/// Builds API clients bound to a [`ClientConfig`]. No network traffic.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn TgsApi>, ApiError>;
}

/// Production factory producing [`TgsClient`]s.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn TgsApi>, ApiError> {
        Ok(Arc::new(TgsClient::new(config, self.timeout)?))
    }
}

/// HTTP client for one tgstation-server.
#[derive(Debug, Clone)]
pub struct TgsClient {
    client: Client,
    base_url: String,
}

impl TgsClient {
    /// Create a client sending the configured headers on every request.
    pub fn new(config: &ClientConfig, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(API_HEADER),
            header_value("API header", &config.api_header)?,
        );
        headers.insert(USER_AGENT, header_value("User-Agent", &config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.token {
            let mut bearer = header_value("auth token", &format!("Bearer {}", token))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl TgsApi for TgsClient {
    async fn server_info(&self) -> Result<ServerInformation, ApiError> {
        let response = self
            .client
            .get(self.url("/"))
            .send()
            .await
            .map_err(ApiError::Transport)?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(ApiError::Decode)
    }

    async fn create_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/"))
            .basic_auth(username, Some(password))
            .send()
            .await
            .map_err(ApiError::Transport)?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(ApiError::Decode)
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader { name })
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        detail: error_detail(status, &body),
    })
}

/// Human-readable detail for a failed response body.
fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorMessageResponse>(body) {
        match (parsed.message, parsed.additional_data) {
            (Some(message), Some(extra)) if !extra.is_empty() => {
                return format!("{} ({})", message, extra)
            }
            (Some(message), _) => return message,
            _ => {}
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body.to_string()
    }
}

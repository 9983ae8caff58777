//! Scripted stand-in for a TGS server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::Deployment;
use crate::client::{
    ApiError, ClientConfig, ClientFactory, ServerInformation, TgsApi, TokenResponse,
};
use crate::settings::{MemoryStore, Settings};

/// `Ok(())` succeeds, `Err(status)` fails with that status.
pub type Outcome = Result<(), u16>;

#[derive(Debug, Default)]
struct FakeState {
    info_script: VecDeque<Outcome>,
    token_script: VecDeque<Outcome>,
    events: Vec<&'static str>,
    info_bearers: Vec<Option<String>>,
    token_bearers: Vec<Option<String>>,
    credentials: Vec<(String, String)>,
    issued: usize,
    builds: usize,
    fail_builds: bool,
}

/// Factory and server in one. Unscripted requests succeed.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn script_info(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.with(|s| s.info_script.extend(outcomes));
    }

    pub fn script_tokens(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.with(|s| s.token_script.extend(outcomes));
    }

    pub fn fail_builds(&self, fail: bool) {
        self.with(|s| s.fail_builds = fail);
    }

    pub fn builds(&self) -> usize {
        self.with(|s| s.builds)
    }

    pub fn info_calls(&self) -> usize {
        self.with(|s| s.info_bearers.len())
    }

    pub fn token_calls(&self) -> usize {
        self.with(|s| s.token_bearers.len())
    }

    /// Remote calls in the order they arrived.
    pub fn events(&self) -> Vec<&'static str> {
        self.with(|s| s.events.clone())
    }

    /// Bearer token sent with each server info request.
    pub fn info_bearers(&self) -> Vec<Option<String>> {
        self.with(|s| s.info_bearers.clone())
    }

    pub fn token_requests_bearers(&self) -> Vec<Option<String>> {
        self.with(|s| s.token_bearers.clone())
    }

    pub fn credentials_seen(&self) -> Vec<(String, String)> {
        self.with(|s| s.credentials.clone())
    }
}

impl ClientFactory for FakeServer {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn TgsApi>, ApiError> {
        self.with(|s| {
            if s.fail_builds {
                return Err(ApiError::InvalidHeader { name: "User-Agent" });
            }
            s.builds += 1;
            Ok(())
        })?;

        Ok(Arc::new(FakeClient {
            server: self.clone(),
            bearer: config.token.clone(),
        }))
    }
}

struct FakeClient {
    server: FakeServer,
    bearer: Option<String>,
}

fn status_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        detail: format!("scripted {}", status),
    }
}

#[async_trait]
impl TgsApi for FakeClient {
    async fn server_info(&self) -> Result<ServerInformation, ApiError> {
        self.server.with(|s| {
            s.events.push("server_info");
            s.info_bearers.push(self.bearer.clone());
            match s.info_script.pop_front().unwrap_or(Ok(())) {
                Ok(()) => Ok(ServerInformation {
                    version: Some("5.12.0".to_string()),
                    api_version: Some("9.10.0".to_string()),
                    ..ServerInformation::default()
                }),
                Err(status) => Err(status_error(status)),
            }
        })
    }

    async fn create_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenResponse, ApiError> {
        self.server.with(|s| {
            s.events.push("create_token");
            s.token_bearers.push(self.bearer.clone());
            s.credentials
                .push((username.to_string(), password.to_string()));
            match s.token_script.pop_front().unwrap_or(Ok(())) {
                Ok(()) => {
                    s.issued += 1;
                    Ok(TokenResponse {
                        bearer: format!("token-{}", s.issued),
                        expires_at: None,
                    })
                }
                Err(status) => Err(status_error(status)),
            }
        })
    }
}

/// A deployment over an empty in-memory store.
pub fn deployment(server: &FakeServer) -> Deployment {
    Deployment::new(
        Settings::new(Arc::new(MemoryStore::new())),
        Arc::new(server.clone()),
    )
}

/// A deployment with `admin`/`hunter2` stored and no token yet.
pub async fn deployment_with_credentials(server: &FakeServer) -> Deployment {
    let deployment = deployment(server);
    deployment.settings().set_username("admin").await.unwrap();
    deployment.settings().set_password("hunter2").await.unwrap();
    deployment
}

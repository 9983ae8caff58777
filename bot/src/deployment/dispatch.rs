//! Remote calls with first-use authentication and bounded 401 retry.

use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::{Deployment, DeploymentError};
use crate::client::{ApiError, ServerInformation, TgsApi};
use crate::reply::Reply;

/// Attempts per call, counting the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// A remote operation the bot can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ServerInfo,
}

impl Operation {
    pub const fn name(self) -> &'static str {
        match self {
            Operation::ServerInfo => "server_info",
        }
    }

    async fn invoke(self, api: &dyn TgsApi) -> Result<Response, ApiError> {
        match self {
            Operation::ServerInfo => api.server_info().await.map(Response::ServerInfo),
        }
    }
}

/// Successful result of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ServerInfo(ServerInformation),
}

impl Deployment {
    /// Invoke `operation` against the server.
    ///
    /// Authenticates first if no token is stored, acknowledges the command
    /// once, and re-authenticates on 401 for up to [`MAX_ATTEMPTS`]
    /// attempts. Failures are reported through `reply` and yield `None`.
    pub async fn call(&self, operation: Operation, reply: &dyn Reply) -> Option<Response> {
        let span = info_span!(
            "tgs_call",
            operation = operation.name(),
            call_id = %Uuid::new_v4()
        );

        match self.dispatch(operation, reply).instrument(span.clone()).await {
            Ok(response) => Some(response),
            Err(e) => {
                report_failure(e, reply).instrument(span).await;
                None
            }
        }
    }

    async fn dispatch(
        &self,
        operation: Operation,
        reply: &dyn Reply,
    ) -> Result<Response, DeploymentError> {
        if self.settings.auth_token().await?.is_none() {
            debug!("No stored token, authenticating first");
            self.reauthenticate(None).await?;
        }

        if let Err(e) = reply.acknowledge().await {
            warn!("Failed to acknowledge command: {}", e);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let handle = self.client().await?;

            match operation.invoke(handle.api()).await {
                Ok(response) => {
                    debug!(attempt, "TGS call succeeded");
                    return Ok(response);
                }
                Err(e) if e.is_unauthorized() && attempt < MAX_ATTEMPTS => {
                    debug!(attempt, "Unauthorized, re-authenticating");
                    self.reauthenticate(handle.config().token.as_deref()).await?;
                }
                Err(e) => {
                    if e.is_unauthorized() {
                        warn!(attempt, "Still unauthorized, giving up");
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

async fn report_failure(error: DeploymentError, reply: &dyn Reply) {
    warn!("TGS call failed: {}", error);
    if let Err(e) = reply.say(&error.user_message()).await {
        error!("Failed to deliver error message: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{deployment, deployment_with_credentials, FakeServer};
    use super::*;
    use crate::client::explain;
    use crate::reply::testing::RecordingReply;

    async fn authenticated(server: &FakeServer) -> Deployment {
        let deployment = deployment_with_credentials(server).await;
        deployment.settings().set_auth_token("initial").await.unwrap();
        deployment
    }

    #[tokio::test]
    async fn first_call_authenticates_once_before_invoking() {
        let server = FakeServer::new();
        let deployment = deployment_with_credentials(&server).await;
        let reply = RecordingReply::new();

        let response = deployment.call(Operation::ServerInfo, &reply).await;

        assert!(matches!(response, Some(Response::ServerInfo(_))));
        assert_eq!(server.events(), vec!["create_token", "server_info"]);
        assert_eq!(server.info_bearers(), vec![Some("token-1".to_string())]);
        assert_eq!(reply.acks(), 1);
        assert!(reply.messages().is_empty());
    }

    #[tokio::test]
    async fn stored_token_skips_authentication() {
        let server = FakeServer::new();
        let deployment = authenticated(&server).await;
        let reply = RecordingReply::new();

        assert!(deployment.call(Operation::ServerInfo, &reply).await.is_some());
        assert_eq!(server.events(), vec!["server_info"]);
        assert_eq!(server.info_bearers(), vec![Some("initial".to_string())]);
    }

    #[tokio::test]
    async fn recovers_after_two_unauthorized_attempts() {
        let server = FakeServer::new();
        let deployment = authenticated(&server).await;
        server.script_info([Err(401), Err(401), Ok(())]);
        let reply = RecordingReply::new();

        let response = deployment.call(Operation::ServerInfo, &reply).await;

        assert!(response.is_some());
        assert_eq!(server.token_calls(), 2);
        assert_eq!(server.info_calls(), 3);
        assert_eq!(
            server.info_bearers(),
            vec![
                Some("initial".to_string()),
                Some("token-1".to_string()),
                Some("token-2".to_string()),
            ]
        );
        assert_eq!(reply.acks(), 1);
        assert!(reply.messages().is_empty());
    }

    #[tokio::test]
    async fn gives_up_after_three_unauthorized_attempts() {
        let server = FakeServer::new();
        let deployment = authenticated(&server).await;
        server.script_info([Err(401), Err(401), Err(401)]);
        let reply = RecordingReply::new();

        let response = deployment.call(Operation::ServerInfo, &reply).await;

        assert!(response.is_none());
        assert_eq!(server.info_calls(), MAX_ATTEMPTS as usize);
        assert_eq!(server.token_calls(), 2);
        assert_eq!(reply.messages(), vec![explain(401, "scripted 401")]);
        assert_eq!(reply.acks(), 1);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let server = FakeServer::new();
        let deployment = authenticated(&server).await;
        server.script_info([Err(404)]);
        let reply = RecordingReply::new();

        assert!(deployment.call(Operation::ServerInfo, &reply).await.is_none());
        assert_eq!(server.info_calls(), 1);
        assert_eq!(server.token_calls(), 0);
        assert_eq!(reply.last(), explain(404, "scripted 404"));
    }

    #[tokio::test]
    async fn failed_reauthentication_aborts_the_call() {
        let server = FakeServer::new();
        let deployment = authenticated(&server).await;
        server.script_info([Err(401)]);
        server.script_tokens([Err(500)]);
        let reply = RecordingReply::new();

        assert!(deployment.call(Operation::ServerInfo, &reply).await.is_none());
        assert_eq!(server.info_calls(), 1);
        assert_eq!(server.token_calls(), 1);
        assert_eq!(reply.messages(), vec![explain(500, "scripted 500")]);
    }

    #[tokio::test]
    async fn failed_first_authentication_is_not_retried() {
        let server = FakeServer::new();
        let deployment = deployment_with_credentials(&server).await;
        server.script_tokens([Err(401)]);
        let reply = RecordingReply::new();

        assert!(deployment.call(Operation::ServerInfo, &reply).await.is_none());
        assert_eq!(server.token_calls(), 1);
        assert_eq!(server.info_calls(), 0);
        assert_eq!(reply.acks(), 0);
        assert_eq!(reply.last(), explain(401, "scripted 401"));
    }

    #[tokio::test]
    async fn missing_credentials_are_reported_without_network_calls() {
        let server = FakeServer::new();
        let deployment = deployment(&server);
        let reply = RecordingReply::new();

        assert!(deployment.call(Operation::ServerInfo, &reply).await.is_none());
        assert!(server.events().is_empty());
        assert_eq!(
            reply.messages(),
            vec![DeploymentError::MissingCredentials.user_message()]
        );
    }

    #[tokio::test]
    async fn client_build_failure_is_reported() {
        let server = FakeServer::new();
        let deployment = authenticated(&server).await;
        server.fail_builds(true);
        let reply = RecordingReply::new();

        assert!(deployment.call(Operation::ServerInfo, &reply).await.is_none());
        assert!(reply
            .last()
            .starts_with("There was an error communicating with TGS"));
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_one_token() {
        let server = FakeServer::new();
        let deployment = deployment_with_credentials(&server).await;
        let (a, b) = (RecordingReply::new(), RecordingReply::new());

        let (first, second) = tokio::join!(
            deployment.call(Operation::ServerInfo, &a),
            deployment.call(Operation::ServerInfo, &b)
        );

        assert!(first.is_some() && second.is_some());
        assert_eq!(server.token_calls(), 1);
        assert_eq!(a.acks() + b.acks(), 2);
    }
}

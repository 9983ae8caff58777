//! Human-readable explanations for API failures.

use super::ApiError;

/// Explain a failure status returned by the server.
pub fn explain(status: u16, detail: &str) -> String {
    match status {
        400 => format!("ERROR 400 (Bad Request): {}", detail),
        401 => "ERROR 401 (Unauthorized): Invalid or expired credentials were provided. Try running `/tgs4 authenticate`.".to_string(),
        403 => "ERROR 403 (Forbidden): You made a request that the authenticated user is not allowed to perform.".to_string(),
        404 => "ERROR 404 (Not Found): A resource was requested that *never* existed.".to_string(),
        406 => "ERROR 406 (Not Acceptable): No Accept header provided.".to_string(),
        408 => "ERROR 408 (Request Timeout)".to_string(),
        409 => "ERROR 409 (Conflict): Documented in the requests that use them.".to_string(),
        410 => "ERROR 410 (Gone): Attempted to access/modify a resource that isn't ready or is no longer ready.".to_string(),
        422 => "ERROR 422 (Unprocessable Entity): This should only be possible if your server configuration is incorrect. Specifically, the watchdog is not present in deployment.".to_string(),
        424 => "ERROR 424 (Failed Dependency): A request that depends on the GitHub API failed for a reason other than rate limiting. Check the server logs, usually this indicates a bad access token.".to_string(),
        426 => "ERROR 426 (Upgrade Required): This bot's API version is not compatible with the server's API version.".to_string(),
        429 => "ERROR 429 (Rate Limited): GitHub.com's rate limit has been reached.".to_string(),
        500 => format!("ERROR 500 (Server Error): Please report the following error: {}", detail),
        501 => "ERROR 501 (Not Implemented): Functionality not available in the current server version.".to_string(),
        503 => "ERROR 503 (Service Unavailable): The server is either starting up or shutting down and isn't ready to respond to requests. You can try again soon and a response/lack thereof will indicate which of the two events it was.".to_string(),
        _ => format!("Unknown API error {}: {}", status, detail),
    }
}

/// Chat message for any API failure.
pub fn describe(error: &ApiError) -> String {
    match error {
        ApiError::Status { status, detail } => explain(*status, detail),
        other => format!("There was an error communicating with TGS: {}", other),
    }
}

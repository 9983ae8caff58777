//! Input validation for the configuration commands.

use thiserror::Error;

use crate::settings::PORT_RANGE;

/// Rejected user input. The message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Error: The host must be HTTP, not HTTPS.")]
    Https,

    #[error("Error: `{0}` is not supported, the host must use `http://`.")]
    UnsupportedScheme(String),

    #[error("Error: `{0}` is not a valid host. Use the form `http://hostname[:port]`.")]
    MalformedHost(String),

    #[error("Error: {0} is not a valid port! Please check to ensure you're attempting to use a port from 1024 to 65535.")]
    InvalidPort(String),

    #[error("Error: Do not include the version in the API.")]
    VersionInApiName,

    #[error("Error: The {0} cannot be empty.")]
    Empty(&'static str),
}

/// A validated host, split from any port it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    /// `http://hostname`, no port, no trailing slash.
    pub host: String,
    pub port: Option<u16>,
}

pub fn parse_host(input: &str) -> Result<HostTarget, ValidationError> {
    let input = input.trim();
    if input.to_ascii_lowercase().starts_with("https") {
        return Err(ValidationError::Https);
    }

    let authority = match input.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("http") => rest,
        Some((scheme, _)) => {
            return Err(ValidationError::UnsupportedScheme(format!("{}://", scheme)))
        }
        // Bare hostname or address, assume http.
        None => input,
    }
    .trim_end_matches('/');

    let (hostname, port) = match authority.split_once(':') {
        Some((hostname, port)) => (hostname, Some(parse_port_str(port)?)),
        None => (authority, None),
    };

    let malformed = hostname.is_empty()
        || hostname
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '@' | '?' | '#'));
    if malformed {
        return Err(ValidationError::MalformedHost(input.to_string()));
    }

    Ok(HostTarget {
        host: format!("http://{}", hostname),
        port,
    })
}

pub fn parse_port(port: i64) -> Result<u16, ValidationError> {
    u16::try_from(port)
        .ok()
        .filter(|p| PORT_RANGE.contains(p))
        .ok_or_else(|| ValidationError::InvalidPort(port.to_string()))
}

fn parse_port_str(port: &str) -> Result<u16, ValidationError> {
    port.parse::<i64>()
        .map_err(|_| ValidationError::InvalidPort(port.to_string()))
        .and_then(parse_port)
}

/// API name without version, e.g. `Tgstation.Server.Api`.
pub fn parse_api_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim().trim_end_matches('/');
    match name.chars().last() {
        None => Err(ValidationError::Empty("API name")),
        Some(c) if c.is_ascii_digit() => Err(ValidationError::VersionInApiName),
        Some(_) => Ok(name.to_string()),
    }
}

/// Checks a free-form value is not blank and returns it trimmed.
pub fn non_empty<'a>(input: &'a str, what: &'static str) -> Result<&'a str, ValidationError> {
    let value = input.trim();
    if value.is_empty() {
        Err(ValidationError::Empty(what))
    } else {
        Ok(value)
    }
}

//! HTTP client module for tgstation-server communication.

mod explain;
mod tgs;

pub use explain::describe;
pub use tgs::{
    ApiError, ClientConfig, ClientFactory, HttpClientFactory, ServerInformation, TgsApi,
};

#[cfg(test)]
pub use explain::explain;
#[cfg(test)]
pub use tgs::TokenResponse;

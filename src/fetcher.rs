use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use url::Url;

use crate::error::FetchError;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Retrieves the raw body of one remote resource.
///
/// Implementations perform a single attempt; retry policy belongs to the caller.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, url: &Url, auth_token: Option<&str>) -> Result<Bytes, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &Url, auth_token: Option<&str>) -> Result<Bytes, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(status, url.as_str()));
        }
        Ok(response.bytes()?)
    }
}

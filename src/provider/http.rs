use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::retry::RetryPolicy;

const USER_AGENT: &str = concat!("depsentry/", env!("CARGO_PKG_VERSION"));

/// Transport settings shared by every HTTP provider.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

pub(crate) fn build_client(provider: &str, settings: &HttpSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Config(format!("cannot build HTTP client for {}: {}", provider, e)))
}

/// Basic auth credentials for providers that accept them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Credentials {
    pub username: String,
    pub token: String,
}

/// POSTs `body` as JSON and decodes a JSON answer.
///
/// Non-success statuses become [`Error::ProviderQueryFailed`] carrying the
/// status, so the retry layer can tell rate limiting from a bad request.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    body: &B,
    credentials: Option<&Credentials>,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut request = client
        .post(url)
        .header("Accept", "application/json")
        .json(body);
    if let Some(creds) = credentials {
        request = request.basic_auth(&creds.username, Some(&creds.token));
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::http_status(provider, status.as_u16(), &text));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::from_reqwest(provider, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::query_failed(provider, format!("malformed response: {}", e)))
}

use crate::errors::FetchError;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Wire shape shared by upstream payloads and our own response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NumbersPayload {
    pub numbers: Vec<i64>,
}

/// Decodes an upstream body of the form `{"numbers": [..]}`.
pub fn parse_numbers(body: &[u8]) -> Result<Vec<i64>, serde_json::Error> {
    serde_json::from_slice::<NumbersPayload>(body).map(|payload| payload.numbers)
}

/// Fetches number lists from single upstreams.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Self {
        Self::with_client(reqwest::Client::new(), timeout, max_body_bytes)
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration, max_body_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_body_bytes,
        }
    }

    /// GETs `url` and decodes its numbers.
    ///
    /// The timeout covers the whole exchange, including reading the body. The
    /// response is consumed or dropped on every path, which releases the
    /// connection. Dropping the returned future cancels the request.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<i64>, FetchError> {
        timeout(self.timeout, self.fetch_inner(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
    }

    async fn fetch_inner(&self, url: &Url) -> Result<Vec<i64>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };
        if response
            .content_length()
            .is_some_and(|length| length > self.max_body_bytes as u64)
        {
            return Err(too_large());
        }

        // Chunked bodies carry no length up front; stop reading at the cap
        let body = Limited::new(reqwest::Body::from(response), self.max_body_bytes)
            .collect()
            .await
            .map_err(|source| {
                if source.is::<LengthLimitError>() {
                    too_large()
                } else {
                    FetchError::Body {
                        url: url.to_string(),
                        source,
                    }
                }
            })?
            .to_bytes();

        parse_numbers(&body).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
    }
}

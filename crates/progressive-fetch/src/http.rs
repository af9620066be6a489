//! HTTP range source backed by reqwest.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use stream_common::{RangeRequest, RangeResponse, RangeSource, SourceError, SourceResult};
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};

/// Issues `Range` requests against the bucket.
///
/// The request's cache layer is a local side channel and never becomes a
/// request header. 200 and 206 are both success; nothing is retried.
#[derive(Clone)]
pub struct HttpRangeSource {
    client: Client,
}

impl HttpRangeSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(url.to_string())
    } else {
        SourceError::Connection(format!("{}: {}", url, err))
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    async fn fetch(&self, request: &RangeRequest) -> SourceResult<RangeResponse> {
        let range = request.range.header_value()?;
        debug!(url = %request.url, range = %range, "Fetching range");

        let response = self
            .client
            .get(&request.url)
            .header(header::RANGE, &range)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound(request.url.clone())),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(SourceError::RangeNotSatisfiable {
                    url: request.url.clone(),
                    range,
                    len: response.content_length().unwrap_or(0),
                })
            }
            other => {
                return Err(SourceError::Http {
                    status: other.as_u16(),
                    url: request.url.clone(),
                })
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?;

        // A 200 means the server ignored the range and sent the whole file
        let body = if status == StatusCode::OK && body.len() as u64 > request.range.len() {
            let span = request.range.resolve(body.len() as u64).ok_or_else(|| {
                SourceError::RangeNotSatisfiable {
                    url: request.url.clone(),
                    range: range.clone(),
                    len: body.len() as u64,
                }
            })?;
            body.slice(span.offset as usize..(span.offset + span.size) as usize)
        } else {
            body
        };

        Ok(RangeResponse::network(status.as_u16(), body))
    }
}

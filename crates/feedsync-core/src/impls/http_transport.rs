//! HttpTransport - reqwest で REST API にレコードを再送する

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use tracing::debug;

use crate::domain::{HttpMethod, ReplayRequest};
use crate::error::TransportError;
use crate::ports::ReplayTransport;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = parse_base_url(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for a request; path segments are percent-encoded.
    pub fn url_for(&self, request: &ReplayRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(&request.segments);
        }
        Ok(url)
    }

    /// Whether the API host answers at all. Any HTTP response counts as online.
    pub async fn probe(&self) -> bool {
        self.client.head(self.base_url.clone()).send().await.is_ok()
    }
}

fn parse_base_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(TransportError::InvalidUrl(format!(
            "{raw}: expected an http(s) base url"
        )));
    }
    Ok(url)
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
    }
}

#[async_trait]
impl ReplayTransport for HttpTransport {
    async fn send(&self, request: &ReplayRequest) -> Result<u16, TransportError> {
        let url = self.url_for(request)?;
        debug!(method = %request.method, %url, "replaying request");

        let response = self
            .client
            .request(to_method(request.method), url)
            .header(CONTENT_TYPE, "application/json")
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                method: request.method.as_str(),
                path: request.path(),
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }
}

use crate::config::FeedEndpoint;
use crate::errors::IngestError;
use crate::gtfs_rt_handlers::{DecodedFeed, decode_feed};
use std::future::Future;
use std::time::Duration;

/// Anything that can hand back the raw bytes of one feed endpoint.
pub trait FeedSource {
    fn fetch_payload(
        &self,
        endpoint: &FeedEndpoint,
    ) -> impl Future<Output = Result<Vec<u8>, IngestError>> + Send;
}

/// Fetches an endpoint and decodes it. The body is only decoded once the
/// source reported success.
pub async fn fetch_feed<S: FeedSource>(
    source: &S,
    endpoint: &FeedEndpoint,
) -> Result<DecodedFeed, IngestError> {
    let payload = source.fetch_payload(endpoint).await?;
    decode_feed(&endpoint.url, &payload)
}

pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    pub fn make_request(&self, endpoint: &FeedEndpoint) -> reqwest::RequestBuilder {
        let mut request = self.client.get(&endpoint.url);

        if let Some(key) = &endpoint.key {
            request = request.query(&[("key", key)]);
        }

        request
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch_payload(&self, endpoint: &FeedEndpoint) -> Result<Vec<u8>, IngestError> {
        let transport_error = |source: reqwest::Error| IngestError::Transport {
            url: endpoint.url.clone(),
            // the request url carries the key as a query parameter
            source: source.without_url(),
        };

        let response = self
            .make_request(endpoint)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();

        if !status.is_success() {
            return Err(IngestError::HttpStatus {
                url: endpoint.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(transport_error)?;

        Ok(bytes.to_vec())
    }
}

//! HTTP client for the answering service's streaming endpoint.

use ds_domain::config::BackendConfig;
use ds_domain::error::{Error, Result};
use ds_domain::stream::BoxStream;
use serde::Serialize;

/// Body of a send-message request.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub chat_session_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<i64>,
    pub use_agentic_search: bool,
}

pub struct BackendClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl BackendClient {
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(from_reqwest)?;

        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::debug!(env = %cfg.api_key_env, "no API key set; sending unauthenticated requests");
        }

        Ok(Self {
            client,
            url: cfg.send_message_url(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post a message and return the response body as a byte stream.
    ///
    /// Fails with [`Error::Network`] or [`Error::Timeout`] when no response
    /// arrives, and with [`Error::Backend`] on a non-success status.
    pub async fn send_message(
        &self,
        req: &SendMessageRequest,
    ) -> Result<BoxStream<'static, Result<Vec<u8>>>> {
        let mut builder = self.client.post(&self.url).json(req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(url = %self.url, session = %req.chat_session_id, "sending message");
        let resp = builder.send().await.map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response_body(resp))
    }
}

/// Expose a response body as raw byte chunks.
fn response_body(response: reqwest::Response) -> BoxStream<'static, Result<Vec<u8>>> {
    let stream = async_stream::stream! {
        let mut response = response;
        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => yield Ok(bytes.to_vec()),
                Ok(None) => break,
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}

/// Timeouts map to [`Error::Timeout`]; everything else to [`Error::Network`].
fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error};

use crate::core::constants::RequestMethod;
use crate::core::error::{PimsError, Result, TransportError};
use crate::core::format::Credentials;
use crate::core::query::HistoryQuery;

// Longest slice of an error body kept in `TransportError::Status`.
const ERROR_BODY_LIMIT: usize = 256;

/// Performs one History call and hands back the raw response body.
#[async_trait]
pub trait HistoryTransport: Send + Sync {
    async fn fetch(
        &self,
        query: &HistoryQuery,
        credentials: &Credentials,
    ) -> std::result::Result<String, TransportError>;
}

/// HTTP transport over reqwest.
///
/// Credentials go out as HTTP basic auth. Gateways that insist on NTLM
/// need an NTLM-capable proxy in front, or another `HistoryTransport`.
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PimsError::Transport(TransportError::Network(e.to_string())))?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            return TransportError::Timeout(self.timeout);
        }
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl HistoryTransport for ReqwestTransport {
    async fn fetch(
        &self,
        query: &HistoryQuery,
        credentials: &Credentials,
    ) -> std::result::Result<String, TransportError> {
        let request = match query.method {
            RequestMethod::Get => self.client.get(query.get_url()),
            RequestMethod::Post => self
                .client
                .post(&query.url)
                .header(CONTENT_TYPE, "text/xml; charset=utf-8")
                .body(query.xml.clone()),
        };

        debug!("{:?} {}", query.method, query.url);

        let response = request
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("History endpoint rejected user {}: {}", credentials.username, status);
            return Err(TransportError::Unauthorized(status.as_u16()));
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(|e| self.map_error(e))
    }
}

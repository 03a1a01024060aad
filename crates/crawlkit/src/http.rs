//! Plain HTTP page fetching for the degraded state

use crate::error::PageError;
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

/// Connect timeout shared by page and media requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of raw (unrendered) page HTML
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_html(
        &self,
        url: &str,
        timeout: Duration,
        cookie_header: Option<&str>,
    ) -> Result<String, PageError>;
}

/// Build the HTTP client used for page and media requests
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, PageError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(PageError::ClientBuild)
}

/// [`PageSource`] backed by reqwest
#[derive(Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_html(
        &self,
        url: &str,
        timeout: Duration,
        cookie_header: Option<&str>,
    ) -> Result<String, PageError> {
        let mut request = self
            .client
            .get(url)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .timeout(timeout);
        if let Some(cookie) = cookie_header {
            request = request.header(COOKIE, cookie);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let response = request.send().await.map_err(PageError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::Status(status.as_u16()));
        }

        let (body, truncated) = read_body_until(response, deadline).await;
        if truncated && body.is_empty() {
            return Err(PageError::Timeout);
        }
        debug!(%url, bytes = body.len(), truncated, "Fetched raw page");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Read response body until the deadline, returning partial content if it passes
async fn read_body_until(
    response: reqwest::Response,
    deadline: tokio::time::Instant,
) -> (Bytes, bool) {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => body.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        warn!(error = %e, "Error reading page body");
                        let has_content = !body.is_empty();
                        return (Bytes::from(body), has_content);
                    }
                    None => return (Bytes::from(body), false),
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!("Page body deadline reached, using partial content");
                return (Bytes::from(body), true);
            }
        }
    }
}

mod error;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::config::HttpConfig;

pub use error::FetchError;

/// Longest response body excerpt kept for diagnostics.
const BODY_EXCERPT_CHARS: usize = 500;

/// Build a client carrying the configured default headers and timeout.
pub fn build_client(config: &HttpConfig) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| FetchError::Client(format!("invalid header name '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::Client(format!("invalid value for '{}': {}", key, e)))?;
        headers.insert(name, value);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(config.timeout())
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// Build a client for plain single-shot downloads, optionally through a proxy.
pub fn build_download_client(
    user_agent: &str,
    timeout: std::time::Duration,
    proxy: Option<&str>,
) -> Result<Client, FetchError> {
    let mut builder = Client::builder().user_agent(user_agent).timeout(timeout);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| FetchError::Client(format!("invalid proxy URL '{}': {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// Append query parameters to a URL.
pub fn with_query(url: &str, query: &[(&str, String)]) -> Result<Url, FetchError> {
    let invalid = |e: url::ParseError| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    };

    if query.is_empty() {
        Url::parse(url).map_err(invalid)
    } else {
        Url::parse_with_params(url, query).map_err(invalid)
    }
}

/**
    GET a URL and decode the body as JSON, retrying with linear backoff.

    Transport errors, timeouts, non-2xx statuses and undecodable bodies all
    count as failed attempts. After `max_retries` extra attempts the last
    failure is wrapped in [`FetchError::Exhausted`]; callers decide whether
    that means skipping an item or aborting.
*/
pub async fn fetch_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    config: &HttpConfig,
) -> Result<Value, FetchError> {
    let target = with_query(url, query)?;
    let attempts = config.max_retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        tracing::debug!(url = %target, attempt, attempts, "Fetching");

        let err = match try_fetch_json(client, &target).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= attempts {
            tracing::error!(url = %target, attempts, error = %err, "Fetch failed");
            if let Some(status) = err.status() {
                tracing::error!(url = %target, %status, "Response status");
            }
            if let Some(body) = err.body_excerpt() {
                tracing::error!(url = %target, body, "Response content");
            }
            return Err(FetchError::Exhausted {
                url: target.to_string(),
                attempts,
                last: Box::new(err),
            });
        }

        let delay = config.retry_delay(attempt);
        tracing::warn!(
            url = %target,
            attempt,
            error = %err,
            "Fetch attempt failed, retrying in {:?}",
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Single-attempt GET returning the body as text.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, FetchError> {
    let target = with_query(url, &[])?;
    let response = client.get(target).send().await?;
    success_body(response).await
}

/// Single-attempt GET returning the raw body bytes.
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let target = with_query(url, &[])?;
    let response = client.get(target).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status,
            body: excerpt(&body),
        });
    }

    Ok(response.bytes().await?.to_vec())
}

async fn try_fetch_json(client: &Client, url: &Url) -> Result<Value, FetchError> {
    let response = client.get(url.clone()).send().await?;
    let body = success_body(response).await?;
    Ok(serde_json::from_str(&body)?)
}

async fn success_body(response: reqwest::Response) -> Result<String, FetchError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            status,
            body: excerpt(&body),
        });
    }

    Ok(body)
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// A canned HTTP response.
    #[derive(Clone)]
    pub struct Canned {
        pub status: u16,
        pub content_type: &'static str,
        pub body: Vec<u8>,
    }

    impl Canned {
        pub fn json(status: u16, body: &str) -> Self {
            Self {
                status,
                content_type: "application/json",
                body: body.as_bytes().to_vec(),
            }
        }

        pub fn text(status: u16, body: &str) -> Self {
            Self {
                status,
                content_type: "text/plain",
                body: body.as_bytes().to_vec(),
            }
        }
    }

    /**
        Serve `responses` in order, one per connection, repeating the last one.

        Returns the base URL and a counter of requests served.
    */
    pub async fn serve(responses: Vec<Canned>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let canned = responses[n.min(responses.len() - 1)].clone();

                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(read) => buf.extend_from_slice(&chunk[..read]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    canned.status,
                    canned.content_type,
                    canned.body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&canned.body).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }
}

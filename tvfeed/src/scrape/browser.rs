use std::time::Duration;

use anyhow::{Result, anyhow};
use chrome_browser::{ChromeBrowser, ChromeBrowserTab, ChromeLaunchOptions, NetworkRequestStream};
use serde_json::Value;
use tokio::time::{Instant, timeout_at};

use crate::config::ScrapeConfig;

/// Collects the resolved `src` of every `<img>` on the page.
const IMAGE_SOURCES_SCRIPT: &str =
    "Array.from(document.querySelectorAll('img'), el => el.src || '')";

const DOCUMENT_READY: &str = "document.readyState === 'complete'";

/**
    Create a browser instance from the scrape config.
*/
pub async fn create_browser(config: &ScrapeConfig) -> Result<ChromeBrowser> {
    let mut options = ChromeLaunchOptions::default()
        .headless(config.headless)
        .devtools(false)
        .enable_gpu(config.headless);

    if let Some(ref proxy) = config.proxy {
        options = options.proxy_server(proxy);
    }

    ChromeBrowser::new(options).await
}

/**
    Render the configured page and return the image sources found in its DOM.

    The browser is closed before returning, whether or not extraction worked.
*/
pub async fn collect_image_sources(config: &ScrapeConfig) -> Result<Vec<String>> {
    let browser = create_browser(config).await?;
    let tab = browser
        .get_tab(0)
        .await
        .ok_or_else(|| anyhow!("No browser tab available"))?;

    let result = extract_from_tab(&tab, config).await;

    let _ = tab.navigate("about:blank").await;
    let _ = browser.close().await;

    result
}

async fn extract_from_tab(tab: &ChromeBrowserTab, config: &ScrapeConfig) -> Result<Vec<String>> {
    let mut requests = tab.network().requests();

    tracing::info!(url = %config.page_url, "Navigating");
    tab.navigate(&config.page_url).await?;
    tab.wait_for_function(DOCUMENT_READY).await?;

    let idle = wait_for_network_idle(&mut requests, config.idle_window(), config.idle_timeout()).await;
    if !idle {
        tracing::warn!(
            "Network did not settle within {:?}, extracting anyway",
            config.idle_timeout()
        );
    }

    let value = tab.eval_json(IMAGE_SOURCES_SCRIPT.to_string(), true).await?;
    let sources = image_sources(value);
    tracing::info!(count = sources.len(), "Found image elements");
    Ok(sources)
}

/// Anything that yields page network requests one at a time.
trait RequestEvents {
    /// Wait for the next request; `false` once the stream has closed.
    async fn next_request(&mut self) -> bool;
}

impl RequestEvents for NetworkRequestStream {
    async fn next_request(&mut self) -> bool {
        self.next().await.is_some()
    }
}

/**
    Wait until no new request has started for `window`, giving up at `limit`.

    Returns `true` when the network went idle, `false` on timeout.
*/
async fn wait_for_network_idle<R: RequestEvents>(
    requests: &mut R,
    window: Duration,
    limit: Duration,
) -> bool {
    let deadline = Instant::now() + limit;
    let mut seen = 0usize;

    loop {
        let idle_at = (Instant::now() + window).min(deadline);

        match timeout_at(idle_at, requests.next_request()).await {
            Ok(true) => seen += 1,
            Ok(false) => {
                tracing::debug!(requests = seen, "Network stream closed");
                return true;
            }
            Err(_) => {
                tracing::debug!(requests = seen, "Network wait finished");
                return idle_at < deadline;
            }
        }
    }
}

/// Turn the script result into a list of source strings.
pub fn image_sources(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(src) => Some(src),
                _ => None,
            })
            .collect(),
        other => {
            tracing::warn!(result = %other, "Unexpected image query result");
            Vec::new()
        }
    }
}

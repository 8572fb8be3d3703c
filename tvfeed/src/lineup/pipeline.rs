use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::config::LineupConfig;
use crate::http::fetch_json;
use crate::output::GuideDocument;

use super::guide::{GuideWindow, fetch_programmes};
use super::normalize::normalize_channels;
use super::types::Channel;

/// Fetch and normalize the channel catalog. Failure yields an empty list.
pub async fn fetch_channels(client: &Client, config: &LineupConfig, base_url: &Url) -> Vec<Channel> {
    tracing::info!(url = %config.channels_endpoint, "Fetching channel list");

    let body = match fetch_json(client, &config.channels_endpoint, &[], &config.http).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch channel list");
            return Vec::new();
        }
    };

    match body {
        Value::Array(records) => normalize_channels(&records, base_url),
        other => {
            tracing::error!(kind = json_kind(&other), "Channel list is not an array");
            Vec::new()
        }
    }
}

/**
    Build the guide: every channel first, then each channel's programmes.

    Guides are fetched one channel at a time. A channel whose guide can't be
    fetched simply contributes no programmes.
*/
pub async fn build_guide(
    client: &Client,
    config: &LineupConfig,
    base_url: &Url,
    channels: &[Channel],
    window: &GuideWindow,
) -> GuideDocument {
    let mut document = GuideDocument::new(&config.guide);

    for channel in channels {
        document.push_channel(channel);
    }

    for channel in channels {
        let programmes = fetch_programmes(client, config, &channel.id, window).await;

        let mut dropped = 0;
        for programme in &programmes {
            if !document.push_programme(&channel.id, programme, base_url) {
                dropped += 1;
            }
        }

        if dropped > 0 {
            tracing::warn!(
                channel = %channel.id,
                dropped,
                "Dropped programmes with unusable timestamps"
            );
        }
    }

    tracing::info!(
        channels = document.channel_count(),
        programmes = document.programme_count(),
        "Guide built"
    );

    document
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

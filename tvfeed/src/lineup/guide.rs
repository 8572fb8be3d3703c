use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::LineupConfig;
use crate::http::fetch_json;
use crate::util::time::{now, to_iso_utc};

use super::types::Programme;

/// Time range requested from the guide endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl GuideWindow {
    /// From now until `hours` from now.
    pub fn from_now(hours: i64) -> Result<Self> {
        Self::starting_at(now(), hours)
    }

    /// Fails when `hours` is not positive or the end falls outside the calendar.
    pub fn starting_at(start: DateTime<Utc>, hours: i64) -> Result<Self> {
        if hours <= 0 {
            bail!("Guide window must be at least one hour, got {}", hours);
        }

        let end = TimeDelta::try_hours(hours)
            .and_then(|span| start.checked_add_signed(span))
            .ok_or_else(|| anyhow!("Guide window of {} hours is out of range", hours))?;

        Ok(Self { start, end })
    }

    /// Query parameters for the guide endpoint.
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("startTime", to_iso_utc(&self.start)),
            ("endTime", to_iso_utc(&self.end)),
        ]
    }
}

/// Guide entry as delivered upstream. Every field is optional here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProgramme {
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    genre: Option<Genre>,
    #[serde(default)]
    image_url: Option<String>,
}

/// The `genre` field is either a single label or a list of labels.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Genre {
    One(String),
    Many(Vec<Option<String>>),
}

impl Genre {
    fn into_labels(self) -> Vec<String> {
        let labels = match self {
            Genre::One(label) => vec![label],
            Genre::Many(labels) => labels.into_iter().flatten().collect(),
        };
        labels.into_iter().filter(|l| !l.trim().is_empty()).collect()
    }
}

/**
    Fetch the guide for one channel.

    Any failure (exhausted retries, unexpected response shape) yields an
    empty list: a channel without guide data never stops the run.
*/
pub async fn fetch_programmes(
    client: &Client,
    config: &LineupConfig,
    channel_id: &str,
    window: &GuideWindow,
) -> Vec<Programme> {
    let Some(url) = guide_url(&config.epg_endpoint, channel_id) else {
        tracing::error!(endpoint = %config.epg_endpoint, "Guide endpoint cannot take a channel path");
        return Vec::new();
    };

    tracing::debug!(channel = channel_id, "Fetching guide");

    let body = match fetch_json(client, url.as_str(), &window.query(), &config.http).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(channel = channel_id, error = %e, "No guide data for channel");
            return Vec::new();
        }
    };

    let Some(items) = programmes_array(&body) else {
        tracing::warn!(channel = channel_id, "Guide response has no programs list");
        return Vec::new();
    };

    let programmes = parse_programmes(channel_id, items);
    tracing::debug!(channel = channel_id, count = programmes.len(), "Found programmes");
    programmes
}

/// Guide endpoint with the channel id appended as one encoded path segment.
pub fn guide_url(endpoint: &str, channel_id: &str) -> Option<Url> {
    let mut url = Url::parse(endpoint).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(channel_id);
    Some(url)
}

/// The `programs` array of a guide response, if it has that shape.
pub fn programmes_array(body: &Value) -> Option<&[Value]> {
    body.as_object()?
        .get("programs")?
        .as_array()
        .map(Vec::as_slice)
}

/**
    Parse guide items one by one.

    Malformed items are logged and skipped. Items without both a start and an
    end time are dropped silently, since a guide entry needs both.
*/
pub fn parse_programmes(channel_id: &str, items: &[Value]) -> Vec<Programme> {
    items
        .iter()
        .filter_map(|item| match RawProgramme::deserialize(item) {
            Ok(raw) => into_programme(raw),
            Err(e) => {
                tracing::error!(channel = channel_id, error = %e, "Skipping malformed programme");
                None
            }
        })
        .collect()
}

fn into_programme(raw: RawProgramme) -> Option<Programme> {
    let start = raw.start_time.filter(|s| !s.trim().is_empty())?;
    let end = raw.end_time.filter(|s| !s.trim().is_empty())?;

    Some(Programme {
        start,
        end,
        title: raw.title.filter(|t| !t.is_empty()),
        description: raw.description.filter(|d| !d.is_empty()),
        genres: raw.genre.map(Genre::into_labels).unwrap_or_default(),
        image: raw.image_url.filter(|i| !i.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::test_server::{Canned, serve};

    #[test]
    fn test_window_query() {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = GuideWindow::starting_at(start, 24).unwrap();

        let [(start_key, start_value), (end_key, end_value)] = window.query();
        assert_eq!(start_key, "startTime");
        assert_eq!(start_value, "2024-01-01T00:00:00.000Z");
        assert_eq!(end_key, "endTime");
        assert_eq!(end_value, "2024-01-02T00:00:00.000Z");
    }

    #[test]
    fn test_window_rejects_bad_lengths() {
        let start = now();
        assert!(GuideWindow::starting_at(start, 0).is_err());
        assert!(GuideWindow::starting_at(start, -6).is_err());
        assert!(GuideWindow::starting_at(start, i64::MAX / 1000).is_err());
        assert!(GuideWindow::from_now(i64::MAX).is_err());
        assert!(GuideWindow::from_now(24 * 365).is_ok());
    }

    #[test]
    fn test_guide_url_encodes_channel_id() {
        assert_eq!(
            guide_url("https://lineup.example.com/api/epg", "42").unwrap().as_str(),
            "https://lineup.example.com/api/epg/42"
        );
        assert_eq!(
            guide_url("https://lineup.example.com/api/epg/", "42").unwrap().as_str(),
            "https://lineup.example.com/api/epg/42"
        );
        assert_eq!(
            guide_url("https://lineup.example.com/api/epg", "a/b?c#d").unwrap().as_str(),
            "https://lineup.example.com/api/epg/a%2Fb%3Fc%23d"
        );
        assert!(guide_url("not a url", "42").is_none());
    }

    #[test]
    fn test_programmes_array_shape() {
        assert!(programmes_array(&json!({ "programs": [] })).is_some());
        assert!(programmes_array(&json!({ "programs": "nope" })).is_none());
        assert!(programmes_array(&json!({ "items": [] })).is_none());
        assert!(programmes_array(&json!([])).is_none());
    }

    #[test]
    fn test_parse_genre_forms() {
        let items = vec![
            json!({
                "startTime": "2024-01-01T00:00:00Z",
                "endTime": "2024-01-01T01:00:00Z",
                "genre": "Drama"
            }),
            json!({
                "startTime": "2024-01-01T01:00:00Z",
                "endTime": "2024-01-01T02:00:00Z",
                "genre": ["News", "", null, "Weather"]
            }),
        ];

        let programmes = parse_programmes("1", &items);
        assert_eq!(programmes[0].genres, vec!["Drama"]);
        assert_eq!(programmes[1].genres, vec!["News", "Weather"]);
    }

    #[test]
    fn test_parse_skips_missing_times_and_malformed() {
        let items = vec![
            json!({ "startTime": "2024-01-01T00:00:00Z", "title": "No end" }),
            json!({ "endTime": "2024-01-01T00:00:00Z", "title": "No start" }),
            json!("not an object"),
            json!({ "startTime": 5, "endTime": "2024-01-01T00:00:00Z" }),
            json!({
                "startTime": "2024-01-01T00:00:00Z",
                "endTime": "2024-01-01T00:30:00Z",
                "title": "Kept",
                "description": "",
                "imageUrl": "/img/p.jpg"
            }),
        ];

        let programmes = parse_programmes("1", &items);
        assert_eq!(programmes.len(), 1);
        assert_eq!(programmes[0].title.as_deref(), Some("Kept"));
        assert_eq!(programmes[0].description, None);
        assert_eq!(programmes[0].image.as_deref(), Some("/img/p.jpg"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_empty() {
        let (base, _hits) = serve(vec![Canned::text(500, "down")]).await;

        let mut config = LineupConfig {
            epg_endpoint: format!("{base}/api/epg"),
            ..LineupConfig::default()
        };
        config.http.max_retries = 0;
        config.http.retry_delay_secs = 0;

        let client = crate::http::build_client(&config.http).unwrap();
        let programmes =
            fetch_programmes(&client, &config, "42", &GuideWindow::from_now(1).unwrap()).await;
        assert!(programmes.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_parses_programs() {
        let body = r#"{"programs":[{"startTime":"2024-01-01T00:00:00Z","endTime":"2024-01-01T01:00:00Z","title":"Morning"}]}"#;
        let (base, hits) = serve(vec![Canned::json(200, body)]).await;

        let config = LineupConfig {
            epg_endpoint: format!("{base}/api/epg/"),
            ..LineupConfig::default()
        };

        let client = crate::http::build_client(&config.http).unwrap();
        let programmes =
            fetch_programmes(&client, &config, "42", &GuideWindow::from_now(1).unwrap()).await;

        assert_eq!(programmes.len(), 1);
        assert_eq!(programmes[0].title.as_deref(), Some("Morning"));
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

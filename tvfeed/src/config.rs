use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:141.0) Gecko/20100101 Firefox/141.0";

/// Load a YAML config file, or fall back to the built-in defaults.
pub fn load_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// HTTP settings for API fetches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Extra attempts after the first one fails.
    pub max_retries: u32,
    /// Backoff base in seconds; attempt `n` waits `n * retry_delay_secs`.
    pub retry_delay_secs: u64,
    pub headers: BTreeMap<String, String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before the retry following failed attempt number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.retry_delay_secs.saturating_mul(u64::from(attempt)))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let headers = [
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Origin", "https://lgchannels.com"),
            ("Referer", "https://lgchannels.com/"),
            ("Sec-Fetch-Dest", "empty"),
            ("Sec-Fetch-Mode", "cors"),
            ("Sec-Fetch-Site", "same-site"),
            ("User-Agent", BROWSER_USER_AGENT),
            ("X-Requested-With", "XMLHttpRequest"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 2,
            headers,
        }
    }
}

/// Attributes placed on the guide's root `tv` element. Empty values are omitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GuideMeta {
    pub generator_name: String,
    pub generator_url: String,
    pub source_name: String,
    pub source_url: String,
}

/// Settings for the `lineup` pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LineupConfig {
    /// Base for resolving relative logo, stream and image URLs.
    pub base_url: String,
    pub channels_endpoint: String,
    /// Guide endpoint; the channel id is appended as a path segment.
    pub epg_endpoint: String,
    pub epg_hours: i64,
    pub output_dir: PathBuf,
    pub playlist_filename: String,
    pub epg_filename: String,
    pub guide: GuideMeta,
    pub http: HttpConfig,
}

impl LineupConfig {
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join(&self.playlist_filename)
    }

    pub fn epg_path(&self) -> PathBuf {
        self.output_dir.join(&self.epg_filename)
    }
}

impl Default for LineupConfig {
    fn default() -> Self {
        let base_url = "https://channel-lineup.lgchannels.com".to_string();
        Self {
            channels_endpoint: format!("{base_url}/api/channels"),
            epg_endpoint: format!("{base_url}/api/epg"),
            base_url,
            epg_hours: 24,
            output_dir: PathBuf::from("lgchannels_playlist"),
            playlist_filename: "lgchannels.m3u".to_string(),
            epg_filename: "lgchannels_epg.xml.gz".to_string(),
            guide: GuideMeta {
                generator_name: "tvfeed".to_string(),
                generator_url: String::new(),
                source_name: "LG Channels".to_string(),
                source_url: "https://lgchannels.com/".to_string(),
            },
            http: HttpConfig::default(),
        }
    }
}

/// Settings for the `scrape-images` pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub page_url: String,
    pub output_dir: PathBuf,
    /// File stem prefix; files are named `<prefix>_<index><ext>`.
    pub file_prefix: String,
    /// Extension used when the image URL path has none (with leading dot).
    pub default_extension: String,
    pub image_timeout_secs: u64,
    /// Network counts as idle after this long without a new request.
    pub idle_window_ms: u64,
    /// Upper bound on the network idle wait.
    pub idle_timeout_secs: u64,
    pub headless: bool,
    /// Proxy for both the browser and image downloads.
    pub proxy: Option<String>,
}

impl ScrapeConfig {
    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            page_url: "https://www.jagobd.com/category/bangla-channel".to_string(),
            output_dir: PathBuf::from("images"),
            file_prefix: "channel_image".to_string(),
            default_extension: ".jpg".to_string(),
            image_timeout_secs: 10,
            idle_window_ms: 500,
            idle_timeout_secs: 30,
            headless: true,
            proxy: None,
        }
    }
}

/// Settings for the `relay` pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub source_url: String,
    /// Guide URLs advertised in the rewritten header.
    pub epg_urls: Vec<String>,
    pub output_file: PathBuf,
    /// Group label forced onto every entry.
    pub group_title: String,
    /// Entries whose original group matches one of these are dropped.
    pub drop_groups: Vec<String>,
    pub tvg_shift: Option<i32>,
    pub timeout_secs: u64,
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            source_url: "https://cdn.djdoolky76.net/m9L6CtgDVC.m3u".to_string(),
            epg_urls: vec!["https://zipline.nocn.ddnsfree.com/u/merged2_epg.xml.gz".to_string()],
            output_file: PathBuf::from("UDPTV.m3u"),
            group_title: "UDPTV Live Streams".to_string(),
            drop_groups: Vec::new(),
            tvg_shift: None,
            timeout_secs: 15,
        }
    }
}

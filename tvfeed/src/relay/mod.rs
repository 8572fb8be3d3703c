use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::{NoExpand, Regex};

use crate::config::RelayConfig;
use crate::http::{build_download_client, fetch_text};

const RELAY_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static GROUP_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"group-title="([^"]*)""#).expect("valid group-title regex"));

/// Rewritten playlist body, without header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayOutput {
    pub lines: Vec<String>,
    /// `#EXTINF` entries kept.
    pub entries: usize,
    /// Entries kept together with a stream URL.
    pub streams: usize,
    /// Entries removed because of their original group.
    pub dropped: usize,
}

/**
    Download, rewrite and save the relayed playlist.

    The download is a single attempt; any failure is fatal for the run.
*/
pub async fn run_relay(config: &RelayConfig) -> Result<RelayOutput> {
    tracing::info!(url = %config.source_url, "Downloading playlist");

    let client = build_download_client(RELAY_USER_AGENT, config.timeout(), None)?;
    let source = fetch_text(&client, &config.source_url)
        .await
        .with_context(|| format!("Failed to download {}", config.source_url))?;

    let output = rewrite_playlist(&source, config);
    tracing::info!(
        entries = output.entries,
        streams = output.streams,
        dropped = output.dropped,
        "Rewrote playlist"
    );

    let rendered = render_relay(&output, config, Utc::now());
    std::fs::write(&config.output_file, rendered)
        .with_context(|| format!("Failed to write {}", config.output_file.display()))?;

    tracing::info!(path = %config.output_file.display(), "Playlist saved");
    Ok(output)
}

/**
    Rewrite playlist lines under the standard group label.

    Each `#EXTINF` line is kept with its group forced to the configured
    label, followed by its stream URL when the next line is not a comment.
    Header and other `#` lines, blank lines and "Last Updated" banners are
    dropped. Stray non-comment lines are kept as they are.
*/
pub fn rewrite_playlist(source: &str, config: &RelayConfig) -> RelayOutput {
    let group = config.group_title.replace('"', "'");
    let lines: Vec<&str> = source.lines().map(str::trim).collect();

    let mut output = RelayOutput::default();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if line.starts_with("#EXTINF") {
            let stream = lines
                .get(i)
                .copied()
                .filter(|next| !next.is_empty() && !next.starts_with('#'));
            if stream.is_some() {
                i += 1;
            }

            if original_group(line).is_some_and(|g| config.drop_groups.iter().any(|d| d == g)) {
                output.dropped += 1;
                continue;
            }

            output.lines.push(force_group(line, &group));
            output.entries += 1;

            if let Some(url) = stream {
                output.lines.push(url.to_string());
                output.streams += 1;
            }
        } else if line.is_empty() || line.starts_with('#') || line.starts_with("Last Updated") {
            continue;
        } else {
            output.lines.push(line.to_string());
        }
    }

    output
}

/// Header plus body, ready to write.
pub fn render_relay(output: &RelayOutput, config: &RelayConfig, now: DateTime<Utc>) -> String {
    let mut header = String::from("#EXTM3U");
    if !config.epg_urls.is_empty() {
        header.push_str(&format!(" url-tvg=\"{}\"", config.epg_urls.join(",")));
    }
    if let Some(shift) = config.tvg_shift {
        header.push_str(&format!(" tvg-shift={}", shift));
    }

    let mut rendered = format!(
        "{}\n# Last Updated: {}\n",
        header,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for line in &output.lines {
        rendered.push_str(line);
        rendered.push('\n');
    }
    rendered
}

/// The `group-title` value of a metadata line, if present.
pub fn original_group(line: &str) -> Option<&str> {
    GROUP_TITLE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Replace the `group-title` value, or insert the attribute before the title comma.
fn force_group(line: &str, group: &str) -> String {
    let attribute = format!("group-title=\"{}\"", group);

    if GROUP_TITLE.is_match(line) {
        return GROUP_TITLE
            .replace_all(line, NoExpand(&attribute))
            .into_owned();
    }

    match title_separator(line) {
        Some(pos) => format!("{} {}{}", &line[..pos], attribute, &line[pos..]),
        None => format!("{} {}", line, attribute),
    }
}

/// Byte offset of the comma that separates attributes from the title.
fn title_separator(line: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (pos, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(pos),
            _ => {}
        }
    }
    None
}

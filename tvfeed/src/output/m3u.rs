use std::path::Path;

use anyhow::{Context, Result};

use crate::lineup::Channel;

/// A rendered M3U playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub content: String,
    /// Number of `#EXTINF` entries written.
    pub entries: usize,
}

impl Playlist {
    /// Write the playlist, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, &self.content)
            .with_context(|| format!("failed to write playlist {}", path.display()))
    }
}

/**
    Generate an M3U playlist pointing at the companion guide file.

    Channels without a stream URL are skipped. A playlist with no entries is
    still a valid header-only document.
*/
pub fn generate_m3u(channels: &[Channel], epg_filename: &str) -> Playlist {
    let mut content = format!("#EXTM3U x-tvg-url=\"{}\"\n", attr_value(epg_filename));
    let mut entries = 0;

    for channel in channels {
        let Some(stream_url) = channel.stream_url.as_deref() else {
            tracing::warn!(id = %channel.id, name = %channel.name, "Skipping channel without stream URL");
            continue;
        };

        let logo_attr = channel
            .logo
            .as_ref()
            .map(|logo| format!(" tvg-logo=\"{}\"", attr_value(logo)))
            .unwrap_or_default();

        let group_attr = channel
            .group_title()
            .map(|group| format!(" group-title=\"{}\"", attr_value(&group)))
            .unwrap_or_default();

        content.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"{id}\" tvg-name=\"{name}\"{logo}{group},{title}\n{url}\n",
            id = attr_value(&channel.id),
            name = attr_value(&channel.name),
            logo = logo_attr,
            group = group_attr,
            title = single_line(&channel.name),
            url = single_line(stream_url),
        ));
        entries += 1;
    }

    if entries == 0 {
        tracing::error!("No channels with a stream URL, playlist has only a header");
    }

    Playlist { content, entries }
}

/// Keep a value inside its double-quoted attribute and on one line.
fn attr_value(value: &str) -> String {
    single_line(value).replace('"', "'")
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

/// A channel from the lineup catalog, after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub number: String,
    /// Absolute logo URL.
    pub logo: Option<String>,
    /// Absolute stream URL. Channels without one stay in the guide but are
    /// left out of the playlist.
    pub stream_url: Option<String>,
    pub description: String,
    pub categories: Vec<String>,
}

impl Channel {
    /// Comma-joined non-empty categories, if there are any.
    pub fn group_title(&self) -> Option<String> {
        let groups: Vec<&str> = self
            .categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();

        if groups.is_empty() {
            None
        } else {
            Some(groups.join(","))
        }
    }
}

/// A single guide entry for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programme {
    /// Upstream start timestamp, not yet reformatted.
    pub start: String,
    /// Upstream end timestamp, not yet reformatted.
    pub end: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    /// Image URL as delivered; may be relative.
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(categories: &[&str]) -> Channel {
        Channel {
            id: "1".into(),
            name: "One".into(),
            number: "1".into(),
            logo: None,
            stream_url: None,
            description: String::new(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_group_title_joins_non_empty() {
        assert_eq!(
            channel(&["News", "", "  ", "Sports"]).group_title().as_deref(),
            Some("News,Sports")
        );
    }

    #[test]
    fn test_group_title_absent() {
        assert_eq!(channel(&[]).group_title(), None);
        assert_eq!(channel(&["", " "]).group_title(), None);
    }
}

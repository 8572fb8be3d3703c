use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use url::Url;

use crate::config::GuideMeta;
use crate::lineup::{Channel, Programme};
use crate::util::time::format_xmltv_timestamp;
use crate::util::url::resolve_url;

// https://github.com/XMLTV/xmltv/blob/master/xmltv.dtd
pub const TAG_TV: &str = "tv";
pub const TAG_CHANNEL: &str = "channel";
pub const TAG_PROGRAMME: &str = "programme";
pub const TAG_DISPLAY_NAME: &str = "display-name";
pub const TAG_ICON: &str = "icon";
pub const TAG_TITLE: &str = "title";
pub const TAG_DESC: &str = "desc";
pub const TAG_CATEGORY: &str = "category";

const DOCTYPE: &str = r#"tv SYSTEM "xmltv.dtd""#;

/// An element in the guide tree. Attributes keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Add the attribute only when the value is non-empty.
    pub fn attr_if_present(self, key: &str, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.attr(key, value)
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    #[cfg(test)]
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), quick_xml::Error> {
        let mut elem = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            elem.push_attribute((k.as_str(), v.as_str()));
        }

        if self.text.is_none() && self.children.is_empty() {
            writer.write_event(Event::Empty(elem))?;
            return Ok(());
        }

        writer.write_event(Event::Start(elem))?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// The full XMLTV document: a `tv` root with channels, then programmes.
#[derive(Debug, Clone)]
pub struct GuideDocument {
    pub root: XmlNode,
}

impl GuideDocument {
    /// Empty guide; empty metadata values produce no attribute.
    pub fn new(meta: &GuideMeta) -> Self {
        let root = XmlNode::new(TAG_TV)
            .attr_if_present("generator-info-name", &meta.generator_name)
            .attr_if_present("generator-info-url", &meta.generator_url)
            .attr_if_present("source-info-name", &meta.source_name)
            .attr_if_present("source-info-url", &meta.source_url);
        Self { root }
    }

    pub fn push_channel(&mut self, channel: &Channel) {
        self.root.push(build_channel_node(channel));
    }

    /// Append a programme; returns `false` when it was dropped for bad timestamps.
    pub fn push_programme(&mut self, channel_id: &str, programme: &Programme, base_url: &Url) -> bool {
        match build_programme_node(channel_id, programme, base_url) {
            Some(node) => {
                self.root.push(node);
                true
            }
            None => false,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.count(TAG_CHANNEL)
    }

    pub fn programme_count(&self) -> usize {
        self.count(TAG_PROGRAMME)
    }

    fn count(&self, tag: &str) -> usize {
        self.root.children.iter().filter(|c| c.name == tag).count()
    }

    /// Serialize with XML declaration and XMLTV doctype.
    pub fn write_xml<W: Write>(&self, out: W) -> Result<W> {
        let mut writer = Writer::new(out);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .context("failed to write XML declaration")?;
        writer.get_mut().write_all(b"\n")?;

        // BytesText::new would escape the quotes around the DTD name
        writer
            .write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))
            .context("failed to write doctype")?;
        writer.get_mut().write_all(b"\n")?;

        self.root
            .write_to(&mut writer)
            .context("failed to write guide")?;

        Ok(writer.into_inner())
    }

    #[cfg(test)]
    pub fn to_xml_string(&self) -> Result<String> {
        let bytes = self.write_xml(Vec::new())?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Write the document gzip-compressed to `path`.
    pub fn write_gzipped(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("failed to create guide file {}", path.display()))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

        let encoder = self.write_xml(encoder)?;
        encoder
            .finish()
            .context("failed to finish gzip stream")?
            .flush()
            .context("failed to flush guide file")?;

        Ok(())
    }
}

/// `<channel id=…>` with display name, optional icon and description.
pub fn build_channel_node(channel: &Channel) -> XmlNode {
    let mut node = XmlNode::new(TAG_CHANNEL)
        .attr("id", &channel.id)
        .child(XmlNode::new(TAG_DISPLAY_NAME).text(&channel.name));

    if let Some(logo) = &channel.logo {
        node.push(XmlNode::new(TAG_ICON).attr("src", logo));
    }

    if !channel.description.is_empty() {
        node.push(XmlNode::new(TAG_DESC).text(&channel.description));
    }

    node
}

/**
    `<programme>` for one guide entry.

    Returns `None` when either timestamp fails to reformat; both are
    mandatory in XMLTV.
*/
pub fn build_programme_node(
    channel_id: &str,
    programme: &Programme,
    base_url: &Url,
) -> Option<XmlNode> {
    let start = format_xmltv_timestamp(&programme.start);
    let stop = format_xmltv_timestamp(&programme.end);
    if start.is_empty() || stop.is_empty() {
        return None;
    }

    let mut node = XmlNode::new(TAG_PROGRAMME)
        .attr("channel", channel_id)
        .attr("start", start)
        .attr("stop", stop);

    if let Some(title) = &programme.title {
        node.push(XmlNode::new(TAG_TITLE).text(title));
    }

    if let Some(desc) = &programme.description {
        node.push(XmlNode::new(TAG_DESC).text(desc));
    }

    for genre in &programme.genres {
        node.push(XmlNode::new(TAG_CATEGORY).text(genre));
    }

    if let Some(src) = programme
        .image
        .as_deref()
        .and_then(|image| resolve_url(base_url, image))
    {
        node.push(XmlNode::new(TAG_ICON).attr("src", src));
    }

    Some(node)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn base() -> Url {
        Url::parse("https://lineup.example.com").unwrap()
    }

    fn channel() -> Channel {
        Channel {
            id: "c1".into(),
            name: "News & Weather".into(),
            number: "1".into(),
            logo: Some("https://img.example.com/c1.png".into()),
            stream_url: Some("https://cdn.example.com/c1.m3u8".into()),
            description: String::new(),
            categories: Vec::new(),
        }
    }

    fn programme(start: &str, end: &str) -> Programme {
        Programme {
            start: start.into(),
            end: end.into(),
            title: Some("Evening \"Live\"".into()),
            description: Some("<b>Headlines</b>".into()),
            genres: vec!["News".into(), "Politics".into(), "Weather".into()],
            image: Some("/img/p.jpg".into()),
        }
    }

    #[test]
    fn test_empty_meta_attributes_are_omitted() {
        let doc = GuideDocument::new(&GuideMeta {
            generator_name: "tvfeed".into(),
            ..GuideMeta::default()
        });
        assert_eq!(
            doc.root.attributes,
            vec![("generator-info-name".to_string(), "tvfeed".to_string())]
        );
    }

    #[test]
    fn test_channel_node() {
        let node = build_channel_node(&channel());
        assert_eq!(node.get_attribute("id"), Some("c1"));
        let names: Vec<&str> = node.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![TAG_DISPLAY_NAME, TAG_ICON]);
    }

    #[test]
    fn test_programme_node() {
        let node =
            build_programme_node("c1", &programme("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z"), &base())
                .unwrap();

        assert_eq!(node.get_attribute("channel"), Some("c1"));
        assert_eq!(node.get_attribute("start"), Some("20240101000000 +0000"));
        assert_eq!(node.get_attribute("stop"), Some("20240101010000 +0000"));

        let categories: Vec<&str> = node
            .children
            .iter()
            .filter(|c| c.name == TAG_CATEGORY)
            .filter_map(|c| c.text.as_deref())
            .collect();
        assert_eq!(categories, vec!["News", "Politics", "Weather"]);

        let icon = node.children.iter().find(|c| c.name == TAG_ICON).unwrap();
        assert_eq!(icon.get_attribute("src"), Some("https://lineup.example.com/img/p.jpg"));
    }

    #[test]
    fn test_programme_with_bad_timestamp_is_dropped() {
        assert!(
            build_programme_node("c1", &programme("not-a-date", "2024-01-01T01:00:00Z"), &base())
                .is_none()
        );
        assert!(
            build_programme_node("c1", &programme("2024-01-01T01:00:00Z", ""), &base()).is_none()
        );
    }

    #[test]
    fn test_serialized_document() {
        let mut doc = GuideDocument::new(&GuideMeta {
            generator_name: "tvfeed".into(),
            ..GuideMeta::default()
        });
        doc.push_channel(&channel());
        assert!(doc.push_programme(
            "c1",
            &programme("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z"),
            &base()
        ));
        assert!(!doc.push_programme("c1", &programme("bad", "worse"), &base()));

        assert_eq!(doc.channel_count(), 1);
        assert_eq!(doc.programme_count(), 1);

        let xml = doc.to_xml_string().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n<tv generator-info-name=\"tvfeed\">"));
        assert!(xml.contains("<display-name>News &amp; Weather</display-name>"));
        assert!(xml.contains("<icon src=\"https://img.example.com/c1.png\"/>"));
        assert!(xml.contains("<title>Evening "));
        assert!(xml.contains("<desc>&lt;b&gt;Headlines&lt;/b&gt;</desc>"));
        assert_eq!(xml.matches("<category>").count(), 3);
        assert!(xml.ends_with("</tv>"));

        let channel_pos = xml.find("<channel ").unwrap();
        let programme_pos = xml.find("<programme ").unwrap();
        assert!(channel_pos < programme_pos);
    }

    #[test]
    fn test_write_gzipped_round_trip() {
        let mut doc = GuideDocument::new(&GuideMeta::default());
        doc.push_channel(&channel());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("guide.xml.gz");
        doc.write_gzipped(&path).unwrap();

        let mut xml = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut xml)
            .unwrap();

        assert_eq!(xml, doc.to_xml_string().unwrap());
        assert!(xml.contains("<tv><channel id=\"c1\">"));
    }
}

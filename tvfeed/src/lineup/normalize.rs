use serde_json::{Map, Value};
use url::Url;

use crate::util::url::resolve_url;

use super::types::Channel;

/// Why a raw catalog record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    NotAnObject,
    MissingId,
}

/**
    Normalize raw catalog records into channels.

    Order is preserved. Records that are not objects or carry no usable `id`
    are dropped with a warning, so every returned channel has a non-empty id.
*/
pub fn normalize_channels(records: &[Value], base_url: &Url) -> Vec<Channel> {
    let channels: Vec<Channel> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match normalize_channel(record, base_url) {
            Ok(channel) => {
                tracing::debug!(id = %channel.id, name = %channel.name, "Added channel");
                Some(channel)
            }
            Err(Rejected::NotAnObject) => {
                tracing::warn!(index, record = %record, "Skipping invalid channel record");
                None
            }
            Err(Rejected::MissingId) => {
                tracing::warn!(index, "Skipping channel with missing ID");
                None
            }
        })
        .collect();

    tracing::info!(
        kept = channels.len(),
        total = records.len(),
        "Processed channel records"
    );

    channels
}

/// Normalize a single catalog record.
pub fn normalize_channel(record: &Value, base_url: &Url) -> Result<Channel, Rejected> {
    let object = record.as_object().ok_or(Rejected::NotAnObject)?;

    let id = scalar(object, "id")
        .filter(|id| !id.is_empty())
        .ok_or(Rejected::MissingId)?;

    let name = scalar(object, "name")
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("Channel {}", id));

    let number = scalar(object, "channelNumber").unwrap_or_else(|| "0".to_string());

    let logo = scalar(object, "logoUrl").and_then(|logo| resolve_url(base_url, &logo));
    let stream_url = scalar(object, "streamUrl").and_then(|url| resolve_url(base_url, &url));

    let description = scalar(object, "description").unwrap_or_default();

    let categories = match object.get("categories") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_value).collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    };

    Ok(Channel {
        id,
        name,
        number,
        logo,
        stream_url,
        description,
        categories,
    })
}

/// Read a string or number field as a string. Null and other types are absent.
fn scalar(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(scalar_value)
}

fn scalar_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

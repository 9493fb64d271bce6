//! Lenient deserializers for columns the hosted API returns loosely typed.

use serde::Deserialize;
use serde::de::{self, Deserializer};

use super::{MAX_LINKS_PER_ITEM, WorkItem};

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

/// Accept `42` or `"42"`
pub fn int_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => Ok(value),
        IntOrString::Str(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

/// Accept `null`, `""`, `42` or `"42"`
pub fn opt_int_or_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Option::<IntOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntOrString::Int(value)) => Ok(Some(value)),
        Some(IntOrString::Str(text)) if text.trim().is_empty() => Ok(None),
        Some(IntOrString::Str(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
    }
}

/// The items column is JSON; anything but an array reads as no items,
/// elements that are not work items are skipped, and links beyond
/// `MAX_LINKS_PER_ITEM` are dropped.
pub fn work_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<WorkItem>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Array(elements)) = value else {
        return Ok(Vec::new());
    };
    Ok(elements
        .into_iter()
        .filter_map(|element| serde_json::from_value::<WorkItem>(element).ok())
        .map(|mut item| {
            item.links.truncate(MAX_LINKS_PER_ITEM);
            item
        })
        .collect())
}

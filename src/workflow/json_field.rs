//! Decoding of JSON-encoded multipart fields.
//!
//! Clients send `meta`, `sections` and `tags` either as the JSON text of the
//! value or as a JSON string that itself contains that text. [`FlexibleJson`]
//! accepts both and every decode failure becomes
//! [`ApiError::MalformedField`].

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use crate::db::models::BlogMeta;
use crate::error::ApiError;

pub const INVALID_META: &str = "Invalid meta format";
pub const META_NOT_OBJECT: &str = "Meta must be a valid JSON object";
pub const META_KEYS_MISSING: &str = "Meta must include meta_title and meta_description";
pub const INVALID_SECTIONS: &str = "Invalid sections format";
pub const SECTIONS_NOT_ARRAY: &str = "Sections must be a valid JSON array";
pub const INVALID_TAGS: &str = "Invalid tags format";
pub const TAGS_NOT_ARRAY: &str = "Tags must be a valid JSON array";

#[derive(Debug, Clone, PartialEq)]
pub struct FlexibleJson(pub Value);

impl FlexibleJson {
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw).ok()? {
            Value::String(inner) => serde_json::from_str(&inner).ok().map(FlexibleJson),
            value => Some(FlexibleJson(value)),
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> Option<T> {
        serde_json::from_value(self.0).ok()
    }
}

/// One entry of the `sections` field before positions and uploads are applied
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionInput {
    #[serde(default)]
    pub section_img: Option<String>,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub section_description: Option<String>,
    #[serde(default)]
    pub section_list: Option<Vec<String>>,
}

fn meta_object(raw: &str) -> Result<Map<String, Value>, ApiError> {
    match FlexibleJson::parse(raw) {
        Some(FlexibleJson(Value::Object(map))) => Ok(map),
        _ => Err(ApiError::malformed(INVALID_META, META_NOT_OBJECT)),
    }
}

fn non_empty_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Keywords arrive either as an array of strings or as one comma list.
fn keywords(map: &Map<String, Value>) -> Option<Vec<String>> {
    match map.get("meta_keywords")? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Value::String(list) => Some(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

pub fn decode_meta(raw: &str) -> Result<BlogMeta, ApiError> {
    let map = meta_object(raw)?;
    match (
        non_empty_str(&map, "meta_title"),
        non_empty_str(&map, "meta_description"),
    ) {
        (Some(meta_title), Some(meta_description)) => Ok(BlogMeta {
            meta_title,
            meta_description,
            meta_keywords: keywords(&map).unwrap_or_default(),
        }),
        _ => Err(ApiError::malformed(INVALID_META, META_KEYS_MISSING)),
    }
}

/// Key-wise merge onto the stored meta; absent or empty keys keep their value.
pub fn merge_meta(raw: &str, current: &BlogMeta) -> Result<BlogMeta, ApiError> {
    let map = meta_object(raw)?;
    Ok(BlogMeta {
        meta_title: non_empty_str(&map, "meta_title").unwrap_or_else(|| current.meta_title.clone()),
        meta_description: non_empty_str(&map, "meta_description")
            .unwrap_or_else(|| current.meta_description.clone()),
        meta_keywords: keywords(&map).unwrap_or_else(|| current.meta_keywords.clone()),
    })
}

pub fn decode_sections(raw: &str) -> Result<Vec<SectionInput>, ApiError> {
    FlexibleJson::parse(raw)
        .filter(|json| json.0.is_array())
        .and_then(FlexibleJson::decode)
        .ok_or_else(|| ApiError::malformed(INVALID_SECTIONS, SECTIONS_NOT_ARRAY))
}

pub fn decode_tags(raw: &str) -> Result<Vec<String>, ApiError> {
    let tags: Vec<String> = FlexibleJson::parse(raw)
        .filter(|json| json.0.is_array())
        .and_then(FlexibleJson::decode)
        .ok_or_else(|| ApiError::malformed(INVALID_TAGS, TAGS_NOT_ARRAY))?;
    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

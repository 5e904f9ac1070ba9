//! Search API response types
//!
//! Wire structures for `GET /search/songs`. The API is loose about types:
//! `downloadUrl` is `false` for tracks without streams, `duration` arrives as
//! either a string or a number, and `image` is sometimes a bare URL. The
//! deserializers here accept all of those shapes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top-level response envelope.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub data: SearchData,
}

#[derive(Debug, Deserialize)]
pub struct SearchData {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
    /// Raw result entries, converted one by one so a single malformed entry
    /// does not fail the whole page.
    pub results: Vec<Value>,
}

/// One song entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSong {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub primary_artists: String,

    #[serde(default)]
    pub album: Option<ApiAlbum>,

    /// Artwork in ascending size order.
    #[serde(default, deserialize_with = "lenient_links")]
    pub image: Vec<ApiLink>,

    /// Streams in ascending bitrate order.
    #[serde(default, deserialize_with = "lenient_links")]
    pub download_url: Vec<ApiLink>,

    /// Seconds.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAlbum {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A quality-tagged URL (`{"quality": "320kbps", "link": "https://..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLink {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(alias = "url")]
    pub link: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_links<'de, D>(deserializer: D) -> Result<Vec<ApiLink>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(link) => Some(ApiLink {
                    quality: None,
                    link,
                }),
                other => serde_json::from_value::<ApiLink>(other).ok(),
            })
            .filter(|link| !link.link.trim().is_empty())
            .collect(),
        Value::String(link) if !link.trim().is_empty() => vec![ApiLink {
            quality: None,
            link,
        }],
        _ => Vec::new(),
    })
}

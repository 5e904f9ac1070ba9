//! Catalog domain models

use core_runtime::config::StreamQuality;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CatalogError, Result};
use crate::types::ApiSong;

/// One playable stream of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUrl {
    /// Bitrate label as reported by the API (`"320kbps"`), if any.
    pub quality: Option<String>,
    pub url: String,
}

/// A playable song from the search catalog.
///
/// Display strings are already entity-decoded. `streams` is never empty and is
/// ordered lowest to highest quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub primary_artists: String,
    pub album: Option<String>,
    /// Largest artwork variant.
    pub artwork_url: Option<String>,
    pub streams: Vec<StreamUrl>,
    pub duration_secs: Option<u32>,
}

impl Track {
    /// Convert an API entry, rejecting entries that cannot be played.
    pub fn from_api(song: ApiSong) -> Result<Self> {
        let id = song.id.trim().to_string();
        if id.is_empty() {
            return Err(CatalogError::InvalidTrack {
                id: song.name,
                reason: "missing id".to_string(),
            });
        }

        if song.download_url.is_empty() {
            return Err(CatalogError::InvalidTrack {
                id,
                reason: "no stream URL".to_string(),
            });
        }

        let streams = song
            .download_url
            .into_iter()
            .map(|link| StreamUrl {
                quality: link.quality,
                url: link.link,
            })
            .collect();

        Ok(Self {
            id,
            name: decode_entities(&song.name),
            primary_artists: decode_entities(&song.primary_artists),
            album: song
                .album
                .and_then(|album| album.name)
                .map(|name| decode_entities(&name))
                .filter(|name| !name.is_empty()),
            artwork_url: song.image.into_iter().last().map(|image| image.link),
            streams,
            duration_secs: song.duration.and_then(|d| u32::try_from(d).ok()),
        })
    }

    /// The stream to hand the audio element for the requested quality.
    ///
    /// `Kbps(n)` picks the stream labelled `"{n}kbps"` and falls back to the
    /// highest quality when no label matches.
    pub fn stream_url(&self, quality: StreamQuality) -> Option<&str> {
        let wanted = match quality {
            StreamQuality::Highest => None,
            StreamQuality::Kbps(kbps) => Some(format!("{}kbps", kbps)),
        };

        wanted
            .and_then(|label| {
                self.streams
                    .iter()
                    .find(|s| s.quality.as_deref() == Some(label.as_str()))
            })
            .or_else(|| self.streams.last())
            .map(|s| s.url.as_str())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(|secs| Duration::from_secs(secs as u64))
    }

    /// `"<name> - <artists>.mp3"` with path separators and other characters
    /// that are illegal in file names removed.
    pub fn download_file_name(&self) -> String {
        let raw = if self.primary_artists.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.name, self.primary_artists)
        };
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
            .filter(|c| !c.is_control())
            .collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            format!("{}.mp3", self.id)
        } else {
            format!("{}.mp3", cleaned)
        }
    }
}

/// Decode the HTML entities the search API leaves in display strings.
///
/// Unknown entities are kept verbatim.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let numeric = name.strip_prefix('#')?;
            let code = match numeric
                .strip_prefix('x')
                .or_else(|| numeric.strip_prefix('X'))
            {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;

use crate::error::ChapterSourceError;

/// A chapter as described by the remote document, times in whole seconds
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChapter {
    pub start_time: i32,
    pub end_time: Option<i32>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
}

/// A chapter entry that could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidChapter {
    /// Position in the document's `chapters` array
    pub index: usize,
    /// Start time of the entry when that field alone was readable
    pub start_time: Option<i32>,
    pub reason: String,
}

/// A parsed chapters document; entries are decoded one by one
#[derive(Debug, Clone, PartialEq)]
pub struct ChaptersDocument {
    pub chapters: Vec<Result<RemoteChapter, InvalidChapter>>,
}

#[derive(Deserialize)]
struct RawDocument {
    chapters: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChapter {
    start_time: f64,
    end_time: Option<f64>,
    title: Option<String>,
    img: Option<String>,
    url: Option<String>,
}

fn to_seconds(value: f64) -> Option<i32> {
    if !value.is_finite() || value < 0.0 || value > f64::from(i32::MAX) {
        return None;
    }
    Some(value.round() as i32)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_chapter(index: usize, value: serde_json::Value) -> Result<RemoteChapter, InvalidChapter> {
    let readable_start = value
        .get("startTime")
        .and_then(serde_json::Value::as_f64)
        .and_then(to_seconds);
    let invalid = |reason: String| InvalidChapter {
        index,
        start_time: readable_start,
        reason,
    };

    let raw: RawChapter = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;

    let start_time = to_seconds(raw.start_time)
        .ok_or_else(|| invalid(format!("invalid startTime {}", raw.start_time)))?;
    let end_time = match raw.end_time {
        Some(end) => {
            Some(to_seconds(end).ok_or_else(|| invalid(format!("invalid endTime {end}")))?)
        }
        None => None,
    };

    Ok(RemoteChapter {
        start_time,
        end_time,
        title: non_empty(raw.title),
        image_url: non_empty(raw.img),
        link_url: non_empty(raw.url),
    })
}

/// Parse chapters JSON bytes (`{"chapters": [...]}`)
pub fn parse_chapters_document(json_bytes: &[u8]) -> Result<ChaptersDocument, ChapterSourceError> {
    let raw: RawDocument = serde_json::from_slice(json_bytes)?;

    let chapters = raw
        .chapters
        .into_iter()
        .enumerate()
        .map(|(index, value)| parse_chapter(index, value))
        .collect();

    Ok(ChaptersDocument { chapters })
}

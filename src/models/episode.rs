// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PodcastSummary;

/// An episode row as returned by listings and lookups
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub podcast_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    pub is_public: bool,
    pub image_url: Option<String>,
    pub media_url: String,
    pub media_type: Option<String>,
    pub media_filesize: i64,
    pub duration: i32,
    pub past_hour_total_unique_pageviews: i32,
    pub past_day_total_unique_pageviews: i32,
    pub past_week_total_unique_pageviews: i32,
    pub past_month_total_unique_pageviews: i32,
    pub past_year_total_unique_pageviews: i32,
    pub past_all_time_total_unique_pageviews: i32,
    pub chapters_url: Option<String>,
    pub chapters_url_last_parsed: Option<DateTime<Utc>>,
    /// Present only when the listing asked for the owning podcast
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podcast: Option<PodcastSummary>,
}

impl Episode {
    /// Create a public episode with empty counters and media metadata
    pub fn new(id: impl Into<String>, podcast_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            podcast_id: podcast_id.into(),
            title: None,
            description: None,
            pub_date: None,
            is_public: true,
            image_url: None,
            media_url: String::new(),
            media_type: None,
            media_filesize: 0,
            duration: 0,
            past_hour_total_unique_pageviews: 0,
            past_day_total_unique_pageviews: 0,
            past_week_total_unique_pageviews: 0,
            past_month_total_unique_pageviews: 0,
            past_year_total_unique_pageviews: 0,
            past_all_time_total_unique_pageviews: 0,
            chapters_url: None,
            chapters_url_last_parsed: None,
            podcast: None,
        }
    }

    /// Cut the description down to at most `limit` characters
    pub fn truncate_description(&mut self, limit: usize) {
        if let Some(description) = self.description.as_mut()
            && let Some((byte_index, _)) = description.char_indices().nth(limit)
        {
            description.truncate(byte_index);
        }
    }

    /// The episode's remote chapters location, if one is set and non-blank
    pub fn chapters_url(&self) -> Option<&str> {
        self.chapters_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

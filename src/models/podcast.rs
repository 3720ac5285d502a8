// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A podcast together with the categories it is filed under
#[derive(Debug, Clone, PartialEq)]
pub struct Podcast {
    pub id: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub category_ids: Vec<String>,
}

impl Podcast {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            image_url: None,
            is_public: true,
            category_ids: Vec::new(),
        }
    }

    pub fn summary(&self) -> PodcastSummary {
        PodcastSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// The podcast columns selected alongside an episode listing
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PodcastSummary {
    pub id: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
}

/// A row of a recency projection, keyed by category or podcast id
#[derive(Debug, Clone, PartialEq)]
pub struct RecencyEntry {
    pub episode_id: String,
    pub group_id: String,
    pub pub_date: DateTime<Utc>,
}

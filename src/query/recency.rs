// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Grouping key of a recency projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecencyDimension {
    Category,
    Podcast,
}

impl RecencyDimension {
    pub fn table_name(self) -> &'static str {
        match self {
            RecencyDimension::Category => "recent_episodes_by_category",
            RecencyDimension::Podcast => "recent_episodes_by_podcast",
        }
    }

    pub fn key_column(self) -> &'static str {
        match self {
            RecencyDimension::Category => "category_id",
            RecencyDimension::Podcast => "podcast_id",
        }
    }
}

/// A page of a recency projection, newest publication first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyQuery {
    pub dimension: RecencyDimension,
    pub group_ids: Vec<String>,
    pub skip: u64,
    pub take: u64,
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Serialize;

/// A clip or chapter attached to an episode
///
/// Official chapters come from the episode's remote chapters document and are
/// owned by the configured super user; everything else is a user clip.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub id: String,
    pub episode_id: String,
    pub owner_id: String,
    pub title: Option<String>,
    pub start_time: i32,
    pub end_time: Option<i32>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub is_official_chapter: bool,
    pub is_public: bool,
}

impl MediaReference {
    /// Create a public user clip starting at `start_time`
    pub fn clip(
        id: impl Into<String>,
        episode_id: impl Into<String>,
        owner_id: impl Into<String>,
        start_time: i32,
    ) -> Self {
        Self {
            id: id.into(),
            episode_id: episode_id.into(),
            owner_id: owner_id.into(),
            title: None,
            start_time,
            end_time: None,
            image_url: None,
            link_url: None,
            is_official_chapter: false,
            is_public: true,
        }
    }
}

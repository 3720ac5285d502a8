// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

/// Options for the episode listing entry points
#[derive(Debug, Clone)]
pub struct ListingConfig {
    /// Descriptions in list views are cut to this many characters
    pub description_limit: usize,
    /// Multi-podcast queries only apply popularity limiting above this many ids
    pub podcast_limit_threshold: usize,
    /// `most-recent` limiting keeps episodes published within this window
    pub recent_window: chrono::Duration,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            description_limit: 2500,
            podcast_limit_threshold: 10,
            recent_window: chrono::Duration::hours(24),
        }
    }
}

/// Options for the chapter synchronizer
#[derive(Debug, Clone)]
pub struct ChapterSyncConfig {
    /// User that owns chapters created from remote documents
    pub super_user_id: String,
    /// Minimum interval between two remote fetches for the same episode
    pub freshness_window: chrono::Duration,
}

impl ChapterSyncConfig {
    /// Create a config owned by `super_user_id` with the default 12 hour window
    pub fn new(super_user_id: impl Into<String>) -> Self {
        Self {
            super_user_id: super_user_id.into(),
            freshness_window: chrono::Duration::hours(12),
        }
    }
}

/// Options for the dead-episode reaper
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Maximum number of episodes removed per pass
    pub batch_size: usize,
    /// Pause after every pass
    pub throttle: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            throttle: Duration::from_secs(1),
        }
    }
}

/// Everything a running service needs, assembled by the binary
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub fetch_timeout: Duration,
    pub listing: ListingConfig,
    pub chapters: ChapterSyncConfig,
    pub reaper: ReaperConfig,
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Episode, MediaReference, Page};
use crate::query::{QueryPlan, RecencyQuery};

/// Storage abstraction used by the listing, chapter and reaper services
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Execute an episode plan, returning the requested page and the total match count
    async fn query_episodes(&self, plan: &QueryPlan) -> Result<Page<Episode>, StoreError>;

    /// Read a page of episode ids from a recency projection
    async fn query_recency(&self, query: &RecencyQuery) -> Result<Page<String>, StoreError>;

    async fn find_episode(&self, episode_id: &str) -> Result<Option<Episode>, StoreError>;

    /// Record when the episode's chapters document was last fetched
    async fn mark_chapters_parsed(
        &self,
        episode_id: &str,
        parsed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Official chapters of an episode ordered by start time
    async fn find_official_chapters(
        &self,
        episode_id: &str,
        public_only: bool,
    ) -> Result<Vec<MediaReference>, StoreError>;

    /// Insert the media reference, or overwrite the stored one with the same id
    async fn save_media_reference(
        &self,
        media_ref: &MediaReference,
    ) -> Result<MediaReference, StoreError>;

    /// Non-public episodes without any media reference
    async fn find_dead_episodes(&self, limit: usize) -> Result<Vec<Episode>, StoreError>;

    /// Delete an episode. Returns `false` when it was already gone.
    async fn remove_episode(&self, episode_id: &str) -> Result<bool, StoreError>;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Episode, MediaReference, Page};
use crate::query::{QueryPlan, RecencyQuery};

use super::{EpisodeStore, InMemoryStore};

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection reset".to_string())
}

/// An in-memory store with injectable failures
#[derive(Default)]
pub(crate) struct FaultyStore {
    pub inner: InMemoryStore,
    /// Removals succeed this many times, then fail
    pub removals_allowed: Option<AtomicUsize>,
    /// Saving a media reference starting here fails
    pub failing_save_start: Option<i32>,
    pub fail_mark_parsed: bool,
}

#[async_trait]
impl EpisodeStore for FaultyStore {
    async fn query_episodes(&self, plan: &QueryPlan) -> Result<Page<Episode>, StoreError> {
        self.inner.query_episodes(plan).await
    }

    async fn query_recency(&self, query: &RecencyQuery) -> Result<Page<String>, StoreError> {
        self.inner.query_recency(query).await
    }

    async fn find_episode(&self, episode_id: &str) -> Result<Option<Episode>, StoreError> {
        self.inner.find_episode(episode_id).await
    }

    async fn mark_chapters_parsed(
        &self,
        episode_id: &str,
        parsed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_mark_parsed {
            return Err(unavailable());
        }
        self.inner.mark_chapters_parsed(episode_id, parsed_at).await
    }

    async fn find_official_chapters(
        &self,
        episode_id: &str,
        public_only: bool,
    ) -> Result<Vec<MediaReference>, StoreError> {
        self.inner
            .find_official_chapters(episode_id, public_only)
            .await
    }

    async fn save_media_reference(
        &self,
        media_ref: &MediaReference,
    ) -> Result<MediaReference, StoreError> {
        if self.failing_save_start == Some(media_ref.start_time) {
            return Err(unavailable());
        }
        self.inner.save_media_reference(media_ref).await
    }

    async fn find_dead_episodes(&self, limit: usize) -> Result<Vec<Episode>, StoreError> {
        self.inner.find_dead_episodes(limit).await
    }

    async fn remove_episode(&self, episode_id: &str) -> Result<bool, StoreError> {
        if let Some(allowed) = &self.removals_allowed {
            if allowed.load(Ordering::SeqCst) == 0 {
                return Err(unavailable());
            }
            allowed.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.remove_episode(episode_id).await
    }
}

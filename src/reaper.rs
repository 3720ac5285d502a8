// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ReaperConfig;
use crate::error::StoreError;
use crate::store::EpisodeStore;

/// Result of a single reaper pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapPass {
    /// Dead episodes selected for removal
    pub selected: usize,
    /// Episodes actually deleted; lower than `selected` when another pass got there first
    pub removed: usize,
    /// The batch was full, so more dead episodes may remain
    pub more_remaining: bool,
}

/// Totals over a sequence of passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapSummary {
    pub passes: usize,
    pub removed: usize,
}

/// Removes non-public episodes that have no media references
pub struct Reaper<S: EpisodeStore + ?Sized> {
    store: Arc<S>,
    config: ReaperConfig,
}

impl<S: EpisodeStore + ?Sized> Reaper<S> {
    pub fn new(store: Arc<S>, config: ReaperConfig) -> Self {
        Self { store, config }
    }

    /// Remove up to one batch of dead episodes, then pause for the throttle interval.
    ///
    /// A storage error aborts the pass; rows deleted before it stay deleted.
    #[tracing::instrument(skip(self), fields(batch_size = self.config.batch_size))]
    pub async fn run_pass(&self) -> Result<ReapPass, StoreError> {
        let dead = self
            .store
            .find_dead_episodes(self.config.batch_size)
            .await?;
        let selected = dead.len();

        let mut removed = 0;
        for episode in &dead {
            if self.store.remove_episode(&episode.id).await? {
                removed += 1;
            } else {
                debug!(episode = %episode.id, "dead episode already removed");
            }
        }

        info!(selected, removed, "reaper pass finished");

        if !self.config.throttle.is_zero() {
            tokio::time::sleep(self.config.throttle).await;
        }

        Ok(ReapPass {
            selected,
            removed,
            more_remaining: selected > 0 && selected == self.config.batch_size,
        })
    }

    /// Keep running passes until one comes back partial or empty
    pub async fn run_until_exhausted(&self) -> Result<ReapSummary, StoreError> {
        self.run_until_exhausted_with(|_| {}).await
    }

    /// Like [`Reaper::run_until_exhausted`], reporting the running totals after every pass
    pub async fn run_until_exhausted_with(
        &self,
        mut on_pass: impl FnMut(&ReapSummary),
    ) -> Result<ReapSummary, StoreError> {
        let mut summary = ReapSummary::default();
        loop {
            let pass = self.run_pass().await?;
            summary.passes += 1;
            summary.removed += pass.removed;
            on_pass(&summary);
            if !pass.more_remaining {
                return Ok(summary);
            }
        }
    }
}

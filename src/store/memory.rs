// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::{Episode, MediaReference, Page, Podcast, RecencyEntry};
use crate::query::{Direction, QueryPlan, RecencyDimension, RecencyQuery, SortOrder};

use super::EpisodeStore;

#[derive(Debug, Default)]
struct MemoryState {
    podcasts: HashMap<String, Podcast>,
    episodes: BTreeMap<String, Episode>,
    media_refs: BTreeMap<String, MediaReference>,
    recency: HashMap<RecencyDimension, Vec<RecencyEntry>>,
}

/// A process-local store that evaluates query plans directly.
///
/// Useful for tests and for running the services without a database.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    episode_queries: AtomicUsize,
}

fn paginate<T>(items: Vec<T>, skip: u64, take: u64) -> Vec<T> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let take = usize::try_from(take).unwrap_or(usize::MAX);
    items.into_iter().skip(skip).take(take).collect()
}

fn sort_episodes(episodes: &mut [Episode], order: SortOrder) {
    match order {
        SortOrder::Random => fastrand::shuffle(episodes),
        SortOrder::Column { column, direction } => episodes.sort_by(|a, b| {
            let nulls = column.is_null(a).cmp(&column.is_null(b));
            let values = match direction {
                Direction::Asc => column.compare(a, b),
                Direction::Desc => column.compare(b, a),
            };
            nulls.then(values).then_with(|| a.id.cmp(&b.id))
        }),
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_podcast(&self, podcast: Podcast) {
        let mut state = self.state.write().await;
        state.podcasts.insert(podcast.id.clone(), podcast);
    }

    pub async fn insert_episode(&self, episode: Episode) {
        let mut state = self.state.write().await;
        state.episodes.insert(episode.id.clone(), episode);
    }

    pub async fn insert_media_reference(&self, media_ref: MediaReference) {
        let mut state = self.state.write().await;
        state.media_refs.insert(media_ref.id.clone(), media_ref);
    }

    pub async fn insert_recency(&self, dimension: RecencyDimension, entry: RecencyEntry) {
        let mut state = self.state.write().await;
        state.recency.entry(dimension).or_default().push(entry);
    }

    pub async fn episode(&self, episode_id: &str) -> Option<Episode> {
        self.state.read().await.episodes.get(episode_id).cloned()
    }

    pub async fn episode_count(&self) -> usize {
        self.state.read().await.episodes.len()
    }

    /// Every media reference of an episode, official or not, ordered by start time
    pub async fn media_references(&self, episode_id: &str) -> Vec<MediaReference> {
        let state = self.state.read().await;
        let mut refs: Vec<_> = state
            .media_refs
            .values()
            .filter(|media_ref| media_ref.episode_id == episode_id)
            .cloned()
            .collect();
        refs.sort_by_key(|media_ref| media_ref.start_time);
        refs
    }

    /// Number of plans executed against the episode table so far
    pub fn episode_query_count(&self) -> usize {
        self.episode_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EpisodeStore for InMemoryStore {
    async fn query_episodes(&self, plan: &QueryPlan) -> Result<Page<Episode>, StoreError> {
        self.episode_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;

        let mut matches: Vec<Episode> = state
            .episodes
            .values()
            .filter(|episode| {
                state
                    .podcasts
                    .get(&episode.podcast_id)
                    .is_some_and(|podcast| plan.admits(episode, podcast))
            })
            .cloned()
            .collect();

        sort_episodes(&mut matches, plan.order);

        let total = matches.len() as u64;
        let mut items = match plan.page {
            Some(page) => paginate(matches, page.skip, page.take),
            None => matches,
        };

        if plan.include_podcast {
            for episode in &mut items {
                episode.podcast = state.podcasts.get(&episode.podcast_id).map(Podcast::summary);
            }
        }

        Ok(Page::new(items, total))
    }

    async fn query_recency(&self, query: &RecencyQuery) -> Result<Page<String>, StoreError> {
        let state = self.state.read().await;

        let mut entries: Vec<&RecencyEntry> = state
            .recency
            .get(&query.dimension)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| query.group_ids.contains(&entry.group_id))
                    .collect()
            })
            .unwrap_or_default();

        entries.sort_by(|a, b| {
            b.pub_date
                .cmp(&a.pub_date)
                .then_with(|| a.episode_id.cmp(&b.episode_id))
        });

        let total = entries.len() as u64;
        let ids = entries
            .into_iter()
            .map(|entry| entry.episode_id.clone())
            .collect();

        Ok(Page::new(paginate(ids, query.skip, query.take), total))
    }

    async fn find_episode(&self, episode_id: &str) -> Result<Option<Episode>, StoreError> {
        Ok(self.episode(episode_id).await)
    }

    async fn mark_chapters_parsed(
        &self,
        episode_id: &str,
        parsed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(episode) = state.episodes.get_mut(episode_id) {
            episode.chapters_url_last_parsed = Some(parsed_at);
        }
        Ok(())
    }

    async fn find_official_chapters(
        &self,
        episode_id: &str,
        public_only: bool,
    ) -> Result<Vec<MediaReference>, StoreError> {
        let state = self.state.read().await;
        let mut chapters: Vec<MediaReference> = state
            .media_refs
            .values()
            .filter(|media_ref| {
                media_ref.episode_id == episode_id
                    && media_ref.is_official_chapter
                    && (media_ref.is_public || !public_only)
            })
            .cloned()
            .collect();
        chapters.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Ok(chapters)
    }

    async fn save_media_reference(
        &self,
        media_ref: &MediaReference,
    ) -> Result<MediaReference, StoreError> {
        let mut state = self.state.write().await;
        state
            .media_refs
            .insert(media_ref.id.clone(), media_ref.clone());
        Ok(media_ref.clone())
    }

    async fn find_dead_episodes(&self, limit: usize) -> Result<Vec<Episode>, StoreError> {
        let state = self.state.read().await;
        let dead = state
            .episodes
            .values()
            .filter(|episode| {
                !episode.is_public
                    && !state
                        .media_refs
                        .values()
                        .any(|media_ref| media_ref.episode_id == episode.id)
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(dead)
    }

    async fn remove_episode(&self, episode_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.episodes.remove(episode_id).is_some())
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ListingConfig;
use crate::error::ListingError;
use crate::models::{Episode, Page};
use crate::query::{
    EpisodeQueryOptions, QueryPlan, RecencyDimension, RecencyQuery, SortKey, build_episode_query,
};
use crate::store::EpisodeStore;

/// Caller-facing inputs shared by every listing entry point
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub include_podcast: bool,
    pub search_text: Option<String>,
    pub sort: Option<SortKey>,
    pub skip: u64,
    pub take: u64,
}

impl Default for ListingRequest {
    fn default() -> Self {
        Self {
            include_podcast: false,
            search_text: None,
            sort: None,
            skip: 0,
            take: 20,
        }
    }
}

impl ListingRequest {
    fn query_options(&self, limit: bool) -> EpisodeQueryOptions {
        EpisodeQueryOptions {
            include_podcast: self.include_podcast,
            search_text: self.search_text.clone(),
            sort: self.sort,
            limit,
        }
    }

    fn is_most_recent(&self) -> bool {
        self.sort == Some(SortKey::MostRecent)
    }
}

/// Split a comma-separated id list, dropping blanks and repeats
pub fn parse_id_list(input: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in input.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Entry points for paginated episode listings
pub struct EpisodeLister<S: EpisodeStore + ?Sized> {
    store: Arc<S>,
    config: ListingConfig,
}

impl<S: EpisodeStore + ?Sized> EpisodeLister<S> {
    pub fn new(store: Arc<S>, config: ListingConfig) -> Self {
        Self { store, config }
    }

    /// List public episodes across every podcast
    pub async fn list_all(&self, request: &ListingRequest) -> Result<Page<Episode>, ListingError> {
        self.list_all_at(request, Utc::now()).await
    }

    pub async fn list_all_at(
        &self,
        request: &ListingRequest,
        now: DateTime<Utc>,
    ) -> Result<Page<Episode>, ListingError> {
        debug!(sort = ?request.sort, "listing all episodes");
        let plan = self.base_plan(request, true, now).public_only();
        self.run_direct(plan, request).await
    }

    /// List public episodes of podcasts filed under any of the comma-separated categories
    pub async fn list_by_categories(
        &self,
        request: &ListingRequest,
        category_ids: &str,
    ) -> Result<Page<Episode>, ListingError> {
        self.list_by_categories_at(request, category_ids, Utc::now())
            .await
    }

    pub async fn list_by_categories_at(
        &self,
        request: &ListingRequest,
        category_ids: &str,
        now: DateTime<Utc>,
    ) -> Result<Page<Episode>, ListingError> {
        let category_ids = parse_id_list(category_ids);
        if category_ids.is_empty() {
            return Ok(Page::empty());
        }

        if request.is_most_recent() {
            debug!(categories = category_ids.len(), "listing via category recency projection");
            let plan = self.base_plan(request, false, now);
            return self
                .recency_assisted(plan, RecencyDimension::Category, category_ids, request)
                .await;
        }

        debug!(categories = category_ids.len(), sort = ?request.sort, "listing by categories");
        let plan = self
            .base_plan(request, true, now)
            .in_categories(category_ids)
            .public_only();
        self.run_direct(plan, request).await
    }

    /// List public episodes of the comma-separated podcasts
    pub async fn list_by_podcasts(
        &self,
        request: &ListingRequest,
        podcast_ids: &str,
    ) -> Result<Page<Episode>, ListingError> {
        self.list_by_podcasts_at(request, podcast_ids, Utc::now())
            .await
    }

    pub async fn list_by_podcasts_at(
        &self,
        request: &ListingRequest,
        podcast_ids: &str,
        now: DateTime<Utc>,
    ) -> Result<Page<Episode>, ListingError> {
        let podcast_ids = parse_id_list(podcast_ids);
        if podcast_ids.is_empty() {
            return Ok(Page::empty());
        }

        // A single podcast is cheap to sort directly, whatever the sort key
        if podcast_ids.len() == 1 {
            debug!(podcast = %podcast_ids[0], "listing single podcast");
            let plan = self
                .base_plan(request, false, now)
                .in_podcasts(podcast_ids)
                .public_only();
            return self.run_direct(plan, request).await;
        }

        if request.is_most_recent() {
            debug!(podcasts = podcast_ids.len(), "listing via podcast recency projection");
            let plan = self.base_plan(request, false, now);
            return self
                .recency_assisted(plan, RecencyDimension::Podcast, podcast_ids, request)
                .await;
        }

        let limit = podcast_ids.len() > self.config.podcast_limit_threshold;
        debug!(podcasts = podcast_ids.len(), limit, "listing by podcasts");
        let plan = self
            .base_plan(request, limit, now)
            .in_podcasts(podcast_ids)
            .public_only();
        self.run_direct(plan, request).await
    }

    fn base_plan(&self, request: &ListingRequest, limit: bool, now: DateTime<Utc>) -> QueryPlan {
        build_episode_query(&request.query_options(limit), now, self.config.recent_window)
    }

    async fn run_direct(
        &self,
        plan: QueryPlan,
        request: &ListingRequest,
    ) -> Result<Page<Episode>, ListingError> {
        let plan = plan.paginate(request.skip, request.take);
        let page = self.store.query_episodes(&plan).await?;
        Ok(self.truncate(page))
    }

    /// Page through a recency projection first, then load only the episodes it names.
    ///
    /// The returned order follows the plan's sort, not the projection's.
    async fn recency_assisted(
        &self,
        plan: QueryPlan,
        dimension: RecencyDimension,
        group_ids: Vec<String>,
        request: &ListingRequest,
    ) -> Result<Page<Episode>, ListingError> {
        let recent = self
            .store
            .query_recency(&RecencyQuery {
                dimension,
                group_ids,
                skip: request.skip,
                take: request.take,
            })
            .await?;

        if recent.total == 0 {
            return Ok(Page::empty());
        }

        let page = self
            .store
            .query_episodes(&plan.restricted_to(recent.items))
            .await?;

        Ok(self.truncate(Page::new(page.items, recent.total)))
    }

    fn truncate(&self, mut page: Page<Episode>) -> Page<Episode> {
        for episode in &mut page.items {
            episode.truncate_description(self.config.description_limit);
        }
        page
    }
}

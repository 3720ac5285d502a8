// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Episode, Podcast};

use super::sort::{EpisodeColumn, SortKey, SortOrder, resolve_sort_column};

/// Candidate restriction applied to expensive listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopularityLimit {
    /// Only episodes with at least one pageview in the counter's window
    NonzeroPageviews(EpisodeColumn),
    /// Only episodes published after the cut-off
    PublishedAfter(DateTime<Utc>),
}

impl PopularityLimit {
    pub fn admits(&self, episode: &Episode) -> bool {
        match self {
            PopularityLimit::NonzeroPageviews(column) => {
                column.pageviews(episode).is_some_and(|views| views > 0)
            }
            PopularityLimit::PublishedAfter(cutoff) => {
                episode.pub_date.is_some_and(|date| date > *cutoff)
            }
        }
    }
}

/// Which podcasts an episode has to belong to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Membership {
    #[default]
    Any,
    /// The owning podcast is filed under one of these categories
    Categories(Vec<String>),
    /// The episode belongs to one of these podcasts
    Podcasts(Vec<String>),
}

impl Membership {
    pub fn admits(&self, episode: &Episode, podcast: &Podcast) -> bool {
        match self {
            Membership::Any => true,
            Membership::Categories(ids) => podcast.category_ids.iter().any(|id| ids.contains(id)),
            Membership::Podcasts(ids) => ids.contains(&episode.podcast_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: u64,
    pub take: u64,
}

/// An immutable description of an episode query.
///
/// Every builder method consumes the plan and returns an extended copy, so a
/// plan can be shared freely and compiled once by the store that executes it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Select the owning podcast alongside each episode
    pub include_podcast: bool,
    /// Lowercased, trimmed title search text; `None` matches every title
    pub title_search: Option<String>,
    pub public_only: bool,
    pub popularity: Option<PopularityLimit>,
    pub membership: Membership,
    pub episode_ids: Option<Vec<String>>,
    pub order: SortOrder,
    pub page: Option<Pagination>,
}

impl QueryPlan {
    /// A plan matching every episode joined to an existing podcast
    pub fn new(include_podcast: bool, order: SortOrder) -> Self {
        Self {
            include_podcast,
            title_search: None,
            public_only: false,
            popularity: None,
            membership: Membership::Any,
            episode_ids: None,
            order,
            page: None,
        }
    }

    pub fn matching_title(self, search_text: Option<&str>) -> Self {
        let title_search = search_text
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());
        Self {
            title_search,
            ..self
        }
    }

    pub fn public_only(self) -> Self {
        Self {
            public_only: true,
            ..self
        }
    }

    pub fn with_popularity_limit(self, limit: Option<PopularityLimit>) -> Self {
        Self {
            popularity: limit,
            ..self
        }
    }

    pub fn in_categories(self, category_ids: Vec<String>) -> Self {
        Self {
            membership: Membership::Categories(category_ids),
            ..self
        }
    }

    pub fn in_podcasts(self, podcast_ids: Vec<String>) -> Self {
        Self {
            membership: Membership::Podcasts(podcast_ids),
            ..self
        }
    }

    /// Narrow the plan to exactly these episode ids
    pub fn restricted_to(self, episode_ids: Vec<String>) -> Self {
        Self {
            episode_ids: Some(episode_ids),
            ..self
        }
    }

    pub fn paginate(self, skip: u64, take: u64) -> Self {
        Self {
            page: Some(Pagination { skip, take }),
            ..self
        }
    }

    /// Whether an episode of `podcast` satisfies every predicate of the plan
    pub fn admits(&self, episode: &Episode, podcast: &Podcast) -> bool {
        if self.public_only && !episode.is_public {
            return false;
        }

        if let Some(search) = &self.title_search {
            let matches = episode
                .title
                .as_deref()
                .is_some_and(|title| title.to_lowercase().contains(search.as_str()));
            if !matches {
                return false;
            }
        }

        if let Some(ids) = &self.episode_ids
            && !ids.contains(&episode.id)
        {
            return false;
        }

        if let Some(limit) = &self.popularity
            && !limit.admits(episode)
        {
            return false;
        }

        self.membership.admits(episode, podcast)
    }
}

/// Caller-facing inputs of the episode query builder
#[derive(Debug, Clone, Default)]
pub struct EpisodeQueryOptions {
    pub include_podcast: bool,
    pub search_text: Option<String>,
    pub sort: Option<SortKey>,
    /// Restrict candidates with a popularity window
    pub limit: bool,
}

/// The popularity window that keeps a sort from scanning every episode
pub fn popularity_limit(
    sort: Option<SortKey>,
    now: DateTime<Utc>,
    recent_window: Duration,
) -> Option<PopularityLimit> {
    let sort = sort?;
    if let Some(column) = sort.pageview_column() {
        return Some(PopularityLimit::NonzeroPageviews(column));
    }
    match sort {
        SortKey::MostRecent => Some(PopularityLimit::PublishedAfter(now - recent_window)),
        _ => None,
    }
}

/// Build the base plan for an episode listing.
///
/// Episodes are always inner-joined to their podcast. Title search is a
/// case-insensitive substring match, and the popularity window is only added
/// when `options.limit` is set.
pub fn build_episode_query(
    options: &EpisodeQueryOptions,
    now: DateTime<Utc>,
    recent_window: Duration,
) -> QueryPlan {
    let order = resolve_sort_column(options.sort, EpisodeColumn::PastWeekPageviews);
    let limit = if options.limit {
        popularity_limit(options.sort, now, recent_window)
    } else {
        None
    };

    QueryPlan::new(options.include_podcast, order)
        .matching_title(options.search_text.as_deref())
        .with_popularity_limit(limit)
}

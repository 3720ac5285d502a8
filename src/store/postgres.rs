// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use crate::error::StoreError;
use crate::models::{Episode, MediaReference, Page, PodcastSummary};
use crate::query::{
    QueryPlan, RecencyQuery, SqlParam, compile_episode_query, compile_recency_query,
    episode_select_list,
};

use super::EpisodeStore;

const MEDIA_REF_COLUMNS: &str = "id, episode_id, owner_id, title, start_time, end_time, \
     image_url, link_url, is_official_chapter, is_public";

/// Bind compiled parameters in placeholder order
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                SqlParam::Text(value) => query.bind(value.clone()),
                SqlParam::TextArray(values) => query.bind(values.clone()),
                SqlParam::Timestamp(value) => query.bind(*value),
                SqlParam::BigInt(value) => query.bind(*value),
            };
        }
        query
    }};
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// Postgres-backed store using a shared connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn attach_podcasts(&self, episodes: &mut [Episode]) -> Result<(), StoreError> {
        let mut podcast_ids: Vec<String> = episodes
            .iter()
            .map(|episode| episode.podcast_id.clone())
            .collect();
        podcast_ids.sort();
        podcast_ids.dedup();

        let podcasts: HashMap<String, PodcastSummary> =
            sqlx::query_as::<Postgres, PodcastSummary>(
                "SELECT id, title, image_url FROM podcasts WHERE id = ANY($1)",
            )
            .bind(podcast_ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|podcast| (podcast.id.clone(), podcast))
            .collect();

        for episode in episodes {
            episode.podcast = podcasts.get(&episode.podcast_id).cloned();
        }
        Ok(())
    }
}

#[async_trait]
impl EpisodeStore for PgStore {
    #[tracing::instrument(skip(self, plan), fields(db.table = "episodes"))]
    async fn query_episodes(&self, plan: &QueryPlan) -> Result<Page<Episode>, StoreError> {
        let compiled = compile_episode_query(plan);

        let total: i64 = bind_params!(
            sqlx::query_scalar::<Postgres, i64>(&compiled.count_sql),
            &compiled.count_params
        )
        .fetch_one(&self.pool)
        .await?;

        let mut episodes: Vec<Episode> = bind_params!(
            sqlx::query_as::<Postgres, Episode>(&compiled.select_sql),
            &compiled.select_params
        )
        .fetch_all(&self.pool)
        .await?;

        if plan.include_podcast && !episodes.is_empty() {
            self.attach_podcasts(&mut episodes).await?;
        }

        Ok(Page::new(episodes, count_to_u64(total)))
    }

    #[tracing::instrument(skip(self, query), fields(db.table = query.dimension.table_name()))]
    async fn query_recency(&self, query: &RecencyQuery) -> Result<Page<String>, StoreError> {
        let compiled = compile_recency_query(query);

        let total: i64 = bind_params!(
            sqlx::query_scalar::<Postgres, i64>(&compiled.count_sql),
            &compiled.count_params
        )
        .fetch_one(&self.pool)
        .await?;

        if total == 0 {
            return Ok(Page::empty());
        }

        let ids: Vec<String> = bind_params!(
            sqlx::query_scalar::<Postgres, String>(&compiled.select_sql),
            &compiled.select_params
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(ids, count_to_u64(total)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "episodes"))]
    async fn find_episode(&self, episode_id: &str) -> Result<Option<Episode>, StoreError> {
        let sql = format!(
            "SELECT {} FROM episodes episode WHERE episode.id = $1",
            episode_select_list("episode")
        );
        let episode = sqlx::query_as::<Postgres, Episode>(&sql)
            .bind(episode_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(episode)
    }

    #[tracing::instrument(skip(self), fields(db.table = "episodes"))]
    async fn mark_chapters_parsed(
        &self,
        episode_id: &str,
        parsed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE episodes SET chapters_url_last_parsed = $2 WHERE id = $1")
            .bind(episode_id)
            .bind(parsed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_refs"))]
    async fn find_official_chapters(
        &self,
        episode_id: &str,
        public_only: bool,
    ) -> Result<Vec<MediaReference>, StoreError> {
        let sql = format!(
            "SELECT {MEDIA_REF_COLUMNS} FROM media_refs \
             WHERE episode_id = $1 AND is_official_chapter = TRUE \
             AND ($2 = FALSE OR is_public = TRUE) \
             ORDER BY start_time ASC, id ASC"
        );
        let chapters = sqlx::query_as::<Postgres, MediaReference>(&sql)
            .bind(episode_id)
            .bind(public_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(chapters)
    }

    #[tracing::instrument(skip(self, media_ref), fields(db.table = "media_refs", media_ref.id = %media_ref.id))]
    async fn save_media_reference(
        &self,
        media_ref: &MediaReference,
    ) -> Result<MediaReference, StoreError> {
        let sql = format!(
            "INSERT INTO media_refs ({MEDIA_REF_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
             title = EXCLUDED.title, start_time = EXCLUDED.start_time, \
             end_time = EXCLUDED.end_time, image_url = EXCLUDED.image_url, \
             link_url = EXCLUDED.link_url, is_official_chapter = EXCLUDED.is_official_chapter, \
             is_public = EXCLUDED.is_public, updated_at = NOW() \
             RETURNING {MEDIA_REF_COLUMNS}"
        );
        let saved = sqlx::query_as::<Postgres, MediaReference>(&sql)
            .bind(&media_ref.id)
            .bind(&media_ref.episode_id)
            .bind(&media_ref.owner_id)
            .bind(&media_ref.title)
            .bind(media_ref.start_time)
            .bind(media_ref.end_time)
            .bind(&media_ref.image_url)
            .bind(&media_ref.link_url)
            .bind(media_ref.is_official_chapter)
            .bind(media_ref.is_public)
            .fetch_one(&self.pool)
            .await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self), fields(db.table = "episodes"))]
    async fn find_dead_episodes(&self, limit: usize) -> Result<Vec<Episode>, StoreError> {
        let sql = format!(
            "SELECT {} FROM episodes episode \
             LEFT JOIN media_refs media_ref ON media_ref.episode_id = episode.id \
             WHERE episode.is_public = FALSE AND media_ref.id IS NULL \
             LIMIT $1",
            episode_select_list("episode")
        );
        let episodes = sqlx::query_as::<Postgres, Episode>(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(episodes)
    }

    #[tracing::instrument(skip(self), fields(db.table = "episodes"))]
    async fn remove_episode(&self, episode_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM episodes WHERE id = $1")
            .bind(episode_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

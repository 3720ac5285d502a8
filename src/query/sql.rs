// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};

use super::plan::{Membership, PopularityLimit, QueryPlan};
use super::recency::RecencyQuery;
use super::sort::SortOrder;

/// Columns selected for every episode listing
const EPISODE_COLUMNS: &[&str] = &[
    "id",
    "podcast_id",
    "title",
    "description",
    "pub_date",
    "is_public",
    "image_url",
    "media_url",
    "media_type",
    "media_filesize",
    "duration",
    "past_hour_total_unique_pageviews",
    "past_day_total_unique_pageviews",
    "past_week_total_unique_pageviews",
    "past_month_total_unique_pageviews",
    "past_year_total_unique_pageviews",
    "past_all_time_total_unique_pageviews",
    "chapters_url",
    "chapters_url_last_parsed",
];

/// A value bound to a `$n` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    TextArray(Vec<String>),
    Timestamp(DateTime<Utc>),
    BigInt(i64),
}

/// Parameterized select and count statements for one plan
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub select_sql: String,
    pub select_params: Vec<SqlParam>,
    pub count_sql: String,
    pub count_params: Vec<SqlParam>,
}

#[derive(Default)]
struct Params(Vec<SqlParam>);

impl Params {
    fn push(&mut self, param: SqlParam) -> String {
        self.0.push(param);
        format!("${}", self.0.len())
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Comma-separated episode columns qualified with `alias`
pub(crate) fn episode_select_list(alias: &str) -> String {
    EPISODE_COLUMNS
        .iter()
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// Compile an episode plan into Postgres statements.
///
/// Every value that originates from the caller or the clock is bound as a
/// parameter; only fixed identifiers are written into the SQL text.
pub fn compile_episode_query(plan: &QueryPlan) -> CompiledQuery {
    let mut params = Params::default();
    let mut conditions = Vec::new();

    if let Some(search) = &plan.title_search {
        let placeholder = params.push(SqlParam::Text(format!("%{}%", escape_like(search))));
        conditions.push(format!("LOWER(episode.title) LIKE {placeholder} ESCAPE '\\'"));
    }

    if plan.public_only {
        conditions.push("episode.is_public = TRUE".to_string());
    }

    match &plan.popularity {
        Some(PopularityLimit::NonzeroPageviews(column)) => {
            conditions.push(format!("episode.{} > 0", column.sql_name()));
        }
        Some(PopularityLimit::PublishedAfter(cutoff)) => {
            let placeholder = params.push(SqlParam::Timestamp(*cutoff));
            conditions.push(format!("episode.pub_date > {placeholder}"));
        }
        None => {}
    }

    match &plan.membership {
        Membership::Any => {}
        Membership::Categories(ids) => {
            let placeholder = params.push(SqlParam::TextArray(ids.clone()));
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM podcast_categories pc \
                 WHERE pc.podcast_id = podcast.id AND pc.category_id = ANY({placeholder}))"
            ));
        }
        Membership::Podcasts(ids) => {
            let placeholder = params.push(SqlParam::TextArray(ids.clone()));
            conditions.push(format!("episode.podcast_id = ANY({placeholder})"));
        }
    }

    if let Some(ids) = &plan.episode_ids {
        let placeholder = params.push(SqlParam::TextArray(ids.clone()));
        conditions.push(format!("episode.id = ANY({placeholder})"));
    }

    let from = format!(
        "FROM episodes episode INNER JOIN podcasts podcast ON podcast.id = episode.podcast_id{}",
        where_clause(&conditions)
    );

    let count_sql = format!("SELECT COUNT(*) {from}");
    let count_params = params.0.clone();

    let columns = episode_select_list("episode");

    let order = match plan.order {
        SortOrder::Random => "RANDOM()".to_string(),
        SortOrder::Column { column, direction } => format!(
            "episode.{} {} NULLS LAST, episode.id ASC",
            column.sql_name(),
            direction.as_sql()
        ),
    };

    let mut select_sql = format!("SELECT {columns} {from} ORDER BY {order}");
    if let Some(page) = plan.page {
        let offset = params.push(SqlParam::BigInt(to_i64(page.skip)));
        let limit = params.push(SqlParam::BigInt(to_i64(page.take)));
        select_sql.push_str(&format!(" OFFSET {offset} LIMIT {limit}"));
    }

    CompiledQuery {
        select_sql,
        select_params: params.0,
        count_sql,
        count_params,
    }
}

/// Compile a recency projection page into Postgres statements
pub fn compile_recency_query(query: &RecencyQuery) -> CompiledQuery {
    let mut params = Params::default();
    let ids = params.push(SqlParam::TextArray(query.group_ids.clone()));
    let from = format!(
        "FROM {} recent WHERE recent.{} = ANY({ids})",
        query.dimension.table_name(),
        query.dimension.key_column()
    );

    let count_sql = format!("SELECT COUNT(*) {from}");
    let count_params = params.0.clone();

    let offset = params.push(SqlParam::BigInt(to_i64(query.skip)));
    let limit = params.push(SqlParam::BigInt(to_i64(query.take)));
    let select_sql = format!(
        "SELECT recent.episode_id {from} ORDER BY recent.pub_date DESC OFFSET {offset} LIMIT {limit}"
    );

    CompiledQuery {
        select_sql,
        select_params: params.0,
        count_sql,
        count_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::recency::RecencyDimension;
    use crate::query::sort::EpisodeColumn;
    use chrono::Duration;

    #[test]
    fn plain_plan_joins_podcast_without_filters() {
        let plan = QueryPlan::new(false, SortOrder::desc(EpisodeColumn::PubDate));
        let compiled = compile_episode_query(&plan);

        assert_eq!(
            compiled.count_sql,
            "SELECT COUNT(*) FROM episodes episode INNER JOIN podcasts podcast ON podcast.id = episode.podcast_id"
        );
        assert!(compiled.select_sql.ends_with("ORDER BY episode.pub_date DESC NULLS LAST, episode.id ASC"));
        assert!(compiled.select_params.is_empty());
    }

    #[test]
    fn search_text_is_bound_not_interpolated() {
        let plan = QueryPlan::new(false, SortOrder::Random).matching_title(Some("50% off'; DROP"));
        let compiled = compile_episode_query(&plan);

        assert!(!compiled.select_sql.contains("DROP"));
        assert!(compiled.select_sql.contains("LOWER(episode.title) LIKE $1 ESCAPE '\\'"));
        assert_eq!(
            compiled.select_params,
            vec![SqlParam::Text("%50\\% off'; drop%".to_string())]
        );
    }

    #[test]
    fn recent_window_cutoff_is_a_parameter() {
        let cutoff = Utc::now() - Duration::hours(24);
        let plan = QueryPlan::new(false, SortOrder::desc(EpisodeColumn::PubDate))
            .public_only()
            .with_popularity_limit(Some(PopularityLimit::PublishedAfter(cutoff)));
        let compiled = compile_episode_query(&plan);

        assert!(compiled.count_sql.contains("episode.is_public = TRUE AND episode.pub_date > $1"));
        assert_eq!(compiled.count_params, vec![SqlParam::Timestamp(cutoff)]);
    }

    #[test]
    fn pageview_limit_uses_counter_column() {
        let plan = QueryPlan::new(false, SortOrder::Random).with_popularity_limit(Some(
            PopularityLimit::NonzeroPageviews(EpisodeColumn::PastHourPageviews),
        ));
        let compiled = compile_episode_query(&plan);

        assert!(compiled.count_sql.contains("episode.past_hour_total_unique_pageviews > 0"));
        assert!(compiled.select_sql.ends_with("ORDER BY RANDOM()"));
    }

    #[test]
    fn pagination_only_binds_on_select() {
        let plan = QueryPlan::new(false, SortOrder::Random)
            .in_podcasts(vec!["p1".to_string(), "p2".to_string()])
            .paginate(20, 10);
        let compiled = compile_episode_query(&plan);

        assert!(compiled.count_sql.contains("episode.podcast_id = ANY($1)"));
        assert!(compiled.select_sql.ends_with("OFFSET $2 LIMIT $3"));
        assert_eq!(compiled.count_params.len(), 1);
        assert_eq!(
            compiled.select_params,
            vec![
                SqlParam::TextArray(vec!["p1".to_string(), "p2".to_string()]),
                SqlParam::BigInt(20),
                SqlParam::BigInt(10),
            ]
        );
    }

    #[test]
    fn category_membership_uses_exists_subquery() {
        let plan = QueryPlan::new(false, SortOrder::Random)
            .in_categories(vec!["c1".to_string()])
            .restricted_to(vec!["e1".to_string()]);
        let compiled = compile_episode_query(&plan);

        assert!(compiled.count_sql.contains("pc.category_id = ANY($1)"));
        assert!(compiled.count_sql.contains("episode.id = ANY($2)"));
    }

    #[test]
    fn recency_query_orders_by_publication() {
        let compiled = compile_recency_query(&RecencyQuery {
            dimension: RecencyDimension::Podcast,
            group_ids: vec!["p1".to_string()],
            skip: 0,
            take: 20,
        });

        assert_eq!(
            compiled.count_sql,
            "SELECT COUNT(*) FROM recent_episodes_by_podcast recent WHERE recent.podcast_id = ANY($1)"
        );
        assert!(compiled.select_sql.ends_with("ORDER BY recent.pub_date DESC OFFSET $2 LIMIT $3"));
        assert_eq!(compiled.select_params.len(), 3);
    }
}

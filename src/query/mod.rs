// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod plan;
mod recency;
mod sort;
mod sql;

pub use plan::{
    EpisodeQueryOptions, Membership, Pagination, PopularityLimit, QueryPlan, build_episode_query,
    popularity_limit,
};
pub use recency::{RecencyDimension, RecencyQuery};
pub use sort::{Direction, EpisodeColumn, SortKey, SortOrder, resolve_sort_column};
pub use sql::{CompiledQuery, SqlParam, compile_episode_query, compile_recency_query};

pub(crate) use sql::episode_select_list;

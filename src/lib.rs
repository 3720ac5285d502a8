// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod chapters;
pub mod config;
pub mod error;
pub mod http;
pub mod listing;
pub mod models;
pub mod query;
pub mod reaper;
pub mod store;

// Re-export main types for convenience
pub use chapters::{ChapterOutcome, ChapterSync, ChapterSynchronizer, ReconcileReport, SyncStatus};
pub use config::{ChapterSyncConfig, ListingConfig, ReaperConfig, ServiceConfig};
pub use error::{ChapterError, ChapterSourceError, ListingError, SortKeyError, StoreError};
pub use http::{HttpClient, ReqwestClient};
pub use listing::{EpisodeLister, ListingRequest, parse_id_list};
pub use models::{Episode, MediaReference, Page, Podcast, PodcastSummary, RecencyEntry};
pub use query::{QueryPlan, SortKey};
pub use reaper::{ReapPass, ReapSummary, Reaper};
pub use store::{EpisodeStore, InMemoryStore, PgStore};

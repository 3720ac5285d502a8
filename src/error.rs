// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Errors raised by a persistence backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur when fetching or parsing a remote chapters document
#[derive(Error, Debug)]
pub enum ChapterSourceError {
    #[error("Invalid chapters URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to fetch chapters from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse chapters document: {0}")]
    ParseFailed(#[from] serde_json::Error),
}

/// Errors surfaced by chapter retrieval
#[derive(Error, Debug)]
pub enum ChapterError {
    #[error("Episode not found: {0}")]
    EpisodeNotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by the episode listing entry points
#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// An unrecognised sort key was supplied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown sort key '{0}'")]
pub struct SortKeyError(pub String);

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::error::ChapterSourceError;
use crate::http::HttpClient;

use super::parse::{ChaptersDocument, parse_chapters_document};

/// Fetch and parse a remote chapters document
pub async fn fetch_chapters_document<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<ChaptersDocument, ChapterSourceError> {
    let url = Url::parse(url)?;
    let bytes = client
        .get_bytes(url.as_str())
        .await
        .map_err(|e| ChapterSourceError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    parse_chapters_document(&bytes)
}

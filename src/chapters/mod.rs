// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod fetch;
mod parse;
mod sync;

pub use fetch::fetch_chapters_document;
pub use parse::{ChaptersDocument, InvalidChapter, RemoteChapter, parse_chapters_document};
pub use sync::{ChapterOutcome, ChapterSync, ChapterSynchronizer, ReconcileReport, SyncStatus};

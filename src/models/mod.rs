// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod episode;
mod media_ref;
mod podcast;

pub use episode::{Episode, Page};
pub use media_ref::MediaReference;
pub use podcast::{Podcast, PodcastSummary, RecencyEntry};

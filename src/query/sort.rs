// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SortKeyError;
use crate::models::Episode;

/// Sort keys accepted by the listing entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    TopPastHour,
    TopPastDay,
    TopPastWeek,
    TopPastMonth,
    TopPastYear,
    TopAllTime,
    MostRecent,
    Oldest,
    Alphabetical,
    Random,
}

impl SortKey {
    pub const ALL: [SortKey; 10] = [
        SortKey::TopPastHour,
        SortKey::TopPastDay,
        SortKey::TopPastWeek,
        SortKey::TopPastMonth,
        SortKey::TopPastYear,
        SortKey::TopAllTime,
        SortKey::MostRecent,
        SortKey::Oldest,
        SortKey::Alphabetical,
        SortKey::Random,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::TopPastHour => "top-past-hour",
            SortKey::TopPastDay => "top-past-day",
            SortKey::TopPastWeek => "top-past-week",
            SortKey::TopPastMonth => "top-past-month",
            SortKey::TopPastYear => "top-past-year",
            SortKey::TopAllTime => "top-all-time",
            SortKey::MostRecent => "most-recent",
            SortKey::Oldest => "oldest",
            SortKey::Alphabetical => "alphabetical",
            SortKey::Random => "random",
        }
    }

    /// The pageview counter a `top-*` key ranks by
    pub fn pageview_column(self) -> Option<EpisodeColumn> {
        match self {
            SortKey::TopPastHour => Some(EpisodeColumn::PastHourPageviews),
            SortKey::TopPastDay => Some(EpisodeColumn::PastDayPageviews),
            SortKey::TopPastWeek => Some(EpisodeColumn::PastWeekPageviews),
            SortKey::TopPastMonth => Some(EpisodeColumn::PastMonthPageviews),
            SortKey::TopPastYear => Some(EpisodeColumn::PastYearPageviews),
            SortKey::TopAllTime => Some(EpisodeColumn::PastAllTimePageviews),
            _ => None,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = SortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SortKeyError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Episode columns a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeColumn {
    PubDate,
    Title,
    PastHourPageviews,
    PastDayPageviews,
    PastWeekPageviews,
    PastMonthPageviews,
    PastYearPageviews,
    PastAllTimePageviews,
}

impl EpisodeColumn {
    pub fn sql_name(self) -> &'static str {
        match self {
            EpisodeColumn::PubDate => "pub_date",
            EpisodeColumn::Title => "title",
            EpisodeColumn::PastHourPageviews => "past_hour_total_unique_pageviews",
            EpisodeColumn::PastDayPageviews => "past_day_total_unique_pageviews",
            EpisodeColumn::PastWeekPageviews => "past_week_total_unique_pageviews",
            EpisodeColumn::PastMonthPageviews => "past_month_total_unique_pageviews",
            EpisodeColumn::PastYearPageviews => "past_year_total_unique_pageviews",
            EpisodeColumn::PastAllTimePageviews => "past_all_time_total_unique_pageviews",
        }
    }

    /// Pageview count for counter columns, `None` for the others
    pub fn pageviews(self, episode: &Episode) -> Option<i32> {
        match self {
            EpisodeColumn::PastHourPageviews => Some(episode.past_hour_total_unique_pageviews),
            EpisodeColumn::PastDayPageviews => Some(episode.past_day_total_unique_pageviews),
            EpisodeColumn::PastWeekPageviews => Some(episode.past_week_total_unique_pageviews),
            EpisodeColumn::PastMonthPageviews => Some(episode.past_month_total_unique_pageviews),
            EpisodeColumn::PastYearPageviews => Some(episode.past_year_total_unique_pageviews),
            EpisodeColumn::PastAllTimePageviews => {
                Some(episode.past_all_time_total_unique_pageviews)
            }
            EpisodeColumn::PubDate | EpisodeColumn::Title => None,
        }
    }

    pub fn is_null(self, episode: &Episode) -> bool {
        match self {
            EpisodeColumn::PubDate => episode.pub_date.is_none(),
            EpisodeColumn::Title => episode.title.is_none(),
            _ => false,
        }
    }

    /// Ascending comparison of two episodes on this column
    pub fn compare(self, a: &Episode, b: &Episode) -> Ordering {
        match self {
            EpisodeColumn::PubDate => a.pub_date.cmp(&b.pub_date),
            EpisodeColumn::Title => a.title.cmp(&b.title),
            counter => counter.pageviews(a).cmp(&counter.pageviews(b)),
        }
    }
}

/// How a compiled query orders its rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Randomisation is left to the storage backend
    Random,
    Column {
        column: EpisodeColumn,
        direction: Direction,
    },
}

impl SortOrder {
    pub fn desc(column: EpisodeColumn) -> Self {
        SortOrder::Column {
            column,
            direction: Direction::Desc,
        }
    }

    pub fn asc(column: EpisodeColumn) -> Self {
        SortOrder::Column {
            column,
            direction: Direction::Asc,
        }
    }
}

/// Resolve a sort key into the column and direction to order by.
///
/// Without a key the listing falls back to `default_column`, newest/highest first.
pub fn resolve_sort_column(sort: Option<SortKey>, default_column: EpisodeColumn) -> SortOrder {
    let Some(sort) = sort else {
        return SortOrder::desc(default_column);
    };

    if let Some(column) = sort.pageview_column() {
        return SortOrder::desc(column);
    }

    match sort {
        SortKey::MostRecent => SortOrder::desc(EpisodeColumn::PubDate),
        SortKey::Oldest => SortOrder::asc(EpisodeColumn::PubDate),
        SortKey::Alphabetical => SortOrder::asc(EpisodeColumn::Title),
        SortKey::Random => SortOrder::Random,
        _ => SortOrder::desc(default_column),
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ChapterSyncConfig;
use crate::error::ChapterError;
use crate::http::HttpClient;
use crate::models::MediaReference;
use crate::store::EpisodeStore;

use super::fetch::fetch_chapters_document;
use super::parse::{ChaptersDocument, RemoteChapter};

/// What happened to one chapter during reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterOutcome {
    Created { start_time: i32, id: String },
    Updated { start_time: i32, id: String },
    Unchanged { start_time: i32, id: String },
    /// Hidden because the remote document no longer lists it
    Suppressed { start_time: i32, id: String },
    Failed {
        start_time: Option<i32>,
        reason: String,
    },
}

/// Per-chapter outcomes of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub outcomes: Vec<ChapterOutcome>,
}

impl ReconcileReport {
    fn count(&self, predicate: impl Fn(&ChapterOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|outcome| predicate(outcome)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Created { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Updated { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Unchanged { .. }))
    }

    pub fn suppressed(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Suppressed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ChapterOutcome::Failed { .. }))
    }
}

/// Whether, and how, the remote document was consulted
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// The episode has no chapters URL
    NoChaptersUrl,
    /// The last fetch is still within the freshness window
    Fresh,
    Synced(ReconcileReport),
    /// The document could not be fetched, parsed or diffed; stored chapters are served
    Unavailable(String),
}

/// Public official chapters of an episode and how they were obtained
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterSync {
    pub chapters: Vec<MediaReference>,
    pub total: u64,
    pub status: SyncStatus,
}

/// Keeps an episode's official chapters in line with its remote chapters document
pub struct ChapterSynchronizer<S: EpisodeStore + ?Sized, C: HttpClient> {
    store: Arc<S>,
    client: C,
    config: ChapterSyncConfig,
}

impl<S: EpisodeStore + ?Sized, C: HttpClient> ChapterSynchronizer<S, C> {
    pub fn new(store: Arc<S>, client: C, config: ChapterSyncConfig) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Return the episode's chapters, refreshing them from the remote document when stale
    pub async fn retrieve_chapters(&self, episode_id: &str) -> Result<ChapterSync, ChapterError> {
        self.retrieve_chapters_at(episode_id, Utc::now()).await
    }

    #[tracing::instrument(skip(self, now))]
    pub async fn retrieve_chapters_at(
        &self,
        episode_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ChapterSync, ChapterError> {
        let episode = self
            .store
            .find_episode(episode_id)
            .await?
            .ok_or_else(|| ChapterError::EpisodeNotFound(episode_id.to_string()))?;

        let status = match episode.chapters_url() {
            None => SyncStatus::NoChaptersUrl,
            Some(_) if !self.needs_refresh(episode.chapters_url_last_parsed, now) => {
                debug!("chapters are fresh");
                SyncStatus::Fresh
            }
            Some(url) => self.sync_remote(&episode.id, url, now).await,
        };

        let chapters = self.store.find_official_chapters(&episode.id, true).await?;
        let total = chapters.len() as u64;

        Ok(ChapterSync {
            chapters,
            total,
            status,
        })
    }

    /// Refresh when never parsed or when the last parse is at least one window old
    pub fn needs_refresh(&self, last_parsed: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_parsed {
            None => true,
            Some(last) => now - last >= self.config.freshness_window,
        }
    }

    async fn sync_remote(&self, episode_id: &str, url: &str, now: DateTime<Utc>) -> SyncStatus {
        // Stamp before fetching so concurrent requests see the episode as fresh
        if let Err(e) = self.store.mark_chapters_parsed(episode_id, now).await {
            warn!(error = %e, "failed to stamp chapters parse time");
            return SyncStatus::Unavailable(e.to_string());
        }

        let document = match fetch_chapters_document(&self.client, url).await {
            Ok(document) => document,
            Err(e) => {
                warn!(url, error = %e, "chapters document unavailable");
                return SyncStatus::Unavailable(e.to_string());
            }
        };

        let existing = match self.store.find_official_chapters(episode_id, false).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "failed to load stored chapters");
                return SyncStatus::Unavailable(e.to_string());
            }
        };

        let report = self.reconcile(episode_id, existing, document).await;
        info!(
            created = report.created(),
            updated = report.updated(),
            unchanged = report.unchanged(),
            suppressed = report.suppressed(),
            failed = report.failed(),
            "chapters reconciled"
        );
        SyncStatus::Synced(report)
    }

    async fn reconcile(
        &self,
        episode_id: &str,
        existing: Vec<MediaReference>,
        document: ChaptersDocument,
    ) -> ReconcileReport {
        let mut outcomes = Vec::new();

        let mut remote = Vec::new();
        let mut remote_starts = HashSet::new();
        let mut unreadable_starts = HashSet::new();
        for entry in document.chapters {
            match entry {
                Ok(chapter) if remote_starts.insert(chapter.start_time) => remote.push(chapter),
                Ok(chapter) => outcomes.push(ChapterOutcome::Failed {
                    start_time: Some(chapter.start_time),
                    reason: "duplicate startTime in chapters document".to_string(),
                }),
                Err(invalid) => {
                    // Still listed remotely, so its local chapter is left as it is
                    if let Some(start_time) = invalid.start_time {
                        unreadable_starts.insert(start_time);
                    }
                    outcomes.push(ChapterOutcome::Failed {
                        start_time: invalid.start_time,
                        reason: format!("chapter {}: {}", invalid.index, invalid.reason),
                    });
                }
            }
        }

        let mut local_by_start: HashMap<i32, MediaReference> = HashMap::new();
        for chapter in existing {
            let listed = remote_starts.contains(&chapter.start_time)
                || unreadable_starts.contains(&chapter.start_time);
            if !listed {
                if chapter.is_public {
                    let suppressed = MediaReference {
                        is_public: false,
                        ..chapter
                    };
                    outcomes.push(self.save(suppressed, ChapterKind::Suppressed).await);
                }
                continue;
            }
            local_by_start.entry(chapter.start_time).or_insert(chapter);
        }

        for chapter in remote {
            let outcome = match local_by_start.remove(&chapter.start_time) {
                Some(local) => {
                    let updated = apply_remote(local.clone(), &chapter);
                    if updated == local {
                        ChapterOutcome::Unchanged {
                            start_time: local.start_time,
                            id: local.id,
                        }
                    } else {
                        self.save(updated, ChapterKind::Updated).await
                    }
                }
                None => {
                    let created = self.new_chapter(episode_id, &chapter);
                    self.save(created, ChapterKind::Created).await
                }
            };
            outcomes.push(outcome);
        }

        for outcome in &outcomes {
            if let ChapterOutcome::Failed { start_time, reason } = outcome {
                warn!(?start_time, reason = %reason, "chapter not reconciled");
            }
        }

        ReconcileReport { outcomes }
    }

    fn new_chapter(&self, episode_id: &str, chapter: &RemoteChapter) -> MediaReference {
        let blank = MediaReference {
            id: Uuid::new_v4().simple().to_string(),
            episode_id: episode_id.to_string(),
            owner_id: self.config.super_user_id.clone(),
            title: None,
            start_time: chapter.start_time,
            end_time: None,
            image_url: None,
            link_url: None,
            is_official_chapter: true,
            is_public: true,
        };
        apply_remote(blank, chapter)
    }

    async fn save(&self, media_ref: MediaReference, kind: ChapterKind) -> ChapterOutcome {
        let start_time = media_ref.start_time;
        match self.store.save_media_reference(&media_ref).await {
            Ok(saved) => kind.outcome(start_time, saved.id),
            Err(e) => ChapterOutcome::Failed {
                start_time: Some(start_time),
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Clone, Copy)]
enum ChapterKind {
    Created,
    Updated,
    Suppressed,
}

impl ChapterKind {
    fn outcome(self, start_time: i32, id: String) -> ChapterOutcome {
        match self {
            ChapterKind::Created => ChapterOutcome::Created { start_time, id },
            ChapterKind::Updated => ChapterOutcome::Updated { start_time, id },
            ChapterKind::Suppressed => ChapterOutcome::Suppressed { start_time, id },
        }
    }
}

fn apply_remote(local: MediaReference, chapter: &RemoteChapter) -> MediaReference {
    MediaReference {
        title: chapter.title.clone(),
        start_time: chapter.start_time,
        end_time: chapter.end_time,
        image_url: chapter.image_url.clone(),
        link_url: chapter.link_url.clone(),
        is_official_chapter: true,
        is_public: true,
        ..local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{Duration, TimeZone};

    use crate::models::Episode;
    use crate::store::InMemoryStore;
    use crate::store::testing::FaultyStore;

    const CHAPTERS_URL: &str = "https://example.com/chapters.json";
    const SUPER_USER: &str = "super-user";

    #[derive(Default)]
    struct MockHttpClient {
        body: Mutex<String>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockHttpClient {
        fn serving(body: &str) -> Self {
            Self {
                body: Mutex::new(body.to_string()),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClient for Arc<MockHttpClient> {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                // An unparseable URL makes reqwest fail without touching the network
                return reqwest::get("http://[invalid").await.map(|_| Bytes::new());
            }
            let body = self.body.lock().unwrap().clone();
            Ok(Bytes::from(body))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn episode_with_chapters(last_parsed: Option<DateTime<Utc>>) -> Episode {
        let mut episode = Episode::new("ep1", "pod1");
        episode.chapters_url = Some(CHAPTERS_URL.to_string());
        episode.chapters_url_last_parsed = last_parsed;
        episode
    }

    fn official(id: &str, start_time: i32, title: &str) -> MediaReference {
        MediaReference {
            title: Some(title.to_string()),
            is_official_chapter: true,
            ..MediaReference::clip(id, "ep1", SUPER_USER, start_time)
        }
    }

    fn synchronizer<S: EpisodeStore + ?Sized>(
        store: &Arc<S>,
        client: &Arc<MockHttpClient>,
    ) -> ChapterSynchronizer<S, Arc<MockHttpClient>> {
        ChapterSynchronizer::new(
            store.clone(),
            client.clone(),
            ChapterSyncConfig::new(SUPER_USER),
        )
    }

    async fn store_with(episode: Episode, chapters: Vec<MediaReference>) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_episode(episode).await;
        for chapter in chapters {
            store.insert_media_reference(chapter).await;
        }
        store
    }

    #[tokio::test]
    async fn missing_episode_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let client = Arc::new(MockHttpClient::serving("{}"));

        let err = synchronizer(&store, &client)
            .retrieve_chapters_at("missing", now())
            .await
            .unwrap_err();

        assert!(matches!(err, ChapterError::EpisodeNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn episode_without_chapters_url_skips_fetch() {
        let store = store_with(
            Episode::new("ep1", "pod1"),
            vec![official("c1", 0, "Intro")],
        )
        .await;
        let client = Arc::new(MockHttpClient::serving("{}"));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert_eq!(sync.status, SyncStatus::NoChaptersUrl);
        assert_eq!(sync.total, 1);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn recently_parsed_chapters_are_not_refetched() {
        let store = store_with(
            episode_with_chapters(Some(now() - Duration::hours(1))),
            vec![],
        )
        .await;
        let client = Arc::new(MockHttpClient::serving(r#"{"chapters": []}"#));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert_eq!(sync.status, SyncStatus::Fresh);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn stale_chapters_are_refetched_after_half_a_day() {
        let store = store_with(
            episode_with_chapters(Some(now() - Duration::hours(12))),
            vec![],
        )
        .await;
        let client = Arc::new(MockHttpClient::serving(r#"{"chapters": []}"#));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert!(matches!(sync.status, SyncStatus::Synced(_)));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn freshness_window_is_measured_from_last_parse() {
        let store = Arc::new(InMemoryStore::new());
        let client = Arc::new(MockHttpClient::default());
        let sync = synchronizer(&store, &client);

        assert!(sync.needs_refresh(None, now()));
        assert!(!sync.needs_refresh(Some(now()), now()));
        assert!(!sync.needs_refresh(Some(now() - Duration::hours(11)), now()));
        assert!(sync.needs_refresh(Some(now() - Duration::hours(12)), now()));
        assert!(sync.needs_refresh(Some(now() - Duration::days(3)), now()));
    }

    #[tokio::test]
    async fn sync_updates_matching_and_suppresses_missing_chapters() {
        let store = store_with(
            episode_with_chapters(None),
            vec![official("c10", 10, "Old"), official("c20", 20, "B")],
        )
        .await;
        let client = Arc::new(MockHttpClient::serving(
            r#"{"chapters": [{"startTime": 10, "title": "A"}]}"#,
        ));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        let all = store.media_references("ep1").await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title.as_deref(), Some("A"));
        assert!(all[0].is_public);
        assert_eq!(all[1].start_time, 20);
        assert!(!all[1].is_public);

        assert_eq!(sync.total, 1);
        assert_eq!(sync.chapters[0].id, "c10");
        let SyncStatus::Synced(report) = sync.status else {
            panic!("expected a sync");
        };
        assert_eq!(report.updated(), 1);
        assert_eq!(report.suppressed(), 1);
    }

    #[tokio::test]
    async fn sync_creates_new_chapters_owned_by_super_user() {
        let store = store_with(episode_with_chapters(None), vec![]).await;
        let client = Arc::new(MockHttpClient::serving(
            r#"{"chapters": [
                {"startTime": 0, "title": "Intro"},
                {"startTime": 60, "endTime": 120, "title": "Main", "img": "https://example.com/i.png", "url": "https://example.com"}
            ]}"#,
        ));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert_eq!(sync.total, 2);
        let main = &sync.chapters[1];
        assert_eq!(main.owner_id, SUPER_USER);
        assert!(main.is_official_chapter);
        assert!(main.is_public);
        assert_eq!(main.end_time, Some(120));
        assert_eq!(main.image_url.as_deref(), Some("https://example.com/i.png"));
        assert_eq!(main.link_url.as_deref(), Some("https://example.com"));
    }

    #[tokio::test]
    async fn resync_with_unchanged_document_creates_no_duplicates() {
        let store = store_with(episode_with_chapters(None), vec![]).await;
        let client = Arc::new(MockHttpClient::serving(
            r#"{"chapters": [{"startTime": 0, "title": "Intro"}, {"startTime": 30, "title": "Part"}]}"#,
        ));
        let synchronizer = synchronizer(&store, &client);

        let first = synchronizer.retrieve_chapters_at("ep1", now()).await.unwrap();
        let immediate = synchronizer.retrieve_chapters_at("ep1", now()).await.unwrap();
        let later = synchronizer
            .retrieve_chapters_at("ep1", now() + Duration::hours(13))
            .await
            .unwrap();

        assert_eq!(immediate.status, SyncStatus::Fresh);
        assert_eq!(first.chapters, immediate.chapters);
        assert_eq!(first.chapters, later.chapters);
        let SyncStatus::Synced(report) = later.status else {
            panic!("expected a sync");
        };
        assert_eq!(report.unchanged(), 2);
        assert_eq!(report.created(), 0);
        assert_eq!(store.media_references("ep1").await.len(), 2);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn suppressed_chapter_reappearing_is_republished() {
        let mut hidden = official("c5", 5, "Back");
        hidden.is_public = false;
        let store = store_with(episode_with_chapters(None), vec![hidden]).await;
        let client = Arc::new(MockHttpClient::serving(
            r#"{"chapters": [{"startTime": 5, "title": "Back"}]}"#,
        ));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert_eq!(sync.total, 1);
        assert_eq!(sync.chapters[0].id, "c5");
    }

    #[tokio::test]
    async fn unreadable_entry_keeps_its_local_chapter_public() {
        let store = store_with(episode_with_chapters(None), vec![official("c10", 10, "Intro")]).await;
        let client = Arc::new(MockHttpClient::serving(
            r#"{"chapters": [{"startTime": 10, "title": "Intro", "url": 42}]}"#,
        ));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        let SyncStatus::Synced(report) = &sync.status else {
            panic!("expected a sync");
        };
        assert_eq!(report.suppressed(), 0);
        assert!(matches!(
            report.outcomes.as_slice(),
            [ChapterOutcome::Failed { start_time: Some(10), .. }]
        ));
        let stored = store.media_references("ep1").await;
        assert!(stored[0].is_public);
        assert_eq!(sync.total, 1);
    }

    #[tokio::test]
    async fn user_clips_are_left_alone() {
        let clip = MediaReference::clip("clip", "ep1", "user", 10);
        let store = store_with(episode_with_chapters(None), vec![clip.clone()]).await;
        let client = Arc::new(MockHttpClient::serving(r#"{"chapters": []}"#));

        synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert_eq!(store.media_references("ep1").await, vec![clip]);
    }

    #[tokio::test]
    async fn fetch_failure_serves_stored_chapters_and_stamps_parse_time() {
        let store = store_with(episode_with_chapters(None), vec![official("c1", 0, "Intro")]).await;
        let client = Arc::new(MockHttpClient::failing());

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert!(matches!(sync.status, SyncStatus::Unavailable(_)));
        assert_eq!(sync.total, 1);
        assert_eq!(
            store.episode("ep1").await.unwrap().chapters_url_last_parsed,
            Some(now())
        );
    }

    #[tokio::test]
    async fn malformed_document_serves_stored_chapters() {
        let store = store_with(episode_with_chapters(None), vec![official("c1", 0, "Intro")]).await;
        let client = Arc::new(MockHttpClient::serving("<html>not json</html>"));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert!(matches!(sync.status, SyncStatus::Unavailable(_)));
        assert_eq!(sync.chapters[0].title.as_deref(), Some("Intro"));
    }

    #[tokio::test]
    async fn stamp_failure_skips_remote_sync() {
        let store = Arc::new(FaultyStore {
            fail_mark_parsed: true,
            ..Default::default()
        });
        store.inner.insert_episode(episode_with_chapters(None)).await;
        let client = Arc::new(MockHttpClient::serving(r#"{"chapters": []}"#));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        assert!(matches!(sync.status, SyncStatus::Unavailable(_)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn per_chapter_failures_do_not_stop_siblings() {
        let store = Arc::new(FaultyStore {
            failing_save_start: Some(30),
            ..Default::default()
        });
        store.inner.insert_episode(episode_with_chapters(None)).await;
        let client = Arc::new(MockHttpClient::serving(
            r#"{"chapters": [
                {"startTime": 0, "title": "Intro"},
                {"startTime": 30, "title": "Broken"},
                {"title": "No start"},
                {"startTime": 0, "title": "Duplicate"},
                {"startTime": 60, "title": "Outro"}
            ]}"#,
        ));

        let sync = synchronizer(&store, &client)
            .retrieve_chapters_at("ep1", now())
            .await
            .unwrap();

        let SyncStatus::Synced(report) = &sync.status else {
            panic!("expected a sync");
        };
        assert_eq!(report.created(), 2);
        assert_eq!(report.failed(), 3);
        let starts: Vec<_> = sync.chapters.iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![0, 60]);
        assert_eq!(sync.chapters[0].title.as_deref(), Some("Intro"));
    }
}

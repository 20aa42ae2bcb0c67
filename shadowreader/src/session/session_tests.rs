//! Behavioural tests for ReadingSession.

#[cfg(test)]
mod tests {
    use crate::config::{MatcherKind, ReaderConfig};
    use crate::errors::ReaderError;
    use crate::position::{BookIdentity, MemorySettingsStore, PositionStore};
    use crate::session::ReadingSession;
    use crate::source::SiteRegistry;
    use crate::testing::ScriptedSite;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    fn book(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn identity(file: &tempfile::NamedTempFile) -> BookIdentity {
        BookIdentity::new(file.path().to_str().unwrap())
    }

    fn session(store: &Arc<MemorySettingsStore>, config: ReaderConfig) -> ReadingSession {
        session_with_sites(store, config, SiteRegistry::new())
    }

    fn session_with_sites(
        store: &Arc<MemorySettingsStore>,
        config: ReaderConfig,
        sites: SiteRegistry,
    ) -> ReadingSession {
        ReadingSession::new(config, PositionStore::new(store.clone()), sites).unwrap()
    }

    fn novel(latency: Option<Duration>) -> Arc<ScriptedSite> {
        let site = ScriptedSite::new("https://novel.test/")
            .chapter("https://novel.test/1.html", "abcdefg")
            .chapter("https://novel.test/2.html", "hijk");
        Arc::new(match latency {
            Some(latency) => site.with_latency(latency),
            None => site,
        })
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(MemorySettingsStore::new());
        let result = ReadingSession::new(
            ReaderConfig::default().with_page_size(0),
            PositionStore::new(store),
            SiteRegistry::new(),
        );
        assert!(matches!(result, Err(ReaderError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_turn_without_book() {
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());
        assert!(matches!(session.turn_forward(10).await, Err(ReaderError::NoActiveBook)));
        assert!(session.current_identity().await.is_none());
    }

    #[tokio::test]
    async fn test_first_open_persists_initial_record() {
        let file = book("abcdefghij");
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());

        session.open(identity(&file)).await.unwrap();

        assert_eq!(
            store.raw(identity(&file).as_str()),
            Some(json!({"kind": "local", "consumed_offset": 0}))
        );
        assert_eq!(session.current_identity().await, Some(identity(&file)));
    }

    #[tokio::test]
    async fn test_legacy_record_resumes_and_is_rewritten() {
        let content: String = ('a'..='z').cycle().take(60).collect();
        let file = book(&content);
        let store = Arc::new(MemorySettingsStore::new());
        store.insert_raw(identity(&file).as_str(), json!(42));
        let session = session(&store, ReaderConfig::default());

        session.open(identity(&file)).await.unwrap();
        let reading = session.turn_forward(10).await.unwrap();

        assert_eq!(reading.page().text(), &content[42..52]);
        assert_eq!(
            store.raw(identity(&file).as_str()),
            Some(json!({"kind": "local", "consumed_offset": 52}))
        );
    }

    #[tokio::test]
    async fn test_forward_then_backward() {
        let file = book("abcdefghij");
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());
        session.open(identity(&file)).await.unwrap();

        assert_eq!(session.turn_forward(3).await.unwrap().page().text(), "abc");
        assert_eq!(session.turn_forward(3).await.unwrap().page().text(), "def");
        assert_eq!(session.turn_backward(3).await.unwrap().page().text(), "abc");
        assert_eq!(
            store.raw(identity(&file).as_str()),
            Some(json!({"kind": "local", "consumed_offset": 3}))
        );
    }

    #[tokio::test]
    async fn test_end_of_book_hides_display_and_keeps_position() {
        let file = book("abcd");
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());
        session.open(identity(&file)).await.unwrap();

        assert_eq!(session.turn_forward(3).await.unwrap().display_text(), "abc   75.00%");
        assert_eq!(session.turn_forward(3).await.unwrap().display_text(), "d   100.00%");

        let end = session.turn_forward(3).await.unwrap();
        assert!(end.is_end());
        assert_eq!(end.display_text(), "");
        assert_eq!(
            store.raw(identity(&file).as_str()),
            Some(json!({"kind": "local", "consumed_offset": 4}))
        );
    }

    #[tokio::test]
    async fn test_reopen_resumes_from_saved_position() {
        let file = book("abcdefghij");
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());

        session.open(identity(&file)).await.unwrap();
        session.turn_forward(3).await.unwrap();
        session.turn_forward(3).await.unwrap();

        session.open(identity(&file)).await.unwrap();
        assert_eq!(session.turn_forward(3).await.unwrap().page().text(), "ghi");
    }

    #[tokio::test]
    async fn test_search_match_straddling_pages_redisplays_previous_page() {
        let file = book("abcdefghEND more text");
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default().with_page_size(10));
        session.open(identity(&file)).await.unwrap();

        let reading = session.search_forward("END").await.unwrap();

        assert_eq!(reading.display_text(), "abcdefghEN   47.62%");
        assert_eq!(
            store.raw(identity(&file).as_str()),
            Some(json!({"kind": "local", "consumed_offset": 10}))
        );
    }

    #[tokio::test]
    async fn test_search_repeated_prefix_with_prefix_function() {
        let file = book("xxxxxxxxxxaaabyyyyyy");
        let store = Arc::new(MemorySettingsStore::new());
        let config = ReaderConfig::default()
            .with_page_size(10)
            .with_matcher(MatcherKind::PrefixFunction);
        let session = session(&store, config);
        session.open(identity(&file)).await.unwrap();

        let reading = session.search_forward("aab").await.unwrap();

        assert_eq!(reading.display_text(), "aaabyyyyyy   100.00%");
        assert_eq!(
            store.raw(identity(&file).as_str()),
            Some(json!({"kind": "local", "consumed_offset": 20}))
        );
    }

    // The naive matcher misses "aab" in "aaab"; the search ends at the end
    // of the book and the reader is put back where the search started.
    #[tokio::test]
    async fn test_search_repeated_prefix_with_naive_matcher_rewinds() {
        let file = book("xxxxxxxxxxaaabyyyyyy");
        let store = Arc::new(MemorySettingsStore::new());
        let config = ReaderConfig::default()
            .with_page_size(10)
            .with_matcher(MatcherKind::Naive);
        let session = session(&store, config);
        session.open(identity(&file)).await.unwrap();

        let reading = session.search_forward("aab").await.unwrap();

        assert!(reading.is_end());
        assert_eq!(
            store.raw(identity(&file).as_str()),
            Some(json!({"kind": "local", "consumed_offset": 0}))
        );
        assert_eq!(session.turn_forward(10).await.unwrap().page().text(), "xxxxxxxxxx");
    }

    #[tokio::test]
    async fn test_search_rejects_empty_keyword() {
        let file = book("abc");
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());
        session.open(identity(&file)).await.unwrap();

        assert!(matches!(session.search_forward("").await, Err(ReaderError::EmptyKeyword)));
    }

    #[tokio::test]
    async fn test_remote_first_open_resolves_first_section() {
        let site = novel(None);
        let store = Arc::new(MemorySettingsStore::new());
        let session =
            session_with_sites(&store, ReaderConfig::default(), SiteRegistry::new().with_adapter(site));

        session.open("https://novel.test/book/").await.unwrap();
        assert_eq!(
            store.raw("https://novel.test/book/"),
            Some(json!({
                "kind": "remote",
                "consumed_offset": 0,
                "section_locator": "https://novel.test/1.html"
            }))
        );

        assert_eq!(session.turn_forward(5).await.unwrap().page().text(), "abcde");
    }

    #[tokio::test]
    async fn test_unknown_url_is_unsupported_origin() {
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());

        let err = session.open("https://elsewhere.test/book/").await.unwrap_err();
        assert!(matches!(err, ReaderError::UnsupportedOrigin { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_is_not_persisted() {
        let site = novel(None);
        let store = Arc::new(MemorySettingsStore::new());
        let session = session_with_sites(
            &store,
            ReaderConfig::default(),
            SiteRegistry::new().with_adapter(site.clone()),
        );
        session.open("https://novel.test/book/").await.unwrap();
        session.turn_forward(7).await.unwrap();
        let saved = store.raw("https://novel.test/book/");

        site.fail_next("https://novel.test/2.html", 1);
        let err = session.turn_forward(7).await.unwrap_err();

        assert!(matches!(err, ReaderError::Network(_)));
        assert_eq!(store.raw("https://novel.test/book/"), saved);
        assert_eq!(session.turn_forward(7).await.unwrap().page().text(), "hijk");
    }

    #[tokio::test]
    async fn test_open_cancels_in_flight_fetch() {
        let site = novel(Some(Duration::from_secs(30)));
        let store = Arc::new(MemorySettingsStore::new());
        let session = Arc::new(session_with_sites(
            &store,
            ReaderConfig::default(),
            SiteRegistry::new().with_adapter(site),
        ));
        session.open("https://novel.test/book/").await.unwrap();
        let before = store.raw("https://novel.test/book/");

        let turning = {
            let session = session.clone();
            tokio::spawn(async move { session.turn_forward(3).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let file = book("local text");
        session.open(identity(&file)).await.unwrap();

        let result = turning.await.unwrap();
        assert!(matches!(result, Err(ReaderError::Cancelled(_))));
        assert_eq!(store.raw("https://novel.test/book/"), before);
        assert_eq!(session.current_identity().await, Some(identity(&file)));
    }

    #[tokio::test]
    async fn test_try_turn_is_busy_while_turn_in_flight() {
        let site = novel(Some(Duration::from_millis(200)));
        let store = Arc::new(MemorySettingsStore::new());
        let session = Arc::new(session_with_sites(
            &store,
            ReaderConfig::default(),
            SiteRegistry::new().with_adapter(site),
        ));
        session.open("https://novel.test/book/").await.unwrap();

        let turning = {
            let session = session.clone();
            tokio::spawn(async move { session.turn_forward(3).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(session.try_turn_forward(3).await, Err(ReaderError::Busy)));
        assert_eq!(turning.await.unwrap().unwrap().page().text(), "abc");
    }

    #[tokio::test]
    async fn test_concurrent_turns_queue_in_order() {
        let site = novel(Some(Duration::from_millis(10)));
        let store = Arc::new(MemorySettingsStore::new());
        let session = session_with_sites(
            &store,
            ReaderConfig::default(),
            SiteRegistry::new().with_adapter(site.clone()),
        );
        session.open("https://novel.test/book/").await.unwrap();

        let (first, second) = futures::join!(session.turn_forward(3), session.turn_forward(3));

        assert_eq!(first.unwrap().page().text(), "abc");
        assert_eq!(second.unwrap().page().text(), "def");
        assert_eq!(site.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_close_twice_then_open_another_book() {
        let first = book("first book");
        let second = book("second book");
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default());

        session.open(identity(&first)).await.unwrap();
        session.close().await;
        session.close().await;
        assert!(session.current_identity().await.is_none());

        session.open(identity(&second)).await.unwrap();
        assert_eq!(session.turn_forward(6).await.unwrap().page().text(), "second");
        assert!(session.percent().await.is_some());
    }

    fn chapters(pairs: &[(&str, &str)]) -> Arc<ScriptedSite> {
        let site = pairs
            .iter()
            .fold(ScriptedSite::new("https://novel.test/"), |site, (locator, text)| {
                site.chapter(*locator, *text)
            });
        Arc::new(site)
    }

    #[tokio::test]
    async fn test_search_without_match_keeps_remote_progress() {
        let site = chapters(&[
            ("https://novel.test/1.html", "abcdefgh"),
            ("https://novel.test/2.html", "ijklmnop"),
            ("https://novel.test/3.html", "qrstuvwx"),
        ]);
        let store = Arc::new(MemorySettingsStore::new());
        let mut config = ReaderConfig::default().with_page_size(4);
        config.remote.estimated_section_count = 3;
        let session = session_with_sites(&store, config, SiteRegistry::new().with_adapter(site));
        session.open("https://novel.test/book/").await.unwrap();

        for _ in 0..3 {
            session.turn_forward(4).await.unwrap();
        }
        let before = session.percent().await.unwrap();
        assert!((before - 50.0).abs() < 1e-9);

        let reading = session.search_forward("zzz").await.unwrap();
        assert!(reading.is_end());
        assert!((reading.percent() - before).abs() < 1e-9);

        let next = session.turn_forward(4).await.unwrap();
        assert_eq!(next.page().text(), "mnop");
        assert!(next.percent() >= before, "{} < {before}", next.percent());
    }

    #[tokio::test]
    async fn test_remote_match_straddling_chapters_redisplays_chapter_end() {
        let site = chapters(&[
            ("https://novel.test/1.html", "abcdefEN"),
            ("https://novel.test/2.html", "D more!!"),
        ]);
        let store = Arc::new(MemorySettingsStore::new());
        let session = session_with_sites(
            &store,
            ReaderConfig::default().with_page_size(4),
            SiteRegistry::new().with_adapter(site),
        );
        session.open("https://novel.test/book/").await.unwrap();

        let reading = session.search_forward("END").await.unwrap();

        assert_eq!(reading.page().text(), "efEN");
        assert_eq!(
            store.raw("https://novel.test/book/"),
            Some(json!({
                "kind": "remote",
                "consumed_offset": 8,
                "section_locator": "https://novel.test/1.html"
            }))
        );
    }

    #[tokio::test]
    async fn test_network_failure_during_search_rewinds() {
        let site = chapters(&[
            ("https://novel.test/1.html", "abcdefgh"),
            ("https://novel.test/2.html", "ijklmnop"),
            ("https://novel.test/3.html", "qrstuvwx"),
        ]);
        let store = Arc::new(MemorySettingsStore::new());
        let session = session_with_sites(
            &store,
            ReaderConfig::default().with_page_size(4),
            SiteRegistry::new().with_adapter(site.clone()),
        );
        session.open("https://novel.test/book/").await.unwrap();
        assert_eq!(session.turn_forward(4).await.unwrap().page().text(), "abcd");
        let saved = store.raw("https://novel.test/book/");

        site.fail_next("https://novel.test/3.html", 1);
        let err = session.search_forward("zzz").await.unwrap_err();

        assert!(matches!(err, ReaderError::Network(_)));
        assert_eq!(store.raw("https://novel.test/book/"), saved);
        assert_eq!(session.turn_forward(4).await.unwrap().page().text(), "efgh");
    }

    // The rewind stays in memory, so it survives the file going away.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_search_rewind_survives_removed_file() {
        let file = book("abcdefghij");
        let id = identity(&file);
        let store = Arc::new(MemorySettingsStore::new());
        let session = session(&store, ReaderConfig::default().with_page_size(3));
        session.open(id.clone()).await.unwrap();
        session.turn_forward(3).await.unwrap();
        file.close().unwrap();

        let reading = session.search_forward("zzz").await.unwrap();

        assert!(reading.is_end());
        assert_eq!(session.turn_forward(3).await.unwrap().page().text(), "def");
        assert_eq!(
            store.raw(id.as_str()),
            Some(json!({"kind": "local", "consumed_offset": 6}))
        );
    }
}

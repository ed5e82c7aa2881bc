use crate::common::{create_test_config, threads_body, translation_body, videos_body};
use tempfile::TempDir;
use tube_harvest::batch::NoopObserver;
use tube_harvest::client::{MessageOptions, SearchQuery};
use tube_harvest::history::SearchKind;
use tube_harvest::model::VideoStatus;
use tube_harvest::storage::RunStatus;
use tube_harvest::{FetchError, HarvestError, Session};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOD: &str = "dQw4w9WgXcQ";
const GONE: &str = "jNQXAC9IVRw";

async fn mount_videos(server: &MockServer, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(videos_body(ids)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_collect_translate_and_push() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    mount_videos(&server, &[GOOD, GONE]).await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", GOOD))
        .respond_with(ResponseTemplate::new(200).set_body_json(threads_body(GOOD)))
        .expect(1)
        .mount(&server)
        .await;

    // Comments disabled on this video; retried once, then recorded as failed
    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", GONE))
        .respond_with(ResponseTemplate::new(404).set_body_string("commentsDisabled"))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("langpair", "en|zh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translation_body("很好")))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "code": 0 })))
        .expect(3)
        .mount(&server)
        .await;

    let mut session = Session::open(config.clone()).expect("Failed to open session");

    let added = session
        .add_videos(&[
            format!("https://www.youtube.com/watch?v={}", GOOD),
            GONE.to_string(),
        ])
        .await
        .expect("add failed");
    assert_eq!(added.len(), 2);
    assert_eq!(session.history().searches()[0].kind, SearchKind::Url);

    // Comment collection
    let summary = session
        .collect_comments(&[], &NoopObserver)
        .await
        .expect("collection failed");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
    assert!(matches!(
        summary.results[GONE].error(),
        Some(FetchError::Http { status: 404, .. })
    ));

    assert_eq!(session.video(GOOD).unwrap().status, VideoStatus::Completed);
    assert_eq!(session.video(GONE).unwrap().status, VideoStatus::Failed);
    assert_eq!(session.comments(GOOD).unwrap().len(), 2);
    assert!(session.comments(GONE).is_none());

    let usage = session.usage();
    assert_eq!(usage.api.daily_requests, 4);
    assert_eq!(usage.remaining_quota, usage.daily_quota - 4);

    // Translation of collected comments
    let summary = session
        .translate_comments(&[], None, &NoopObserver)
        .await
        .expect("translation failed");
    assert_eq!(summary.total, 1);
    assert_eq!(summary.successful, 1);
    let comments = session.comments(GOOD).unwrap();
    assert!(comments.iter().all(|c| c.is_translated_to("zh")));
    assert_eq!(
        comments[0].translation.as_ref().unwrap().translated_text,
        "很好"
    );

    // Two video messages and a summary
    let report = session
        .push_videos(&[], &MessageOptions::default(), true)
        .await
        .expect("push failed");
    assert_eq!(report.successful, 2);
    assert!(report.summary_sent);

    let runs = session.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == RunStatus::Completed));

    let analytics = session.report();
    assert_eq!(analytics.overview.total_videos, 2);
    assert_eq!(analytics.comments.total_comments, 2);
    assert_eq!(analytics.comments.replies, 1);

    // Everything survives a reopen
    drop(session);
    let reopened = Session::open(config).expect("Failed to reopen session");
    assert_eq!(reopened.videos().len(), 2);
    assert!(reopened.comments(GOOD).unwrap()[1].is_translated_to("zh"));
    assert_eq!(reopened.usage().api.daily_requests, 4);
    assert!(!reopened.history().actions().is_empty());
}

#[tokio::test]
async fn test_aborted_collection_keeps_finished_videos() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, &server.uri());
    config.batch.continue_on_error = false;

    mount_videos(&server, &[GOOD, GONE]).await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", GOOD))
        .respond_with(ResponseTemplate::new(200).set_body_json(threads_body(GOOD)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", GONE))
        .respond_with(ResponseTemplate::new(404).set_body_string("commentsDisabled"))
        .expect(2)
        .mount(&server)
        .await;

    let mut session = Session::open(config.clone()).unwrap();
    session
        .add_videos(&[GOOD.to_string(), GONE.to_string()])
        .await
        .unwrap();

    let result = session
        .collect_comments(&[GOOD.to_string(), GONE.to_string()], &NoopObserver)
        .await;

    match result {
        Err(HarvestError::BatchAborted { item, counts, .. }) => {
            assert_eq!(item, GONE);
            assert_eq!(counts.processed, 2);
            assert_eq!(counts.successful, 1);
            assert_eq!(counts.failed, 1);
        }
        other => panic!("expected abort, got {:?}", other.map(|s| s.processed)),
    }

    // The video finished before the abort matches its cached comments
    assert_eq!(session.video(GOOD).unwrap().status, VideoStatus::Completed);
    assert_eq!(session.video(GONE).unwrap().status, VideoStatus::Failed);
    assert!(session.comments(GOOD).is_some());

    let runs = session.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].total, 2);
    assert_eq!(runs[0].processed, 2);
    assert_eq!(runs[0].successful, 1);
    assert_eq!(runs[0].failed, 1);
    assert!(runs[0].error_message.as_deref().unwrap().contains(GONE));

    drop(session);
    let reopened = Session::open(config).unwrap();
    assert_eq!(reopened.video(GOOD).unwrap().status, VideoStatus::Completed);
}

#[tokio::test]
async fn test_search_records_history_and_quota() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .and(query_param("order", "viewCount"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": { "videoId": GOOD } },
                { "id": { "videoId": GONE } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_videos(&server, &[GOOD, GONE]).await;

    let mut session = Session::open(config).unwrap();
    let mut query = SearchQuery::new("never gonna", 2);
    query.order = "viewCount".parse().unwrap();

    let videos = session.search_videos(&query).await.expect("search failed");
    assert_eq!(videos.len(), 2);
    assert_eq!(session.track_videos(videos).unwrap(), 2);

    let entry = &session.history().searches()[0];
    assert_eq!(entry.query, "never gonna");
    assert_eq!(entry.results, 2);
    assert_eq!(entry.kind, SearchKind::Keyword);
    assert_eq!(session.history().suggestions("never", 5), vec!["never gonna"]);

    // One search (100 units) and one details call (1 unit)
    assert_eq!(session.usage().api.quota_used, 101);
}

#[tokio::test]
async fn test_search_quota_exhausted() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(r#"{"error":{"errors":[{"reason":"dailyLimitExceeded"}]}}"#),
        )
        .mount(&server)
        .await;

    let mut session = Session::open(config).unwrap();
    let result = session.search_videos(&SearchQuery::new("rust", 5)).await;

    assert!(matches!(
        result,
        Err(HarvestError::Fetch(FetchError::QuotaExceeded(_)))
    ));
    assert!(session.history().searches().is_empty());
}

#[tokio::test]
async fn test_skip_existing_uses_cached_comments() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, &server.uri());
    config.batch.skip_existing = true;

    mount_videos(&server, &[GOOD]).await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(threads_body(GOOD)))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::open(config).unwrap();
    session.add_videos(&[GOOD.to_string()]).await.unwrap();

    let first = session.collect_comments(&[], &NoopObserver).await.unwrap();
    assert_eq!(first.successful, 1);

    let second = session
        .collect_comments(&[GOOD.to_string()], &NoopObserver)
        .await
        .unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(second.successful, 0);
    assert!(second.results[GOOD].is_skipped());
}

#[tokio::test]
async fn test_invalid_video_input_is_rejected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    let mut session = Session::open(config).unwrap();
    let result = session
        .add_videos(&["https://example.com/not-a-video".to_string()])
        .await;

    assert!(matches!(result, Err(HarvestError::Validation(_))));
    assert!(session.videos().is_empty());
}

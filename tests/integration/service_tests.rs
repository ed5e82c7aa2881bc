use crate::common::{create_test_config, threads_body, translation_body, videos_body, API_KEY};
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;
use tube_harvest::cache::{text_fingerprint, ResultCache};
use tube_harvest::client::{
    build_http_client, split_text, MessageOptions, SearchQuery, TranslationService,
    WebhookClient, YoutubeClient,
};
use tube_harvest::model::{Translation, Video, VideoStatus};
use tube_harvest::state::QuotaLedger;
use tube_harvest::FetchError;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn video(id: &str) -> Video {
    Video {
        id: id.to_string(),
        title: format!("Video {}", id),
        channel: "Rustaceans".to_string(),
        channel_id: "UCrust".to_string(),
        thumbnail: None,
        description: String::new(),
        published_at: Utc::now(),
        duration: "PT3M".to_string(),
        views: 1500,
        likes: 20,
        comments: 4,
        url: Video::watch_url(id),
        status: VideoStatus::Completed,
        added_at: Utc::now(),
    }
}

fn translator(
    dir: &TempDir,
    uri: &str,
    max_text_length: usize,
) -> (TranslationService, Arc<ResultCache<Translation>>) {
    let mut config = create_test_config(dir, uri);
    config.translation.max_text_length = max_text_length;
    let cache = Arc::new(ResultCache::in_memory(1000, 800));
    let service = TranslationService::new(
        build_http_client(None).expect("Failed to build client"),
        &config.translation,
        cache.clone(),
    );
    (service, cache)
}

#[tokio::test]
async fn test_search_follows_pages_and_keeps_order() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .and(query_param("pageToken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [ { "id": { "videoId": "ccc" } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .and(query_param("q", "rust async"))
        .and(query_param("key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": { "videoId": "aaa" } },
                { "id": { "kind": "youtube#channel" } },
                { "id": { "videoId": "bbb" } }
            ],
            "nextPageToken": "page2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Details come back in a different order than the search
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .and(query_param("id", "aaa,bbb,ccc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(videos_body(&["ccc", "aaa", "bbb"])))
        .expect(1)
        .mount(&server)
        .await;

    let client = YoutubeClient::new(
        build_http_client(None).unwrap(),
        &config.youtube,
        API_KEY,
    );
    let videos = client
        .search(&SearchQuery::new("rust async", 3))
        .await
        .expect("search failed");

    let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["aaa", "bbb", "ccc"]);
    assert_eq!(videos[2].views, 1000);
    assert_eq!(videos[0].likes, 50);
    assert_eq!(videos[0].duration, "PT4M13S");
    assert_eq!(videos[0].channel, "Rustaceans");
    assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=aaa");
}

#[tokio::test]
async fn test_fetch_comments_flattens_replies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", "vid"))
        .and(query_param("maxResults", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(threads_body("vid")))
        .mount(&server)
        .await;

    let client = YoutubeClient::new(build_http_client(None).unwrap(), &config.youtube, API_KEY);
    let comments = client.fetch_comments("vid", 20).await.expect("fetch failed");

    assert_eq!(comments.len(), 2);
    assert!(!comments[0].is_reply);
    assert_eq!(comments[0].author, "alice");
    assert_eq!(comments[0].likes, 7);
    assert_eq!(comments[0].reply_count, 1);
    assert!(comments[1].is_reply);
    assert_eq!(comments[1].parent_id.as_deref(), Some("vid-t1"));
    assert_eq!(comments[1].video_id, "vid");
}

#[tokio::test]
async fn test_quota_error_is_not_retryable() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {
                "code": 403,
                "message": "The request cannot be completed because you have exceeded your quota.",
                "errors": [ { "reason": "quotaExceeded" } ]
            }
        })))
        .mount(&server)
        .await;

    let client = YoutubeClient::new(build_http_client(None).unwrap(), &config.youtube, API_KEY);
    let err = client
        .search(&SearchQuery::new("rust", 5))
        .await
        .expect_err("search should fail");

    assert!(matches!(err, FetchError::QuotaExceeded(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_rate_limit_error_is_retryable() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {
                "code": 403,
                "message": "The request was throttled.",
                "errors": [ { "reason": "rateLimitExceeded" } ]
            }
        })))
        .mount(&server)
        .await;

    let client = YoutubeClient::new(build_http_client(None).unwrap(), &config.youtube, API_KEY);
    let err = client
        .search(&SearchQuery::new("rust", 5))
        .await
        .expect_err("search should fail");

    assert!(matches!(err, FetchError::Http { status: 403, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_exhausted_ledger_blocks_requests() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = YoutubeClient::new(build_http_client(None).unwrap(), &config.youtube, API_KEY)
        .with_quota(Arc::new(QuotaLedger::new(50)));
    let err = client
        .search(&SearchQuery::new("rust", 5))
        .await
        .expect_err("search should be refused");

    assert!(matches!(err, FetchError::QuotaExceeded(_)));
}

#[tokio::test]
async fn test_translation_served_from_cache() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translation_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let (service, cache) = translator(&dir, &server.uri(), 500);
    cache.store(
        &text_fingerprint("Hello world", "en", "zh"),
        Translation {
            original_text: "Hello world".to_string(),
            translated_text: "你好世界".to_string(),
            source_lang: "en".to_string(),
            target_lang: "zh".to_string(),
            confidence: 1.0,
            provider: "MyMemory".to_string(),
            timestamp: Utc::now(),
            segments: None,
        },
    );

    let result = service
        .translate_text("  Hello world ", "zh", "en")
        .await
        .expect("translation failed");

    assert_eq!(result.translated_text, "你好世界");
    assert_eq!(service.stats().cached, 1);
    assert_eq!(service.stats().total_translations, 0);
}

#[tokio::test]
async fn test_translation_is_cached_after_first_call() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("q", "Good morning"))
        .and(query_param("langpair", "en|ja"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translation_body("おはよう")))
        .expect(1)
        .mount(&server)
        .await;

    let (service, _) = translator(&dir, &server.uri(), 500);
    let first = service.translate_text("Good morning", "ja", "en").await.unwrap();
    let second = service.translate_text("Good morning", "ja", "en").await.unwrap();

    assert_eq!(first.translated_text, "おはよう");
    assert_eq!(first.provider, "MyMemory");
    assert!((first.confidence - 0.98).abs() < 1e-9);
    assert_eq!(second.translated_text, first.translated_text);
    assert!(service.is_cached("Good morning", "ja", "en"));

    let stats = service.stats();
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.cached, 1);
}

#[tokio::test]
async fn test_long_text_is_translated_in_segments() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translation_body("[x]")))
        .mount(&server)
        .await;

    let text = "Ownership is great. Borrowing is better. Lifetimes take a while to learn.";
    let expected = split_text(text, 20).len();
    assert!(expected > 1);

    let (service, _) = translator(&dir, &server.uri(), 20);
    let result = service.translate_text(text, "zh", "en").await.unwrap();

    assert_eq!(result.segments, Some(expected));
    assert_eq!(result.translated_text, "[x]".repeat(expected));
    assert_eq!(result.original_text, text);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), expected);

    // The combined result is cached under the full text
    assert!(service.is_cached(text, "zh", "en"));
}

#[tokio::test]
async fn test_failed_segment_keeps_original_text() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let text = "Ownership is great. Borrowing is better. Lifetimes take a while to learn.";
    let segments = split_text(text, 20);
    assert!(segments.len() > 2);

    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("q", segments[1]))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translation_body("[x]")))
        .mount(&server)
        .await;

    let (service, _) = translator(&dir, &server.uri(), 20);
    let result = service
        .translate_text(text, "zh", "en")
        .await
        .expect("one failed segment should not fail the text");

    let expected: String = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| if i == 1 { segment.to_string() } else { "[x]".to_string() })
        .collect();
    assert_eq!(result.translated_text, expected);
    assert!(result.translated_text.contains(segments[1]));
    assert_eq!(result.segments, Some(segments.len()));

    // Translated pieces are reused later; the degraded whole is not
    assert!(service.is_cached(segments[0], "zh", "en"));
    assert!(!service.is_cached(text, "zh", "en"));
    assert_eq!(service.stats().successful, 1);
}

#[tokio::test]
async fn test_translation_provider_errors() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("langpair", "en|xx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responseData": { "translatedText": "" },
            "responseStatus": "403",
            "responseDetails": "INVALID TARGET LANGUAGE"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("langpair", "en|de"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responseData": null,
            "responseStatus": 429,
            "responseDetails": "MYMEMORY WARNING: YOU USED ALL AVAILABLE FREE TRANSLATIONS FOR TODAY"
        })))
        .mount(&server)
        .await;

    let (service, _) = translator(&dir, &server.uri(), 500);

    let err = service.translate_text("Hello", "xx", "en").await.unwrap_err();
    assert_eq!(err, FetchError::Api("INVALID TARGET LANGUAGE".to_string()));

    let err = service.translate_text("Hello", "de", "en").await.unwrap_err();
    assert!(matches!(err, FetchError::QuotaExceeded(_)));

    let err = service.translate_text("   ", "de", "en").await.unwrap_err();
    assert!(matches!(err, FetchError::Validation(_)));

    assert_eq!(service.stats().failed, 2);
}

#[tokio::test]
async fn test_webhook_accepts_code_zero() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "msg_type": "text",
            "content": { "text": "hello" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "msg": "success"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hook = WebhookClient::from_config(build_http_client(None).unwrap(), &config.webhook)
        .expect("webhook should be valid");
    hook.send_text("hello").await.expect("push failed");

    let stats = hook.stats();
    assert_eq!(stats.total_sent, 1);
    assert_eq!(stats.successful, 1);
    assert!(stats.last_sent_time.is_some());
}

#[tokio::test]
async fn test_webhook_rejects_nonzero_code() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 19001,
            "msg": "param invalid: incoming webhook access token invalid"
        })))
        .mount(&server)
        .await;

    let hook = WebhookClient::from_config(build_http_client(None).unwrap(), &config.webhook).unwrap();
    let err = hook.send_text("hello").await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Api("param invalid: incoming webhook access token invalid".to_string())
    );
    assert_eq!(hook.stats().failed, 1);
}

#[tokio::test]
async fn test_webhook_batch_sends_summary() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &server.uri());

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "code": 0 })))
        .expect(3)
        .mount(&server)
        .await;

    let hook = WebhookClient::from_config(build_http_client(None).unwrap(), &config.webhook).unwrap();
    let items = vec![(video("a"), Vec::new()), (video("b"), Vec::new())];
    let mut progress = Vec::new();

    let report = hook
        .send_batch(&items, &MessageOptions::default(), true, |p| {
            progress.push(p.percentage)
        })
        .await;

    assert_eq!(report.total, 2);
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 0);
    assert!(report.summary_sent);
    assert_eq!(progress, vec![50, 100]);
}

#[test]
fn test_webhook_host_must_be_allowed() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, "http://127.0.0.1:9");
    config.webhook.allowed_hosts = vec!["open.feishu.cn".to_string()];

    let result = WebhookClient::new(
        build_http_client(None).unwrap(),
        "http://127.0.0.1:9/hook",
        &config.webhook,
    );
    assert!(matches!(result, Err(FetchError::Validation(_))));

    let ok = WebhookClient::new(
        build_http_client(None).unwrap(),
        "https://open.feishu.cn/open-apis/bot/v2/hook/abc",
        &config.webhook,
    );
    assert!(ok.is_ok());
}

//! Reddit and Pushbullet clients against local mock servers.

use futures_util::{StreamExt, TryStreamExt};
use serde_json::json;
use std::time::Duration;
use subreddit_alert::config::{FilterConfig, PushbulletConfig, RedditConfig};
use subreddit_alert::engine::{PostFilter, Scanner};
use subreddit_alert::feed::auth::RedditAuth;
use subreddit_alert::feed::reddit::RedditFeed;
use subreddit_alert::feed::FeedSource;
use subreddit_alert::notify::pushbullet::PushbulletNotifier;
use subreddit_alert::notify::Notifier;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn reddit_config(server: &MockServer, max_pages: u32) -> RedditConfig {
    RedditConfig {
        auth_base: server.uri(),
        api_base: server.uri(),
        user_agent: "subreddit-alert-tests".to_string(),
        page_size: 2,
        max_pages,
    }
}

fn reddit_feed(server: &MockServer, max_pages: u32) -> RedditFeed {
    let config = reddit_config(server, max_pages);
    let auth = RedditAuth::new("client-id".to_string(), "client-secret".to_string(), &config);
    RedditFeed::new(auth, &config, TIMEOUT).unwrap()
}

fn submission(title: &str, created_utc: f64, flair: Option<&str>) -> serde_json::Value {
    json!({
        "kind": "t3",
        "data": {
            "title": title,
            "url": format!("https://deals.test/{}", created_utc as i64),
            "permalink": "/r/test/comments/x/",
            "link_flair_text": flair,
            "created_utc": created_utc
        }
    })
}

fn listing(after: Option<&str>, children: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "kind": "Listing", "data": { "after": after, "children": children } })
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    mount_token_expiring(server, 3600, expected_calls).await;
}

async fn mount_token_expiring(server: &MockServer, expires_in: u64, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(header("user-agent", "subreddit-alert-tests"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "bearer",
            "expires_in": expires_in
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_two_pages(server: &MockServer, second_page_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/r/test/new"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("after"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            Some("t3_second"),
            vec![
                submission("Samsung 990 Pro NVMe", 1_700_000_300.0, Some("SSD")),
                submission("RTX 4070 Super", 1_700_000_200.0, Some("GPU")),
            ],
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/test/new"))
        .and(query_param("after", "t3_second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            None,
            vec![submission("Crucial P3 NVMe", 1_700_000_100.0, None)],
        )))
        .expect(second_page_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_feed_follows_pagination() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_two_pages(&server, 1).await;

    let feed = reddit_feed(&server, 10);
    let posts: Vec<_> = feed.fetch_newest("test").try_collect().await.unwrap();

    let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Samsung 990 Pro NVMe", "RTX 4070 Super", "Crucial P3 NVMe"]);
    assert_eq!(posts[0].flair.as_deref(), Some("SSD"));
    assert_eq!(posts[2].flair, None);
    assert_eq!(posts[0].created_at.timestamp(), 1_700_000_300);
}

#[tokio::test]
async fn test_feed_is_lazy() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_two_pages(&server, 0).await;

    let feed = reddit_feed(&server, 10);
    let first: Vec<_> = feed.fetch_newest("test").take(2).collect().await;

    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|p| p.is_ok()));
}

#[tokio::test]
async fn test_feed_respects_max_pages() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_two_pages(&server, 0).await;

    let feed = reddit_feed(&server, 1);
    let posts: Vec<_> = feed.fetch_newest("test").try_collect().await.unwrap();

    assert_eq!(posts.len(), 2);
}

#[tokio::test]
async fn test_token_is_cached_across_reads() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_two_pages(&server, 2).await;

    let feed = reddit_feed(&server, 10);
    for _ in 0..2 {
        let posts: Vec<_> = feed.fetch_newest("test").try_collect().await.unwrap();
        assert_eq!(posts.len(), 3);
    }
}

#[tokio::test]
async fn test_rejected_token_is_exchanged_again() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/r/test/new"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_two_pages(&server, 1).await;

    let feed = reddit_feed(&server, 10);
    let err = feed
        .fetch_newest("test")
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("401"));

    let posts: Vec<_> = feed.fetch_newest("test").try_collect().await.unwrap();
    assert_eq!(posts.len(), 3);
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed_every_read() {
    let server = MockServer::start().await;
    // Shorter than the refresh margin, so it is stale as soon as it arrives
    mount_token_expiring(&server, 30, 3).await;
    mount_two_pages(&server, 0).await;

    let feed = reddit_feed(&server, 1);
    for _ in 0..3 {
        let posts: Vec<_> = feed.fetch_newest("test").try_collect().await.unwrap();
        assert_eq!(posts.len(), 2);
    }
}

#[tokio::test]
async fn test_subreddit_is_percent_encoded() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/r/bad%2Fname%3Fx/new"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(None, vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let feed = reddit_feed(&server, 10);
    let posts: Vec<_> = feed.fetch_newest("bad/name?x").try_collect().await.unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn test_feed_error_status_surfaces() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/r/test/new"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .mount(&server)
        .await;

    let feed = reddit_feed(&server, 10);
    let err = feed
        .fetch_newest("test")
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    let msg = format!("{:#}", err);
    assert!(msg.contains("503"), "{msg}");
    assert!(msg.contains("upstream overloaded"), "{msg}");
}

#[tokio::test]
async fn test_token_rejection_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let feed = reddit_feed(&server, 10);
    let first = feed.fetch_newest("test").next().await.unwrap();

    let msg = format!("{:#}", first.unwrap_err());
    assert!(msg.contains("token exchange failed"), "{msg}");
}

#[tokio::test]
async fn test_pushbullet_sends_note() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/pushes"))
        .and(header("access-token", "o.secret"))
        .and(body_json(json!({
            "type": "note",
            "title": "Samsung 990 Pro NVMe",
            "body": "https://deals.test/1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"active": true})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = PushbulletNotifier::new(
        "o.secret".to_string(),
        &PushbulletConfig { api_base: server.uri() },
        TIMEOUT,
    )
    .unwrap();

    notifier
        .send("Samsung 990 Pro NVMe", "https://deals.test/1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_pushbullet_error_status_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/pushes"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid access token"))
        .mount(&server)
        .await;

    let notifier = PushbulletNotifier::new(
        "o.bad".to_string(),
        &PushbulletConfig { api_base: server.uri() },
        TIMEOUT,
    )
    .unwrap();

    let err = notifier.send("t", "u").await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_scanner_end_to_end_seed() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_two_pages(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/v2/pushes"))
        .and(body_json(json!({
            "type": "note",
            "title": "Samsung 990 Pro NVMe",
            "body": "https://deals.test/1700000300"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let filter = PostFilter::new(&FilterConfig {
        terms: vec!["nvme".to_string()],
        regex: None,
        flairs: None,
    })
    .unwrap();
    let notifier = PushbulletNotifier::new(
        "o.secret".to_string(),
        &PushbulletConfig { api_base: server.uri() },
        TIMEOUT,
    )
    .unwrap();
    let mut scanner = Scanner::new(
        "test",
        filter,
        Box::new(reddit_feed(&server, 10)),
        Box::new(notifier),
    );

    let notified = scanner.scan().await.unwrap();

    assert_eq!(notified.len(), 1);
    assert_eq!(scanner.watermark().timestamp(), 1_700_000_300);
}

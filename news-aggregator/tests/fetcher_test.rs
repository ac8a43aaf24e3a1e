mod common;

use common::{init_tracing, rss_fixture};
use news_aggregator::{FeedParser, ProxyChainFetcher, ProxyRoute};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET: &str = "https://feeds.example.com/world.xml";

fn route(server: &MockServer, name: &str) -> ProxyRoute {
    ProxyRoute::text(name, &format!("{}/{}?quest={{url}}", server.uri(), name))
}

#[tokio::test]
async fn fails_over_through_timeout_and_error_to_first_valid_route() {
    init_tracing();
    let server = MockServer::start().await;
    let feed = rss_fixture(&[("Monsoon arrives early", "https://news.example/m1")]);

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(feed.clone())
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unused"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let routes = vec![
        route(&server, "slow"),
        route(&server, "broken"),
        route(&server, "good"),
        route(&server, "unused"),
    ];

    let fetcher = ProxyChainFetcher::new("test-agent").unwrap();
    let records = fetcher
        .fetch(TARGET, &routes, Duration::from_millis(300), FeedParser::accept_feed)
        .await
        .expect("third route should succeed");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title.as_deref(), Some("Monsoon arrives early"));
    server.verify().await;
}

#[tokio::test]
async fn unwraps_json_wrapped_bodies() {
    let server = MockServer::start().await;
    let feed = rss_fixture(&[("Wrapped story", "https://news.example/w1")]);

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "contents": feed })))
        .mount(&server)
        .await;

    let routes = vec![ProxyRoute::json_wrapped(
        "allorigins",
        &format!("{}/get?url={{url}}", server.uri()),
        "contents",
    )];

    let fetcher = ProxyChainFetcher::new("test-agent").unwrap();
    let records = fetcher
        .fetch(TARGET, &routes, Duration::from_secs(1), FeedParser::accept_feed)
        .await
        .expect("wrapped body should be accepted");
    assert_eq!(records[0].link.as_deref(), Some("https://news.example/w1"));
}

#[tokio::test]
async fn rejected_bodies_and_missing_fields_move_to_next_route() {
    let server = MockServer::start().await;
    let feed = rss_fixture(&[("Third time lucky", "https://news.example/t1")]);

    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Rate limited</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nofield"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&server)
        .await;

    let routes = vec![
        route(&server, "html"),
        ProxyRoute::json_wrapped("nofield", &format!("{}/nofield?url={{url}}", server.uri()), "contents"),
        route(&server, "ok"),
    ];

    let fetcher = ProxyChainFetcher::new("test-agent").unwrap();
    let records = fetcher
        .fetch(TARGET, &routes, Duration::from_secs(1), FeedParser::accept_feed)
        .await;
    assert_eq!(records.map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn exhausted_chain_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let routes = vec![route(&server, "a"), route(&server, "b")];
    let fetcher = ProxyChainFetcher::new("test-agent").unwrap();
    let records = fetcher
        .fetch(TARGET, &routes, Duration::from_secs(1), FeedParser::accept_feed)
        .await;
    assert!(records.is_none());
}

#[tokio::test]
async fn cache_busted_route_appends_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/studio"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<div class=\"tgme_widget_message\"></div>"))
        .expect(1)
        .mount(&server)
        .await;

    let target = format!("{}/s/studio", server.uri());
    let routes = vec![ProxyRoute::text("direct", "{raw_url}").with_cache_bust()];
    let fetcher = ProxyChainFetcher::new("test-agent").unwrap();
    let page = fetcher
        .fetch(&target, &routes, Duration::from_secs(1), news_aggregator::ChannelPageParser::accept_page)
        .await;
    assert!(page.is_some());

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].url.query().unwrap_or_default().starts_with("t="));
}

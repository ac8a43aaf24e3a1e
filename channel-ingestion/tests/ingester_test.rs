mod common;

use channel_ingestion::{ChannelIngester, IngestionError, Update};
use common::{bot_ok, init_tracing, test_api, InMemoryArchive, TEST_TOKEN};
use interfaces::ArchiveMediaType;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT: i64 = -1001234567890;

fn method_path(name: &str) -> String {
    format!("/bot{}/{}", TEST_TOKEN, name)
}

fn update(json: serde_json::Value) -> Update {
    serde_json::from_value(json).unwrap()
}

fn ingester(server: &MockServer, archive: Arc<InMemoryArchive>) -> ChannelIngester {
    ChannelIngester::new(test_api(&server.uri()), archive)
}

async fn mount_file(server: &MockServer, file_id: &str, file_path: &str) {
    Mock::given(method("GET"))
        .and(path(method_path("getFile")))
        .and(query_param("file_id", file_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(bot_ok(json!({
            "file_id": file_id,
            "file_path": file_path
        }))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn archives_largest_photo_with_caption() {
    init_tracing();
    let server = MockServer::start().await;
    mount_file(&server, "big", "photos/file_42.jpg").await;

    let archive = Arc::new(InMemoryArchive::new());
    let ingester = ingester(&server, archive.clone());

    let record = ingester
        .handle_update(&update(json!({
            "update_id": 1,
            "channel_post": {
                "message_id": 42,
                "chat": { "id": CHAT },
                "caption": "On set today",
                "photo": [
                    { "file_id": "thumb", "width": 90, "height": 60 },
                    { "file_id": "big", "width": 1280, "height": 853 },
                    { "file_id": "mid", "width": 320, "height": 213 }
                ]
            }
        })))
        .await
        .unwrap()
        .expect("channel post should be archived");

    let expected_url = format!("{}/file/bot{}/photos/file_42.jpg", server.uri(), TEST_TOKEN);
    assert_eq!(record.text, "On set today");
    assert_eq!(record.media_url.as_deref(), Some(expected_url.as_str()));
    assert_eq!(record.media_type, Some(ArchiveMediaType::Photo));
    assert_eq!(archive.row(CHAT, 42), Some(record));
}

#[tokio::test]
async fn edited_post_updates_the_same_row() {
    let server = MockServer::start().await;
    mount_file(&server, "clip", "videos/file_7.mp4").await;

    let archive = Arc::new(InMemoryArchive::new());
    let ingester = ingester(&server, archive.clone());

    ingester
        .handle_update(&update(json!({
            "update_id": 10,
            "channel_post": {
                "message_id": 7,
                "chat": { "id": CHAT },
                "text": "Trailer out"
            }
        })))
        .await
        .unwrap();

    ingester
        .handle_update(&update(json!({
            "update_id": 11,
            "edited_channel_post": {
                "message_id": 7,
                "chat": { "id": CHAT },
                "caption": "Trailer out now",
                "video": { "file_id": "clip" }
            }
        })))
        .await
        .unwrap();

    assert_eq!(archive.len(), 1);
    let row = archive.row(CHAT, 7).unwrap();
    assert_eq!(row.text, "Trailer out now");
    assert_eq!(row.media_type, Some(ArchiveMediaType::Video));
}

#[tokio::test]
async fn updates_without_channel_posts_are_ignored() {
    let server = MockServer::start().await;
    let archive = Arc::new(InMemoryArchive::new());
    let ingester = ingester(&server, archive.clone());

    let result = ingester
        .handle_update(&update(json!({ "update_id": 3 })))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(archive.len(), 0);
}

#[tokio::test]
async fn get_file_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(method_path("getFile")))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_file(&server, "gif", "animations/file_9.mp4").await;

    let archive = Arc::new(InMemoryArchive::new());
    let ingester = ingester(&server, archive.clone());

    let record = ingester
        .handle_update(&update(json!({
            "update_id": 4,
            "channel_post": {
                "message_id": 9,
                "chat": { "id": CHAT },
                "animation": { "file_id": "gif" }
            }
        })))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.media_type, Some(ArchiveMediaType::Animation));
    assert!(record.media_url.unwrap().ends_with("/animations/file_9.mp4"));
    server.verify().await;
}

#[tokio::test]
async fn rejected_file_lookup_is_not_retried_and_nothing_is_archived() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(method_path("getFile")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: invalid file_id"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let archive = Arc::new(InMemoryArchive::new());
    let ingester = ingester(&server, archive.clone());

    let err = ingester
        .handle_update(&update(json!({
            "update_id": 5,
            "channel_post": {
                "message_id": 11,
                "chat": { "id": CHAT },
                "video": { "file_id": "gone" }
            }
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestionError::Api { status: 400, .. }));
    assert_eq!(archive.len(), 0);
    server.verify().await;
}

#[tokio::test]
async fn archive_failure_is_reported() {
    let server = MockServer::start().await;
    let archive = Arc::new(InMemoryArchive::new());
    archive.fail();
    let ingester = ingester(&server, archive);

    let err = ingester
        .handle_update(&update(json!({
            "update_id": 6,
            "channel_post": { "message_id": 12, "chat": { "id": CHAT }, "text": "hello" }
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestionError::Archive(_)));
}

#[tokio::test]
async fn polling_advances_offset_past_processed_updates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(method_path("getUpdates")))
        .and(query_param("offset", "103"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bot_ok(json!([]))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(method_path("getUpdates")))
        .respond_with(ResponseTemplate::new(200).set_body_json(bot_ok(json!([
            {
                "update_id": 101,
                "channel_post": { "message_id": 1, "chat": { "id": CHAT }, "text": "first" }
            },
            {
                "update_id": 102,
                "channel_post": { "message_id": 2, "chat": { "id": CHAT }, "text": "second" }
            }
        ]))))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let archive = Arc::new(InMemoryArchive::new());
    let ingester = ingester(&server, archive.clone());

    let offset = ingester.poll_once(None, 0).await.unwrap();
    assert_eq!(offset, Some(103));
    assert_eq!(archive.len(), 2);

    assert_eq!(ingester.poll_once(offset, 0).await.unwrap(), Some(103));
    server.verify().await;
}

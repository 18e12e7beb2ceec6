//! Entity materialization: payload round-trips, identifier classification,
//! lookups that must distinguish "not found" from "empty", and composite
//! thread assembly.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dote6::error::Error;
use dote6::forum::Thread;
use dote6::post::Post;
use dote6::tag::Tag;
use dote6::user::User;
use dote6::{user, Client};

fn test_client(server: &MockServer) -> Client {
    Client::custom(&server.uri(), Duration::from_millis(1))
}

#[test]
fn payload_round_trips_and_absent_fields_stay_unset() {
    let post = Post::from_data(json!({
        "id": 476_264,
        "author": "blotch",
        "creator_id": 12,
        "md5": "0f2c4e3a",
        "file_ext": "jpg",
        "file_url": "https://static.example/0f2c4e3a.jpg",
        "tags": "canine feral sitting",
        "children": "100,101",
        "score": 77,
        "has_children": true,
        "voted_up_by_me": true,
    }))
    .unwrap();

    assert_eq!(post.id(), Some(476_264));
    assert_eq!(post.author(), Some("blotch"));
    assert_eq!(post.creator_id(), Some(12));
    assert_eq!(post.md5(), Some("0f2c4e3a"));
    assert_eq!(post.file_ext(), Some("jpg"));
    assert_eq!(post.tags(), vec!["canine", "feral", "sitting"]);
    assert_eq!(post.children(), vec!["100", "101"]);
    assert_eq!(post.score(), Some(77));
    assert_eq!(post.has_children(), Some(true));

    // absent known fields read as unset
    assert_eq!(post.rating(), None);
    assert_eq!(post.description(), None);
    assert_eq!(post.parent_id(), None);

    // unknown payload fields pass through
    assert_eq!(post.extra().get("voted_up_by_me"), Some(&json!(true)));
    assert_eq!(post.dump_data()["voted_up_by_me"], json!(true));
}

#[test]
fn non_object_payloads_are_rejected() {
    assert!(matches!(
        Post::from_data(json!([1, 2, 3])),
        Err(Error::MalformedResponse { .. })
    ));
}

#[tokio::test]
async fn numeric_identifiers_look_up_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tag/index.json"))
        .and(query_param("id", "123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 123, "name": "scalie", "type": 5, "count": 9000 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let tag = Tag::new(&client, "123").await.unwrap();
    assert_eq!(tag.name(), Some("scalie"));
    assert_eq!(tag.type_str(), Some("species"));
}

#[tokio::test]
async fn other_identifiers_look_up_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tag/index.json"))
        .and(query_param("name", "scalie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 123, "name": "scalie", "type": 5, "count": 9000 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let tag = Tag::new(&client, "scalie").await.unwrap();
    assert_eq!(tag.id(), Some(123));
}

#[tokio::test]
async fn empty_lookups_are_not_found_rather_than_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tag/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = test_client(&server);

    match Tag::new(&client, "missingno").await {
        Err(Error::NotFound { kind, ident }) => {
            assert_eq!(kind, "tag");
            assert_eq!(ident, "missingno");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(matches!(
        User::new(&client, "404").await,
        Err(Error::NotFound { kind: "user", .. })
    ));
}

#[tokio::test]
async fn comments_read_oldest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/comment/index.json"))
        .and(query_param("post_id", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 3, "body": "newest" },
            { "id": 2, "body": "middle" },
            { "id": 1, "body": "oldest" }
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let post = Post::from_data(json!({ "id": 9 })).unwrap();
    let comments = post.comments(&client).await.unwrap();
    let ids: Vec<_> = comments.iter().filter_map(|comment| comment.id()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn threads_store_replies_in_chronological_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forum/show.json"))
        .and(query_param("id", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            { "id": 5, "title": "rules", "body": "read them" }
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/index.json"))
        .and(query_param("parent_id", "5"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 8, "parent_id": 5, "body": "latest reply" },
            { "id": 6, "parent_id": 5, "body": "first reply" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum/index.json"))
        .and(query_param("parent_id", "5"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let thread = Thread::new(&client, 5).await.unwrap();
    assert_eq!(thread.op().title(), Some("rules"));
    let ids: Vec<_> = thread.replies().iter().filter_map(|reply| reply.id()).collect();
    assert_eq!(ids, vec![6, 8]);
}

#[tokio::test]
async fn login_stores_credentials_for_later_posts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login.json"))
        .and(body_string_contains("name=me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            { "name": "me", "password_hash": "0abc" }
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/index.json"))
        .and(query_param("name", "me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 44, "name": "me", "level": 20 }
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(!client.is_authenticated());
    let user = user::login(&client, "me", "hunter2").await.unwrap();
    assert_eq!(user.id(), Some(44));
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn rejected_login_clears_nothing_and_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            { "success": "failed", "reason": "bad password" }
        )))
        .mount(&server)
        .await;

    let client = test_client(&server);
    match user::login(&client, "me", "wrong").await {
        Err(Error::Login(reason)) => assert_eq!(reason, "bad password"),
        other => panic!("expected Login error, got {other:?}"),
    }
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn mutations_require_credentials_before_any_network_call() {
    // no mocks mounted on purpose: an eager Unauthorized never reaches the
    // server, while any request would come back as an unexpected 404
    let server = MockServer::start().await;
    let client = test_client(&server);

    let post = Post::from_data(json!({ "id": 1 })).unwrap();
    assert!(matches!(
        post.vote(&client, dote6::post::Vote::Up).await,
        Err(Error::Unauthorized)
    ));
}

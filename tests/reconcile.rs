//! Reconciliation scenarios: fresh downloads, renames, early stop, the
//! extras classification, and the overload retry path.

use std::fs;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dote6::reconcile::{Backoff, Options, Reconciler};
use dote6::store::{content_md5, ContentIndex, INDEX_FILE, METADATA_DIR};
use dote6::Client;

fn test_client(server: &MockServer) -> Client {
    Client::custom(&server.uri(), Duration::from_millis(1))
}

/// Mounts one page of the primary search (`limit=100`).
async fn mount_search_page(server: &MockServer, tags: &str, page: &str, body: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/post/index.json"))
        .and(query_param("tags", tags))
        .and(query_param("limit", "100"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts the single-item secondary search used for the extras check.
async fn mount_md5_lookup(server: &MockServer, md5: &str, body: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/post/index.json"))
        .and(query_param("tags", format!("md5:{md5}")))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn remote_post(id: u64, md5: &str, file_url: Option<&str>) -> Value {
    match file_url {
        Some(url) => json!({ "id": id, "md5": md5, "file_ext": "png", "file_url": url }),
        None => json!({ "id": id, "md5": md5, "file_ext": "png" }),
    }
}

#[tokio::test]
async fn missing_content_is_downloaded_and_indexed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"fresh bytes";
    let md5 = content_md5(bytes);
    let file_url = format!("{}/data/{md5}.png", server.uri());

    mount_search_page(&server, "canine", "1", vec![remote_post(1, &md5, Some(&file_url))]).await;
    mount_search_page(&server, "canine", "2", Vec::new()).await;
    Mock::given(method("GET"))
        .and(path(format!("/data/{md5}.png")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    let report = Reconciler::new(&client, dir.path(), Options::default())
        .run("canine", &mut index)
        .await
        .unwrap();

    assert_eq!(report.downloaded(), 1);
    assert_eq!(report.failed(), 0);
    let expected = format!("{md5}.png");
    assert_eq!(fs::read(dir.path().join(&expected)).unwrap(), bytes);
    assert_eq!(index.get(&md5), Some(expected.as_str()));
    // the run downloaded something, so the sidecar was saved once at the end
    let sidecar = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
    assert!(sidecar.contains(&md5));
}

#[tokio::test]
async fn known_content_under_the_wrong_name_is_renamed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"known bytes";
    let md5 = content_md5(bytes);
    fs::write(dir.path().join("old.png"), bytes).unwrap();

    mount_search_page(&server, "canine", "1", vec![remote_post(2, &md5, None)]).await;
    mount_search_page(&server, "canine", "2", Vec::new()).await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    assert_eq!(index.get(&md5), Some("old.png"));

    let report = Reconciler::new(&client, dir.path(), Options::default())
        .run("canine", &mut index)
        .await
        .unwrap();

    assert_eq!(report.renamed(), 1);
    assert_eq!(report.downloaded(), 0);
    let expected = format!("{md5}.png");
    assert!(!dir.path().join("old.png").exists());
    assert_eq!(fs::read(dir.path().join(&expected)).unwrap(), bytes);
    assert_eq!(index.get(&md5), Some(expected.as_str()));
}

#[tokio::test]
async fn local_files_outside_the_query_are_classified_against_the_site() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"extra bytes";
    let md5 = content_md5(bytes);
    fs::write(dir.path().join("extra.png"), bytes).unwrap();

    mount_search_page(&server, "canine", "1", Vec::new()).await;
    mount_md5_lookup(&server, &md5, vec![remote_post(9, &md5, None)]).await;
    Mock::given(method("GET"))
        .and(path("/comment/index.json"))
        .and(query_param("post_id", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    let report = Reconciler::new(&client, dir.path(), Options::default())
        .run("canine", &mut index)
        .await
        .unwrap();

    assert_eq!(report.extra_on_site(), 1);
    assert_eq!(report.not_found_on_site(), 0);
    // metadata for the extra is stored best-effort under its checksum
    assert!(dir.path().join(METADATA_DIR).join(&md5).is_file());
}

#[tokio::test]
async fn unknown_local_files_are_reported_and_optionally_copied() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"keepsake bytes";
    let md5 = content_md5(bytes);
    fs::write(dir.path().join("keepsake.png"), bytes).unwrap();

    mount_search_page(&server, "canine", "1", Vec::new()).await;
    mount_md5_lookup(&server, &md5, Vec::new()).await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    let options = Options {
        copy_extras: true,
        ..Options::default()
    };
    let report = Reconciler::new(&client, dir.path(), options)
        .run("canine", &mut index)
        .await
        .unwrap();

    assert_eq!(report.not_found_on_site(), 1);
    assert_eq!(report.extra_on_site(), 0);
    assert!(dir
        .path()
        .join("!extra/notfound")
        .join("keepsake.png")
        .is_file());
}

#[tokio::test]
async fn only_new_runs_halt_on_the_first_existing_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"already here";
    let md5 = content_md5(bytes);
    fs::write(dir.path().join(format!("{md5}.png")), bytes).unwrap();

    let unseen_md5 = content_md5(b"never fetched");
    let unseen_url = format!("{}/data/unseen.png", server.uri());
    mount_search_page(
        &server,
        "canine",
        "1",
        vec![
            remote_post(3, &md5, None),
            remote_post(4, &unseen_md5, Some(&unseen_url)),
        ],
    )
    .await;
    // halting on the first existing file means neither the second page nor
    // the second post's file is ever requested
    Mock::given(method("GET"))
        .and(path("/post/index.json"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/unseen.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"never fetched".to_vec(), "image/png"))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    let options = Options {
        stop_on_existing: true,
        ..Options::default()
    };
    let report = Reconciler::new(&client, dir.path(), options)
        .run("canine", &mut index)
        .await
        .unwrap();

    assert!(report.stopped_early());
    assert_eq!(report.total_seen(), 1);
    assert_eq!(report.already_present(), 1);
    assert_eq!(report.downloaded(), 0);
    assert_eq!(report.failed(), 0);
}

#[tokio::test]
async fn overloaded_downloads_are_retried_per_policy() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"slow bytes";
    let md5 = content_md5(bytes);
    let file_url = format!("{}/data/{md5}.png", server.uri());

    mount_search_page(&server, "canine", "1", vec![remote_post(6, &md5, Some(&file_url))]).await;
    mount_search_page(&server, "canine", "2", Vec::new()).await;
    // first attempt is turned away, the retry succeeds
    Mock::given(method("GET"))
        .and(path(format!("/data/{md5}.png")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/data/{md5}.png")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.to_vec(), "image/png"))
        .with_priority(5)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    let policy = Backoff {
        delay: Duration::from_millis(1),
        max_attempts: 3,
    };
    let report = Reconciler::new(&client, dir.path(), Options::default())
        .with_policy(Box::new(policy))
        .run("canine", &mut index)
        .await
        .unwrap();

    assert_eq!(report.downloaded(), 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(fs::read(dir.path().join(format!("{md5}.png"))).unwrap(), bytes);
}

#[tokio::test]
async fn overloaded_page_fetches_retry_the_same_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"page retry bytes";
    let md5 = content_md5(bytes);
    let file_url = format!("{}/data/{md5}.png", server.uri());

    // the first request for page 1 is turned away; the retry hits the
    // same page number and succeeds
    Mock::given(method("GET"))
        .and(path("/post/index.json"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_search_page(&server, "canine", "1", vec![remote_post(8, &md5, Some(&file_url))]).await;
    mount_search_page(&server, "canine", "2", Vec::new()).await;
    Mock::given(method("GET"))
        .and(path(format!("/data/{md5}.png")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.to_vec(), "image/png"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    let policy = Backoff {
        delay: Duration::from_millis(1),
        max_attempts: 3,
    };
    let report = Reconciler::new(&client, dir.path(), Options::default())
        .with_policy(Box::new(policy))
        .run("canine", &mut index)
        .await
        .unwrap();

    assert_eq!(report.downloaded(), 1);
    assert_eq!(report.failed(), 0);
}

#[tokio::test]
async fn metadata_sidecars_are_written_for_every_scanned_post() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bytes = b"meta bytes";
    let md5 = content_md5(bytes);
    // already present under its expected name: nothing to download, but
    // metadata is still refreshed
    fs::write(dir.path().join(format!("{md5}.png")), bytes).unwrap();

    mount_search_page(&server, "canine", "1", vec![remote_post(7, &md5, None)]).await;
    mount_search_page(&server, "canine", "2", Vec::new()).await;

    let client = test_client(&server);
    let mut index = ContentIndex::load(dir.path()).unwrap();
    let options = Options {
        write_metadata: true,
        ..Options::default()
    };
    let report = Reconciler::new(&client, dir.path(), options)
        .run("canine", &mut index)
        .await
        .unwrap();

    assert_eq!(report.already_present(), 1);
    let document: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(METADATA_DIR).join(&md5)).unwrap())
            .unwrap();
    assert_eq!(document["id"], json!(7));
    assert_eq!(document["md5"], json!(md5));
}

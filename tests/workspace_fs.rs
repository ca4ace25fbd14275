//! End-to-end scenarios driving `NodeEngine` against a mocked remote
//! workspace API, per §8's testable properties: round trips, remote-
//! modification detection, dirty-node visibility, rename subtree rewrite,
//! and notebook suffix semantics.

use base64::Engine;
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use workspacefs::cache::disk::DiskCache;
use workspacefs::cache::metadata::MetadataCache;
use workspacefs::node::{NodeEngine, ROOT_INO};
use workspacefs::remote::RemoteClient;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
}

fn b64(s: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(s)
}

async fn engine_against(server: &MockServer) -> NodeEngine {
    let metadata_cache = MetadataCache::with_config(Duration::from_secs(60), 1_000);
    let remote = RemoteClient::new(server.uri(), "test-token".to_string(), metadata_cache);
    NodeEngine::new(remote, DiskCache::disabled(), 1000, false)
}

/// An `object-info` response body. `remote_path` is echoed back as `path`
/// so a node that adopts this response carries the same remote path the
/// caller queried for, matching how the real API behaves.
fn object_info(remote_path: &str, object_type: &str, size: u64, modified_at_ms: u64) -> serde_json::Value {
    json!({
        "path": remote_path,
        "object_type": object_type,
        "size": size,
        "modified_at_ms": modified_at_ms,
    })
}

/// Same as [`object_info`] but carrying a stable `object_id`, the way a
/// real workspace object would: inode identity survives a rename because
/// it is derived from the id, not from the (now-stale) path.
fn object_info_with_id(remote_path: &str, object_type: &str, size: u64, modified_at_ms: u64, object_id: &str) -> serde_json::Value {
    json!({
        "path": remote_path,
        "object_type": object_type,
        "size": size,
        "modified_at_ms": modified_at_ms,
        "object_id": object_id,
    })
}

#[tokio::test]
async fn round_trip_small_file_through_import_and_export() {
    let server = MockServer::start().await;
    let engine = engine_against(&server).await;

    // `create` writes an initial empty payload then stats the new object.
    // Root-level children have no leading separator (`join_path` with an
    // empty parent path returns the bare name).
    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace-files/import-file"))
        .and(query_param("path", "note.txt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "note.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("note.txt", "file", 0, now_ms())))
        .mount(&server)
        .await;

    let (node, outcome) = engine.create(ROOT_INO, "note.txt").await.unwrap();
    assert!(outcome.direct_io);

    let payload = b"hello from a freshly created file";
    let written = engine.write(node.ino, 0, payload).await.unwrap();
    assert_eq!(written as usize, payload.len());

    let read_back = engine.read(node.ino, 0, payload.len() as u32).await.unwrap();
    assert_eq!(read_back, payload);

    // `create` already holds one open reference; dropping it to zero via
    // `release` is what actually persists the dirty buffer, re-exercising
    // the same `import-file` and `get-status` mocks a second time.
    engine.release(node.ino).await.unwrap();
}

#[tokio::test]
async fn large_write_uses_signed_url_then_falls_back_on_failure() {
    let server = MockServer::start().await;
    let engine = engine_against(&server).await;
    let big = vec![7u8; 6 * 1024 * 1024];

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace-files/import-file"))
        .and(query_param("path", "big.bin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("big.bin", "file", 0, now_ms())))
        .mount(&server)
        .await;

    let (node, _) = engine.create(ROOT_INO, "big.bin").await.unwrap();
    engine.write(node.ino, 0, &big).await.unwrap();

    // `new-files` fails outright, so persisting the large write must fall
    // back to `import-file` rather than fail the whole operation.
    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace-files/new-files"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    engine.release(node.ino).await.unwrap();
}

#[tokio::test]
async fn remote_modification_is_detected_on_reopen() {
    // Uses a real disk cache, not `DiskCache::disabled()`: the defect this
    // guards against only shows up once a cached entry exists to serve
    // stale bytes from on the second open.
    let server = MockServer::start().await;
    let cache_dir = tempfile::tempdir().unwrap();
    let metadata_cache = MetadataCache::with_config(Duration::from_secs(60), 1_000);
    let remote = RemoteClient::new(server.uri(), "test-token".to_string(), metadata_cache);
    let disk_cache = DiskCache::new(cache_dir.path().to_path_buf(), 1024 * 1024, Duration::from_secs(3600)).unwrap();
    let engine = NodeEngine::new(remote, disk_cache, 1000, false);
    let first_mtime = now_ms();

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "shared.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("shared.txt", "file", 5, first_mtime)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace-files/export"))
        .respond_with(ResponseTemplate::new(200).set_body_string(b64("first")))
        .mount(&server)
        .await;

    let node = engine.lookup(ROOT_INO, "shared.txt").await.unwrap();
    engine.open(node.ino, false, false).await.unwrap();
    let first_read = engine.read(node.ino, 0, 64).await.unwrap();
    assert_eq!(first_read, b"first");
    engine.release(node.ino).await.unwrap();

    // A second open observes a newer `modified_at` and must drop the
    // stale cached buffer rather than serve it again.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "shared.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("shared.txt", "file", 6, first_mtime + 60_000)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace-files/export"))
        .respond_with(ResponseTemplate::new(200).set_body_string(b64("second")))
        .mount(&server)
        .await;

    engine.open(node.ino, false, false).await.unwrap();
    let second_read = engine.read(node.ino, 0, 64).await.unwrap();
    assert_eq!(second_read, b"second");
}

#[tokio::test]
async fn dirty_node_stays_visible_to_lookup_before_flush() {
    let server = MockServer::start().await;
    let engine = engine_against(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace-files/import-file"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "draft.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("draft.txt", "file", 0, now_ms())))
        .mount(&server)
        .await;

    let (node, _) = engine.create(ROOT_INO, "draft.txt").await.unwrap();
    engine.write(node.ino, 0, b"unflushed content").await.unwrap();

    // `lookup` must return the in-memory dirty node's state: no second
    // `get-status` mock for a fresh stat is registered, so any path that
    // falls through to the remote for this name would panic on an
    // unmatched request.
    let looked_up = engine.lookup(ROOT_INO, "draft.txt").await.unwrap();
    assert_eq!(looked_up.ino, node.ino);
    let attr = engine.attr(looked_up.ino).await.unwrap();
    assert_eq!(attr.size, "unflushed content".len() as u64);
}

#[tokio::test]
async fn rename_rewrites_subtree_paths() {
    let server = MockServer::start().await;
    let engine = engine_against(&server).await;

    Mock::given(method("POST")).and(path("/api/2.0/workspace/mkdirs")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "src"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("src", "directory", 0, now_ms())))
        .mount(&server)
        .await;
    let src_dir = engine.mkdir(ROOT_INO, "src").await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "src/lib.rs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info_with_id("src/lib.rs", "file", 3, now_ms(), "7002")))
        .mount(&server)
        .await;
    let child = engine.lookup(src_dir.ino, "lib.rs").await.unwrap();

    Mock::given(method("POST")).and(path("/api/2.0/workspace/rename")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    engine.rename(ROOT_INO, "src", ROOT_INO, "app").await.unwrap();

    // The child keeps its inode, but its cached `remote_path` should have
    // been rewritten from "src/lib.rs" to "app/lib.rs"; a fresh lookup by
    // the same name must now stat the NEW path, not the old one.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "app/lib.rs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info_with_id("app/lib.rs", "file", 3, now_ms(), "7002")))
        .mount(&server)
        .await;
    let child_again = engine.lookup(src_dir.ino, "lib.rs").await.unwrap();
    assert_eq!(child_again.ino, child.ino);

    // The old name no longer resolves locally, so a lookup for "src" under
    // root must go out to the remote and observe it's gone.
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "src"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    assert!(engine.lookup(ROOT_INO, "src").await.is_err());
}

#[tokio::test]
async fn notebook_suffix_is_synthesized_for_directory_listings() {
    let server = MockServer::start().await;
    let engine = engine_against(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "analysis", "object_type": "notebook", "size": 10, "modified_at_ms": now_ms()},
            {"name": "readme.md", "object_type": "file", "size": 4, "modified_at_ms": now_ms()},
        ])))
        .mount(&server)
        .await;

    let entries = engine.read_dir(ROOT_INO).await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"analysis.ipynb"));
    assert!(names.contains(&"readme.md"));
}

#[tokio::test]
async fn notebook_create_sends_jupyter_import() {
    let server = MockServer::start().await;
    let engine = engine_against(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/workspace/import"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "scratch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("scratch", "notebook", 0, now_ms())))
        .mount(&server)
        .await;

    let (node, _) = engine.create(ROOT_INO, "scratch.ipynb").await.unwrap();
    let attr = engine.attr(node.ino).await.unwrap();
    assert!(!attr.is_directory);
}

#[tokio::test]
async fn large_notebook_export_is_base64_decoded() {
    let server = MockServer::start().await;
    let engine = engine_against(&server).await;
    let source = "{\"cells\": []}";

    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace/get-status"))
        .and(query_param("path", "nb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(object_info("nb", "notebook", source.len() as u64, now_ms())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/workspace-files/export"))
        .and(query_param("format", "JUPYTER"))
        .respond_with(ResponseTemplate::new(200).set_body_string(b64(source)))
        .mount(&server)
        .await;

    let node = engine.lookup(ROOT_INO, "nb.ipynb").await.unwrap();
    engine.open(node.ino, false, false).await.unwrap();
    let bytes = engine.read(node.ino, 0, source.len() as u32).await.unwrap();
    assert_eq!(bytes, source.as_bytes());
}

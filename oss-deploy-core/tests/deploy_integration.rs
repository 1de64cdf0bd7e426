mod common;

use async_trait::async_trait;
use common::{config_for, settings_for, write_file, MemoryStore};
use oss_deploy_core::config::{ProbeFailurePolicy, RuleSpec, RunConfig};
use oss_deploy_core::contract::{MockObjectStore, ObjectHead, ObjectStore, PutObject};
use oss_deploy_core::deploy::deploy;
use oss_deploy_core::error::{DeployError, StoreError};
use oss_deploy_core::fingerprint::Fingerprint;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

#[tokio::test]
async fn empty_bucket_uploads_everything_with_baseline_policies() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "a.js", b"console.log(1)");
    write_file(tmp.path(), "b.txt", b"hello");

    let store = MemoryStore::new();
    let report = deploy(&config_for(tmp.path()), &store).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.considered, 2);
    assert_eq!(report.uploaded, vec!["a.js", "b.txt"]);
    assert!(report.skipped.is_empty());

    let a = store.object("/a.js").expect("a.js uploaded");
    assert_eq!(a.headers.get("Cache-Control"), Some("max-age=94608000"));
    assert_eq!(a.body, b"console.log(1)");
    let b = store.object("/b.txt").expect("b.txt uploaded");
    assert_eq!(b.headers.get("Cache-Control"), Some("max-age=120"));
}

#[tokio::test]
async fn unchanged_file_is_skipped_without_put() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "a.js", b"console.log(1)");
    write_file(tmp.path(), "b.txt", b"hello");

    let store = MemoryStore::new();
    store.seed("/b.txt", b"hello");

    let report = deploy(&config_for(tmp.path()), &store).await.unwrap();

    assert_eq!(report.uploaded, vec!["a.js"]);
    assert_eq!(report.skipped, vec!["b.txt"]);
    assert_eq!(store.put_keys(), vec!["/a.js"]);
}

#[tokio::test]
async fn changed_file_is_uploaded_again() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "index.html", b"<h1>v2</h1>");

    let store = MemoryStore::new();
    store.seed("/index.html", b"<h1>v1</h1>");

    let report = deploy(&config_for(tmp.path()), &store).await.unwrap();
    assert_eq!(report.uploaded, vec!["index.html"]);
    assert_eq!(store.object("/index.html").unwrap().body, b"<h1>v2</h1>");
}

#[tokio::test]
async fn second_run_skips_everything_uploaded_by_the_first() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "a.js", b"1");
    write_file(tmp.path(), "css/site.css", b"body{}");
    write_file(tmp.path(), "img/logo.png", &[0x89, 0x50, 0x4e, 0x47]);

    let store = MemoryStore::new();
    let config = config_for(tmp.path());

    let first = deploy(&config, &store).await.unwrap();
    assert_eq!(first.uploaded.len(), 3);

    store.reset_put_log();
    let second = deploy(&config, &store).await.unwrap();
    assert!(second.uploaded.is_empty());
    assert_eq!(second.skipped.len(), 3);
    assert!(store.put_keys().is_empty());
}

#[tokio::test]
async fn path_prefix_is_joined_to_relative_path() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "img/logo.png", b"png");

    let mut settings = settings_for(tmp.path());
    settings.path_prefix = "/v1/".into();
    let config = RunConfig::try_from(settings).unwrap();

    let store = MemoryStore::new();
    deploy(&config, &store).await.unwrap();
    assert_eq!(store.put_keys(), vec!["/v1/img/logo.png"]);
}

#[tokio::test]
async fn matching_rule_overrides_cache_control() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "index.html", b"<html>");
    write_file(tmp.path(), "app.js", b"x");

    let mut settings = settings_for(tmp.path());
    settings.rules = vec![
        RuleSpec {
            pattern: r"\.html$".into(),
            headers: vec![
                "Cache-Control: no-cache".into(),
                "Content-Type: text/html; charset=utf-8".into(),
            ],
        },
        RuleSpec {
            pattern: "index".into(),
            headers: vec!["Cache-Control: max-age=5".into()],
        },
    ];
    let config = RunConfig::try_from(settings).unwrap();

    let store = MemoryStore::new();
    deploy(&config, &store).await.unwrap();

    let html = store.object("/index.html").unwrap();
    assert_eq!(html.headers.get("Cache-Control"), Some("no-cache"));
    assert_eq!(
        html.headers.get("Content-Type"),
        Some("text/html; charset=utf-8")
    );
    let js = store.object("/app.js").unwrap();
    assert_eq!(js.headers.get("Cache-Control"), Some("max-age=94608000"));
}

#[tokio::test]
async fn failed_upload_does_not_stop_other_files_or_batches() {
    let tmp = tempdir().unwrap();
    for i in 1..=5 {
        write_file(tmp.path(), &format!("f{i}.txt"), format!("file {i}").as_bytes());
    }

    let mut settings = settings_for(tmp.path());
    settings.chunk_size = 2;
    let config = RunConfig::try_from(settings).unwrap();

    let store = MemoryStore::failing_on(&["/f3.txt"]);
    let report = deploy(&config, &store).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.uploaded, vec!["f1.txt", "f2.txt", "f4.txt", "f5.txt"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].relative_path, "f3.txt");
    assert_eq!(report.failed[0].key, "/f3.txt");
    for key in ["/f1.txt", "/f2.txt", "/f4.txt", "/f5.txt"] {
        assert!(store.object(key).is_some(), "{key} should be stored");
    }
    assert!(store.object("/f3.txt").is_none());
}

#[tokio::test]
async fn probe_errors_fail_open_and_upload() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "b.txt", b"hello");

    let mut store = MockObjectStore::new();
    store
        .expect_head()
        .returning(|_| Err(StoreError::backend("connection timed out")));
    store
        .expect_put()
        .withf(|req: &PutObject<'_>| req.key == "/b.txt")
        .times(1)
        .returning(|_| Ok(()));

    let report = deploy(&config_for(tmp.path()), &store).await.unwrap();
    assert_eq!(report.uploaded, vec!["b.txt"]);
}

#[tokio::test]
async fn probe_errors_are_reported_when_configured_to_fail() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "b.txt", b"hello");

    let mut settings = settings_for(tmp.path());
    settings.probe_failure = ProbeFailurePolicy::Fail;
    let config = RunConfig::try_from(settings).unwrap();

    let mut store = MockObjectStore::new();
    store
        .expect_head()
        .returning(|_| Err(StoreError::backend("AccessDenied")));
    store.expect_put().never();

    let report = deploy(&config, &store).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed[0].relative_path, "b.txt");
    assert!(report.failed[0].reason.contains("AccessDenied"));
}

#[tokio::test]
async fn mock_store_sees_fingerprint_matching_local_content() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "a.css", b"p{margin:0}");
    let expected = Fingerprint::of(b"p{margin:0}");

    let mut store = MockObjectStore::new();
    store.expect_head().returning(|_| Ok(ObjectHead::missing()));
    store
        .expect_put()
        .withf(move |req: &PutObject<'_>| *req.fingerprint == expected && req.key == "/a.css")
        .times(1)
        .returning(|_| Ok(()));

    deploy(&config_for(tmp.path()), &store).await.unwrap();
}

#[tokio::test]
async fn missing_public_dir_aborts_before_any_request() {
    let tmp = tempdir().unwrap();
    let mut store = MockObjectStore::new();
    store.expect_head().never();
    store.expect_put().never();

    let err = deploy(&config_for(&tmp.path().join("dist")), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Listing { .. }));
}

/// Deletes `victim` from disk the first time `trigger` is looked up, so the
/// next batch finds its file gone.
struct VanishingFileStore {
    inner: MemoryStore,
    trigger: &'static str,
    victim: PathBuf,
    heads: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for VanishingFileStore {
    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        self.heads.lock().unwrap().push(key.to_string());
        if key == self.trigger {
            let _ = std::fs::remove_file(&self.victim);
        }
        self.inner.head(key).await
    }

    async fn put<'a>(&self, req: PutObject<'a>) -> Result<(), StoreError> {
        self.inner.put(req).await
    }
}

#[tokio::test]
async fn vanished_local_file_aborts_the_run_after_its_batch() {
    let tmp = tempdir().unwrap();
    write_file(tmp.path(), "a.txt", b"a");
    write_file(tmp.path(), "b.txt", b"b");
    write_file(tmp.path(), "c.txt", b"c");

    let mut settings = settings_for(tmp.path());
    settings.chunk_size = 1;
    let config = RunConfig::try_from(settings).unwrap();

    let store = VanishingFileStore {
        inner: MemoryStore::new(),
        trigger: "/a.txt",
        victim: tmp.path().join("b.txt"),
        heads: Mutex::new(Vec::new()),
    };

    let err = deploy(&config, &store).await.unwrap_err();
    match err {
        DeployError::LocalIo { path, .. } => assert_eq!(path, tmp.path().join("b.txt")),
        other => panic!("expected LocalIo, got {other:?}"),
    }

    // the batch before the failure completed
    assert_eq!(store.inner.put_keys(), vec!["/a.txt"]);
    // nothing after it started
    let heads = store.heads.lock().unwrap().clone();
    assert_eq!(heads, vec!["/a.txt"]);
    assert!(store.inner.object("/c.txt").is_none());
}

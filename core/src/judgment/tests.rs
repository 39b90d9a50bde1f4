//! Tests for judgment loading

use super::*;
use crate::error::ErrorKind;
use crate::testing::MockJudgmentStore;
use crate::traits::JudgmentStore;

use std::sync::Arc;
use std::time::{Duration, Instant};

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ============================================================================
// JudgmentLoader
// ============================================================================

#[tokio::test]
async fn test_load_merges_all_judgments() {
    let store = Arc::new(
        MockJudgmentStore::new()
            .with_ratings("j1", "laptop", &[("d1", 1.0), ("d2", 0.0)])
            .with_ratings("j2", "laptop", &[("d3", 2.0)]),
    );
    let loader = JudgmentLoader::new(store.clone(), MergePolicy::FirstSeen);

    let set = loader.load(&ids(&["j1", "j2"])).await.unwrap();

    assert_eq!(store.calls(), 2);
    assert_eq!(set.len(), 3);
    assert_eq!(set.rating("laptop", "d3"), Some(2.0));
    assert_eq!(set.sources(), ids(&["j1", "j2"]).as_slice());
}

#[tokio::test]
async fn test_merge_order_follows_id_list_not_completion() {
    // j1 completes last but is listed first, so its rating wins under FirstSeen.
    let store = Arc::new(
        MockJudgmentStore::new()
            .with_ratings("j1", "laptop", &[("d1", 1.0)])
            .with_ratings("j2", "laptop", &[("d1", 3.0)])
            .with_delay("j1", Duration::from_millis(50)),
    );

    let first = JudgmentLoader::new(store.clone(), MergePolicy::FirstSeen)
        .load(&ids(&["j1", "j2"]))
        .await
        .unwrap();
    assert_eq!(first.rating("laptop", "d1"), Some(1.0));
    assert_eq!(first.sources(), ids(&["j1", "j2"]).as_slice());

    let last = JudgmentLoader::new(store, MergePolicy::LastSeen)
        .load(&ids(&["j1", "j2"]))
        .await
        .unwrap();
    assert_eq!(last.rating("laptop", "d1"), Some(3.0));
}

#[tokio::test]
async fn test_retrievals_run_concurrently() {
    let delay = Duration::from_millis(100);
    let store = Arc::new(
        MockJudgmentStore::new()
            .with_ratings("j1", "q", &[("a", 1.0)])
            .with_ratings("j2", "q", &[("b", 1.0)])
            .with_ratings("j3", "q", &[("c", 1.0)])
            .with_delay("j1", delay)
            .with_delay("j2", delay)
            .with_delay("j3", delay),
    );
    let loader = JudgmentLoader::new(store, MergePolicy::default());

    let start = Instant::now();
    let set = loader.load(&ids(&["j1", "j2", "j3"])).await.unwrap();

    assert_eq!(set.len(), 3);
    assert!(
        start.elapsed() < delay * 2,
        "retrievals should overlap, took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_missing_judgment_is_not_found() {
    let store = Arc::new(MockJudgmentStore::new().with_ratings("j1", "q", &[("a", 1.0)]));
    let loader = JudgmentLoader::new(store, MergePolicy::default());

    let err = loader.load(&ids(&["j1", "gone"])).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::JudgmentNotFound);
    assert!(err.message.contains("gone"));
}

#[tokio::test]
async fn test_unavailable_store_is_store_error() {
    let store = Arc::new(MockJudgmentStore::new().with_unavailable("j1"));
    let loader = JudgmentLoader::new(store, MergePolicy::default());

    let err = loader.load(&ids(&["j1"])).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::JudgmentStore);
}

#[tokio::test]
async fn test_first_failure_returns_without_waiting_for_slow_retrievals() {
    let store = Arc::new(
        MockJudgmentStore::new()
            .with_ratings("slow", "q", &[("a", 1.0)])
            .with_delay("slow", Duration::from_secs(5)),
    );
    let loader = JudgmentLoader::new(store.clone(), MergePolicy::default());

    let start = Instant::now();
    let err = loader.load(&ids(&["slow", "missing"])).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::JudgmentNotFound);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(store.calls(), 2);
    assert_eq!(store.completed(), 1);
}

#[tokio::test]
async fn test_incomplete_judgment_rejected() {
    let store = Arc::new(
        MockJudgmentStore::new()
            .with_ratings("j1", "q", &[("a", 1.0)])
            .with_status("j1", JudgmentStatus::Processing),
    );
    let loader = JudgmentLoader::new(store, MergePolicy::default());

    let err = loader.load(&ids(&["j1"])).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::JudgmentStore);
    assert!(err.message.contains("PROCESSING"));
}

// ============================================================================
// FileJudgmentStore
// ============================================================================

#[tokio::test]
async fn test_file_store_reads_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("esci.json"),
        r#"{
            "name": "esci",
            "type": "IMPORT_JUDGMENT",
            "status": "COMPLETED",
            "judgmentRatings": [
                { "query": "laptop", "ratings": [{ "docId": "d1", "rating": "2.0" }] }
            ]
        }"#,
    )
    .unwrap();
    let store = FileJudgmentStore::new(dir.path());

    let judgment = store.get_judgment("esci").await.unwrap();

    assert_eq!(judgment.name, "esci");
    assert_eq!(judgment.judgment_ratings[0].ratings[0].rating, 2.0);
}

#[tokio::test]
async fn test_file_store_missing_and_malformed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    let store = FileJudgmentStore::new(dir.path());

    assert!(store.get_judgment("absent").await.unwrap_err().is_not_found());
    assert!(store.get_judgment("../etc/passwd").await.unwrap_err().is_not_found());
    assert!(store.get_judgment("").await.unwrap_err().is_not_found());

    let err = store.get_judgment("broken").await.unwrap_err();
    assert!(!err.is_not_found());
    assert_eq!(err.to_error_kind(), ErrorKind::JudgmentStore);
}

#[tokio::test]
async fn test_loader_over_file_store() {
    let dir = tempfile::tempdir().unwrap();
    for (id, doc, rating) in [("a", "d1", 1), ("b", "d2", 3)] {
        std::fs::write(
            dir.path().join(format!("{id}.json")),
            format!(
                r#"{{"judgmentRatings":[{{"query":"q","ratings":[{{"docId":"{doc}","rating":{rating}}}]}}]}}"#
            ),
        )
        .unwrap();
    }
    let loader = JudgmentLoader::new(Arc::new(FileJudgmentStore::new(dir.path())), MergePolicy::default());

    let set = loader.load(&ids(&["a", "b"])).await.unwrap();
    assert_eq!(set.rating("q", "d2"), Some(3.0));

    let err = loader.load(&ids(&["a", "c"])).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::JudgmentNotFound);
}

use indexflow::error::OrchestratorError;
use indexflow::job::{JobRecord, JobStatus};
use indexflow::store::{FileJobStore, JobStore, MemoryJobStore};

fn record(id: &str) -> JobRecord {
    JobRecord::new(id, "test storage")
}

#[tokio::test]
async fn test_create_then_load() {
    let store = MemoryJobStore::new();
    store.create(record("my index")).await.unwrap();

    let loaded = store.load("my-index").await.unwrap();
    assert_eq!(loaded.id, "my-index");
    assert_eq!(loaded.status, JobStatus::Scheduled);
    assert_eq!(loaded.sanitized_storage_name, "test-storage");
}

#[tokio::test]
async fn test_duplicate_create_is_already_exists() {
    let store = MemoryJobStore::new();
    store.create(record("my index")).await.unwrap();

    let err = store.create(record("my index")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::JobAlreadyExists(id) if id == "my-index"));
}

#[tokio::test]
async fn test_create_rejects_name_with_no_usable_id() {
    // "!!!" sanitizes to an empty id; such a record must be rejected at
    // create, not persisted where the scheduler scan cannot see it.
    let store = MemoryJobStore::new();
    let err = store.create(record("!!!")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidJobId(name) if name == "!!!"));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_load_missing_is_not_found() {
    let store = MemoryJobStore::new();
    let err = store.load("nope").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::JobNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn test_exists() {
    let store = MemoryJobStore::new();
    assert!(!store.exists("my-index").await.unwrap());
    store.create(record("my index")).await.unwrap();
    assert!(store.exists("my-index").await.unwrap());
}

#[tokio::test]
async fn test_save_is_full_overwrite() {
    let store = MemoryJobStore::new();
    store.create(record("my index")).await.unwrap();

    let mut loaded = store.load("my-index").await.unwrap();
    loaded.start_run(vec!["w1".into(), "w2".into()]);
    loaded.completed_workflows.push("w1".into());
    loaded.recompute_percent();
    store.save(&loaded).await.unwrap();
    // Saving again must be idempotent.
    store.save(&loaded).await.unwrap();

    let reloaded = store.load("my-index").await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Running);
    assert_eq!(reloaded.completed_workflows, vec!["w1".to_string()]);
    assert_eq!(reloaded.percent_complete, 50.0);
}

#[tokio::test]
async fn test_list_returns_all_records() {
    let store = MemoryJobStore::new();
    store.create(record("alpha")).await.unwrap();
    store.create(record("beta")).await.unwrap();
    store.create(record("gamma")).await.unwrap();

    let mut ids: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
}

// ==================== FileJobStore ====================

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::open(dir.path()).await.unwrap();

    let mut rec = record("contoso filings");
    rec.entity_extraction_prompt = Some("extract entities".into());
    store.create(rec).await.unwrap();

    let loaded = store.load("contoso-filings").await.unwrap();
    assert_eq!(loaded.id, "contoso-filings");
    assert_eq!(loaded.entity_extraction_prompt.as_deref(), Some("extract entities"));

    // A second store over the same directory sees the persisted record.
    let reopened = FileJobStore::open(dir.path()).await.unwrap();
    assert!(reopened.exists("contoso-filings").await.unwrap());
    assert_eq!(reopened.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_file_store_duplicate_create() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::open(dir.path()).await.unwrap();

    store.create(record("my index")).await.unwrap();
    let err = store.create(record("my index")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::JobAlreadyExists(_)));
}

#[tokio::test]
async fn test_file_store_rejects_name_with_no_usable_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::open(dir.path()).await.unwrap();

    let err = store.create(record("!!!")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidJobId(_)));

    // Nothing reached the directory, so every created record stays
    // visible to the scheduler's list() scan.
    assert!(!store.exists("").await.unwrap());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_store_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::open(dir.path()).await.unwrap();

    let err = store.load("ghost").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::JobNotFound(_)));
}

#[tokio::test]
async fn test_file_store_save_overwrites_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::open(dir.path()).await.unwrap();

    store.create(record("my index")).await.unwrap();
    let mut loaded = store.load("my-index").await.unwrap();
    loaded.mark_failed("boom");
    store.save(&loaded).await.unwrap();

    let reloaded = store.load("my-index").await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Failed);
    assert_eq!(reloaded.progress, "boom");
}

#[tokio::test]
async fn test_file_store_rejects_unknown_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileJobStore::open(dir.path()).await.unwrap();

    // A record written out-of-band with a status value the orchestrator
    // does not define must fail to load, not pass through.
    let doc = serde_json::json!({
        "id": "weird",
        "epoch_request_time": 100,
        "human_readable_index_name": "weird",
        "sanitized_storage_name": "s",
        "human_readable_storage_name": "s",
        "all_workflows": [],
        "completed_workflows": [],
        "failed_workflows": [],
        "status": "PAUSED",
        "percent_complete": 0.0,
        "progress": ""
    });
    tokio::fs::write(dir.path().join("weird.json"), doc.to_string())
        .await
        .unwrap();

    let err = store.load("weird").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Store(_)));
    assert!(store.list().await.is_err());
}

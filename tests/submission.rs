use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pipeline_runner::core::StorageLocation;
use pipeline_runner::{
    BuildState, Error, ExecutionService, JobDescriptor, JobSpecDocument, ObjectStorage,
    PipelineBuilder, Result, Session,
};

// -----------------------------------------------------------------------------
// Fakes
// -----------------------------------------------------------------------------

#[derive(Default)]
struct FakeExecutor {
    submitted: Mutex<Vec<(JobSpecDocument, String)>>,
    failures_left: AtomicUsize,
}

impl FakeExecutor {
    fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Default::default()
        }
    }

    fn submissions(&self) -> Vec<(JobSpecDocument, String)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionService for FakeExecutor {
    async fn submit(&self, document: &JobSpecDocument, request_id: &str) -> Result<Value> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::submission("quota exceeded"));
        }

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((document.clone(), request_id.to_string()));
        Ok(json!({
            "name": format!("operations/op-{}", submitted.len()),
            "metadata": { "request": request_id }
        }))
    }
}

struct FakeStorage {
    objects: HashSet<String>,
    lookups: Mutex<Vec<StorageLocation>>,
}

impl FakeStorage {
    fn with(objects: &[&str]) -> Self {
        Self {
            objects: objects.iter().map(|s| s.to_string()).collect(),
            lookups: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn exists(&self, location: &StorageLocation) -> Result<bool> {
        self.lookups.lock().unwrap().push(location.clone());
        Ok(self.objects.contains(&location.to_string()))
    }
}

fn pipeline() -> PipelineBuilder {
    let mut p = PipelineBuilder::new(JobDescriptor::new(
        "p", "job1", "ubuntu", "gs://out", "gs://log",
    ));
    p.add_disk("d1", "/mnt/data");
    p.add_input("d1", "gs://bucket/sample.bam");
    p.set_command("echo hi", false).unwrap();
    p
}

// -----------------------------------------------------------------------------
// run()
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_run_requires_build() {
    let executor = FakeExecutor::default();
    let mut p = pipeline();

    let err = p.run(&executor).await.unwrap_err();
    assert!(matches!(err, Error::NotBuilt));
    assert!(executor.submissions().is_empty());
    assert_eq!(p.state(), &BuildState::Configuring);
}

#[tokio::test]
async fn test_run_submits_built_document() {
    let executor = FakeExecutor::default();
    let mut p = pipeline();
    let built = p.build().clone();

    let op = p.run(&executor).await.unwrap();

    assert_eq!(op.name.as_deref(), Some("operations/op-1"));
    assert_eq!(op.response["metadata"]["request"], json!(op.request_id));

    let submissions = executor.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, built);
    assert_eq!(submissions[0].1, op.request_id);
    assert_eq!(
        p.state(),
        &BuildState::Submitted {
            request_id: op.request_id.clone()
        }
    );
}

#[tokio::test]
async fn test_second_run_needs_fresh_build() {
    let executor = FakeExecutor::default();
    let mut p = pipeline();
    p.build();
    let first = p.run(&executor).await.unwrap();

    let err = p.run(&executor).await.unwrap_err();
    assert!(matches!(err, Error::AlreadySubmitted(ref id) if *id == first.request_id));
    assert_eq!(executor.submissions().len(), 1);

    p.build();
    let second = p.run(&executor).await.unwrap();
    assert_ne!(first.request_id, second.request_id);
    assert_eq!(executor.submissions().len(), 2);
}

#[tokio::test]
async fn test_failed_run_can_be_retried() {
    let executor = FakeExecutor::failing(1);
    let mut p = pipeline();
    p.build();

    let err = p.run(&executor).await.unwrap_err();
    assert!(matches!(err, Error::Submission(ref msg) if msg.contains("quota")));
    assert_eq!(p.state(), &BuildState::Built);

    let op = p.run(&executor).await.unwrap();
    assert_eq!(op.name.as_deref(), Some("operations/op-1"));
}

#[tokio::test]
async fn test_run_sends_last_built_document() {
    let executor = FakeExecutor::default();
    let mut p = pipeline();
    p.build();
    p.set_command("echo changed", false).unwrap();

    p.run(&executor).await.unwrap();

    let submissions = executor.submissions();
    assert_eq!(
        submissions[0].0.ephemeral_pipeline.docker.cmd.as_deref(),
        Some("echo hi")
    );
}

#[tokio::test]
async fn test_run_through_session() {
    let executor = Arc::new(FakeExecutor::default());
    let storage = Arc::new(FakeStorage::with(&["gs://bucket/sample.bam"]));
    let session = Session::from_parts(storage, executor.clone());

    let mut p = pipeline();
    p.build();
    assert!(p.verify_inputs(session.storage()).await.unwrap().is_empty());
    p.run(session.executor()).await.unwrap();

    assert_eq!(executor.submissions().len(), 1);
}

// -----------------------------------------------------------------------------
// verify_inputs()
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_verify_inputs_reports_missing_in_order() {
    let storage = FakeStorage::with(&["gs://bucket/b.bam"]);
    let mut p = pipeline();
    p.add_input("d1", "gs://bucket/a.bam");
    p.add_input("d1", "gs://bucket/b.bam");
    p.add_input("d1", "gs://bucket/c.bam");

    let missing = p.verify_inputs(&storage).await.unwrap();
    assert_eq!(
        missing,
        vec![
            "gs://bucket/sample.bam".to_string(),
            "gs://bucket/a.bam".to_string(),
            "gs://bucket/c.bam".to_string(),
        ]
    );
    assert_eq!(storage.lookups.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_verify_inputs_rejects_non_storage_paths() {
    let storage = FakeStorage::with(&[]);
    let mut p = pipeline();
    p.add_input("d1", "/local/file.bam");

    let err = p.verify_inputs(&storage).await.unwrap_err();
    assert!(matches!(err, Error::InvalidLocation(ref l) if l == "/local/file.bam"));
    // Nothing is looked up when any location is malformed.
    assert!(storage.lookups.lock().unwrap().is_empty());
}

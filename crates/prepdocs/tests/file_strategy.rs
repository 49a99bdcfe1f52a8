//! Orchestration tests with recording collaborators

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;
use prepdocs::config::{MetadataConfig, SplitterConfig};
use prepdocs::enrichment::PollPolicy;
use prepdocs::ingestion::{default_file_processors, FileProcessors, MetadataExtractor};
use prepdocs::providers::{AzureCredential, StaticTokenCredential};
use prepdocs::{
    DocumentAction, Error, FileAcls, FileStrategy, Strategy, UploadUserFileStrategy,
};

fn processors() -> Arc<FileProcessors> {
    Arc::new(default_file_processors(&SplitterConfig::default()).unwrap())
}

struct Harness {
    log: CallLog,
    search: Arc<RecordingSearchManager>,
}

impl Harness {
    fn new() -> Self {
        let log = CallLog::default();
        let search = Arc::new(RecordingSearchManager::new(&log));
        Self { log, search }
    }

    fn strategy(&self, lister: StaticLister, action: DocumentAction) -> FileStrategy {
        FileStrategy::new(
            Arc::new(lister),
            Arc::new(RecordingBlobManager::new(&self.log)),
            self.search.clone(),
            processors(),
            action,
        )
    }
}

#[tokio::test]
async fn test_unregistered_extension_is_skipped() {
    let harness = Harness::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let lister = StaticLister::with_files(vec![tracked_file("photo.xyz", b"\x00\x01", &drops)]);

    let report = harness.strategy(lister, DocumentAction::Add).run().await.unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 1);
    assert!(harness.log.calls().is_empty());
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_add_uploads_then_indexes() {
    let harness = Harness::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let lister = StaticLister::with_files(vec![
        tracked_file("docs/a.txt", b"Alpha sentence. Beta sentence.", &drops),
        tracked_file("docs/b.csv", b"id,name\n1,alpha\n", &drops),
    ]);

    let report = harness
        .strategy(lister, DocumentAction::Add)
        .with_category(Some("handbook".to_string()))
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert!(report.is_success());
    assert_eq!(
        harness.log.calls(),
        vec!["upload:a.txt", "update:a.txt", "upload:b.csv", "update:b.csv"]
    );
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    let sections = harness.search.sections.lock();
    assert!(sections.iter().all(|s| s.category.as_deref() == Some("handbook")));
    assert!(sections.iter().any(|s| s.split_page.text.contains("1,alpha")));
}

#[tokio::test]
async fn test_image_embeddings_computed_from_blob_uris() {
    let harness = Harness::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let lister = StaticLister::with_files(vec![tracked_file("a.txt", b"Some text.", &drops)]);

    harness
        .strategy(lister, DocumentAction::Add)
        .with_image_embeddings(Arc::new(FakeImageEmbeddings::new(&harness.log)))
        .run()
        .await
        .unwrap();

    assert_eq!(
        harness.log.calls(),
        vec!["upload:a.txt", "image_embeddings:1", "update:a.txt"]
    );
    assert_eq!(
        harness.search.image_embeddings.lock().as_deref(),
        Some(&[vec![0.5, 0.25]][..])
    );
}

#[tokio::test]
async fn test_parse_failure_releases_handle_and_continues() {
    let harness = Harness::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let lister = StaticLister::with_files(vec![
        tracked_file("broken.json", b"{not json", &drops),
        tracked_file("ok.txt", b"Fine.", &drops),
    ]);

    let report = harness.strategy(lister, DocumentAction::Add).run().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "broken.json");
    assert_eq!(harness.log.calls(), vec!["upload:ok.txt", "update:ok.txt"]);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_error() {
    let log = CallLog::default();
    let drops = Arc::new(AtomicUsize::new(0));
    let lister = StaticLister::with_files(vec![
        tracked_file("a.txt", b"First.", &drops),
        tracked_file("b.txt", b"Second.", &drops),
    ]);

    let strategy = FileStrategy::new(
        Arc::new(lister),
        Arc::new(RecordingBlobManager::failing(&log)),
        Arc::new(RecordingSearchManager::new(&log)),
        processors(),
        DocumentAction::Add,
    )
    .with_fail_fast(true);

    let result = strategy.run().await;
    assert!(matches!(result, Err(Error::Storage(_))));
    assert_eq!(log.calls(), vec!["upload:a.txt"]);
    // the first file was released; the second was dropped with the unread listing
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_metadata_copied_to_every_section() {
    let harness = Harness::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let text = "Plan ABC-1 overview. ".repeat(120);
    let lister = StaticLister::with_files(vec![tracked_file("plan.txt", text.as_bytes(), &drops)]);
    let extractor = MetadataExtractor::from_config(&MetadataConfig {
        trigger_extensions: vec![".txt".to_string()],
        ..Default::default()
    });
    let llm = FakeLlm::replying(
        &harness.log,
        "```json\n{\"planid\": \"ABC-1\", \"doctype\": \"overview\", \"locale\": \"en-US\"}\n```",
    );

    harness
        .strategy(lister, DocumentAction::Add)
        .with_metadata(Arc::new(llm), extractor)
        .run()
        .await
        .unwrap();

    assert_eq!(harness.log.count("llm"), 1);
    let sections = harness.search.sections.lock();
    assert!(sections.len() > 1);
    for section in sections.iter() {
        assert_eq!(section.planid.as_deref(), Some("ABC-1"));
        assert_eq!(section.doctype.as_deref(), Some("overview"));
    }
}

#[tokio::test]
async fn test_metadata_failure_does_not_abort() {
    let harness = Harness::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let lister = StaticLister::with_files(vec![tracked_file("plan.txt", b"Plan text.", &drops)]);
    let extractor = MetadataExtractor::from_config(&MetadataConfig {
        trigger_extensions: vec![".txt".to_string()],
        ..Default::default()
    });

    let report = harness
        .strategy(lister, DocumentAction::Add)
        .with_metadata(Arc::new(FakeLlm::failing(&harness.log)), extractor)
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert!(harness.search.sections.lock().iter().all(|s| s.planid.is_none()));
}

#[tokio::test]
async fn test_remove_orders_blob_before_index() {
    let harness = Harness::new();
    let lister = StaticLister::with_paths(&["docs/a.pdf", "docs/b.txt"]);

    let report = harness.strategy(lister, DocumentAction::Remove).run().await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(
        harness.log.calls(),
        vec![
            "remove_blob:docs/a.pdf",
            "remove_content:docs/a.pdf",
            "remove_blob:docs/b.txt",
            "remove_content:docs/b.txt",
        ]
    );
}

#[tokio::test]
async fn test_remove_all_clears_everything_once() {
    let harness = Harness::new();
    let lister = StaticLister::with_paths(&["ignored.txt"]);

    harness.strategy(lister, DocumentAction::RemoveAll).run().await.unwrap();

    assert_eq!(harness.log.calls(), vec!["remove_blob:*", "remove_content:*"]);
}

#[tokio::test]
async fn test_setup_creates_index() {
    let harness = Harness::new();
    harness
        .strategy(StaticLister::default(), DocumentAction::Add)
        .setup()
        .await
        .unwrap();

    assert_eq!(harness.log.calls(), vec!["create_index"]);
}

#[tokio::test]
async fn test_setup_warns_when_model_unavailable() {
    let (logs, _guard) = capture_logs();
    let harness = Harness::new();

    harness
        .strategy(StaticLister::default(), DocumentAction::Add)
        .with_metadata(
            Arc::new(FakeLlm::failing(&harness.log)),
            MetadataExtractor::default(),
        )
        .setup()
        .await
        .unwrap();

    assert_eq!(harness.log.calls(), vec!["create_index", "health_check"]);
    assert!(logs
        .contents()
        .contains("Language model 'fake-model' (fake) is not available"));
}

#[tokio::test]
async fn test_setup_checks_healthy_model_quietly() {
    let (logs, _guard) = capture_logs();
    let harness = Harness::new();

    harness
        .strategy(StaticLister::default(), DocumentAction::Add)
        .with_metadata(
            Arc::new(FakeLlm::replying(&harness.log, "None")),
            MetadataExtractor::default(),
        )
        .setup()
        .await
        .unwrap();

    assert_eq!(harness.log.count("health_check"), 1);
    assert!(!logs.contents().contains("is not available"));
}

#[tokio::test]
async fn test_setup_rejects_missing_enrichment_endpoint() {
    let harness = Harness::new();
    let credential = AzureCredential::Token(Arc::new(StaticTokenCredential::new("t")));

    let result = harness
        .strategy(StaticLister::default(), DocumentAction::Add)
        .with_content_understanding(None, credential, PollPolicy::default())
        .setup()
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_setup_rejects_key_credential_for_enrichment() {
    let harness = Harness::new();

    let result = harness
        .strategy(StaticLister::default(), DocumentAction::Add)
        .with_content_understanding(
            Some("https://cu.example".to_string()),
            AzureCredential::Key("secret".to_string()),
            PollPolicy::default(),
        )
        .setup()
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_logs_emitted_inside_injected_span() {
    let (logs, _guard) = capture_logs();
    let harness = Harness::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let lister = StaticLister::with_files(vec![
        tracked_file("notes.xyz", b"?", &drops),
        tracked_file("a.txt", b"Hello.", &drops),
    ]);

    harness
        .strategy(lister, DocumentAction::Add)
        .with_span(tracing::info_span!("ingest_job"))
        .run()
        .await
        .unwrap();

    let output = logs.contents();
    assert!(output.contains("Skipping 'notes.xyz', no parser found."));
    assert!(output.contains("Ingesting 'a.txt'"));
    assert!(output.contains("ingest_job"));
}

#[tokio::test]
async fn test_user_upload_indexes_with_acls() {
    let log = CallLog::default();
    let search = Arc::new(RecordingSearchManager::new(&log));
    let strategy = UploadUserFileStrategy::new(search.clone(), processors());
    let drops = Arc::new(AtomicUsize::new(0));

    let file = tracked_file("mine.txt", b"Private notes.", &drops)
        .with_url("https://blobs.example/user1/mine.txt")
        .with_acls(FileAcls::owner("user1"));
    strategy.add_file(file).await.unwrap();

    assert_eq!(log.calls(), vec!["update:mine.txt"]);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    let sections = search.sections.lock();
    assert_eq!(sections[0].content.acls.oids, vec!["user1"]);
    assert_eq!(
        search.urls.lock()[0].as_deref(),
        Some("https://blobs.example/user1/mine.txt")
    );
}

#[tokio::test]
async fn test_user_upload_warns_about_image_embeddings() {
    let (logs, _guard) = capture_logs();
    let log = CallLog::default();
    let strategy = UploadUserFileStrategy::new(Arc::new(RecordingSearchManager::new(&log)), processors())
        .with_image_embeddings(Arc::new(FakeImageEmbeddings::new(&log)));
    let drops = Arc::new(AtomicUsize::new(0));

    strategy
        .add_file(tracked_file("mine.txt", b"Notes.", &drops))
        .await
        .unwrap();

    assert!(logs
        .contents()
        .contains("Image embeddings are not currently supported for the user upload feature"));
    assert_eq!(log.count("image_embeddings"), 0);
}

#[tokio::test]
async fn test_user_remove_requires_filename() {
    let log = CallLog::default();
    let strategy = UploadUserFileStrategy::new(Arc::new(RecordingSearchManager::new(&log)), processors());

    strategy.remove_file("", "user1").await.unwrap();
    assert!(log.calls().is_empty());

    strategy.remove_file("mine.txt", "user1").await.unwrap();
    assert_eq!(log.calls(), vec!["remove_content:mine.txt:user1"]);
}

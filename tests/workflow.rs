//! Workflow integration tests against deterministic stub analyzers.
//!
//! No network, no API keys: every capability is a `FixedAnalyzer`, so these
//! run in CI on every push.
//!
//! Run with:
//!   cargo test --test workflow

use edgequake_docflow::{
    encode_file_upload, AnalyzerSet, Capability, FixedAnalyzer, LlmStatus, MemoryCheckpointStore,
    MemoryUploadStore, Message, Node, RunState, StatusEvent, UploadRecord, UploadResolver,
    Workflow, WorkflowConfig,
};
use edgequake_docflow::{Checkpoint, CheckpointStore};
use async_trait::async_trait;
use edgequake_docflow::upload::StoredUpload;
use edgequake_docflow::DocflowError;
use futures::StreamExt;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config() -> WorkflowConfig {
    WorkflowConfig::builder()
        .status_pacing_ms(0)
        .build()
        .expect("valid config")
}

/// One stub per file capability, so tests can assert who was called.
struct FileStubs {
    quality: Arc<FixedAnalyzer>,
    enhance: Arc<FixedAnalyzer>,
    preprocess: Arc<FixedAnalyzer>,
    extract: Arc<FixedAnalyzer>,
    ground: Arc<FixedAnalyzer>,
}

impl FileStubs {
    fn healthy() -> Self {
        Self {
            quality: Arc::new(FixedAnalyzer::new(json!({
                "blur_score": 0.12, "skew_angle": 1.5, "lighting_variance": 0.3,
                "issues": ["slight skew"], "image_count": 1
            }))),
            enhance: Arc::new(FixedAnalyzer::new(json!({"instructions": "deskew 1.5°"}))),
            preprocess: Arc::new(FixedAnalyzer::new(json!({"total_boxes": 4, "boxes_per_page": [4]}))),
            extract: Arc::new(FixedAnalyzer::new(json!({
                "raw_text": "Recd Rs 500 from Asha on 3 May", "page_count": 1
            }))),
            ground: Arc::new(FixedAnalyzer::new(json!({
                "normalized_text": "Received Rs 500 from Asha on 3 May.",
                "entities": [{"key": "amount", "value": "Rs 500"}, {"key": "payer", "value": "Asha"}]
            }))),
        }
    }

    fn set(&self) -> AnalyzerSet {
        AnalyzerSet::new()
            .with(Capability::Quality, self.quality.clone())
            .with(Capability::Enhance, self.enhance.clone())
            .with(Capability::Preprocess, self.preprocess.clone())
            .with(Capability::Extract, self.extract.clone())
            .with(Capability::Ground, self.ground.clone())
    }

    fn calls(&self) -> [usize; 5] {
        [
            self.quality.calls(),
            self.enhance.calls(),
            self.preprocess.calls(),
            self.extract.calls(),
            self.ground.calls(),
        ]
    }
}

fn text_set() -> AnalyzerSet {
    AnalyzerSet::new()
        .with(
            Capability::Summarize,
            Arc::new(FixedAnalyzer::new(json!({
                "summary": "Budget approved for two new schools.",
                "key_points": ["budget", "schools"]
            }))),
        )
        .with(
            Capability::Translate,
            Arc::new(FixedAnalyzer::new(json!("दो नए स्कूलों के लिए बजट स्वीकृत।"))),
        )
}

async fn stored_upload(store: &MemoryUploadStore) -> UploadRecord {
    store
        .save(b"%PDF-1.7 fake".to_vec(), Some("letter.pdf"), Some("application/pdf"))
        .await
        .expect("pdf is allow-listed")
}

async fn collect_labels(
    workflow: &Workflow,
    state: RunState,
    run_id: &str,
) -> (RunState, Vec<LlmStatus>) {
    let (tx, mut rx) = mpsc::channel::<StatusEvent>(64);
    let final_state = workflow.execute_with_events(state, run_id, tx).await;
    let mut labels = Vec::new();
    while let Some(event) = rx.recv().await {
        assert_eq!(event.run_id, run_id);
        labels.push(event.llm_status);
    }
    (final_state, labels)
}

// ── Routing ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_prefixed_or_malformed_input_runs_text_pipeline() {
    let stubs = FileStubs::healthy();
    let workflow = Workflow::new(stubs.set(), Arc::new(MemoryUploadStore::new()), config());

    for input in [
        "plain words",
        "FILE_UPLOAD::{broken json",
        "FILE_UPLOAD::{\"filename\": \"x.png\"}",
        "upload::{\"file_id\": \"x\"}",
    ] {
        let out = workflow.execute(RunState::from_text(input), "route").await;
        assert!(out.summary_data.is_some(), "{input:?} should take the text path");
        assert!(out.file_ref.is_none(), "{input:?}");
        assert!(out.file_errors.is_empty(), "{input:?}");
    }
    assert_eq!(stubs.calls(), [0; 5]);
}

#[tokio::test]
async fn file_upload_message_selects_file_pipeline() {
    let uploads = Arc::new(MemoryUploadStore::new());
    let record = stored_upload(&uploads).await;
    let stubs = FileStubs::healthy();
    let workflow = Workflow::new(stubs.set(), uploads, config());

    let state = RunState::from_messages(vec![
        Message::user("hello"),
        Message::assistant("send me a file"),
        Message::user(encode_file_upload(&record)),
    ]);
    let (out, labels) = collect_labels(&workflow, state, "file-ok").await;

    assert_eq!(out.file_ref.as_ref().unwrap().file_id, record.file_id);
    assert!(out.file_errors.is_empty());
    assert!(out.summary_data.is_none());
    assert_eq!(out.preprocess_data.unwrap().total_boxes, 4);
    let grounded = out.grounded_data.unwrap();
    assert_eq!(grounded.normalized_text, "Received Rs 500 from Asha on 3 May.");
    assert_eq!(grounded.entities.len(), 2);
    assert_eq!(out.llm_status, Some(LlmStatus::Completed));
    assert_eq!(stubs.calls(), [1; 5]);

    assert_eq!(
        labels,
        vec![
            LlmStatus::Processing,
            LlmStatus::Assessing,
            LlmStatus::Enhancing,
            LlmStatus::Preprocessing,
            LlmStatus::Extracting,
            LlmStatus::Grounding,
            LlmStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn request_payloads_carry_prior_outputs() {
    let uploads = Arc::new(MemoryUploadStore::new());
    let record = stored_upload(&uploads).await;
    let stubs = FileStubs::healthy();
    let workflow = Workflow::new(stubs.set(), uploads, config());

    workflow
        .execute(RunState::from_text(encode_file_upload(&record)), "payloads")
        .await;

    let quality_req = &stubs.quality.requests()[0];
    assert_eq!(quality_req["file_id"], json!(record.file_id));
    assert_eq!(quality_req["content_type"], json!("application/pdf"));
    assert!(quality_req["base64"].is_string());

    let enhance_req = &stubs.enhance.requests()[0];
    assert_eq!(enhance_req["quality"]["issues"], json!(["slight skew"]));
    assert_eq!(enhance_req["file"]["filename"], json!("letter.pdf"));

    let preprocess_req = &stubs.preprocess.requests()[0];
    assert_eq!(preprocess_req["enhancement"]["instructions"], json!("deskew 1.5°"));

    let extract_req = &stubs.extract.requests()[0];
    assert_eq!(extract_req["preprocess"]["total_boxes"], json!(4));
    assert!(extract_req["enhancement"].is_object());

    assert_eq!(
        stubs.ground.requests(),
        vec![json!("Recd Rs 500 from Asha on 3 May")]
    );
}

// ── Short-circuit ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_upload_stops_at_quality() {
    let stubs = FileStubs::healthy();
    let workflow = Workflow::new(stubs.set(), Arc::new(MemoryUploadStore::new()), config());

    let out = workflow
        .execute(
            RunState::from_text("FILE_UPLOAD::{\"file_id\": \"deadbeef\"}"),
            "missing",
        )
        .await;

    assert_eq!(out.file_errors, vec!["Uploaded file not found".to_string()]);
    assert_eq!(out.llm_status, Some(LlmStatus::Completed));
    assert_eq!(stubs.calls(), [0; 5]);
}

/// Serves the first `available` loads, then reports every upload as gone.
struct VanishingUploads {
    inner: MemoryUploadStore,
    available: usize,
    loads: AtomicUsize,
}

#[async_trait]
impl UploadResolver for VanishingUploads {
    async fn save(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<UploadRecord, DocflowError> {
        self.inner.save(bytes, filename, content_type).await
    }

    async fn load(&self, file_id: &str) -> Result<StoredUpload, DocflowError> {
        if self.loads.fetch_add(1, Ordering::SeqCst) < self.available {
            self.inner.load(file_id).await
        } else {
            Err(DocflowError::UploadNotFound {
                file_id: file_id.to_string(),
            })
        }
    }
}

#[tokio::test]
async fn upload_vanishing_mid_pipeline_stops_at_that_step() {
    // Quality, Enhance and Preprocess each load the upload once.
    let cases = [
        (1, [1, 0, 0, 0, 0]),
        (2, [1, 1, 0, 0, 0]),
        (3, [1, 1, 1, 0, 0]),
    ];
    for (available, expected_calls) in cases {
        let stubs = FileStubs::healthy();
        let uploads = Arc::new(VanishingUploads {
            inner: MemoryUploadStore::new(),
            available,
            loads: AtomicUsize::new(0),
        });
        let record = stored_upload(&uploads.inner).await;
        let workflow = Workflow::new(stubs.set(), uploads, config());

        let (out, labels) = collect_labels(
            &workflow,
            RunState::from_text(encode_file_upload(&record)),
            "vanish",
        )
        .await;

        assert_eq!(
            out.file_errors,
            vec!["Uploaded file not found".to_string()],
            "after {available} loads"
        );
        assert_eq!(stubs.calls(), expected_calls, "after {available} loads");
        assert_eq!(out.llm_status, Some(LlmStatus::Completed));
        assert_eq!(labels.last(), Some(&LlmStatus::Completed));
        assert!(out.file_quality.is_some());
        assert!(out.extracted_data.is_none());
        assert!(out.grounded_data.is_none());
    }
}

#[tokio::test]
async fn no_analyzers_reports_quality_not_configured() {
    let uploads = Arc::new(MemoryUploadStore::new());
    let record = stored_upload(&uploads).await;
    let workflow = Workflow::new(AnalyzerSet::new(), uploads, config());

    let out = workflow
        .execute(RunState::from_text(encode_file_upload(&record)), "bare")
        .await;

    assert_eq!(
        out.file_errors,
        vec!["Vertex AI credentials not configured for quality assessment".to_string()]
    );
    assert!(out.file_quality.is_none());
    assert_eq!(out.llm_status, Some(LlmStatus::Completed));
}

#[tokio::test]
async fn failure_mid_pipeline_keeps_earlier_outputs() {
    let uploads = Arc::new(MemoryUploadStore::new());
    let record = stored_upload(&uploads).await;
    let mut stubs = FileStubs::healthy();
    stubs.preprocess = Arc::new(FixedAnalyzer::failing("model overloaded"));
    let workflow = Workflow::new(stubs.set(), uploads, config());

    let (out, labels) = collect_labels(
        &workflow,
        RunState::from_text(encode_file_upload(&record)),
        "mid",
    )
    .await;

    assert!(out.file_quality.is_some());
    assert!(out.enhanced_data.is_some());
    assert!(out.preprocess_data.is_none());
    assert!(out.extracted_data.is_none());
    assert_eq!(out.file_errors.len(), 1);
    assert!(out.file_errors[0].starts_with("Preprocessing failed: "));
    assert!(out.file_errors[0].contains("model overloaded"));
    assert_eq!(stubs.calls(), [1, 1, 1, 0, 0]);
    assert_eq!(labels.last(), Some(&LlmStatus::Completed));
    assert_eq!(out.llm_status, Some(LlmStatus::Completed));
}

#[tokio::test]
async fn unconfigured_grounder_passes_extraction_through() {
    let uploads = Arc::new(MemoryUploadStore::new());
    let record = stored_upload(&uploads).await;
    let stubs = FileStubs::healthy();
    let analyzers = stubs
        .set()
        .with(Capability::Ground, Arc::new(FixedAnalyzer::unavailable()));
    let workflow = Workflow::new(analyzers, uploads, config());

    let out = workflow
        .execute(RunState::from_text(encode_file_upload(&record)), "no-ground")
        .await;

    assert!(out.file_errors.is_empty());
    let raw = out.extracted_data.unwrap().raw_text;
    let grounded = out.grounded_data.unwrap();
    assert_eq!(grounded.normalized_text, raw);
    assert!(grounded.entities.is_empty());
    assert!(grounded.notes.is_some());
}

// ── Text pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_input_finishes_without_analyzer_calls() {
    let summarizer = Arc::new(FixedAnalyzer::new(json!({"summary": "never"})));
    let translator = Arc::new(FixedAnalyzer::new(json!("never")));
    let analyzers = AnalyzerSet::new()
        .with(Capability::Summarize, summarizer.clone())
        .with(Capability::Translate, translator.clone());
    let workflow = Workflow::new(analyzers, Arc::new(MemoryUploadStore::new()), config());

    let out = workflow.execute(RunState::from_text(""), "empty").await;

    let summary = out.summary_data.unwrap();
    assert_eq!(summary.summary, "");
    assert!(summary.key_points.is_empty());
    assert!(out.translated_data.is_none());
    assert!(out.final_count.is_none());
    assert_eq!(out.llm_status, Some(LlmStatus::Completed));
    assert_eq!(summarizer.calls() + translator.calls(), 0);
}

#[tokio::test]
async fn text_pipeline_is_idempotent_with_stubs() {
    let workflow = Workflow::new(text_set(), Arc::new(MemoryUploadStore::new()), config());
    let input = "The council met and approved the budget for two new schools.";

    let a = workflow.execute(RunState::from_text(input), "a").await;
    let b = workflow.execute(RunState::from_text(input), "b").await;

    assert_eq!(a.summary_data, b.summary_data);
    assert_eq!(a.translated_data, b.translated_data);
    assert_eq!(a.final_count, b.final_count);
    assert_eq!(a.final_count.unwrap().word_count, 6);
}

#[tokio::test]
async fn text_statuses_are_forward_looking() {
    let workflow = Workflow::new(text_set(), Arc::new(MemoryUploadStore::new()), config());
    let (_, labels) = collect_labels(&workflow, RunState::from_text("some text"), "labels").await;
    assert_eq!(
        labels,
        vec![
            LlmStatus::Processing,
            LlmStatus::Thinking,
            LlmStatus::Summarizing,
            LlmStatus::Translating,
            LlmStatus::Counting,
            LlmStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn prose_summary_is_cleaned_before_counting() {
    let analyzers = AnalyzerSet::new().with(
        Capability::Summarize,
        Arc::new(FixedAnalyzer::new(json!("Here is a summary: The quick brown fox."))),
    );
    let workflow = Workflow::new(analyzers, Arc::new(MemoryUploadStore::new()), config());

    let out = workflow.execute(RunState::from_text("long story"), "prose").await;

    assert_eq!(out.summary_data.unwrap().summary, "The quick brown fox.");
    // No translator configured: the summary passes through untranslated.
    assert_eq!(out.translated_data.unwrap().translated_text, "The quick brown fox.");
    assert_eq!(out.final_count.unwrap().word_count, 4);
}

#[tokio::test]
async fn text_failures_degrade_to_fallbacks() {
    let analyzers = AnalyzerSet::new()
        .with(Capability::Summarize, Arc::new(FixedAnalyzer::failing("boom")))
        .with(Capability::Translate, Arc::new(FixedAnalyzer::failing("boom")));
    let workflow = Workflow::new(analyzers, Arc::new(MemoryUploadStore::new()), config());

    let out = workflow.execute(RunState::from_text("a b  c"), "degrade").await;

    assert_eq!(out.summary_data.unwrap().summary, "a b  c");
    assert_eq!(out.translated_data.unwrap().translated_text, "a b  c");
    assert_eq!(out.final_count.unwrap().word_count, 3);
    assert!(out.file_errors.is_empty());
}

// ── Streaming, concurrency, checkpoints ──────────────────────────────────────

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let workflow = Workflow::new(text_set(), Arc::new(MemoryUploadStore::new()), config());

    let (s1, h1) = workflow.execute_stream(RunState::from_text("first"), "one");
    let (s2, h2) = workflow.execute_stream(RunState::from_text(""), "two");

    let e1: Vec<StatusEvent> = s1.collect().await;
    let e2: Vec<StatusEvent> = s2.collect().await;
    assert!(e1.iter().all(|e| e.run_id == "one"));
    assert!(e2.iter().all(|e| e.run_id == "two"));
    assert_eq!(e1.len(), 6);
    assert_eq!(e2.len(), 1);

    let out1 = h1.await.unwrap();
    let out2 = h2.await.unwrap();
    assert_eq!(out1.input_text.as_deref(), Some("first"));
    assert!(out2.final_count.is_none());
}

#[tokio::test]
async fn dropping_the_stream_does_not_cancel_the_run() {
    let workflow = Workflow::new(text_set(), Arc::new(MemoryUploadStore::new()), config());
    let (stream, handle) = workflow.execute_stream(RunState::from_text("words"), "dropped");
    drop(stream);

    let out = handle.await.unwrap();
    assert!(out.final_count.is_some());
    assert_eq!(out.llm_status, Some(LlmStatus::Completed));
}

#[tokio::test]
async fn resume_continues_from_next_node() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let translator = Arc::new(FixedAnalyzer::new(json!("translated")));
    let analyzers = AnalyzerSet::new().with(Capability::Translate, translator.clone());
    let workflow = Workflow::new(analyzers, Arc::new(MemoryUploadStore::new()), config())
        .with_checkpoints(store.clone());

    // A run that stopped after Summarize.
    let mut state = RunState::from_text("input text");
    state.summary_data = Some(edgequake_docflow::state::SummaryData {
        summary: "short summary".into(),
        key_points: vec![],
    });
    store
        .save(&Checkpoint::new("paused", Some(Node::Translate), state))
        .await
        .unwrap();

    let out = workflow.resume("paused").await.unwrap();
    assert_eq!(translator.calls(), 1);
    assert_eq!(out.translated_data.unwrap().translated_text, "translated");
    assert_eq!(out.final_count.unwrap().word_count, 2);

    let last = store.load("paused").await.unwrap().unwrap();
    assert!(last.is_finished());
}

#[tokio::test]
async fn file_run_checkpoints_error_termination() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let workflow = Workflow::new(AnalyzerSet::new(), Arc::new(MemoryUploadStore::new()), config())
        .with_checkpoints(store.clone());

    let out = workflow
        .execute(RunState::from_text("FILE_UPLOAD::{\"file_id\":\"gone\"}"), "err")
        .await;

    let cp = store.load("err").await.unwrap().unwrap();
    assert!(cp.is_finished());
    assert_eq!(cp.state.file_errors, out.file_errors);
}

use std::sync::Mutex;

use async_trait::async_trait;
use report_core::{BackendError, ChunkConfig, LlmConfig, ReportError};
use report_narrative::{ChatMessage, GenerationParams, NarrativePipeline, TextGenerator};
use serde_json::{json, Value};

/// In-memory backend answering through a closure and recording every request.
struct ScriptedBackend<F> {
    respond: F,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl<F> ScriptedBackend<F>
where
    F: Fn(&str) -> Result<String, BackendError> + Send + Sync,
{
    fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().expect("mutex bị poison").clone()
    }
}

#[async_trait]
impl<F> TextGenerator for ScriptedBackend<F>
where
    F: Fn(&str) -> Result<String, BackendError> + Send + Sync,
{
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> Result<String, BackendError> {
        self.calls
            .lock()
            .expect("mutex bị poison")
            .push(messages.to_vec());
        let user = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        (self.respond)(user)
    }
}

fn config(max_chunk_chars: usize) -> LlmConfig {
    LlmConfig {
        model: "gpt-mock".to_string(),
        chunk: ChunkConfig {
            max_chunk_chars,
            ..ChunkConfig::default()
        },
        ..LlmConfig::default()
    }
}

fn condition(id: &str) -> Value {
    json!({"resourceType": "Condition", "id": id, "note": "x".repeat(80)})
}

/// Three conditions, one per chunk under a 150 character limit.
fn three_chunk_input() -> Value {
    json!([condition("c1"), condition("c2"), condition("c3")])
}

fn is_findings_request(user: &str) -> bool {
    user.starts_with("FHIR chunk")
}

/// Chunk 2 answers with prose; chunks 1 and 3 answer with findings wrapped in text.
fn chunk_replies(user: &str) -> Result<String, BackendError> {
    if !is_findings_request(user) {
        return Ok("<section id=\"overview\">merged</section>".to_string());
    }
    if user.contains("\"c2\"") {
        Ok("I could not summarize this chunk.".to_string())
    } else if user.contains("\"c1\"") {
        Ok(r#"Sure: {"patient": {"name": "Jane Doe"}, "byType": {"Condition": [{"id": "c1"}]}}"#.to_string())
    } else {
        Ok(r#"{"patient": {"name": "Someone Else", "gender": "female"}, "byType": {"Condition": [{"id": "c3"}, {"id": "c1"}]}}"#.to_string())
    }
}

#[tokio::test]
async fn small_input_is_single_shot() {
    let backend = ScriptedBackend::new(|_| Ok("<section id=\"overview\">hello</section>".to_string()));
    let pipeline = NarrativePipeline::new(backend, config(250_000));
    let input = json!({
        "resourceType": "Bundle",
        "entry": [{"resource": {"resourceType": "Patient", "name": [{"text": "Jane Doe"}]}}]
    });

    let report = pipeline.generate(&input).await.expect("Không sinh được báo cáo");

    assert_eq!(pipeline.generator().calls().len(), 1);
    assert!(!report.chunked);
    assert_eq!(report.title, "Jane Doe — Health Summary");
    assert_eq!(report.body, "<section id=\"overview\">hello</section>");
    assert!(report.to_html().contains("<section id=\"overview\">hello</section>"));
}

#[tokio::test]
async fn bad_chunk_degrades_without_failing() {
    let pipeline = NarrativePipeline::new(ScriptedBackend::new(chunk_replies), config(150));

    let report = pipeline
        .generate(&three_chunk_input())
        .await
        .expect("Không sinh được báo cáo");

    let calls = pipeline.generator().calls();
    assert_eq!(calls.len(), 4);
    let synthesis: Vec<_> = calls
        .iter()
        .filter(|messages| !is_findings_request(&messages[1].content))
        .collect();
    assert_eq!(synthesis.len(), 1);

    let final_prompt = &synthesis[0][1].content;
    assert!(final_prompt.contains(r#""byType":{"Condition":[{"id":"c1"},{"id":"c3"}]}"#));
    assert!(final_prompt.contains(r#""name":"Jane Doe""#));
    assert!(final_prompt.contains(r#""gender":"female""#));
    assert!(!final_prompt.contains("\"c2\""));
    assert!(report.chunked);
    assert_eq!(report.body, "<section id=\"overview\">merged</section>");
}

#[tokio::test]
async fn oversized_loose_resource_is_sent_whole() {
    let backend = ScriptedBackend::new(|user: &str| {
        if is_findings_request(user) {
            Ok(r#"{"byType": {"Observation": [{"id": "bp"}]}}"#.to_string())
        } else {
            Ok("<section id=\"overview\">bp</section>".to_string())
        }
    });
    let pipeline = NarrativePipeline::new(backend, config(120));
    let observation = json!({
        "resourceType": "Observation",
        "id": "bp",
        "component": [
            {"code": {"text": "a".repeat(60)}},
            {"code": {"text": "b".repeat(60)}},
            {"code": {"text": "c".repeat(60)}}
        ]
    });

    let report = pipeline
        .generate(&observation)
        .await
        .expect("Không sinh được báo cáo");

    let calls = pipeline.generator().calls();
    assert_eq!(calls.len(), 2);
    let chunk_prompt = &calls[0][1].content;
    assert!(is_findings_request(chunk_prompt));
    assert!(chunk_prompt.contains(r#""resourceType":"Observation""#));
    assert!(chunk_prompt.contains(&"c".repeat(60)));
    assert!(report.chunked);
}

#[tokio::test]
async fn chunk_transport_failure_degrades() {
    let backend = ScriptedBackend::new(|user: &str| {
        if is_findings_request(user) && user.contains("\"c3\"") {
            Err(BackendError::Transport("connection reset".to_string()))
        } else {
            chunk_replies(user)
        }
    });
    let pipeline = NarrativePipeline::new(backend, config(150));
    let report = pipeline.generate(&three_chunk_input()).await;
    assert!(report.is_ok());
}

#[tokio::test]
async fn final_synthesis_failure_is_fatal() {
    let backend = ScriptedBackend::new(|user: &str| {
        if is_findings_request(user) {
            chunk_replies(user)
        } else {
            Err(BackendError::Status {
                status: 503,
                message: "overloaded".to_string(),
            })
        }
    });
    let pipeline = NarrativePipeline::new(backend, config(150));

    let err = pipeline.generate(&three_chunk_input()).await.unwrap_err();
    assert!(matches!(
        err,
        ReportError::Backend(BackendError::Status { status: 503, .. })
    ));
    assert_eq!(err.to_string(), "LLM request failed: 503 overloaded");
}

#[tokio::test]
async fn single_shot_failure_is_fatal() {
    let backend = ScriptedBackend::new(|_| Err(BackendError::MissingApiKey));
    let pipeline = NarrativePipeline::new(backend, config(250_000));
    let err = pipeline.generate(&json!([condition("c1")])).await.unwrap_err();
    assert!(matches!(err, ReportError::Backend(BackendError::MissingApiKey)));
}

#[tokio::test]
async fn unsupported_input_never_reaches_backend() {
    let pipeline = NarrativePipeline::new(ScriptedBackend::new(chunk_replies), config(250_000));

    for input in [json!(42), json!("<ClinicalDocument/>"), json!("plain text"), json!(null)] {
        let err = pipeline.generate(&input).await.unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedInput), "{input}");
    }
    let err = pipeline.generate_str("not json").await.unwrap_err();
    assert!(matches!(err, ReportError::UnsupportedInput));
    assert!(pipeline.generator().calls().is_empty());
}

#[tokio::test]
async fn json_text_input_is_accepted() {
    let backend = ScriptedBackend::new(|_| Ok("ok".to_string()));
    let pipeline = NarrativePipeline::new(backend, config(250_000));
    let report = pipeline
        .generate(&json!(r#"[{"resourceType": "Patient", "id": "p1"}]"#))
        .await
        .expect("Không sinh được báo cáo");
    assert_eq!(report.title, "p1 — Health Summary");
}

#[tokio::test]
async fn concurrent_chunks_merge_in_chunk_order() {
    let mut cfg = config(150);
    cfg.chunk.concurrency = 3;
    let pipeline = NarrativePipeline::new(ScriptedBackend::new(chunk_replies), cfg);

    pipeline
        .generate(&three_chunk_input())
        .await
        .expect("Không sinh được báo cáo");

    let calls = pipeline.generator().calls();
    let final_prompt = &calls.last().expect("thiếu request cuối")[1].content;
    assert!(final_prompt.contains(r#"[{"id":"c1"},{"id":"c3"}]"#));
    assert!(final_prompt.contains(r#""name":"Jane Doe""#));
}

#[tokio::test]
async fn debug_dir_receives_parsed_chunks_and_merge() {
    let dir = tempfile::tempdir().expect("Không tạo được thư mục tạm");
    let mut cfg = config(150);
    cfg.chunk.debug_dir = Some(dir.path().join("debug"));
    let pipeline = NarrativePipeline::new(ScriptedBackend::new(chunk_replies), cfg);

    pipeline
        .generate(&three_chunk_input())
        .await
        .expect("Không sinh được báo cáo");

    let debug = dir.path().join("debug");
    assert!(debug.join("chunk-1.json").exists());
    assert!(!debug.join("chunk-2.json").exists());
    assert!(debug.join("chunk-3.json").exists());

    let merged = std::fs::read_to_string(debug.join("merged.json")).expect("thiếu merged.json");
    let merged: Value = serde_json::from_str(&merged).expect("merged.json không hợp lệ");
    assert_eq!(merged["byType"]["Condition"].as_array().map(Vec::len), Some(2));
}

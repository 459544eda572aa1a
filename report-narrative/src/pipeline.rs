//! Chunk/merge/synthesize pipeline.

use std::path::Path;

use futures::stream::{self, StreamExt};
use report_core::{LlmConfig, ReportError};
use serde::Serialize;
use serde_json::Value;

use crate::chunk::{chunk_resources, serialized_len};
use crate::client::{GenerationParams, TextGenerator};
use crate::envelope::{patient_title, NarrativeReport};
use crate::findings::{merge_findings, parse_findings, Findings};
use crate::prompt;

/// Produces a narrative from FHIR input with a fixed backend and config.
pub struct NarrativePipeline<G> {
    generator: G,
    config: LlmConfig,
}

impl<G: TextGenerator> NarrativePipeline<G> {
    pub fn new(generator: G, config: LlmConfig) -> Self {
        Self { generator, config }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Accepts raw text that must parse as FHIR JSON.
    pub async fn generate_str(&self, raw: &str) -> Result<NarrativeReport, ReportError> {
        self.generate(&parse_fhir_text(raw)?).await
    }

    /// Single request when the serialized input fits `chunk.max_chunk_chars`,
    /// otherwise chunk findings, merge and one synthesis request.
    ///
    /// Chunk failures degrade to empty findings. Failure of the single-shot
    /// or final synthesis request fails the whole call.
    pub async fn generate(&self, input: &Value) -> Result<NarrativeReport, ReportError> {
        let parsed;
        let input = match input {
            Value::Object(_) | Value::Array(_) => input,
            Value::String(raw) => {
                parsed = parse_fhir_text(raw)?;
                &parsed
            }
            _ => return Err(ReportError::UnsupportedInput),
        };

        let title = patient_title(input);
        let size = serialized_len(input);
        let limit = self.config.chunk.max_chunk_chars;

        if size <= limit {
            tracing::info!(chars = size, limit, "single-shot narrative");
            let body = self
                .generator
                .complete(
                    &prompt::single_shot_messages(input),
                    &GenerationParams::synthesis(&self.config),
                )
                .await?;
            return Ok(NarrativeReport::new(title, body, false));
        }

        let chunks = chunk_resources(input, limit);
        tracing::info!(chars = size, limit, chunks = chunks.len(), "chunked narrative");

        let concurrency = self.config.chunk.concurrency.max(1);
        let parts: Vec<Findings> = stream::iter(
            chunks
                .iter()
                .enumerate()
                .map(|(index, chunk)| self.chunk_findings(index + 1, chunk)),
        )
        .buffered(concurrency)
        .collect()
        .await;

        let merged = merge_findings(&parts);
        self.write_debug("merged.json", &merged).await;

        let body = self
            .generator
            .complete(
                &prompt::synthesis_messages(&merged),
                &GenerationParams::synthesis(&self.config),
            )
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "final synthesis failed");
                err
            })?;
        Ok(NarrativeReport::new(title, body, true))
    }

    async fn chunk_findings(&self, number: usize, chunk: &[&Value]) -> Findings {
        let messages = prompt::findings_messages(&chunk, self.config.chunk.include_raw);
        let reply = match self
            .generator
            .complete(&messages, &GenerationParams::findings(&self.config))
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(chunk = number, error = %err, "chunk request failed; using empty findings");
                return Findings::default();
            }
        };

        match parse_findings(&reply) {
            Some(findings) => {
                self.write_debug(&format!("chunk-{number}.json"), &findings).await;
                findings
            }
            None => {
                tracing::warn!(chunk = number, chars = reply.len(), "unparseable chunk findings; using empty findings");
                Findings::default()
            }
        }
    }

    async fn write_debug(&self, file_name: &str, data: &impl Serialize) {
        let Some(dir) = self.config.chunk.debug_dir.as_deref() else {
            return;
        };
        if let Err(err) = write_json(dir, file_name, data).await {
            tracing::warn!(file = file_name, error = %err, "could not write debug file");
        }
    }
}

/// FHIR JSON text; CCDA XML and plain text are not accepted here.
fn parse_fhir_text(raw: &str) -> Result<Value, ReportError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
        _ => Err(ReportError::UnsupportedInput),
    }
}

async fn write_json(dir: &Path, file_name: &str, data: &impl Serialize) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let json = serde_json::to_vec_pretty(data)?;
    tokio::fs::write(dir.join(file_name), json).await
}

//! Narrative generation over FHIR input through a text-generation backend.
//!
//! Small inputs go out in one request. Oversized inputs are split into
//! resource-aligned chunks, each chunk is reduced to structured findings, and
//! the merged findings feed one final synthesis request.

mod chunk;
mod client;
mod envelope;
mod findings;
mod pipeline;
pub mod prompt;

pub use chunk::{chunk_resources, flatten_resources, serialized_len};
pub use client::{ChatMessage, GenerationParams, OpenAiClient, Role, TextGenerator};
pub use envelope::{patient_title, NarrativeReport};
pub use findings::{merge_findings, parse_findings, resource_key, Findings, PatientFindings};
pub use pipeline::NarrativePipeline;

use report_core::{LlmConfig, ReportError};
use serde_json::Value;

/// Runs the pipeline against the OpenAI-compatible backend described by `config`.
pub async fn generate_narrative(
    input: &Value,
    config: &LlmConfig,
) -> Result<NarrativeReport, ReportError> {
    let client = OpenAiClient::from_config(config)?;
    NarrativePipeline::new(client, config.clone())
        .generate(input)
        .await
}

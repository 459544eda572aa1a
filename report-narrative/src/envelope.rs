//! Narrative envelope: title, generated body and a minimal HTML wrapper.

use chrono::{DateTime, Utc};
use report_fhir::resolve::{first, human_name, list, text};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const STYLE: &str = ":root{--hx-font:system-ui,Segoe UI,Roboto,Helvetica,Arial,sans-serif;--hx-accent:#2563eb;--hx-muted:#6b7280}\
body{font-family:var(--hx-font);color:#111;line-height:1.6;margin:16px;max-width:900px}\
h1{font-size:1.7rem;color:var(--hx-accent);margin:0 0 8px}\
.subtle{color:var(--hx-muted);font-size:.9rem;margin-bottom:10px}\
section{margin:18px 0;padding:12px 10px;border:1px solid #e5e7eb;border-radius:8px;background:#fff}\
section h2{font-size:1.1rem;border-bottom:1px solid #eee;padding-bottom:6px;margin:0 0 10px}";

/// Generated narrative with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeReport {
    pub title: String,
    /// Backend output, HTML sections without a document wrapper.
    pub body: String,
    pub generated_at: DateTime<Utc>,
    /// Whether the chunk/merge path produced the body.
    pub chunked: bool,
}

impl NarrativeReport {
    pub fn new(title: String, body: String, chunked: bool) -> Self {
        Self {
            title,
            body,
            generated_at: Utc::now(),
            chunked,
        }
    }

    /// Standalone HTML document around the body.
    pub fn to_html(&self) -> String {
        let title = escape_html(&self.title);
        format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head>\
<body><header><h1>{title}</h1><div class=\"subtle\">AI-generated from provided clinical data</div></header>{body}</body></html>",
            body = self.body,
        )
    }
}

/// "<name> — Health Summary" when the input names a patient.
pub fn patient_title(input: &Value) -> String {
    match patient_name(input) {
        Some(name) => format!("{name} — Health Summary"),
        None => "Patient Health Summary".to_string(),
    }
}

fn patient_name(input: &Value) -> Option<String> {
    let is_patient = |r: &&Value| r.get("resourceType").and_then(Value::as_str) == Some("Patient");
    let patient = match input {
        Value::Array(items) => items.iter().find(is_patient),
        Value::Object(map) if map.get("resourceType").and_then(Value::as_str) == Some("Bundle") => {
            list(map.get("entry"))
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .find(is_patient)
        }
        Value::Object(map) => first(map.get("Patient")),
        _ => None,
    }?;
    human_name(first(patient.get("name"))).or_else(|| text(patient.get("id")))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

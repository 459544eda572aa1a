//! Prompt text for the single-shot, per-chunk findings and final synthesis requests.

use report_core::RawInclusion;
use serde::Serialize;

use crate::client::ChatMessage;
use crate::findings::Findings;

const SECTIONS: &str = "\
- <section id=\"overview\"> concise patient overview (name if present, age if derivable, brief highlights).
- <section id=\"conditions\"> prioritized conditions with plain-language explanation and current status.
- <section id=\"medications\"> current meds with purpose if inferable from codes/text; include status.
- <section id=\"trends\"> key vitals and labs trends based on Observation dates (3 most relevant).
- <section id=\"immunizations\"> list with most recent dates.
- <section id=\"care-timeline\"> important encounters/procedures in chronological bullets.
- <section id=\"next-steps\"> actionable, patient-friendly follow-ups.
- <section id=\"disclaimer\"> short disclaimer.";

/// System prompt shared by the single-shot and final synthesis requests.
pub fn report_system_prompt() -> String {
    [
        "You are a clinician-grade health report writer.",
        "Produce a patient-friendly, empathetic, and precise HTML health report.",
        "Ground every statement strictly in the provided structured context. Do not invent facts.",
        "If a detail is missing, state that it is not available.",
        "Write at an 8th-10th grade reading level, avoid jargon, explain any medical terms briefly.",
        "Be concise, use headings, bullets, and short paragraphs. No external links.",
        "Output valid semantic HTML only, no CSS, no script, no DOCTYPE.",
        "Include a small disclaimer at the end that this is informational and not medical advice.",
    ]
    .join(" ")
}

/// User prompt carrying the whole FHIR input.
pub fn fhir_user_prompt(fhir: &impl Serialize) -> String {
    format!(
        "Context FHIR JSON:\n{json}\n\n\
Task: Use ONLY the FHIR content above to write a strictly factual patient health report. Parse the resources directly (no assumptions).\n\
Guidance:\n\
- Identify Patient (Patient resource).\n\
- Summarize Conditions (Condition), Medications (MedicationRequest/MedicationStatement), Vitals & Labs (Observation), Immunizations (Immunization), Procedures (Procedure), Encounters (Encounter), Documents/Reports (DocumentReference/DiagnosticReport).\n\
- Consider effective times, statuses, and codes when summarizing.\n\
- If a field or resource is absent, state \"Not available\".\n\n\
Structure:\n{SECTIONS}\n\n\
Constraints:\n\
- Use valid semantic HTML only for sections (no <html>, <head>, <body>, no script).\n\
- Do not fabricate data; cite only from FHIR.\n\
- Keep within ~900-1400 words.",
        json = compact(fhir),
    )
}

pub fn findings_system_prompt() -> String {
    [
        "You are a clinical data summarizer.",
        "Input: a JSON array of FHIR resources (raw).",
        "Output: a JSON object covering EVERY resource in the input, grouped by resourceType.",
        "No prose, no explanations. Output VALID JSON only.",
    ]
    .join(" ")
}

/// Findings request for one chunk of resources.
pub fn findings_user_prompt(chunk: &impl Serialize, include_raw: RawInclusion) -> String {
    format!(
        "FHIR chunk (JSON array):\n{json}\n\n\
Task: Emit a JSON object that includes EVERY resource from the input, grouped by resourceType. The top-level must be:\n\
{{\n  \"patient\": {{ \"id?\": string, \"name?\": string, \"birthDate?\": string, \"gender?\": string }},\n  \
\"byType\": {{\n    \"<ResourceType>\": Array<EssentialResource>\n  }}\n}}\n\n\
EssentialResource guidelines (preserve facts only, no interpretation):\n\
- Always include: \"id\", \"resourceType\".\n\
- Include status fields if present (status, clinicalStatus, verificationStatus).\n\
- Include key codes/text: \"code\", \"type\", \"category\", with first coding (system, code, display) and any text.\n\
- Include timing: \"effectiveDateTime\", \"issued\", \"authoredOn\", \"performedDateTime\", \"occurrenceDateTime\", \"period\" (start/end) where applicable.\n\
- Include subject/patient/encounter references as IDs or displays if present.\n\
- For Observation, include value (valueQuantity/valueString/valueCodeableConcept), unit, referenceRange if present.\n\
- For DocumentReference/DiagnosticReport, include title/code/date and references.\n\
- For resources not listed above, include their key identifiers and text fields.\n\
- Do not omit any resource type. If unfamiliar, include a compact subset of its fields that convey meaning.\n\n\
Raw inclusion mode: {mode}\n\
- none: Do not include any raw.\n\
- minimal: Include important identifiers under an \"identifiers\" array and top-level \"text\" if present.\n\
- full: Add a compact \"raw\" object with the most important top-level fields from the resource (avoid extremely large blobs).\n\n\
Constraints:\n\
- Use ONLY facts present in the input.\n\
- DO NOT output prose; return JSON object ONLY.",
        json = compact(chunk),
        mode = include_raw.as_str(),
    )
}

/// Final request over merged findings.
pub fn synthesis_user_prompt(merged: &Findings) -> String {
    format!(
        "Combined Findings (JSON):\n{json}\n\n\
Task: Using ONLY these findings (which include ALL resource types grouped under \"byType\"), write a patient-friendly, strictly factual health report.\n\
Use any relevant resource types present (e.g., Condition, Observation, MedicationRequest/MedicationStatement, Immunization, Procedure, Encounter, DocumentReference, DiagnosticReport, CarePlan, Goal, Device, ImagingStudy, ServiceRequest, Appointment, Coverage, Organization/Practitioner/Role, Location, RelatedPerson, RiskAssessment, ClinicalImpression, Flag, Consent, Communication/Request, CareTeam, Task, etc.).\n\n\
Structure:\n{SECTIONS}\n\n\
Return valid HTML sections only (no <html>, <head>, <body>).",
        json = compact(merged),
    )
}

pub fn single_shot_messages(fhir: &impl Serialize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(report_system_prompt()),
        ChatMessage::user(fhir_user_prompt(fhir)),
    ]
}

pub fn findings_messages(chunk: &impl Serialize, include_raw: RawInclusion) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(findings_system_prompt()),
        ChatMessage::user(findings_user_prompt(chunk, include_raw)),
    ]
}

pub fn synthesis_messages(merged: &Findings) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(report_system_prompt()),
        ChatMessage::user(synthesis_user_prompt(merged)),
    ]
}

fn compact(value: &impl Serialize) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn findings_prompt_embeds_chunk_and_mode() {
        let chunk = vec![json!({"resourceType": "Condition", "id": "c1"})];
        let prompt = findings_user_prompt(&chunk, RawInclusion::Minimal);
        assert!(prompt.contains(r#"[{"id":"c1","resourceType":"Condition"}]"#));
        assert!(prompt.contains("Raw inclusion mode: minimal"));
        assert!(prompt.contains(r#""byType""#));
    }

    #[test]
    fn synthesis_prompt_uses_merged_findings_only() {
        let merged = Findings::default();
        let messages = synthesis_messages(&merged);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains(r#"{"patient":{},"byType":{}}"#));
        assert_eq!(messages[0].content, report_system_prompt());
    }
}

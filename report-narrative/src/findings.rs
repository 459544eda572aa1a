//! Per-chunk structured findings: lenient parsing and order-independent merge.

use std::collections::{BTreeMap, HashSet};

use report_fhir::resolve::{first, first_text, scalar_text, text};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Demographics reported by a chunk. Blank values are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientFindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// Essential resource fields grouped by `resourceType`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Findings {
    pub patient: PatientFindings,
    pub by_type: BTreeMap<String, Vec<Value>>,
}

impl Findings {
    pub fn is_empty(&self) -> bool {
        self.patient == PatientFindings::default() && self.by_type.is_empty()
    }

    /// Reads whatever fits the findings shape out of arbitrary JSON.
    /// Non-string patient fields and non-array type groups are ignored.
    fn from_value(value: &Value) -> Self {
        let patient = value.get("patient");
        let field = |name: &str| patient.and_then(|p| scalar_text(p.get(name)));
        let by_type = value
            .get("byType")
            .and_then(Value::as_object)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|(resource_type, entries)| {
                        Some((resource_type.clone(), entries.as_array()?.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Findings {
            patient: PatientFindings {
                id: field("id"),
                name: field("name"),
                birth_date: field("birthDate"),
                gender: field("gender"),
            },
            by_type,
        }
    }
}

/// Extracts the JSON object between the first `{` and the last `}` of a
/// backend reply. Returns `None` when there is no such span or it does not parse.
pub fn parse_findings(reply: &str) -> Option<Findings> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&reply[start..=end]).ok()?;
    value.is_object().then(|| Findings::from_value(&value))
}

/// Merges chunk findings. Demographics are first-non-empty-wins; type groups
/// are concatenated in chunk order and de-duplicated by [`resource_key`],
/// keeping the first occurrence.
pub fn merge_findings(parts: &[Findings]) -> Findings {
    let mut merged = Findings::default();
    for part in parts {
        let patient = &mut merged.patient;
        patient.id = patient.id.take().or_else(|| part.patient.id.clone());
        patient.name = patient.name.take().or_else(|| part.patient.name.clone());
        patient.birth_date = patient
            .birth_date
            .take()
            .or_else(|| part.patient.birth_date.clone());
        patient.gender = patient.gender.take().or_else(|| part.patient.gender.clone());

        for (resource_type, entries) in &part.by_type {
            merged
                .by_type
                .entry(resource_type.clone())
                .or_default()
                .extend(entries.iter().cloned());
        }
    }

    for (resource_type, entries) in merged.by_type.iter_mut() {
        let mut seen = HashSet::new();
        entries.retain(|entry| seen.insert(resource_key(resource_type, entry)));
    }
    merged
}

const DATE_FIELDS: &[&str] = &[
    "/effectiveDateTime",
    "/issued",
    "/authoredOn",
    "/performedDateTime",
    "/occurrenceDateTime",
    "/date",
];

/// De-duplication key for a findings entry, in priority order: own id,
/// first business identifier, first coding plus primary date, then the
/// leading 200 characters of its serialization.
///
/// Distinct entries without id, identifier or coding can collide.
pub fn resource_key(resource_type: &str, entry: &Value) -> String {
    if let Some(id) = scalar_text(entry.get("id")) {
        return format!("{resource_type}:id:{id}");
    }

    if let Some(identifier) = entry.get("identifier") {
        let pick = if identifier.is_array() {
            first(Some(identifier))
        } else {
            Some(identifier)
        };
        if let Some(pick) = pick {
            let system = text(pick.get("system"))
                .or_else(|| text(pick.get("assigner")))
                .unwrap_or_default();
            let value = ["value", "identifier", "id"]
                .iter()
                .find_map(|field| scalar_text(pick.get(*field)));
            if let Some(value) = value {
                return format!("{resource_type}:ident:{system}|{value}");
            }
        }
    }

    let coding = ["/code/coding/0", "/type/coding/0", "/category/0/coding/0"]
        .iter()
        .find_map(|pointer| entry.pointer(pointer));
    if let Some(code) = coding.and_then(|c| scalar_text(c.get("code"))) {
        let system = coding.and_then(|c| text(c.get("system"))).unwrap_or_default();
        let date = first_text(entry, DATE_FIELDS).unwrap_or_default();
        return format!("{resource_type}:code:{system}|{code}@{date}");
    }

    let json: String = serde_json::to_string(entry)
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect();
    format!("{resource_type}:json:{json}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn findings(value: Value) -> Findings {
        Findings::from_value(&value)
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let reply = "Here is the result:\n```json\n{\"patient\": {\"name\": \"Jane\"}, \"byType\": {\"Condition\": [{\"id\": \"c1\"}]}}\n```\nDone.";
        let parsed = parse_findings(reply).expect("Không đọc được findings");
        assert_eq!(parsed.patient.name.as_deref(), Some("Jane"));
        assert_eq!(parsed.by_type["Condition"].len(), 1);
    }

    #[test]
    fn unparseable_replies_yield_none() {
        assert!(parse_findings("no json here").is_none());
        assert!(parse_findings("} backwards {").is_none());
        assert!(parse_findings("{ not: valid }").is_none());
    }

    #[test]
    fn lenient_about_shape() {
        let parsed = findings(json!({
            "patient": {"id": 7, "name": "  ", "gender": {"x": 1}},
            "byType": {"Condition": [{"id": "c1"}], "Broken": "nope"}
        }));
        assert_eq!(parsed.patient.id.as_deref(), Some("7"));
        assert!(parsed.patient.name.is_none());
        assert!(parsed.patient.gender.is_none());
        assert!(!parsed.by_type.contains_key("Broken"));
    }

    #[test]
    fn key_priority() {
        assert_eq!(resource_key("Condition", &json!({"id": "c1", "identifier": [{"value": "x"}]})), "Condition:id:c1");
        assert_eq!(
            resource_key("Condition", &json!({"identifier": [{"system": "urn:a", "value": "x"}]})),
            "Condition:ident:urn:a|x"
        );
        assert_eq!(
            resource_key("Observation", &json!({"code": {"coding": [{"system": "http://loinc.org", "code": "8867-4"}]}, "effectiveDateTime": "2024-01-01"})),
            "Observation:code:http://loinc.org|8867-4@2024-01-01"
        );
        let long = json!({"text": "y".repeat(500)});
        let key = resource_key("Basic", &long);
        assert!(key.starts_with("Basic:json:{\"text\""));
        assert_eq!(key.chars().count(), "Basic:json:".len() + 200);
    }

    #[test]
    fn demographics_first_non_empty_wins() {
        let a = findings(json!({"patient": {"name": "Jane Doe"}}));
        let b = findings(json!({"patient": {"name": "J. Doe", "birthDate": "1970-01-01"}}));
        let merged = merge_findings(&[a, b]);
        assert_eq!(merged.patient.name.as_deref(), Some("Jane Doe"));
        assert_eq!(merged.patient.birth_date.as_deref(), Some("1970-01-01"));
    }

    #[test]
    fn merge_is_order_independent_as_sets() {
        let a = findings(json!({"byType": {
            "Condition": [{"id": "c1"}, {"id": "c2"}],
            "Observation": [{"code": {"coding": [{"code": "8867-4"}]}, "issued": "2024-01-01"}]
        }}));
        let b = findings(json!({"byType": {
            "Condition": [{"id": "c2", "note": "later copy"}, {"id": "c3"}],
            "Observation": [{"code": {"coding": [{"code": "8867-4"}]}, "issued": "2024-01-01"}]
        }}));

        let keys = |merged: &Findings| -> BTreeMap<String, BTreeSet<String>> {
            merged
                .by_type
                .iter()
                .map(|(rt, entries)| (rt.clone(), entries.iter().map(|e| resource_key(rt, e)).collect()))
                .collect()
        };
        let ab = merge_findings(&[a.clone(), b.clone()]);
        let ba = merge_findings(&[b, a]);
        assert_eq!(keys(&ab), keys(&ba));
        assert_eq!(ab.by_type["Condition"].len(), 3);
        assert_eq!(ab.by_type["Observation"].len(), 1);
        // First occurrence is kept.
        assert!(ab.by_type["Condition"][1].get("note").is_none());
    }

    #[test]
    fn serializes_in_prompt_shape() {
        let merged = merge_findings(&[findings(json!({"patient": {"birthDate": "1970-01-01"}, "byType": {}}))]);
        assert_eq!(
            serde_json::to_value(&merged).expect("Không serialize được findings"),
            json!({"patient": {"birthDate": "1970-01-01"}, "byType": {}})
        );
    }
}

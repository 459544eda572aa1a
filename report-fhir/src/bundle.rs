//! Bundle Normalizer: FHIR Bundle → canonical IR.

use report_core::{ReportError, ReportIr};
use serde_json::{json, Value};

use crate::registry::{default_registry, Registry};
use crate::resolve::list;

/// Normalizes a Bundle with the built-in registry.
pub fn normalize_bundle(bundle: &Value) -> Result<ReportIr, ReportError> {
    normalize_bundle_with(bundle, default_registry())
}

/// Normalizes a Bundle, dispatching every typed resource through `registry`.
///
/// Resources without a type tag are skipped. Panel points are sorted once
/// every resource has been processed.
pub fn normalize_bundle_with(bundle: &Value, registry: &Registry) -> Result<ReportIr, ReportError> {
    match bundle.get("resourceType").and_then(Value::as_str) {
        Some("Bundle") => {}
        Some(other) => {
            return Err(ReportError::MalformedCollection(format!(
                "expected resourceType Bundle, found {other}"
            )))
        }
        None => {
            return Err(ReportError::MalformedCollection(
                "expected FHIR Bundle with resourceType".to_string(),
            ))
        }
    }

    let mut ir = ReportIr::new();
    let mut skipped = 0usize;
    for entry in list(bundle.get("entry")) {
        let Some(resource) = entry.get("resource") else {
            skipped += 1;
            continue;
        };
        let Some(resource_type) = resource_type(resource) else {
            skipped += 1;
            continue;
        };
        ir.count_resource(resource_type);
        registry.dispatch(resource_type).apply(resource, &mut ir);
    }
    ir.sort_panels();

    tracing::debug!(
        resources = ir.other.fhir_counts.values().sum::<usize>(),
        types = ir.other.fhir_counts.len(),
        skipped,
        unhandled = ir.raw.as_ref().map_or(0, |raw| raw.fhir.len()),
        "normalized bundle"
    );
    Ok(ir)
}

/// Wraps loose resources into a synthetic `collection` Bundle.
///
/// Items that are not objects with a string `resourceType` are dropped.
pub fn bundle_from_resources<'a, I>(resources: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let entry: Vec<Value> = resources
        .into_iter()
        .filter(|resource| resource_type(resource).is_some())
        .map(|resource| json!({ "resource": resource }))
        .collect();
    json!({ "resourceType": "Bundle", "type": "collection", "entry": entry })
}

pub(crate) fn resource_type(resource: &Value) -> Option<&str> {
    resource
        .get("resourceType")
        .and_then(Value::as_str)
        .filter(|resource_type| !resource_type.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_bundle() {
        let err = normalize_bundle(&json!({"resourceType": "Patient"})).unwrap_err();
        assert!(matches!(err, ReportError::MalformedCollection(_)));
        let err = normalize_bundle(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ReportError::MalformedCollection(_)));
    }

    #[test]
    fn bundle_without_entries_is_empty_ir() {
        let ir = normalize_bundle(&json!({"resourceType": "Bundle"})).expect("Bundle rỗng phải hợp lệ");
        assert_eq!(ir, ReportIr::new());
    }

    #[test]
    fn untyped_resources_are_skipped_and_unknown_kept_raw() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"id": "no-type"}},
                {"fullUrl": "urn:uuid:1"},
                {"resource": {"resourceType": "Basic", "id": "b1"}},
                {"resource": {"resourceType": "Patient", "id": "p1"}}
            ]
        });
        let ir = normalize_bundle(&bundle).expect("Không chuẩn hóa được bundle");
        assert_eq!(ir.other.fhir_counts.len(), 2);
        assert_eq!(ir.other.fhir_counts["Basic"], 1);
        assert_eq!(ir.patient.id.as_deref(), Some("p1"));
        let raw = ir.raw.expect("thiếu vùng _raw");
        assert_eq!(raw.fhir[0]["id"], "b1");
    }

    #[test]
    fn synthetic_bundle_drops_untyped_items() {
        let items = vec![
            json!({"resourceType": "Patient"}),
            json!("text"),
            json!({"resourceType": 3}),
        ];
        let bundle = bundle_from_resources(&items);
        assert_eq!(bundle["type"], "collection");
        assert_eq!(bundle["entry"].as_array().map(Vec::len), Some(1));
    }
}

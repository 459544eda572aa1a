//! FHIR Bundle → legacy domain-noun record, the inverse direction of [`super::legacy_to_ir`].

use report_core::ReportError;
use serde_json::{json, Map, Value};

use crate::bundle::resource_type;
use crate::extract::observation::{social_value, Categories, OBSERVATION_TIME};
use crate::resolve::{
    concept_text, concept_code, finite_number, first, first_text, format_address, format_quantity,
    human_name, join_non_empty, list, scalar_text, strip_tags, text, text_at,
};

/// Converts a Bundle into the record shape read by [`super::legacy_to_ir`].
///
/// Absent fields are omitted rather than written as `null`.
pub fn fhir_to_legacy_record(bundle: &Value) -> Result<Value, ReportError> {
    if bundle.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return Err(ReportError::MalformedCollection(
            "expected FHIR Bundle".to_string(),
        ));
    }
    let resources: Vec<&Value> = list(bundle.get("entry"))
        .iter()
        .filter_map(|entry| entry.get("resource"))
        .filter(|resource| resource_type(resource).is_some())
        .collect();

    let mut record = Map::new();

    if let Some(patient) = of_type(&resources, "Patient").next() {
        let name = first(patient.get("name"));
        record.insert(
            "demographics".to_string(),
            json!({
                "mrn": text(patient.get("id")),
                "name": {
                    "first": name.and_then(|n| first(n.get("given"))).and_then(|g| text(Some(g))),
                    "last": name.and_then(|n| text(n.get("family"))),
                    "full": human_name(name),
                },
                "dob": text(patient.get("birthDate")),
                "gender": text(patient.get("gender")),
                "identifiers": list(patient.get("identifier"))
                    .iter()
                    .map(|id| json!({"identifier": text(id.get("value")), "system": text(id.get("system"))}))
                    .collect::<Vec<_>>(),
            }),
        );
    }

    let medications = of_type(&resources, "MedicationRequest")
        .map(|r| medication(r, "/dosageInstruction/0", json!({"start": text(r.get("authoredOn"))})))
        .chain(of_type(&resources, "MedicationStatement").map(|r| {
            medication(
                r,
                "/dosage/0",
                json!({
                    "start": text_at(r, "/effectivePeriod/start"),
                    "end": text_at(r, "/effectivePeriod/end"),
                }),
            )
        }))
        .collect::<Vec<_>>();
    record.insert("medications".to_string(), Value::Array(medications));

    insert(&mut record, "problems", of_type(&resources, "Condition").map(|r| {
        json!({
            "problem": {"name": concept_text(r.get("code")), "code": code_record(r.get("code"))},
            "status": concept_code(r.get("clinicalStatus")),
            "date_range": {
                "start": first_text(r, &["/onsetDateTime", "/onsetPeriod/start"]),
                "end": first_text(r, &["/abatementDateTime", "/abatementPeriod/end"]),
            },
        })
    }));

    let mut labs: Vec<(String, Value)> = Vec::new();
    let mut vitals: Vec<(String, Value)> = Vec::new();
    let mut social = Vec::new();
    for observation in of_type(&resources, "Observation") {
        let categories = Categories::of(observation);
        let date = first_text(observation, OBSERVATION_TIME);
        let name = concept_text(observation.get("code"));
        if categories.social {
            social.push(json!({
                "name": name.clone().unwrap_or_else(|| "Social history".to_string()),
                "value": social_value(observation),
                "date_time": date,
            }));
        }
        if !categories.laboratory && !categories.vital {
            continue;
        }
        let Some(v) = finite_number(observation.pointer("/valueQuantity/value")) else {
            continue;
        };
        let result = json!({
            "date": date,
            "value": v,
            "unit": text_at(observation, "/valueQuantity/unit"),
        });
        let code = code_record(observation.get("code"));
        if categories.vital {
            let name = name.unwrap_or_else(|| "Vital".to_string());
            group(&mut vitals, name.clone(), || json!({"name": name, "code": code, "results": []}), result);
        } else {
            let name = name.unwrap_or_else(|| "Lab".to_string());
            group(&mut labs, name.clone(), || json!({"panel": {"name": name, "code": code}, "results": []}), result);
        }
    }
    insert(&mut record, "results", labs.into_iter().map(|(_, panel)| panel));
    insert(&mut record, "vitals", vitals.into_iter().map(|(_, panel)| panel));
    insert(&mut record, "social_history", social.into_iter());

    insert(&mut record, "allergies", of_type(&resources, "AllergyIntolerance").map(|r| {
        let concept = r.get("code").or_else(|| r.get("substance"));
        json!({
            "substance": {"name": concept_text(concept), "code": code_record(concept)},
            "reactions": list(r.get("reaction"))
                .iter()
                .map(|reaction| json!({"reaction": concept_text(first(reaction.get("manifestation")))}))
                .collect::<Vec<_>>(),
            "status": concept_code(r.get("clinicalStatus")),
            "severity": text(r.get("criticality")),
        })
    }));

    insert(&mut record, "immunizations", of_type(&resources, "Immunization").map(|r| {
        json!({
            "product": {"name": concept_text(r.get("vaccineCode")), "code": code_record(r.get("vaccineCode"))},
            "date_time": first_text(r, &["/occurrenceDateTime", "/occurrenceString", "/date"]),
            "status": text(r.get("status")),
        })
    }));

    insert(&mut record, "encounters", of_type(&resources, "Encounter").map(|r| {
        let kind = first(r.get("type"));
        json!({
            "name": concept_text(kind),
            "code": code_record(kind),
            "date_time": text_at(r, "/period/start"),
            "date_range": {"start": text_at(r, "/period/start"), "end": text_at(r, "/period/end")},
            "locations": list(r.get("location"))
                .iter()
                .map(|l| json!({"name": text_at(l, "/location/display")}))
                .collect::<Vec<_>>(),
            "reason": concept_text(first(r.get("reasonCode"))),
        })
    }));

    insert(&mut record, "procedures", of_type(&resources, "Procedure").map(|r| {
        json!({
            "name": concept_text(r.get("code")),
            "code": code_record(r.get("code")),
            "date_time": first_text(r, &["/performedDateTime", "/performedPeriod/start", "/performedString"]),
            "performers": list(r.get("performer"))
                .iter()
                .map(|p| json!({"name": text_at(p, "/actor/display")}))
                .collect::<Vec<_>>(),
        })
    }));

    insert(&mut record, "devices", of_type(&resources, "Device").map(|r| {
        let kind = first(r.get("type"));
        let udi = first(r.get("udiCarrier")).and_then(|carrier| text(carrier.get("deviceIdentifier")));
        json!({
            "name": first(r.get("deviceName")).and_then(|d| text(d.get("name"))).or_else(|| concept_text(kind)),
            "code": code_record(kind),
            "status": text(r.get("status")),
            "identifiers": udi.map(|udi| vec![json!({"identifier": udi})]),
        })
    }));

    insert(&mut record, "documents", of_type(&resources, "DocumentReference").map(|r| {
        let attachment = first(r.get("content")).and_then(|c| c.get("attachment"));
        json!({
            "title": text(r.get("description")).or_else(|| attachment.and_then(|a| text(a.get("title")))),
            "code": code_record(r.get("type")),
            "date_time": text(r.get("date")),
            "url": attachment.and_then(|a| text(a.get("url"))),
        })
    }));

    insert(&mut record, "results_interpreted", of_type(&resources, "DiagnosticReport").map(|r| {
        json!({
            "name": concept_text(r.get("code")),
            "code": code_record(r.get("code")),
            "date_time": first_text(r, &["/effectiveDateTime", "/effectivePeriod/start", "/issued"]),
            "results": list(r.get("result"))
                .iter()
                .map(|x| json!({"name": text(x.get("display")).or_else(|| text(x.get("reference")))}))
                .collect::<Vec<_>>(),
        })
    }));

    insert(&mut record, "imaging", of_type(&resources, "ImagingStudy").map(|r| {
        json!({
            "modality": first_text(r, &["/series/0/modality/display", "/series/0/modality/code", "/modality/0/display", "/modality/0/code"]),
            "body_site": first_text(r, &["/series/0/bodySite/display", "/series/0/bodySite/code"]),
            "date_time": text(r.get("started")),
            "name": text(r.get("description")),
        })
    }));

    insert(&mut record, "orders", of_type(&resources, "ServiceRequest").map(|r| {
        json!({
            "name": concept_text(r.get("code")),
            "code": code_record(r.get("code")),
            "status": text(r.get("status")),
            "date_time": first_text(r, &["/authoredOn", "/occurrenceDateTime", "/occurrencePeriod/start"]),
        })
    }));

    insert(&mut record, "nutrition", of_type(&resources, "NutritionOrder").map(|r| {
        json!({
            "date_time": text(r.get("dateTime")),
            "status": text(r.get("status")),
            "diet": join_non_empty(
                list(r.pointer("/oralDiet/type")).iter().filter_map(|t| concept_text(Some(t))),
                ", ",
            ),
            "instruction": concept_text(r.pointer("/oralDiet/instruction"))
                .or_else(|| first(r.get("note")).and_then(|note| text(note.get("text")))),
        })
    }));

    insert(&mut record, "appointments", of_type(&resources, "Appointment").map(|r| {
        json!({
            "start": text(r.get("start")),
            "end": text(r.get("end")),
            "status": text(r.get("status")),
            "type": concept_text(r.get("appointmentType")),
            "reason": concept_text(first(r.get("reasonCode"))),
            "location": list(r.get("participant")).iter().find_map(|p| text_at(p, "/actor/display")),
        })
    }));

    insert(&mut record, "organizations", of_type(&resources, "Organization").map(|r| {
        json!({
            "name": text(r.get("name")),
            "type": concept_text(first(r.get("type"))),
            "phone": first_telecom(r),
        })
    }));

    insert(&mut record, "providers", of_type(&resources, "Practitioner").map(|r| {
        json!({
            "name": {"full": human_name(first(r.get("name")))},
            "specialty": first(r.get("qualification")).and_then(|q| concept_text(q.get("code"))),
            "phone": first_telecom(r),
        })
    }));

    insert(&mut record, "provider_roles", of_type(&resources, "PractitionerRole").map(|r| {
        json!({
            "practitioner": {"name": text_at(r, "/practitioner/display")},
            "organization": {"name": text_at(r, "/organization/display")},
            "specialty": concept_text(first(r.get("specialty"))),
            "location": first(r.get("location")).and_then(|l| text(l.get("display"))),
        })
    }));

    insert(&mut record, "facilities", of_type(&resources, "Location").map(|r| {
        json!({
            "name": text(r.get("name")),
            "type": concept_text(first(r.get("type"))),
            "address": format_address(r.get("address")),
            "phone": first_telecom(r),
        })
    }));

    insert(&mut record, "contacts", of_type(&resources, "RelatedPerson").map(|r| {
        json!({
            "name": {"full": human_name(first(r.get("name")))},
            "relationship": concept_text(first(r.get("relationship"))),
            "phone": first_telecom(r),
        })
    }));

    insert(&mut record, "risk_assessments", of_type(&resources, "RiskAssessment").map(|r| {
        json!({
            "name": concept_text(r.get("code"))
                .or_else(|| concept_text(r.get("condition")))
                .unwrap_or_else(|| "Risk Assessment".to_string()),
            "date_time": first_text(r, &["/occurrenceDateTime", "/occurrencePeriod/start"]),
            "text": strip_tags(r.pointer("/text/div")),
            "probability": first(r.get("prediction")).and_then(|p| {
                text(p.get("probabilityString")).or_else(|| {
                    p.get("probabilityDecimal")
                        .and_then(Value::as_f64)
                        .map(|decimal| format!("{}%", (decimal * 100.0).round()))
                })
            }),
        })
    }));

    insert(&mut record, "medication_administrations", of_type(&resources, "MedicationAdministration").map(|r| {
        let dosage = r.get("dosage");
        json!({
            "date_time": first_text(r, &["/effectiveDateTime", "/effectivePeriod/start", "/occurrenceDateTime", "/occurrencePeriod/start"]),
            "medication": medication_name(r),
            "dose": format_quantity(dosage.and_then(|d| d.get("dose")))
                .or_else(|| dosage.and_then(|d| text(d.get("text")))),
            "route": concept_text(dosage.and_then(|d| d.get("route"))),
            "performer": first(r.get("performer")).and_then(|p| text_at(p, "/actor/display")),
        })
    }));

    insert(&mut record, "medication_dispenses", of_type(&resources, "MedicationDispense").map(|r| {
        json!({
            "date_time": first_text(r, &["/whenHandedOver", "/whenPrepared"]),
            "medication": medication_name(r),
            "quantity": format_quantity(r.get("quantity")),
            "days_supply": format_quantity(r.get("daysSupply")),
            "performer": first(r.get("performer")).and_then(|p| text_at(p, "/actor/display")),
        })
    }));

    insert(&mut record, "clinical_impressions", of_type(&resources, "ClinicalImpression").map(|r| {
        json!({
            "date_time": first_text(r, &["/date", "/effectiveDateTime", "/effectivePeriod/start"]),
            "summary": first_text(r, &["/summary", "/description"]),
            "status": text(r.get("status")),
        })
    }));

    insert(&mut record, "flags", of_type(&resources, "Flag").map(|r| {
        json!({
            "status": text(r.get("status")),
            "code": first(r.pointer("/code/coding")).cloned(),
            "category": concept_text(first(r.get("category"))),
            "period": r.get("period").cloned(),
        })
    }));

    insert(&mut record, "plan_of_care", of_type(&resources, "CarePlan").map(|r| {
        json!({
            "name": first_text(r, &["/title", "/description"]).unwrap_or_else(|| "Care Plan".to_string()),
            "status": text(r.get("status")),
            "date_time": text_at(r, "/period/start"),
            "date_range": {"start": text_at(r, "/period/start"), "end": text_at(r, "/period/end")},
            "activities": list(r.get("activity"))
                .iter()
                .filter_map(|a| {
                    let detail = a.get("detail")?;
                    text(detail.get("description")).or_else(|| concept_text(detail.get("code")))
                })
                .map(|name| json!({"name": name}))
                .collect::<Vec<_>>(),
        })
    }));

    insert(&mut record, "goals", of_type(&resources, "Goal").map(|r| {
        let target = first(r.get("target"));
        json!({
            "name": concept_text(r.get("description")).unwrap_or_else(|| "Goal".to_string()),
            "status": first_text(r, &["/lifecycleStatus", "/status"]),
            "target": target.and_then(|t| {
                text(t.get("detailString")).or_else(|| scalar_text(t.pointer("/detailQuantity/value")))
            }),
            "due": target.and_then(|t| text(t.get("dueDate"))),
        })
    }));

    insert(&mut record, "family_history", of_type(&resources, "FamilyMemberHistory").map(|r| {
        let condition = first(r.get("condition"));
        json!({
            "name": concept_text(r.get("relationship")),
            "problem": {"name": condition.and_then(|c| concept_text(c.get("code")))},
            "age": condition.and_then(|c| scalar_text(c.pointer("/onsetAge/value"))),
            "onset": condition.and_then(|c| text(c.get("onsetString"))),
        })
    }));

    insert(&mut record, "questionnaires", of_type(&resources, "QuestionnaireResponse").map(|r| {
        let questionnaire = r.get("questionnaire");
        json!({
            "title": questionnaire.and_then(|q| {
                text(q.get("display")).or_else(|| text(q.get("reference"))).or_else(|| text(Some(q)))
            }),
            "date_time": text(r.get("authored")),
            "items": list(r.get("item"))
                .iter()
                .map(|item| {
                    let answers = list(item.get("answer"))
                        .iter()
                        .filter_map(|a| {
                            text(a.get("valueString"))
                                .or_else(|| text_at(a, "/valueCoding/display"))
                                .or_else(|| scalar_text(a.get("valueInteger")))
                                .or_else(|| scalar_text(a.get("valueDecimal")))
                        });
                    json!({"question": text(item.get("text")), "answer": join_non_empty(answers, ", ")})
                })
                .collect::<Vec<_>>(),
        })
    }));

    insert(&mut record, "insurance", of_type(&resources, "Coverage").map(|r| {
        json!({
            "plan_name": first(r.get("payor")).and_then(|p| text(p.get("display"))),
            "type": concept_text(r.get("type")),
            "status": text(r.get("status")),
            "date_range": {"start": text_at(r, "/period/start"), "end": text_at(r, "/period/end")},
            "member_id": first_text(r, &["/subscriberId", "/beneficiary/identifier/value"]),
        })
    }));

    Ok(prune_nulls(Value::Object(record)))
}

fn of_type<'a>(resources: &'a [&'a Value], wanted: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    resources
        .iter()
        .copied()
        .filter(move |resource| resource_type(resource) == Some(wanted))
}

fn medication_concept(r: &Value) -> Option<&Value> {
    r.get("medicationCodeableConcept")
        .or_else(|| r.pointer("/medication/concept"))
        .or_else(|| r.pointer("/medication/codeableConcept"))
}

fn medication_name(r: &Value) -> Option<String> {
    concept_text(medication_concept(r)).or_else(|| text_at(r, "/medicationReference/display"))
}

fn medication(r: &Value, dosage_pointer: &str, date_range: Value) -> Value {
    let dosage = r.pointer(dosage_pointer);
    let quantity = dosage.and_then(|d| d.pointer("/doseAndRate/0/doseQuantity"));
    json!({
        "product": {"name": medication_name(r), "code": code_record(medication_concept(r))},
        "dose": {
            "text": dosage.and_then(|d| text(d.get("text"))),
            "value": quantity.and_then(|q| scalar_text(q.get("value"))),
            "unit": quantity.and_then(|q| text(q.get("unit"))),
        },
        "status": text(r.get("status")),
        "date_range": date_range,
    })
}

/// First coding as a legacy `{system, code, name}` object.
fn code_record(concept: Option<&Value>) -> Value {
    match concept.and_then(|c| first(c.get("coding"))) {
        Some(coding) => json!({
            "system": text(coding.get("system")),
            "code": text(coding.get("code")),
            "name": text(coding.get("display")),
        }),
        None => Value::Null,
    }
}

fn first_telecom(r: &Value) -> Option<String> {
    first(r.get("telecom")).and_then(|t| text(t.get("value")))
}

/// Appends a result to the panel keyed by `name`, creating the panel on first use.
fn group(panels: &mut Vec<(String, Value)>, name: String, create: impl FnOnce() -> Value, result: Value) {
    let index = match panels.iter().position(|(key, _)| *key == name) {
        Some(index) => index,
        None => {
            panels.push((name, create()));
            panels.len() - 1
        }
    };
    if let Some(results) = panels[index].1.get_mut("results").and_then(Value::as_array_mut) {
        results.push(result);
    }
}

fn insert(record: &mut Map<String, Value>, key: &str, items: impl Iterator<Item = Value>) {
    record.insert(key.to_string(), Value::Array(items.collect()));
}

fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(prune_nulls).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_bundle() {
        let err = fhir_to_legacy_record(&json!({"resourceType": "Patient"})).unwrap_err();
        assert!(matches!(err, ReportError::MalformedCollection(_)));
    }

    #[test]
    fn groups_lab_results_by_name() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Observation", "category": [{"coding": [{"code": "laboratory"}]}],
                    "code": {"text": "Glucose"}, "valueQuantity": {"value": 99, "unit": "mg/dL"}, "effectiveDateTime": "2024-01-01"}},
                {"resource": {"resourceType": "Observation", "category": [{"coding": [{"code": "laboratory"}]}],
                    "code": {"text": "Glucose"}, "valueQuantity": {"value": 104, "unit": "mg/dL"}, "effectiveDateTime": "2024-02-01"}},
                {"resource": {"resourceType": "Observation", "category": [{"coding": [{"code": "laboratory"}]}],
                    "code": {"text": "Glucose"}, "valueQuantity": {"value": "bad"}}}
            ]
        });
        let record = fhir_to_legacy_record(&bundle).expect("Không chuyển đổi được");
        let results = record["results"].as_array().expect("thiếu results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["panel"]["name"], "Glucose");
        assert_eq!(results[0]["results"].as_array().map(Vec::len), Some(2));
        assert!(results[0]["panel"].get("code").is_none());
        assert!(record.get("demographics").is_none());
    }
}

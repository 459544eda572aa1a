//! Legacy Normalizer: domain-noun records produced by CCDA tooling → canonical IR.
//!
//! The record keys are nouns (`medications`, `problems`, `results`...) instead
//! of FHIR resource types, and values are loose: a field may hold a string, a
//! number or an object with a `name`. Collections this shape never carries
//! (financial, consent, workflow) are left empty so both routes produce the
//! same IR shape.

mod from_bundle;

pub use from_bundle::fhir_to_legacy_record;

use std::collections::BTreeMap;

use report_core::{
    Allergy, Appointment, CarePlan, ClinicalImpression, Code, Condition, ContactPoint,
    DiagnosticReport, Device, Document, Encounter, FamilyHistory, Flag, Goal, Identifier,
    ImagingStudy, Immunization, Location, Medication, MedicationAdministration,
    MedicationDispense, NormalizeOptions, NutritionOrder, Organization, Patient, Practitioner,
    PractitionerRole, Procedure, Questionnaire, RawOverflow, RelatedPerson, ReportError, ReportIr,
    RiskAssessment, SeriesPoint, ServiceRequest, SocialHistory,
};
use serde_json::Value;

use crate::resolve::{finite_number, join_non_empty, list, scalar_text, text};

/// Normalizes a legacy record set into the canonical IR.
pub fn legacy_to_ir(record: &Value, options: NormalizeOptions) -> Result<ReportIr, ReportError> {
    let Some(object) = record.as_object() else {
        return Err(ReportError::MalformedCollection(
            "expected an object keyed by record type".to_string(),
        ));
    };

    let mut ir = ReportIr::new();
    ir.patient = patient(record.get("demographics"));

    for m in records(record, &["medications"]) {
        let product = m.get("product");
        let dose = m.get("dose");
        ir.medications.push(Medication {
            name: name_of(product)
                .or_else(|| name_of(product.and_then(|p| p.get("code"))))
                .unwrap_or_else(|| "Medication".to_string()),
            code: code_of(product.and_then(|p| p.get("code"))),
            status: pick(m, &["/status"]),
            dosage: dose.and_then(|dose| {
                pick(dose, &["/text"]).or_else(|| {
                    let value = pick(dose, &["/value"])?;
                    let unit = pick(dose, &["/unit"])?;
                    Some(format!("{value} {unit}"))
                })
            }),
            start: pick(m, &["/date_range/start"]),
            end: pick(m, &["/date_range/end"]),
        });
    }

    for p in records(record, &["problems"]) {
        let problem = p.get("problem");
        ir.conditions.push(Condition {
            name: name_of(problem)
                .or_else(|| name_of(problem.and_then(|p| p.get("code"))))
                .unwrap_or_else(|| "Condition".to_string()),
            code: code_of(problem.and_then(|p| p.get("code"))),
            onset: pick(p, &["/date_range/start"]),
            abatement: pick(p, &["/date_range/end"]),
            clinical_status: pick(p, &["/status"]),
            verification_status: None,
        });
    }

    for panel in records(record, &["results"]) {
        let header = panel.get("panel");
        let name = name_of(header)
            .or_else(|| pick(panel, &["/name"]))
            .unwrap_or_else(|| "Lab".to_string());
        let code = code_of(header.and_then(|h| h.get("code")));
        for point in series(panel) {
            ir.push_lab_point(&name, code.clone(), point);
        }
    }

    for vital in records(record, &["vitals"]) {
        let name = pick(vital, &["/name"]).unwrap_or_else(|| "Vital".to_string());
        let code = code_of(vital.get("code"));
        for point in series(vital) {
            ir.push_vital_point(&name, code.clone(), point);
        }
    }

    for a in records(record, &["allergies"]) {
        let substance = a.get("substance");
        let reaction = list(a.get("reactions")).first().map(|r| r.get("reaction"));
        ir.allergies.push(Allergy {
            name: name_of(substance)
                .or_else(|| name_of(substance.and_then(|s| s.get("code"))))
                .unwrap_or_else(|| "Allergy".to_string()),
            code: code_of(substance.and_then(|s| s.get("code"))),
            reaction: reaction
                .and_then(name_of)
                .or_else(|| name_of(a.get("reaction"))),
            status: pick(a, &["/status"]),
            criticality: pick(a, &["/severity/code/name"])
                .or_else(|| pick(a, &["/severity", "/criticality"])),
        });
    }

    for i in records(record, &["immunizations"]) {
        let product = i.get("product");
        ir.immunizations.push(Immunization {
            name: name_of(product)
                .or_else(|| name_of(product.and_then(|p| p.get("code"))))
                .unwrap_or_else(|| "Immunization".to_string()),
            code: code_of(product.and_then(|p| p.get("code"))),
            date: pick(i, &["/date", "/date_time"]),
            status: pick(i, &["/status"]),
        });
    }

    for e in records(record, &["encounters"]) {
        ir.encounters.push(Encounter {
            kind: pick(e, &["/name", "/code/name"]),
            code: code_of(e.get("code")),
            start: pick(e, &["/date_time", "/date", "/date_range/start"]),
            end: pick(e, &["/date_range/end"]),
            location: list(e.get("locations")).first().and_then(|l| pick(l, &["/name"])),
            reason: name_of(e.get("reason")).or_else(|| pick(e, &["/finding/name"])),
        });
    }

    for p in records(record, &["procedures"]) {
        ir.procedures.push(Procedure {
            name: pick(p, &["/name", "/code/name"]).unwrap_or_else(|| "Procedure".to_string()),
            code: code_of(p.get("code")),
            date: pick(p, &["/date_time", "/date"]),
            performer: list(p.get("performers")).first().and_then(|p| pick(p, &["/name"])),
        });
    }

    for d in records(record, &["devices"]) {
        ir.devices.push(Device {
            name: pick(d, &["/name", "/code/name"]).unwrap_or_else(|| "Device".to_string()),
            code: code_of(d.get("code")),
            status: pick(d, &["/status"]),
            udi: list(d.get("identifiers"))
                .first()
                .and_then(|id| pick(id, &["/identifier"])),
        });
    }

    // A single `document` is accepted when `documents` is absent.
    for doc in records(record, &["documents", "document"]) {
        ir.documents.push(Document {
            title: pick(doc, &["/title", "/name"]).unwrap_or_else(|| "Document".to_string()),
            kind: code_of(doc.get("code")),
            date: pick(doc, &["/date", "/date_time"]),
            url: pick(doc, &["/url", "/href"]),
        });
    }

    for rep in records(record, &["results_interpreted"]) {
        ir.reports.push(DiagnosticReport {
            name: pick(rep, &["/name"]).unwrap_or_else(|| "Report".to_string()),
            code: code_of(rep.get("code")),
            date: pick(rep, &["/date", "/date_time"]),
            result_refs: list(rep.get("results"))
                .iter()
                .filter_map(|r| pick(r, &["/name", "/code/name"]))
                .collect(),
        });
    }

    for img in records(record, &["imaging"]) {
        ir.imaging.push(ImagingStudy {
            modality: pick(img, &["/modality", "/type"]),
            body_site: pick(img, &["/body_site", "/site"]),
            started: pick(img, &["/date", "/date_time"]),
            description: pick(img, &["/name", "/text"]),
            series: None,
            instances: None,
        });
    }

    for o in records(record, &["orders"]) {
        ir.service_requests.push(ServiceRequest {
            name: pick(o, &["/name", "/text"]).unwrap_or_else(|| "Service request".to_string()),
            code: code_of(o.get("code")),
            date: pick(o, &["/date", "/date_time"]),
            status: pick(o, &["/status"]),
            requester: None,
        });
    }

    for a in records(record, &["appointments"]) {
        ir.appointments.push(Appointment {
            start: pick(a, &["/start", "/date", "/date_time"]),
            end: pick(a, &["/end"]),
            status: pick(a, &["/status"]),
            kind: name_of(a.get("type")),
            reason: name_of(a.get("reason")),
            location: name_of(a.get("location")),
        });
    }

    for o in records(record, &["organizations"]) {
        ir.organizations.push(Organization {
            name: name_of(Some(o)),
            kind: name_of(o.get("type")),
            telecom: pick(o, &["/phone", "/telecom"]),
        });
    }

    for p in records(record, &["providers", "practitioners"]) {
        ir.practitioners.push(Practitioner {
            name: person_name(p.get("name")),
            specialty: name_of(p.get("specialty")),
            telecom: pick(p, &["/phone", "/telecom"]),
        });
    }

    for role in records(record, &["provider_roles"]) {
        ir.practitioner_roles.push(PractitionerRole {
            practitioner: name_of(role.get("practitioner")),
            organization: name_of(role.get("organization")),
            specialty: name_of(role.get("specialty")),
            location: name_of(role.get("location")),
        });
    }

    for l in records(record, &["facilities", "locations"]) {
        ir.locations.push(Location {
            name: name_of(Some(l)),
            kind: name_of(l.get("type")),
            address: address_text(l.get("address")),
            telecom: pick(l, &["/phone"]),
        });
    }

    for c in records(record, &["contacts", "related_persons"]) {
        ir.related_persons.push(RelatedPerson {
            name: person_name(c.get("name")),
            relationship: name_of(c.get("relationship")),
            telecom: pick(c, &["/phone", "/telecom"]),
        });
    }

    for r in records(record, &["risk_assessments"]) {
        ir.risk_assessments.push(RiskAssessment {
            name: pick(r, &["/name"]).unwrap_or_else(|| "Risk Assessment".to_string()),
            date: pick(r, &["/date", "/date_time"]),
            summary: pick(r, &["/text"]),
            probability: pick(r, &["/risk", "/probability"]),
        });
    }

    for cp in records(record, &["plan_of_care"]) {
        ir.care_plans.push(CarePlan {
            title: pick(cp, &["/name"]).unwrap_or_else(|| "Care Plan".to_string()),
            status: pick(cp, &["/status"]),
            start: pick(cp, &["/date_time", "/date_range/start"]),
            end: pick(cp, &["/date_range/end"]),
            activities: list(cp.get("activities"))
                .iter()
                .filter_map(|a| pick(a, &["/name", "/text"]).or_else(|| text(Some(a))))
                .collect(),
        });
    }

    for g in records(record, &["goals"]) {
        ir.goals.push(Goal {
            description: pick(g, &["/name", "/text"]).unwrap_or_else(|| "Goal".to_string()),
            status: pick(g, &["/status"]),
            target: pick(g, &["/target", "/target_value"]),
            due: pick(g, &["/due", "/due_date"]),
        });
    }

    for fh in records(record, &["family_history"]) {
        ir.family_history.push(FamilyHistory {
            relation: pick(fh, &["/name", "/relationship"]),
            condition: pick(fh, &["/problem/name", "/condition/name"]),
            onset: pick(fh, &["/age", "/onset"]),
        });
    }

    for q in records(record, &["questionnaires"]) {
        let items = list(q.get("items")).iter().filter_map(|item| {
            join_non_empty(
                [pick(item, &["/question"]), pick(item, &["/answer"])]
                    .into_iter()
                    .flatten(),
                ": ",
            )
        });
        ir.questionnaires.push(Questionnaire {
            title: pick(q, &["/title", "/name"]).unwrap_or_else(|| "Questionnaire".to_string()),
            date: pick(q, &["/date", "/date_time"]),
            summary: join_non_empty(items, " | "),
        });
    }

    for c in records(record, &["insurance"]) {
        ir.coverage.push(report_core::Coverage {
            payor: pick(c, &["/plan_name", "/payer", "/company"]),
            kind: name_of(c.get("type")),
            status: pick(c, &["/status"]),
            start: pick(c, &["/date_range/start"]),
            end: pick(c, &["/date_range/end"]),
            member_id: pick(c, &["/member_id", "/policy_number"]),
        });
    }

    for s in records(record, &["social_history"]) {
        ir.social_history.push(SocialHistory {
            name: pick(s, &["/name"]).unwrap_or_else(|| "Social history".to_string()),
            value: pick(s, &["/value"]),
            date: pick(s, &["/date", "/date_time"]),
        });
    }

    for n in records(record, &["nutrition"]) {
        ir.nutrition_orders.push(NutritionOrder {
            date: pick(n, &["/date", "/date_time"]),
            status: pick(n, &["/status"]),
            diet: pick(n, &["/diet"]),
            instruction: pick(n, &["/instruction"]),
        });
    }

    for m in records(record, &["medication_administrations"]) {
        ir.med_administrations.push(MedicationAdministration {
            date: pick(m, &["/date", "/date_time"]),
            medication: name_of(m.get("medication")),
            dose: pick(m, &["/dose"]),
            route: name_of(m.get("route")),
            performer: name_of(m.get("performer")),
        });
    }

    for m in records(record, &["medication_dispenses"]) {
        ir.med_dispenses.push(MedicationDispense {
            date: pick(m, &["/date", "/date_time"]),
            medication: name_of(m.get("medication")),
            quantity: pick(m, &["/quantity"]),
            days_supply: pick(m, &["/days_supply"]),
            performer: name_of(m.get("performer")),
        });
    }

    for c in records(record, &["clinical_impressions"]) {
        ir.clinical_impressions.push(ClinicalImpression {
            date: pick(c, &["/date", "/date_time"]),
            summary: pick(c, &["/summary"]),
            status: pick(c, &["/status"]),
        });
    }

    for f in records(record, &["flags"]) {
        ir.flags.push(Flag {
            status: pick(f, &["/status"]),
            code: code_of(f.get("code")),
            category: name_of(f.get("category")),
            period_start: pick(f, &["/period/start"]),
            period_end: pick(f, &["/period/end"]),
        });
    }

    if options.include_ccda_counts {
        let counts: BTreeMap<String, usize> = object
            .iter()
            .filter_map(|(key, value)| Some((key.clone(), value.as_array()?.len())))
            .collect();
        ir.other.ccda_counts = Some(counts);
    }
    ir.raw = Some(RawOverflow {
        fhir: Vec::new(),
        ccda: Some(record.clone()),
    });
    ir.sort_panels();

    tracing::debug!(
        keys = object.len(),
        labs = ir.labs.len(),
        vitals = ir.vitals.len(),
        "normalized legacy record"
    );
    Ok(ir)
}

fn patient(demographics: Option<&Value>) -> Patient {
    let Some(d) = demographics else {
        return Patient::default();
    };

    let mut identifiers: Vec<Identifier> = list(d.get("identifiers"))
        .iter()
        .filter_map(|id| {
            Some(Identifier {
                value: Some(pick(id, &["/identifier"])?),
                system: pick(id, &["/system", "/assigner", "/authority"]),
                kind: name_of(id.get("type")),
            })
        })
        .collect();
    let mrn = pick(d, &["/mrn"]);
    if let Some(mrn) = &mrn {
        identifiers.insert(
            0,
            Identifier {
                system: None,
                value: Some(mrn.clone()),
                kind: Some("MRN".to_string()),
            },
        );
    }

    let phone = pick(d, &["/phone", "/telecom"]);
    Patient {
        id: mrn.or_else(|| pick(d, &["/identifiers/0/identifier"])),
        name: person_name(d.get("name")),
        birth_date: pick(d, &["/dob"]),
        gender: name_of(d.get("gender")),
        phones: phone
            .iter()
            .map(|value| ContactPoint {
                value: value.clone(),
                use_label: None,
                rank: None,
            })
            .collect(),
        phone,
        emails: Vec::new(),
        email: pick(d, &["/email"]),
        address: address_text(d.get("address")),
        identifiers,
    }
}

/// Numeric points of a `results` list; non-finite values are dropped.
fn series(entry: &Value) -> Vec<SeriesPoint> {
    list(entry.get("results"))
        .iter()
        .filter_map(|result| {
            let raw = result.get("value");
            let v = match raw {
                Some(Value::Object(_)) => finite_number(raw.and_then(|raw| raw.get("value"))),
                _ => finite_number(raw),
            }?;
            Some(SeriesPoint {
                t: pick(result, &["/date", "/date_time"]),
                v,
                unit: pick(result, &["/unit", "/value/unit"]),
            })
        })
        .collect()
}

/// Array under the first key present; later keys only apply when earlier ones are absent.
fn records<'a>(record: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|key| record.get(*key).filter(|value| !value.is_null()))
        .map(|value| list(Some(value)))
        .unwrap_or_default()
}

/// First scalar found among the pointers, rendered as text.
fn pick(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|pointer| scalar_text(value.pointer(pointer)))
}

/// A plain string, or the `name` of an object.
fn name_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Object(_) => value.and_then(|v| pick(v, &["/name"])),
        _ => scalar_text(value),
    }
}

/// `{first, last}` joined, else `full`, else a plain string.
fn person_name(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if !value.is_object() {
        return scalar_text(Some(value));
    }
    join_non_empty(
        [pick(value, &["/first"]), pick(value, &["/last"])]
            .into_iter()
            .flatten(),
        " ",
    )
    .or_else(|| pick(value, &["/full"]))
}

fn address_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if value.is_object() {
        pick(value, &["/street", "/full"])
    } else {
        scalar_text(Some(value))
    }
}

/// `{system, code, name}` code object; `display` is accepted in place of `name`.
fn code_of(value: Option<&Value>) -> Option<Code> {
    let value = value.filter(|value| value.is_object())?;
    Code {
        system: pick(value, &["/system"]),
        code: pick(value, &["/code"]),
        display: pick(value, &["/name", "/display"]),
    }
    .non_empty()
}

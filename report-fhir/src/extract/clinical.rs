use report_core::{
    Allergy, Condition, DiagnosticReport, Device, Document, Encounter, ImagingStudy, Immunization,
    Procedure, ReportIr, ServiceRequest,
};
use serde_json::Value;

use crate::resolve::{
    concept_code, concept_text, first, first_coding, first_text, list, text, text_at,
};

pub fn condition(r: &Value, ir: &mut ReportIr) {
    ir.conditions.push(Condition {
        name: concept_text(r.get("code")).unwrap_or_else(|| "Condition".to_string()),
        code: first_coding(r.get("code")),
        onset: first_text(r, &["/onsetDateTime", "/onsetPeriod/start", "/onsetString"]),
        abatement: first_text(r, &["/abatementDateTime", "/abatementPeriod/end"]),
        clinical_status: concept_code(r.get("clinicalStatus")),
        verification_status: concept_code(r.get("verificationStatus")),
    });
}

pub fn allergy_intolerance(r: &Value, ir: &mut ReportIr) {
    // Older resource versions carry the allergen in `substance`.
    let concept = r.get("code").or_else(|| r.get("substance"));
    let manifestation = first(first(r.get("reaction")).and_then(|reaction| reaction.get("manifestation")));
    ir.allergies.push(Allergy {
        name: concept_text(concept).unwrap_or_else(|| "Allergy".to_string()),
        code: first_coding(concept),
        reaction: concept_text(manifestation),
        status: concept_code(r.get("clinicalStatus"))
            .or_else(|| concept_code(r.get("verificationStatus")))
            .or_else(|| text(r.get("status"))),
        criticality: text(r.get("criticality")),
    });
}

pub fn immunization(r: &Value, ir: &mut ReportIr) {
    ir.immunizations.push(Immunization {
        name: concept_text(r.get("vaccineCode")).unwrap_or_else(|| "Immunization".to_string()),
        code: first_coding(r.get("vaccineCode")),
        date: first_text(r, &["/occurrenceDateTime", "/occurrenceString", "/date"]),
        status: text(r.get("status")),
    });
}

pub fn encounter(r: &Value, ir: &mut ReportIr) {
    let kind = first(r.get("type"));
    ir.encounters.push(Encounter {
        kind: concept_text(kind),
        code: first_coding(kind),
        start: text_at(r, "/period/start"),
        end: text_at(r, "/period/end"),
        location: first(r.get("location")).and_then(|location| text_at(location, "/location/display")),
        reason: concept_text(first(r.get("reasonCode"))),
    });
}

pub fn procedure(r: &Value, ir: &mut ReportIr) {
    ir.procedures.push(Procedure {
        name: concept_text(r.get("code")).unwrap_or_else(|| "Procedure".to_string()),
        code: first_coding(r.get("code")),
        date: first_text(r, &["/performedDateTime", "/performedPeriod/start", "/performedString"]),
        performer: first(r.get("performer")).and_then(|performer| text_at(performer, "/actor/display")),
    });
}

pub fn device(r: &Value, ir: &mut ReportIr) {
    let kind = first(r.get("type"));
    let name = first(r.get("deviceName"))
        .and_then(|device_name| text(device_name.get("name")))
        .or_else(|| concept_text(kind))
        .unwrap_or_else(|| "Device".to_string());
    let carrier = first(r.get("udiCarrier"));
    ir.devices.push(Device {
        name,
        code: first_coding(kind),
        status: text(r.get("status")),
        udi: carrier.and_then(|carrier| {
            text(carrier.get("deviceIdentifier")).or_else(|| text(carrier.get("carrierHRF")))
        }),
    });
}

pub fn document_reference(r: &Value, ir: &mut ReportIr) {
    let attachment = first(r.get("content")).and_then(|content| content.get("attachment"));
    ir.documents.push(Document {
        title: text(r.get("description"))
            .or_else(|| attachment.and_then(|attachment| text(attachment.get("title"))))
            .unwrap_or_else(|| "Document".to_string()),
        kind: first_coding(r.get("type")),
        date: text(r.get("date")),
        url: attachment.and_then(|attachment| text(attachment.get("url"))),
    });
}

pub fn diagnostic_report(r: &Value, ir: &mut ReportIr) {
    ir.reports.push(DiagnosticReport {
        name: concept_text(r.get("code")).unwrap_or_else(|| "Report".to_string()),
        code: first_coding(r.get("code")),
        date: first_text(r, &["/effectiveDateTime", "/effectivePeriod/start", "/issued"]),
        result_refs: list(r.get("result"))
            .iter()
            .filter_map(|result| text(result.get("reference")).or_else(|| text(result.get("display"))))
            .collect(),
    });
}

pub fn imaging_study(r: &Value, ir: &mut ReportIr) {
    let series = r.get("series").and_then(Value::as_array);
    let first_series = series.and_then(|series| series.first());
    let modality = first_text(r, &["/modality/0/display", "/modality/0/code"])
        .or_else(|| concept_text(first(r.get("modalities"))))
        .or_else(|| {
            first_series.and_then(|s| first_text(s, &["/modality/display", "/modality/code"]))
        });
    let body_site =
        first_series.and_then(|s| first_text(s, &["/bodySite/display", "/bodySite/code"]));

    let (series_count, instance_count) = match series {
        Some(series) => (
            Some(series.len() as u64),
            Some(
                series
                    .iter()
                    .map(|s| s.get("instance").and_then(Value::as_array).map_or(0, Vec::len) as u64)
                    .sum(),
            ),
        ),
        None => (
            r.get("numberOfSeries").and_then(Value::as_u64),
            r.get("numberOfInstances").and_then(Value::as_u64),
        ),
    };

    ir.imaging.push(ImagingStudy {
        modality,
        body_site,
        started: text(r.get("started")),
        description: text(r.get("description")),
        series: series_count,
        instances: instance_count,
    });
}

pub fn service_request(r: &Value, ir: &mut ReportIr) {
    ir.service_requests.push(ServiceRequest {
        name: concept_text(r.get("code")).unwrap_or_else(|| "Service request".to_string()),
        code: first_coding(r.get("code")),
        date: first_text(r, &["/authoredOn", "/occurrenceDateTime", "/occurrencePeriod/start"]),
        status: text(r.get("status")),
        requester: text_at(r, "/requester/display"),
    });
}

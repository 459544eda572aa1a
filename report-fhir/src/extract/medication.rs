use report_core::{Medication, MedicationAdministration, MedicationDispense, ReportIr};
use serde_json::Value;

use crate::resolve::{
    concept_text, first, first_coding, first_text, format_quantity, text, text_at,
};

/// The medication concept across resource versions.
fn medication_concept(r: &Value) -> Option<&Value> {
    r.get("medicationCodeableConcept")
        .or_else(|| r.pointer("/medication/concept"))
        .or_else(|| r.pointer("/medication/codeableConcept"))
}

fn medication_name(r: &Value) -> Option<String> {
    concept_text(medication_concept(r)).or_else(|| text_at(r, "/medicationReference/display"))
}

fn performer(r: &Value) -> Option<String> {
    first(r.get("performer")).and_then(|performer| text_at(performer, "/actor/display"))
}

pub fn medication_statement(r: &Value, ir: &mut ReportIr) {
    ir.medications.push(Medication {
        name: medication_name(r).unwrap_or_else(|| "Medication".to_string()),
        code: first_coding(medication_concept(r)),
        status: text(r.get("status")),
        dosage: first(r.get("dosage")).and_then(|dosage| text(dosage.get("text"))),
        start: first_text(r, &["/effectivePeriod/start", "/effectiveDateTime"]),
        end: text_at(r, "/effectivePeriod/end"),
    });
}

pub fn medication_request(r: &Value, ir: &mut ReportIr) {
    ir.medications.push(Medication {
        name: medication_name(r).unwrap_or_else(|| "Medication".to_string()),
        code: first_coding(medication_concept(r)),
        status: text(r.get("status")),
        dosage: first(r.get("dosageInstruction")).and_then(|dosage| text(dosage.get("text"))),
        start: text(r.get("authoredOn")),
        end: None,
    });
}

pub fn medication_administration(r: &Value, ir: &mut ReportIr) {
    let dosage = r.get("dosage");
    let dose = format_quantity(dosage.and_then(|dosage| dosage.get("dose")))
        .or_else(|| dosage.and_then(|dosage| text(dosage.get("text"))));
    ir.med_administrations.push(MedicationAdministration {
        date: first_text(
            r,
            &[
                "/effectiveDateTime",
                "/effectivePeriod/start",
                "/occurrenceDateTime",
                "/occurrencePeriod/start",
            ],
        ),
        medication: medication_name(r),
        dose,
        route: concept_text(dosage.and_then(|dosage| dosage.get("route"))),
        performer: performer(r),
    });
}

pub fn medication_dispense(r: &Value, ir: &mut ReportIr) {
    ir.med_dispenses.push(MedicationDispense {
        date: first_text(r, &["/whenHandedOver", "/whenPrepared"]),
        medication: medication_name(r),
        quantity: format_quantity(r.get("quantity")),
        days_supply: format_quantity(r.get("daysSupply")),
        performer: performer(r),
    });
}

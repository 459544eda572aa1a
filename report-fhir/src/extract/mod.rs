//! Per-resource-type extractors.
//!
//! Every extractor has the same shape, [`Extractor`], and appends exactly one
//! entry to one IR collection (Patient replaces, Observation may append to
//! more than one). Missing fields stay `None`; only display names fall back to
//! a fixed placeholder label.

mod care;
mod clinical;
mod directory;
mod financial;
mod medication;
pub(crate) mod observation;
mod patient;
mod workflow;

use report_core::ReportIr;
use serde_json::Value;

/// Writes the normalized form of one resource into the IR.
pub type Extractor = fn(&Value, &mut ReportIr);

/// Built-in extractor table, keyed by exact `resourceType`.
pub(crate) const BUILTIN: &[(&str, Extractor)] = &[
    ("Patient", patient::patient),
    ("Observation", observation::observation),
    ("Condition", clinical::condition),
    ("AllergyIntolerance", clinical::allergy_intolerance),
    ("Immunization", clinical::immunization),
    ("Encounter", clinical::encounter),
    ("Procedure", clinical::procedure),
    ("Device", clinical::device),
    ("DocumentReference", clinical::document_reference),
    ("DiagnosticReport", clinical::diagnostic_report),
    ("ImagingStudy", clinical::imaging_study),
    ("ServiceRequest", clinical::service_request),
    ("MedicationStatement", medication::medication_statement),
    ("MedicationRequest", medication::medication_request),
    ("MedicationAdministration", medication::medication_administration),
    ("MedicationDispense", medication::medication_dispense),
    ("CarePlan", care::care_plan),
    ("Goal", care::goal),
    ("FamilyMemberHistory", care::family_member_history),
    ("QuestionnaireResponse", care::questionnaire_response),
    ("NutritionOrder", care::nutrition_order),
    ("RiskAssessment", care::risk_assessment),
    ("ClinicalImpression", care::clinical_impression),
    ("Flag", care::flag),
    ("Appointment", care::appointment),
    ("AppointmentResponse", care::appointment_response),
    ("Organization", directory::organization),
    ("Practitioner", directory::practitioner),
    ("PractitionerRole", directory::practitioner_role),
    ("Location", directory::location),
    ("RelatedPerson", directory::related_person),
    ("Coverage", financial::coverage),
    ("ExplanationOfBenefit", financial::explanation_of_benefit),
    ("Claim", financial::claim),
    ("ClaimResponse", financial::claim_response),
    ("PaymentNotice", financial::payment_notice),
    ("PaymentReconciliation", financial::payment_reconciliation),
    ("CoverageEligibilityRequest", financial::eligibility_request),
    ("CoverageEligibilityResponse", financial::eligibility_response),
    ("Consent", workflow::consent),
    ("AuditEvent", workflow::audit_event),
    ("Communication", workflow::communication),
    ("CommunicationRequest", workflow::communication_request),
    ("CareTeam", workflow::care_team),
    ("Task", workflow::task),
];

/// Appends the resource to the raw overflow bucket.
pub fn fallback(resource: &Value, ir: &mut ReportIr) {
    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or("");
    tracing::debug!(resource_type, "no extractor registered; keeping raw resource");
    ir.push_raw_fhir(resource.clone());
}

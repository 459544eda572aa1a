use report_core::{Location, Organization, Practitioner, PractitionerRole, RelatedPerson, ReportIr};
use serde_json::Value;

use crate::resolve::{concept_text, first, format_address, human_name, text, text_at};

fn first_telecom(r: &Value) -> Option<String> {
    first(r.get("telecom")).and_then(|telecom| text(telecom.get("value")))
}

pub fn organization(r: &Value, ir: &mut ReportIr) {
    ir.organizations.push(Organization {
        name: text(r.get("name")),
        kind: concept_text(first(r.get("type"))),
        telecom: first_telecom(r),
    });
}

pub fn practitioner(r: &Value, ir: &mut ReportIr) {
    ir.practitioners.push(Practitioner {
        name: human_name(first(r.get("name"))),
        specialty: first(r.get("qualification"))
            .and_then(|qualification| concept_text(qualification.get("code"))),
        telecom: first_telecom(r),
    });
}

pub fn practitioner_role(r: &Value, ir: &mut ReportIr) {
    ir.practitioner_roles.push(PractitionerRole {
        practitioner: text_at(r, "/practitioner/display"),
        organization: text_at(r, "/organization/display"),
        specialty: concept_text(first(r.get("specialty"))),
        location: first(r.get("location")).and_then(|location| text(location.get("display"))),
    });
}

pub fn location(r: &Value, ir: &mut ReportIr) {
    ir.locations.push(Location {
        name: text(r.get("name")),
        kind: concept_text(first(r.get("type"))),
        address: format_address(r.get("address")),
        telecom: first_telecom(r),
    });
}

pub fn related_person(r: &Value, ir: &mut ReportIr) {
    ir.related_persons.push(RelatedPerson {
        name: human_name(first(r.get("name"))),
        relationship: concept_text(first(r.get("relationship"))),
        telecom: first_telecom(r),
    });
}

use report_core::{ContactPoint, Identifier, Patient, ReportIr};
use serde_json::Value;

use crate::resolve::{concept_text, eq_ignore_case, first, format_address, human_name, list, text};

/// Unique contact values kept per channel.
const MAX_CONTACTS: usize = 3;
const UNRANKED: u32 = 99;

pub fn patient(resource: &Value, ir: &mut ReportIr) {
    let telecom = list(resource.get("telecom"));
    let mut phones = ranked_contacts(telecom, "phone");
    let mut emails = ranked_contacts(telecom, "email");
    let phone = preferred_phone(&phones);
    let email = emails.first().map(|contact| contact.value.clone());
    phones.truncate(MAX_CONTACTS);
    emails.truncate(MAX_CONTACTS);

    let addresses = list(resource.get("address"));
    let address = addresses
        .iter()
        .find(|address| eq_ignore_case(address.get("use"), "home"))
        .or_else(|| addresses.first());

    // Last Patient in the collection wins; fields are never merged.
    ir.patient = Patient {
        id: text(resource.get("id")),
        name: human_name(first(resource.get("name"))),
        birth_date: text(resource.get("birthDate")),
        gender: text(resource.get("gender")),
        phone,
        email,
        phones,
        emails,
        address: format_address(address),
        identifiers: list(resource.get("identifier"))
            .iter()
            .filter_map(identifier)
            .collect(),
    };
}

fn identifier(value: &Value) -> Option<Identifier> {
    Some(Identifier {
        value: Some(text(value.get("value"))?),
        system: text(value.get("system")),
        kind: concept_text(value.get("type")),
    })
}

/// Contacts for one channel ordered by rank, then mobile before home before
/// anything else, deduplicated by value. Callers cap the list at [`MAX_CONTACTS`].
fn ranked_contacts(telecom: &[Value], channel: &str) -> Vec<ContactPoint> {
    let mut candidates: Vec<ContactPoint> = telecom
        .iter()
        .filter(|entry| eq_ignore_case(entry.get("system"), channel))
        .filter_map(|entry| {
            Some(ContactPoint {
                value: text(entry.get("value"))?,
                use_label: text(entry.get("use")).map(|label| label.to_lowercase()),
                rank: rank_of(entry.get("rank")),
            })
        })
        .collect();

    candidates.sort_by_key(|contact| {
        (
            contact.rank.unwrap_or(UNRANKED),
            use_priority(contact.use_label.as_deref()),
        )
    });

    let mut seen = Vec::new();
    candidates.retain(|contact| {
        if seen.contains(&contact.value) {
            false
        } else {
            seen.push(contact.value.clone());
            true
        }
    });
    for contact in &mut candidates {
        if contact.use_label.is_none() && contact.rank == Some(1) {
            contact.use_label = Some("primary".to_string());
        }
    }
    candidates
}

/// Rank 1 wins outright; without one, a mobile number beats a home number
/// regardless of the ranks they carry.
fn preferred_phone(phones: &[ContactPoint]) -> Option<String> {
    phones
        .iter()
        .find(|contact| contact.rank == Some(1))
        .or_else(|| {
            phones
                .iter()
                .find(|contact| contact.use_label.as_deref() == Some("mobile"))
        })
        .or_else(|| {
            phones
                .iter()
                .find(|contact| contact.use_label.as_deref() == Some("home"))
        })
        .or_else(|| phones.first())
        .map(|contact| contact.value.clone())
}

fn rank_of(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(number) => number.as_u64().and_then(|rank| u32::try_from(rank).ok()),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn use_priority(label: Option<&str>) -> u8 {
    match label {
        Some("mobile") => 0,
        Some("home") => 1,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contacts_ordered_deduplicated_and_capped() {
        let resource = json!({
            "resourceType": "Patient",
            "id": "p1",
            "name": [{"given": ["Ann"], "family": "Lee"}],
            "telecom": [
                {"system": "phone", "value": "555-0004", "use": "work"},
                {"system": "phone", "value": "555-0003", "use": "home"},
                {"system": "phone", "value": "555-0002", "use": "mobile"},
                {"system": "phone", "value": "555-0001", "rank": 1},
                {"system": "phone", "value": "555-0002", "use": "home"},
                {"system": "email", "value": "ann@example.org"}
            ]
        });
        let mut ir = ReportIr::new();
        patient(&resource, &mut ir);

        let values: Vec<&str> = ir.patient.phones.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["555-0001", "555-0002", "555-0003"]);
        assert_eq!(ir.patient.phone.as_deref(), Some("555-0001"));
        assert_eq!(ir.patient.phones[0].use_label.as_deref(), Some("primary"));
        assert_eq!(ir.patient.phones[1].use_label.as_deref(), Some("mobile"));
        assert_eq!(ir.patient.email.as_deref(), Some("ann@example.org"));
        assert_eq!(ir.patient.name.as_deref(), Some("Ann Lee"));
    }

    #[test]
    fn unranked_mobile_preferred_over_ranked_home() {
        let mut ir = ReportIr::new();
        patient(
            &json!({"telecom": [
                {"system": "phone", "value": "555-0020", "use": "home", "rank": 2},
                {"system": "phone", "value": "555-0030", "use": "work", "rank": 3},
                {"system": "phone", "value": "555-0040", "use": "work", "rank": 4},
                {"system": "phone", "value": "555-0099", "use": "mobile"}
            ]}),
            &mut ir,
        );

        assert_eq!(ir.patient.phone.as_deref(), Some("555-0099"));
        let values: Vec<&str> = ir.patient.phones.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["555-0020", "555-0030", "555-0040"]);
    }

    #[test]
    fn later_patient_replaces_earlier() {
        let mut ir = ReportIr::new();
        patient(&json!({"id": "a", "gender": "female"}), &mut ir);
        patient(&json!({"id": "b"}), &mut ir);
        assert_eq!(ir.patient.id.as_deref(), Some("b"));
        assert_eq!(ir.patient.gender, None);
    }

    #[test]
    fn identifiers_without_value_are_dropped() {
        let mut ir = ReportIr::new();
        patient(
            &json!({"identifier": [
                {"system": "urn:mrn", "value": "123", "type": {"text": "MRN"}},
                {"system": "urn:empty"}
            ]}),
            &mut ir,
        );
        assert_eq!(ir.patient.identifiers.len(), 1);
        assert_eq!(ir.patient.identifiers[0].kind.as_deref(), Some("MRN"));
    }

    #[test]
    fn home_address_preferred() {
        let mut ir = ReportIr::new();
        patient(
            &json!({"address": [
                {"use": "work", "city": "Office Town"},
                {"use": "home", "line": ["1 Main St"], "city": "Springfield"}
            ]}),
            &mut ir,
        );
        assert_eq!(ir.patient.address.as_deref(), Some("1 Main St, Springfield"));
    }
}

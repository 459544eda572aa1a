use report_core::{ReportIr, SeriesPoint, SocialHistory};
use serde_json::Value;

use crate::resolve::{
    concept_text, finite_number, first_coding, first_text, format_quantity, list, scalar_text,
    text, text_at,
};

/// Timestamp fallback chain for an observation point.
pub(crate) const OBSERVATION_TIME: &[&str] = &[
    "/effectiveDateTime",
    "/effectiveInstant",
    "/effectivePeriod/start",
    "/issued",
    "/meta/lastUpdated",
];

/// Category flags carried by an observation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Categories {
    pub laboratory: bool,
    pub vital: bool,
    pub social: bool,
}

impl Categories {
    pub(crate) fn of(resource: &Value) -> Self {
        let mut labels: Vec<String> = Vec::new();
        for category in list(resource.get("category")) {
            labels.extend(text(category.get("text")));
            for coding in list(category.get("coding")) {
                labels.extend(text(coding.get("code")));
                labels.extend(text(coding.get("display")));
            }
        }
        let matches = |needle: &str| {
            labels
                .iter()
                .any(|label| label.to_ascii_lowercase().contains(needle))
        };
        Categories {
            laboratory: matches("laboratory"),
            vital: matches("vital"),
            social: matches("social-history"),
        }
    }
}

/// Classifies an observation as social history, vital sign or lab result.
///
/// Social-history observations become a text entry. Lab and vital
/// observations become a series point only when `valueQuantity.value` is a
/// finite number; an observation flagged as both goes to vitals.
pub fn observation(r: &Value, ir: &mut ReportIr) {
    let categories = Categories::of(r);
    let t = first_text(r, OBSERVATION_TIME);

    if categories.social {
        ir.social_history.push(SocialHistory {
            name: concept_text(r.get("code")).unwrap_or_else(|| "Social history".to_string()),
            value: social_value(r),
            date: t.clone(),
        });
    }

    if !categories.laboratory && !categories.vital {
        return;
    }
    let Some(v) = finite_number(r.pointer("/valueQuantity/value")) else {
        return;
    };

    let fallback_name = if categories.vital { "Vital" } else { "Lab" };
    let name = concept_text(r.get("code")).unwrap_or_else(|| fallback_name.to_string());
    let point = SeriesPoint {
        t,
        v,
        unit: text_at(r, "/valueQuantity/unit"),
    };
    let code = first_coding(r.get("code"));
    if categories.vital {
        ir.push_vital_point(&name, code, point);
    } else {
        ir.push_lab_point(&name, code, point);
    }
}

pub(crate) fn social_value(r: &Value) -> Option<String> {
    if let Some(flag) = r.get("valueBoolean").and_then(Value::as_bool) {
        return Some(if flag { "Yes" } else { "No" }.to_string());
    }
    text(r.get("valueString"))
        .or_else(|| scalar_text(r.get("valueInteger")))
        .or_else(|| scalar_text(r.get("valueDecimal")))
        .or_else(|| concept_text(r.get("valueCodeableConcept")))
        .or_else(|| format_quantity(r.get("valueQuantity")))
}

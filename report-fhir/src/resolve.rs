//! Small field resolvers shared by every extractor.
//!
//! Each resolver returns `Option` and never panics on missing or oddly shaped
//! input, so fallback chains compose left-to-right with `or_else`.

use report_core::Code;
use serde_json::Value;

/// Treats a single value as a one-element list and `null`/missing as empty.
pub fn list(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => &[],
        Some(other) => std::slice::from_ref(other),
    }
}

/// First element of an array-or-single value.
pub fn first(value: Option<&Value>) -> Option<&Value> {
    list(value).first()
}

/// Non-blank string, trimmed.
pub fn text(value: Option<&Value>) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// String at a JSON pointer.
pub fn text_at(value: &Value, pointer: &str) -> Option<String> {
    text(value.pointer(pointer))
}

/// First non-blank string among the pointers, in order.
pub fn first_text(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| text_at(value, pointer))
}

/// Strings, numbers and booleans rendered as display text.
pub fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(_) => text(value),
        Value::Number(number) => match (number.as_i64(), number.as_u64(), number.as_f64()) {
            (Some(i), _, _) => Some(i.to_string()),
            (_, Some(u), _) => Some(u.to_string()),
            (_, _, Some(f)) => Some(format_numeric(f)),
            _ => None,
        },
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Readable text of a coded concept: `text`, then the first coding's display.
///
/// Plain strings (codes in older resource versions) and bare `Coding`
/// objects are accepted as well.
pub fn concept_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if value.is_string() {
        return text(Some(value));
    }
    text(value.get("text"))
        .or_else(|| text(first(value.get("coding")).and_then(|coding| coding.get("display"))))
        .or_else(|| text(value.get("display")))
}

/// `code` of the first coding, or the value itself when it is a plain code string.
pub fn concept_code(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if value.is_string() {
        return text(Some(value));
    }
    text(first(value.get("coding")).and_then(|coding| coding.get("code")))
}

/// First coding of a concept as an IR [`Code`].
pub fn first_coding(value: Option<&Value>) -> Option<Code> {
    let coding = first(value?.get("coding"))?;
    Code {
        system: text(coding.get("system")),
        code: text(coding.get("code")),
        display: text(coding.get("display")),
    }
    .non_empty()
}

/// Finite number from a JSON number or numeric string. Everything else is `None`.
pub fn finite_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// `"<value> <unit>"` for a Quantity/Money-like object; `unit_field` names the unit key.
pub fn format_amount(value: Option<&Value>, unit_field: &str) -> Option<String> {
    let value = value?;
    if !value.is_object() {
        return None;
    }
    let magnitude = scalar_text(value.get("value")).unwrap_or_default();
    let unit = text(value.get(unit_field)).unwrap_or_default();
    let joined = format!("{magnitude} {unit}").trim().to_string();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Quantity rendered with its unit.
pub fn format_quantity(value: Option<&Value>) -> Option<String> {
    format_amount(value, "unit")
}

/// Money rendered with its currency.
pub fn format_money(value: Option<&Value>) -> Option<String> {
    format_amount(value, "currency")
}

pub fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// `HumanName` as a single display string: `text`, else given names followed by family.
pub fn human_name(name: Option<&Value>) -> Option<String> {
    let name = name?;
    if let Some(text) = text(name.get("text")) {
        return Some(text);
    }
    let mut parts: Vec<String> = list(name.get("given"))
        .iter()
        .filter_map(|given| text(Some(given)))
        .collect();
    parts.extend(text(name.get("family")));
    let joined = parts.join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// `Address` as `"line line, city, state, postal"`; `text` when nothing structured exists.
pub fn format_address(address: Option<&Value>) -> Option<String> {
    let address = address?;
    let lines = list(address.get("line"))
        .iter()
        .filter_map(|line| text(Some(line)))
        .collect::<Vec<_>>()
        .join(" ");
    let parts: Vec<String> = [
        Some(lines).filter(|lines| !lines.is_empty()),
        text(address.get("city")),
        text(address.get("state")),
        text(address.get("postalCode")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if parts.is_empty() {
        text(address.get("text"))
    } else {
        Some(parts.join(", "))
    }
}

/// Narrative XHTML with tags removed.
pub fn strip_tags(html: Option<&Value>) -> Option<String> {
    let html = html?.as_str()?;
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    text(Some(&Value::String(out)))
}

/// Case-insensitive equality of an optional string field.
pub fn eq_ignore_case(value: Option<&Value>, expected: &str) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| s.trim().eq_ignore_ascii_case(expected))
}

/// Joins the non-blank parts, returning `None` when nothing remains.
pub fn join_non_empty<I>(parts: I, separator: &str) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let parts: Vec<String> = parts.into_iter().filter(|part| !part.is_empty()).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn concept_prefers_text_then_first_display() {
        let with_text = json!({"text": "Hypertension", "coding": [{"display": "Essential hypertension"}]});
        assert_eq!(concept_text(Some(&with_text)).as_deref(), Some("Hypertension"));

        let display_only = json!({"coding": [{"display": "Essential hypertension"}, {"display": "HTN"}]});
        assert_eq!(
            concept_text(Some(&display_only)).as_deref(),
            Some("Essential hypertension")
        );

        let blank = json!({"text": "  ", "coding": [{"code": "38341003"}]});
        assert_eq!(concept_text(Some(&blank)), None);
        assert_eq!(concept_code(Some(&blank)).as_deref(), Some("38341003"));
    }

    #[test]
    fn first_text_follows_pointer_order() {
        let obs = json!({"issued": "2024-02-02", "meta": {"lastUpdated": "2024-03-03"}});
        let chain = ["/effectiveDateTime", "/issued", "/meta/lastUpdated"];
        assert_eq!(first_text(&obs, &chain).as_deref(), Some("2024-02-02"));

        let only_meta = json!({"meta": {"lastUpdated": "2024-03-03"}});
        assert_eq!(first_text(&only_meta, &chain).as_deref(), Some("2024-03-03"));
        assert_eq!(first_text(&json!({}), &chain), None);
    }

    #[test]
    fn finite_number_rejects_non_numeric() {
        assert_eq!(finite_number(Some(&json!(72))), Some(72.0));
        assert_eq!(finite_number(Some(&json!(" 5.5 "))), Some(5.5));
        assert_eq!(finite_number(Some(&json!("not-a-number"))), None);
        assert_eq!(finite_number(Some(&json!("NaN"))), None);
        assert_eq!(finite_number(Some(&json!("inf"))), None);
        assert_eq!(finite_number(Some(&json!(""))), None);
        assert_eq!(finite_number(Some(&json!(null))), None);
        assert_eq!(finite_number(None), None);
    }

    #[test]
    fn list_wraps_single_values() {
        let single = json!({"a": 1});
        assert_eq!(list(Some(&single)).len(), 1);
        assert!(list(Some(&Value::Null)).is_empty());
        assert_eq!(list(Some(&json!([1, 2]))).len(), 2);
    }

    #[test]
    fn names_and_addresses_render() {
        let name = json!({"given": ["Jane", "Q"], "family": "Doe"});
        assert_eq!(human_name(Some(&name)).as_deref(), Some("Jane Q Doe"));
        assert_eq!(human_name(Some(&json!({}))), None);

        let address = json!({"line": ["1 Main St"], "city": "Springfield", "postalCode": "12345"});
        assert_eq!(
            format_address(Some(&address)).as_deref(),
            Some("1 Main St, Springfield, 12345")
        );
    }

    #[test]
    fn quantities_and_markup() {
        assert_eq!(
            format_quantity(Some(&json!({"value": 30, "unit": "tablet"}))).as_deref(),
            Some("30 tablet")
        );
        assert_eq!(
            format_money(Some(&json!({"value": 12.5, "currency": "USD"}))).as_deref(),
            Some("12.5 USD")
        );
        assert_eq!(format_quantity(Some(&json!({}))), None);
        assert_eq!(
            strip_tags(Some(&json!("<div><p>High</p> risk</div>"))).as_deref(),
            Some("High risk")
        );
    }
}

//! Input Router: decides which normalizer an arbitrary input goes to.

use report_core::{ReportError, ReportIr};
use serde_json::Value;

use crate::bundle::{bundle_from_resources, normalize_bundle_with, resource_type};
use crate::registry::{default_registry, Registry};

/// Converts CCDA XML into a FHIR Bundle. Implemented outside this crate.
pub trait CcdaConverter {
    fn convert(&self, xml: &str) -> Result<Value, ReportError>;
}

/// Recognized input shapes.
#[derive(Debug, PartialEq)]
pub enum InputShape<'a> {
    /// String that looks like XML.
    CcdaXml(&'a str),
    /// Array of resource-like objects.
    Resources(&'a [Value]),
    Bundle,
    /// A single resource object other than a Bundle.
    Resource,
    /// Object whose array values hold resources (`{"Patient": [...], ...}`).
    GroupedByType(Vec<&'a Value>),
    Unsupported,
}

impl<'a> InputShape<'a> {
    pub fn classify(input: &'a Value) -> Self {
        match input {
            Value::String(raw) if raw.trim_start().starts_with('<') => InputShape::CcdaXml(raw),
            Value::Array(items) => InputShape::Resources(items),
            Value::Object(map) => {
                match map.get("resourceType").and_then(Value::as_str) {
                    Some("Bundle") => return InputShape::Bundle,
                    Some(t) if !t.is_empty() => return InputShape::Resource,
                    _ => {}
                }
                let mut found = false;
                let mut resources = Vec::new();
                for value in map.values() {
                    if let Value::Array(items) = value {
                        found = true;
                        resources.extend(items.iter().filter(|item| resource_type(item).is_some()));
                    }
                }
                if found {
                    InputShape::GroupedByType(resources)
                } else {
                    InputShape::Unsupported
                }
            }
            _ => InputShape::Unsupported,
        }
    }
}

/// Routes inputs to the Bundle Normalizer using a fixed registry and an
/// optional CCDA converter.
pub struct Normalizer<'a> {
    registry: &'a Registry,
    ccda: Option<&'a dyn CcdaConverter>,
}

impl Default for Normalizer<'static> {
    fn default() -> Self {
        Self::new(default_registry())
    }
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            ccda: None,
        }
    }

    pub fn with_ccda(mut self, converter: &'a dyn CcdaConverter) -> Self {
        self.ccda = Some(converter);
        self
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Normalizes any accepted input shape into the canonical IR.
    pub fn to_ir(&self, input: &Value) -> Result<ReportIr, ReportError> {
        let shape = InputShape::classify(input);
        tracing::debug!(shape = shape.name(), "routing input");
        match shape {
            InputShape::CcdaXml(xml) => {
                let converter = self.ccda.ok_or(ReportError::CcdaUnavailable)?;
                let bundle = converter.convert(xml)?;
                normalize_bundle_with(&bundle, self.registry)
            }
            InputShape::Resources(items) => {
                normalize_bundle_with(&bundle_from_resources(items), self.registry)
            }
            InputShape::Bundle => normalize_bundle_with(input, self.registry),
            InputShape::Resource => {
                normalize_bundle_with(&bundle_from_resources([input]), self.registry)
            }
            InputShape::GroupedByType(resources) => {
                normalize_bundle_with(&bundle_from_resources(resources), self.registry)
            }
            InputShape::Unsupported => Err(ReportError::UnsupportedInput),
        }
    }

    /// Like [`Normalizer::to_ir`] for raw text: XML goes to the CCDA path,
    /// anything else must parse as JSON.
    pub fn to_ir_str(&self, raw: &str) -> Result<ReportIr, ReportError> {
        if raw.trim_start().starts_with('<') {
            return self.to_ir(&Value::String(raw.to_string()));
        }
        let value: Value = serde_json::from_str(raw)?;
        self.to_ir(&value)
    }
}

impl InputShape<'_> {
    fn name(&self) -> &'static str {
        match self {
            InputShape::CcdaXml(_) => "ccda_xml",
            InputShape::Resources(_) => "resources",
            InputShape::Bundle => "bundle",
            InputShape::Resource => "resource",
            InputShape::GroupedByType(_) => "grouped_by_type",
            InputShape::Unsupported => "unsupported",
        }
    }
}

//! Table from `resourceType` to extractor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use report_core::ReportIr;
use serde_json::Value;

use crate::extract::{self, Extractor, BUILTIN};

/// Outcome of looking a type up in the registry.
#[derive(Clone, Copy)]
pub enum Dispatch {
    Extract(Extractor),
    /// No extractor registered; the resource goes to the raw overflow bucket.
    Fallback,
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Extract(_) => f.write_str("Extract"),
            Dispatch::Fallback => f.write_str("Fallback"),
        }
    }
}

impl Dispatch {
    pub fn apply(self, resource: &Value, ir: &mut ReportIr) {
        match self {
            Dispatch::Extract(extractor) => extractor(resource, ir),
            Dispatch::Fallback => extract::fallback(resource, ir),
        }
    }
}

/// Extractor table. Built once and then only read by the normalizers.
#[derive(Clone)]
pub struct Registry {
    handlers: BTreeMap<String, Extractor>,
}

impl Registry {
    /// Registry with no extractors: every resource falls back to raw overflow.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in extractor.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (resource_type, extractor) in BUILTIN {
            registry.register_handler(*resource_type, *extractor);
        }
        registry
    }

    /// Installs or overrides the extractor for a type, returning the one it replaced.
    pub fn register_handler(
        &mut self,
        resource_type: impl Into<String>,
        extractor: Extractor,
    ) -> Option<Extractor> {
        self.handlers.insert(resource_type.into(), extractor)
    }

    /// Registered type names, sorted.
    pub fn list_handlers(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn is_handled(&self, resource_type: &str) -> bool {
        self.handlers.contains_key(resource_type)
    }

    pub fn dispatch(&self, resource_type: &str) -> Dispatch {
        match self.handlers.get(resource_type) {
            Some(extractor) => Dispatch::Extract(*extractor),
            None => Dispatch::Fallback,
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.list_handlers())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Process-wide built-in registry.
pub fn default_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::builtin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::Medication;
    use serde_json::json;

    fn custom_medication(_: &Value, ir: &mut ReportIr) {
        ir.medications.push(Medication {
            name: "custom".to_string(),
            ..Medication::default()
        });
    }

    #[test]
    fn builtin_lists_known_types() {
        let registry = Registry::builtin();
        let handlers = registry.list_handlers();
        assert!(handlers.contains(&"Patient"));
        assert!(handlers.contains(&"Observation"));
        assert!(handlers.contains(&"CoverageEligibilityResponse"));
        assert!(!handlers.contains(&"Basic"));
        let mut sorted = handlers.clone();
        sorted.sort_unstable();
        assert_eq!(handlers, sorted);
    }

    #[test]
    fn register_overrides_existing_handler() {
        let mut registry = Registry::builtin();
        let previous = registry.register_handler("MedicationRequest", custom_medication);
        assert!(previous.is_some());

        let mut ir = ReportIr::new();
        registry
            .dispatch("MedicationRequest")
            .apply(&json!({"resourceType": "MedicationRequest"}), &mut ir);
        assert_eq!(ir.medications[0].name, "custom");
    }

    #[test]
    fn unknown_type_dispatches_to_fallback() {
        let registry = Registry::empty();
        assert!(matches!(registry.dispatch("Patient"), Dispatch::Fallback));

        let mut ir = ReportIr::new();
        registry
            .dispatch("Patient")
            .apply(&json!({"resourceType": "Patient", "id": "p"}), &mut ir);
        assert_eq!(ir.patient.id, None);
        assert_eq!(ir.raw.map(|raw| raw.fhir.len()), Some(1));
    }
}

//! Which resource types present in an IR have an extractor.

use std::collections::BTreeMap;

use report_core::ReportIr;
use serde::{Deserialize, Serialize};

use crate::registry::Registry;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub fhir_counts: BTreeMap<String, usize>,
    pub handled_types: Vec<String>,
    pub unhandled_types: Vec<String>,
}

/// Splits the types counted in `ir` into handled and unhandled, both sorted.
pub fn coverage_for_ir(ir: &ReportIr, registry: &Registry) -> CoverageReport {
    let (handled_types, unhandled_types) = ir
        .other
        .fhir_counts
        .keys()
        .cloned()
        .partition(|resource_type| registry.is_handled(resource_type));
    CoverageReport {
        fhir_counts: ir.other.fhir_counts.clone(),
        handled_types,
        unhandled_types,
    }
}

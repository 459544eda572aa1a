//! FHIR and legacy CCDA records to the canonical report IR.
//!
//! Everything here is synchronous and free of I/O. The registry maps each
//! `resourceType` to an extractor; the normalizers walk a collection and
//! dispatch every resource through it.

mod bundle;
mod coverage;
mod extract;
mod input;
mod legacy;
mod registry;
pub mod resolve;

pub use bundle::{bundle_from_resources, normalize_bundle, normalize_bundle_with};
pub use coverage::{coverage_for_ir, CoverageReport};
pub use extract::{fallback as fallback_extractor, Extractor};
pub use input::{CcdaConverter, InputShape, Normalizer};
pub use legacy::{fhir_to_legacy_record, legacy_to_ir};
pub use registry::{default_registry, Dispatch, Registry};

use report_core::{ReportError, ReportIr};
use serde_json::Value;

/// Normalizes any accepted input shape with the built-in registry and no CCDA converter.
pub fn to_ir(input: &Value) -> Result<ReportIr, ReportError> {
    Normalizer::default().to_ir(input)
}

/// Normalizes raw JSON text with the built-in registry.
pub fn to_ir_str(raw: &str) -> Result<ReportIr, ReportError> {
    Normalizer::default().to_ir_str(raw)
}

/// Coverage of an IR against the built-in registry.
pub fn coverage_report(ir: &ReportIr) -> CoverageReport {
    coverage_for_ir(ir, default_registry())
}

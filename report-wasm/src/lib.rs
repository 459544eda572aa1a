//! Bridge WASM <-> JavaScript cho bước chuẩn hóa.
//!
//! Đối tượng trả về là JSON thuần (không dùng `Map` của JS) để phía JS có thể
//! `JSON.stringify` trực tiếp.

use report_core::{NormalizeOptions, ReportError, ReportIr};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

/// Tùy chọn từ phía JS, mọi trường đều có thể bỏ trống.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsOptions {
    #[serde(default)]
    include_ccda_counts: Option<bool>,
}

impl From<JsOptions> for NormalizeOptions {
    fn from(opts: JsOptions) -> Self {
        let mut base = NormalizeOptions::default();
        if let Some(flag) = opts.include_ccda_counts {
            base.include_ccda_counts = flag;
        }
        base
    }
}

/// Chuẩn hóa Bundle, mảng resource hoặc object nhóm theo loại thành IR.
#[wasm_bindgen(js_name = toIr)]
pub fn to_ir(input: JsValue) -> Result<JsValue, JsValue> {
    init();
    let value = read_json(input, "input")?;
    let ir = report_fhir::to_ir(&value).map_err(to_js_error)?;
    write_json(&ir)
}

/// Chuẩn hóa bản ghi legacy (dạng khóa theo danh từ) thành IR.
#[wasm_bindgen(js_name = legacyToIr)]
pub fn legacy_to_ir(record: JsValue, options: Option<JsValue>) -> Result<JsValue, JsValue> {
    init();
    let value = read_json(record, "record")?;
    let opts = match options {
        Some(js_opts) if !js_opts.is_undefined() && !js_opts.is_null() => {
            let opts: JsOptions = from_value(js_opts)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được options: {err}")))?;
            NormalizeOptions::from(opts)
        }
        _ => NormalizeOptions::default(),
    };
    let ir = report_fhir::legacy_to_ir(&value, opts).map_err(to_js_error)?;
    write_json(&ir)
}

/// Báo cáo độ phủ của một IR đã chuẩn hóa theo registry mặc định.
#[wasm_bindgen(js_name = coverageReport)]
pub fn coverage_report(ir: JsValue) -> Result<JsValue, JsValue> {
    init();
    let ir: ReportIr =
        from_value(ir).map_err(|err| JsValue::from_str(&format!("Không đọc được IR: {err}")))?;
    write_json(&report_fhir::coverage_report(&ir))
}

/// Chuyển Bundle FHIR sang bản ghi legacy.
#[wasm_bindgen(js_name = fhirToLegacyRecord)]
pub fn fhir_to_legacy_record(bundle: JsValue) -> Result<JsValue, JsValue> {
    init();
    let value = read_json(bundle, "bundle")?;
    let record = report_fhir::fhir_to_legacy_record(&value).map_err(to_js_error)?;
    write_json(&record)
}

fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn read_json(value: JsValue, what: &str) -> Result<serde_json::Value, JsValue> {
    from_value::<serde_json::Value>(value)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON {what}: {err}")))
}

fn write_json<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn to_js_error(err: ReportError) -> JsValue {
    JsValue::from_str(&format_report_error(&err))
}

fn format_report_error(err: &ReportError) -> String {
    format!("Report error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_options_fold_into_defaults() {
        let opts: JsOptions = serde_json::from_str("{}").expect("Không đọc được options");
        assert_eq!(NormalizeOptions::from(opts), NormalizeOptions::default());

        let opts: JsOptions =
            serde_json::from_str(r#"{"includeCcdaCounts": true}"#).expect("Không đọc được options");
        assert!(NormalizeOptions::from(opts).include_ccda_counts);
    }

    #[test]
    fn errors_keep_library_message() {
        let msg = format_report_error(&ReportError::UnsupportedInput);
        assert!(msg.starts_with("Report error: Unsupported input"));
    }
}

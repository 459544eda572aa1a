//! Phân loại lỗi dùng chung cho chuẩn hóa và sinh báo cáo.

/// Lỗi chung khi chuẩn hóa dữ liệu hoặc sinh báo cáo.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(
        "Unsupported input: pass a FHIR Bundle object, an array/object of FHIR resources, or a CCDA XML string."
    )]
    UnsupportedInput,
    #[error("Malformed collection: {0}")]
    MalformedCollection(String),
    #[error("CCDA input requires a configured CCDA-to-FHIR converter")]
    CcdaUnavailable,
    #[error("CCDA conversion failed: {0}")]
    Ccda(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Lỗi khi gọi backend sinh văn bản. Trạng thái và thông điệp được giữ nguyên.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Missing API key for text-generation backend")]
    MissingApiKey,
    #[error("LLM request failed: {status} {message}")]
    Status { status: u16, message: String },
    #[error("LLM transport error: {0}")]
    Transport(String),
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_input_names_accepted_shapes() {
        let msg = ReportError::UnsupportedInput.to_string();
        assert!(msg.contains("FHIR Bundle"));
        assert!(msg.contains("array/object of FHIR resources"));
        assert!(msg.contains("CCDA XML"));
    }

    #[test]
    fn backend_status_is_surfaced_unmodified() {
        let err: ReportError = BackendError::Status {
            status: 429,
            message: "quota exceeded".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "LLM request failed: 429 quota exceeded");
    }

    #[test]
    fn json_errors_become_parse_errors() {
        let err: ReportError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, ReportError::Parse(_)));
        assert!(err.to_string().starts_with("Parse error: "), "{err}");
    }
}

//! Cấu hình cho chuẩn hóa và cho backend sinh văn bản.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Biến môi trường chứa API key mặc định.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Tùy chọn cho nhánh chuẩn hóa legacy/CCDA.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NormalizeOptions {
    /// Ghi thêm độ dài mảng thô theo từng khóa vào `other.ccdaCounts`.
    pub include_ccda_counts: bool,
}

/// Mức dữ liệu thô yêu cầu backend giữ lại trong findings của từng chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RawInclusion {
    #[default]
    None,
    Minimal,
    Full,
}

impl RawInclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            RawInclusion::None => "none",
            RawInclusion::Minimal => "minimal",
            RawInclusion::Full => "full",
        }
    }
}

/// Cấu hình chia nhỏ dữ liệu khi vượt ngưỡng ngữ cảnh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkConfig {
    /// Ngưỡng ký tự của dữ liệu JSON đã serialize.
    pub max_chunk_chars: usize,
    pub include_raw: RawInclusion,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Số request chunk chạy song song; 1 là tuần tự.
    pub concurrency: usize,
    /// Thư mục ghi findings trung gian để gỡ lỗi.
    pub debug_dir: Option<PathBuf>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 250_000,
            include_raw: RawInclusion::None,
            temperature: 0.2,
            max_tokens: 2000,
            concurrency: 1,
            debug_dir: None,
        }
    }
}

/// Cấu hình backend sinh văn bản (tương thích OpenAI chat completions).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    /// Nếu trống sẽ đọc từ [`API_KEY_ENV`].
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Header bổ sung cho proxy/gateway.
    pub headers: BTreeMap<String, String>,
    pub timeout_seconds: u64,
    pub chunk: ChunkConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.6,
            max_tokens: 4000,
            headers: BTreeMap::new(),
            timeout_seconds: 120,
            chunk: ChunkConfig::default(),
        }
    }
}

impl LlmConfig {
    /// API key cấu hình trực tiếp, hoặc lấy từ biến môi trường.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: LlmConfig = serde_json::from_str(
            r#"{"model":"gpt-mock","chunk":{"maxChunkChars":1000,"includeRaw":"minimal"}}"#,
        )
        .expect("Không đọc được config");

        assert_eq!(cfg.model, "gpt-mock");
        assert_eq!(cfg.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.chunk.max_chunk_chars, 1000);
        assert_eq!(cfg.chunk.include_raw, RawInclusion::Minimal);
        assert_eq!(cfg.chunk.concurrency, 1);
        assert_eq!(cfg.chunk.max_tokens, 2000);
    }

    #[test]
    fn explicit_api_key_wins() {
        let cfg = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("sk-test"));
    }
}

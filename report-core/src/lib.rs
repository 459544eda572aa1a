//! Kiểu dữ liệu lõi: IR chuẩn hóa, cấu hình và lỗi.

pub mod config;
pub mod error;
pub mod model;
pub mod time;

pub use config::{ChunkConfig, LlmConfig, NormalizeOptions, RawInclusion, API_KEY_ENV};
pub use error::{BackendError, ReportError};
pub use model::*;
pub use time::parse_timestamp;

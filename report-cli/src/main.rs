mod ccda;
mod input;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use report_core::{LlmConfig, NormalizeOptions, RawInclusion};
use report_fhir::{default_registry, Normalizer};
use tracing_subscriber::EnvFilter;

use crate::ccda::CommandCcdaConverter;
use crate::input::load_input;

#[derive(Parser, Debug)]
#[command(
    name = "report-cli",
    about = "Chuẩn hóa dữ liệu lâm sàng (FHIR/CCDA) và sinh báo cáo tường thuật."
)]
struct Cli {
    /// Bật log mức debug (RUST_LOG vẫn được ưu tiên).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chuẩn hóa Bundle, mảng resource, thư mục hoặc CCDA XML thành IR.
    ToIr(RouteArgs),
    /// Chuyển Bundle FHIR (hoặc mảng resource) sang bản ghi legacy.
    Normalize(IoArgs),
    /// Chuẩn hóa bản ghi legacy thành IR.
    Legacy(LegacyArgs),
    /// Báo cáo loại resource đã/chưa có extractor.
    Coverage(RouteArgs),
    /// Sinh báo cáo tường thuật qua backend tương thích OpenAI.
    Narrative(NarrativeArgs),
}

#[derive(Args, Debug)]
struct IoArgs {
    /// File, thư mục, hoặc `-` cho stdin.
    input: PathBuf,
    /// File kết quả; bỏ trống hoặc `-` để in ra stdout.
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RouteArgs {
    #[command(flatten)]
    io: IoArgs,
    /// Lệnh chuyển CCDA XML (stdin) sang Bundle FHIR (stdout).
    #[arg(long, env = "CCDA_TO_FHIR_COMMAND")]
    ccda_command: Option<String>,
}

#[derive(Args, Debug)]
struct LegacyArgs {
    #[command(flatten)]
    io: IoArgs,
    /// Ghi số phần tử theo từng khóa vào `other.ccdaCounts`.
    #[arg(long)]
    ccda_counts: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RawArg {
    None,
    Minimal,
    Full,
}

impl From<RawArg> for RawInclusion {
    fn from(arg: RawArg) -> Self {
        match arg {
            RawArg::None => RawInclusion::None,
            RawArg::Minimal => RawInclusion::Minimal,
            RawArg::Full => RawInclusion::Full,
        }
    }
}

#[derive(Args, Debug)]
struct NarrativeArgs {
    /// File, thư mục, hoặc `-` cho stdin (FHIR JSON).
    input: PathBuf,
    /// File HTML kết quả (mặc định `report-llm.html`, `-` cho stdout).
    output: Option<PathBuf>,
    /// File JSON cấu hình backend; các cờ bên dưới ghi đè lên.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    temperature: Option<f32>,
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long)]
    max_chunk_chars: Option<usize>,
    #[arg(long, value_enum)]
    include_raw: Option<RawArg>,
    /// Số request chunk chạy song song.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Thư mục ghi findings trung gian.
    #[arg(long)]
    debug_dir: Option<PathBuf>,
    /// In envelope JSON thay vì HTML.
    #[arg(long)]
    json: bool,
}

impl NarrativeArgs {
    /// Cấu hình mặc định, đè bởi file cấu hình rồi bởi các cờ dòng lệnh.
    fn llm_config(&self) -> anyhow::Result<LlmConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Không đọc được file cấu hình {:?}", path))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("File cấu hình không hợp lệ {:?}", path))?
            }
            None => LlmConfig::default(),
        };

        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(chars) = self.max_chunk_chars {
            config.chunk.max_chunk_chars = chars;
        }
        if let Some(raw) = self.include_raw {
            config.chunk.include_raw = raw.into();
        }
        if let Some(concurrency) = self.concurrency {
            config.chunk.concurrency = concurrency;
        }
        if let Some(dir) = &self.debug_dir {
            config.chunk.debug_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::ToIr(args) => {
            let input = load_input(&args.io.input)?;
            let ir = route(&args, &input)?;
            write_output(args.io.output.as_deref(), &serde_json::to_string_pretty(&ir)?)?;
        }
        Command::Normalize(args) => {
            let input = load_input(&args.input)?;
            let bundle = match input {
                serde_json::Value::Array(resources) => {
                    report_fhir::bundle_from_resources(&resources)
                }
                other => other,
            };
            let record = report_fhir::fhir_to_legacy_record(&bundle)
                .context("normalize cần Bundle FHIR JSON hoặc mảng resource")?;
            write_output(args.output.as_deref(), &serde_json::to_string_pretty(&record)?)?;
        }
        Command::Legacy(args) => {
            let input = load_input(&args.io.input)?;
            let options = NormalizeOptions {
                include_ccda_counts: args.ccda_counts,
            };
            let ir = report_fhir::legacy_to_ir(&input, options)?;
            write_output(args.io.output.as_deref(), &serde_json::to_string_pretty(&ir)?)?;
        }
        Command::Coverage(args) => {
            let input = load_input(&args.io.input)?;
            let ir = route(&args, &input)?;
            let report = report_fhir::coverage_report(&ir);
            write_output(args.io.output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
        }
        Command::Narrative(args) => {
            let config = args.llm_config()?;
            let input = load_input(&args.input)?;
            let report = report_narrative::generate_narrative(&input, &config)
                .await
                .context("Sinh báo cáo tường thuật thất bại")?;
            let content = if args.json {
                serde_json::to_string_pretty(&report)?
            } else {
                report.to_html()
            };
            let default_out = PathBuf::from("report-llm.html");
            write_output(Some(args.output.as_deref().unwrap_or(default_out.as_path())), &content)?;
        }
    }

    Ok(())
}

fn route(args: &RouteArgs, input: &serde_json::Value) -> anyhow::Result<report_core::ReportIr> {
    let converter = args
        .ccda_command
        .as_deref()
        .and_then(CommandCcdaConverter::from_command_line);
    let mut normalizer = Normalizer::new(default_registry());
    if let Some(converter) = &converter {
        normalizer = normalizer.with_ccda(converter);
    }
    Ok(normalizer.to_ir(input)?)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Ghi ra file, hoặc stdout khi không có đường dẫn hay đường dẫn là `-`.
fn write_output(path: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            fs::write(path, content)
                .with_context(|| format!("Không ghi được file {:?}", path))?;
            tracing::info!(file = ?path, "output written");
        }
        _ => println!("{content}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrative_args(argv: &[&str]) -> NarrativeArgs {
        let cli = Cli::try_parse_from(argv).expect("Không phân tích được tham số");
        match cli.command {
            Command::Narrative(args) => args,
            other => panic!("lệnh không mong đợi: {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("Không tạo được thư mục tạm");
        let config_path = dir.path().join("llm.json");
        fs::write(
            &config_path,
            r#"{"model": "from-file", "maxTokens": 1234, "chunk": {"maxChunkChars": 999}}"#,
        )
        .expect("Không ghi được file cấu hình");

        let args = narrative_args(&[
            "report-cli",
            "narrative",
            "bundle.json",
            "--config",
            config_path.to_str().expect("đường dẫn UTF-8"),
            "--model",
            "from-flag",
            "--include-raw",
            "minimal",
            "--concurrency",
            "4",
        ]);
        let config = args.llm_config().expect("Không dựng được cấu hình");

        assert_eq!(config.model, "from-flag");
        assert_eq!(config.max_tokens, 1234);
        assert_eq!(config.chunk.max_chunk_chars, 999);
        assert_eq!(config.chunk.include_raw, RawInclusion::Minimal);
        assert_eq!(config.chunk.concurrency, 4);
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn xml_without_converter_is_rejected() {
        let cli = Cli::try_parse_from(["report-cli", "to-ir", "doc.xml"])
            .expect("Không phân tích được tham số");
        let Command::ToIr(args) = cli.command else {
            panic!("phải là to-ir");
        };
        let err = route(&args, &serde_json::json!("<ClinicalDocument/>")).unwrap_err();
        assert!(err.to_string().contains("converter"));
    }

    #[test]
    fn output_goes_to_file() {
        let dir = tempfile::tempdir().expect("Không tạo được thư mục tạm");
        let path = dir.path().join("ir.json");
        write_output(Some(&path), "{}").expect("Không ghi được kết quả");
        assert_eq!(fs::read_to_string(&path).expect("Không đọc lại được"), "{}");
    }
}

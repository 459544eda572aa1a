//! Chuyển CCDA XML sang FHIR Bundle bằng một chương trình bên ngoài.

use std::io::Write;
use std::process::{Command, Stdio};

use report_core::ReportError;
use report_fhir::CcdaConverter;
use serde_json::Value;

/// Gọi chương trình ngoài: XML vào stdin, Bundle JSON ra stdout.
#[derive(Debug, Clone)]
pub struct CommandCcdaConverter {
    program: String,
    args: Vec<String>,
}

impl CommandCcdaConverter {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Tách một dòng lệnh theo khoảng trắng, ví dụ `"node ccda-to-fhir.js"`.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }
}

impl CcdaConverter for CommandCcdaConverter {
    fn convert(&self, xml: &str) -> Result<Value, ReportError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ReportError::Ccda(format!("cannot start {}: {err}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReportError::Ccda("converter stdin unavailable".to_string()))?;

        // Ghi stdin ở luồng riêng để không nghẽn khi chương trình ghi stdout lớn.
        let output = std::thread::scope(|scope| {
            scope.spawn(move || {
                if let Err(err) = stdin.write_all(xml.as_bytes()) {
                    tracing::debug!(error = %err, "converter closed stdin early");
                }
            });
            child.wait_with_output()
        })
        .map_err(|err| ReportError::Ccda(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReportError::Ccda(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|err| ReportError::Ccda(format!("converter output is not JSON: {err}")))
    }
}

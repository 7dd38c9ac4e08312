// src/analyzer.rs

use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::model::{AnalysisFilter, WorkingCopy};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Produces a report over one or more working copies.
pub trait Analyzer: Send + Sync {
    fn run(&self, copies: &[WorkingCopy], filter: &AnalysisFilter) -> Result<Vec<u8>>;
}

/// Runs an external contribution-analysis program (gitinspector-compatible).
#[derive(Debug, Clone)]
pub struct ToolAnalyzer {
    program: String,
    format: OutputFormat,
}

impl ToolAnalyzer {
    pub fn new(program: impl Into<String>, format: OutputFormat) -> Self {
        Self { program: program.into(), format }
    }

    /// Arguments for one invocation: format flags, window, then every target.
    pub fn args(&self, copies: &[WorkingCopy], filter: &AnalysisFilter) -> Vec<String> {
        let mut args = vec![format!("--format={}", self.format.tool_name()), "-Tmw".to_string()];
        if let Some(since) = filter.since_str() {
            args.push(format!("--since={}", since));
        }
        if let Some(until) = filter.until_str() {
            args.push(format!("--until={}", until));
        }
        args.extend(copies.iter().map(|wc| wc.root.display().to_string()));
        args
    }
}

impl Analyzer for ToolAnalyzer {
    fn run(&self, copies: &[WorkingCopy], filter: &AnalysisFilter) -> Result<Vec<u8>> {
        let target = copies
            .iter()
            .map(|wc| wc.identifier.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let args = self.args(copies, filter);
        info!(targets = %target, "running {}", self.program);
        let heads: Vec<&str> = copies.iter().map(|wc| wc.checked_out.as_str()).collect();
        debug!(?args, ?heads, "analysis arguments");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::AnalysisFailed {
                target: target.clone(),
                detail: format!("cannot start {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(Error::AnalysisFailed { target, detail });
        }

        Ok(output.stdout)
    }
}

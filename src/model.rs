// src/model.rs

use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Date formats accepted for `--since` / `--until`
const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Optional analysis window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisFilter {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl AnalysisFilter {
    pub fn parse(since: Option<&str>, until: Option<&str>) -> Result<Self> {
        let since = since.map(parse_date).transpose()?;
        let until = until.map(parse_date).transpose()?;
        if let (Some(s), Some(u)) = (since, until) {
            if s > u {
                return Err(Error::EmptyWindow {
                    since: format_date(s),
                    until: format_date(u),
                });
            }
        }
        Ok(Self { since, until })
    }

    pub fn since_str(&self) -> Option<String> {
        self.since.map(format_date)
    }

    pub fn until_str(&self) -> Option<String> {
        self.until.map(format_date)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| Error::InvalidDate(raw.to_string()))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// One report per repository, or one for the whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Direct,
    Aggregate,
}

/// A checked-out tree on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    pub identifier: String,
    pub root: PathBuf,
    /// What HEAD points at after checkout (branch name or commit id)
    pub checked_out: String,
}

/// Result of one pipeline run: the persisted report, or why there is none.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub identifier: String,
    pub reference: String,
    pub result: Result<PathBuf>,
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub repositories: Vec<String>,
    /// Refs to analyze, in order. Never empty.
    pub refs: Vec<String>,
    pub filter: AnalysisFilter,
    pub mode: Mode,
    pub remote: bool,
    pub format: OutputFormat,
    /// Program used to produce reports
    pub tool: String,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub jobs: usize,
    pub keep_scratch: bool,
}

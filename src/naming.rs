// src/naming.rs

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs;

/// Derives the short name used for a repository's working copy and report.
///
/// Locators ending in `.git` (and every locator in remote mode) reduce to their
/// last path segment, so `https://host/group/name.git` and
/// `git@host:group/name.git` both become `name`. A plain local path is kept as
/// given; report names sanitize its separators later.
pub fn resolve(locator: &str, remote: bool) -> String {
    let trimmed = locator.trim().trim_end_matches('/');
    match trimmed.strip_suffix(".git") {
        Some(stem) => last_segment(stem).to_string(),
        None if remote => last_segment(trimmed).to_string(),
        None => trimmed.to_string(),
    }
}

fn last_segment(s: &str) -> &str {
    s.rsplit(|c: char| c == '/' || c == ':').next().unwrap_or(s)
}

/// Resolves every locator, rejecting empty names and names shared by two
/// different locators. Returns `(locator, identifier)` pairs in input order.
pub fn resolve_all(locators: &[String], remote: bool) -> Result<Vec<(String, String)>> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut resolved = Vec::with_capacity(locators.len());

    for locator in locators {
        let mut identifier = resolve(locator, remote);
        if !remote && matches!(last_segment(&identifier), "." | "..") {
            // `.` means the directory the tool runs in; name it after that
            if let Some(name) = directory_name(locator) {
                identifier = name;
            }
        }
        if identifier.is_empty() || identifier == "." || identifier == ".." {
            return Err(Error::InvalidLocator(locator.clone()));
        }
        if let Some(first) = seen.insert(identifier.clone(), locator) {
            return Err(Error::IdentifierCollision {
                identifier,
                first: first.to_string(),
                second: locator.clone(),
            });
        }
        resolved.push((locator.clone(), identifier));
    }
    Ok(resolved)
}

fn directory_name(locator: &str) -> Option<String> {
    let canonical = fs::canonicalize(locator).ok()?;
    canonical.file_name()?.to_str().map(String::from)
}

/// Fails when two pipelines would write the same report file. `planned` holds
/// `(report name, who writes it)` pairs.
pub fn ensure_distinct_reports(planned: &[(String, String)]) -> Result<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (report, owner) in planned {
        if let Some(first) = seen.insert(report, owner) {
            return Err(Error::ReportCollision {
                report: report.clone(),
                first: first.to_string(),
                second: owner.clone(),
            });
        }
    }
    Ok(())
}

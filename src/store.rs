// src/store.rs

use crate::error::{Error, Result};
use crate::model::AnalysisFilter;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Report file stem: `<base>[_SINCE_<date>][_UNTIL_<date>]`, with path
/// separators flattened to `-` so the name never reaches into subdirectories.
pub fn derive_name(base: &str, filter: &AnalysisFilter) -> String {
    let mut name = base.to_string();
    if let Some(since) = filter.since_str() {
        name.push_str("_SINCE_");
        name.push_str(&since);
    }
    if let Some(until) = filter.until_str() {
        name.push_str("_UNTIL_");
        name.push_str(&until);
    }
    name.replace(['/', '\\'], "-")
}

/// Directory that receives finished reports
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
    extension: &'static str,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>, extension: &'static str) -> Self {
        Self { root: root.into(), extension }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the results directory if it does not exist yet. Never removes it.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|source| Error::Io {
            path: self.root.clone(),
            source,
        })
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", file_name, self.extension))
    }

    /// Writes `payload` to `<root>/<file_name>.<ext>`, replacing any previous
    /// report of the same name, and syncs it to disk.
    pub fn persist(&self, file_name: &str, payload: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(file_name);
        let write = |path: &Path| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(path)?;
            file.write_all(payload)?;
            file.sync_all()
        };
        write(&path).map_err(|source| Error::WriteFailed {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = payload.len(), "report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(since: Option<&str>, until: Option<&str>) -> AnalysisFilter {
        AnalysisFilter::parse(since, until).unwrap()
    }

    #[test]
    fn name_without_filter() {
        assert_eq!(derive_name("service", &AnalysisFilter::default()), "service");
    }

    #[test]
    fn since_precedes_until() {
        let name = derive_name("service", &filter(Some("2023/01/01"), Some("2023/12/31")));
        assert_eq!(name, "service_SINCE_2023-01-01_UNTIL_2023-12-31");
    }

    #[test]
    fn only_until() {
        let name = derive_name("service", &filter(None, Some("2024/03/05")));
        assert_eq!(name, "service_UNTIL_2024-03-05");
    }

    #[test]
    fn separators_are_flattened() {
        let name = derive_name("../work/api", &AnalysisFilter::default());
        assert_eq!(name, "..-work-api");
        assert!(!name.contains('/'));
    }

    #[test]
    fn persist_overwrites_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("analytics"), "html");
        store.ensure_root().unwrap();

        let first = store.persist("svc", b"<html>old</html>").unwrap();
        let second = store.persist("svc", b"<html>new</html>").unwrap();
        let third = store.persist("svc", b"<html>new</html>").unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(fs::read(&third).unwrap(), b"<html>new</html>");
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 1);
    }

    #[test]
    fn persist_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the results directory should be
        let blocker = dir.path().join("analytics");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = ResultStore::new(&blocker, "html");

        let err = store.persist("svc", b"payload").unwrap_err();
        assert!(matches!(err, Error::WriteFailed { .. }));
    }
}

// src/cli.rs

use crate::error::{Error, Result};
use crate::model::{AnalysisFilter, Mode, RunConfig};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "repo-inspector [OPTIONS] [REPOSITORY]...\n       repo-inspector --remote-repos [OPTIONS] [REPOSITORY_URL]...")]
pub struct Args {
    /// Repositories to analyze (local paths, or clone URLs with --remote-repos)
    #[arg(value_name = "REPOSITORY")]
    pub repositories: Vec<String>,

    /// File containing a newline separated list of repositories
    #[arg(long = "repositories", value_name = "FILE")]
    pub repository_file: Option<PathBuf>,

    /// Branch, tag or commit to analyze
    #[arg(long, default_value = "develop")]
    pub branch: String,

    /// File containing a newline separated list of refs; each is analyzed in turn
    #[arg(long, value_name = "FILE", conflicts_with = "branch")]
    pub refs: Option<PathBuf>,

    /// Begin date of the analysis (YYYY/MM/DD)
    #[arg(long)]
    pub since: Option<String>,

    /// End date of the analysis (YYYY/MM/DD)
    #[arg(long)]
    pub until: Option<String>,

    /// Aggregate all repositories in one single report
    #[arg(long, alias = "agregate")]
    pub aggregate: bool,

    /// Clone the repositories first (arguments are clone URLs)
    #[arg(long, alias = "remoteRepos")]
    pub remote_repos: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,

    /// Analysis program to run
    #[arg(long, env = "REPO_INSPECTOR_TOOL", default_value = "gitinspector.py")]
    pub tool: String,

    /// Directory receiving the reports
    #[arg(long, env = "REPO_INSPECTOR_OUTPUT", default_value = "analytics")]
    pub output_dir: PathBuf,

    /// Scratch directory for cloned repositories
    #[arg(long, env = "REPO_INSPECTOR_SCRATCH", default_value = "tmp")]
    pub scratch_dir: PathBuf,

    /// Maximum number of repositories processed at once
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Leave cloned repositories in the scratch directory
    #[arg(long)]
    pub keep_scratch: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    /// Plain text tables
    Text,
    Json,
    Xml,
}

impl OutputFormat {
    /// Value passed to the analysis tool's `--format=`
    pub fn tool_name(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            other => other.tool_name(),
        }
    }
}

impl Args {
    /// Loads list files, validates dates and anchors the output and scratch
    /// directories at `base`. Repository locators are kept as given, they name
    /// the reports.
    pub fn into_config(self, base: &Path) -> Result<RunConfig> {
        let repositories = match &self.repository_file {
            Some(path) => read_list(path)?,
            None => self.repositories.clone(),
        };
        if repositories.is_empty() {
            return Err(Error::NoRepositories);
        }

        let refs = match &self.refs {
            Some(path) => read_list(path)?,
            None => vec![self.branch.clone()],
        };
        if refs.is_empty() {
            return Err(Error::Input {
                path: self.refs.clone().unwrap_or_default(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "no refs listed"),
            });
        }

        let filter = AnalysisFilter::parse(self.since.as_deref(), self.until.as_deref())?;

        Ok(RunConfig {
            repositories,
            refs,
            filter,
            mode: if self.aggregate { Mode::Aggregate } else { Mode::Direct },
            remote: self.remote_repos,
            format: self.format,
            tool: self.tool,
            output_dir: absolutize(base, &self.output_dir),
            scratch_dir: absolutize(base, &self.scratch_dir),
            jobs: usize::from(self.jobs),
            keep_scratch: self.keep_scratch,
        })
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Reads a newline separated list, skipping blank lines and `#` comments.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| Error::Input {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("repo-inspector").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["a.git"]);
        assert_eq!(args.branch, "develop");
        assert_eq!(args.format, OutputFormat::Html);
        assert_eq!(args.jobs, 10);
        assert!(!args.aggregate && !args.remote_repos);
    }

    #[test]
    fn legacy_flag_spellings() {
        let args = parse(&["--agregate", "--remoteRepos", "https://h/x.git"]);
        assert!(args.aggregate);
        assert!(args.remote_repos);
    }

    #[test]
    fn directories_are_made_absolute() {
        let config = parse(&["svc", "/abs/lib"]).into_config(Path::new("/work")).unwrap();
        assert_eq!(config.repositories, vec!["svc", "/abs/lib"]);
        assert_eq!(config.output_dir, PathBuf::from("/work/analytics"));
        assert_eq!(config.scratch_dir, PathBuf::from("/work/tmp"));
        assert_eq!(config.refs, vec!["develop"]);
        assert_eq!(config.mode, Mode::Direct);
    }

    #[test]
    fn remote_locators_untouched() {
        let config = parse(&["--remote-repos", "--aggregate", "git@h:o/r.git"])
            .into_config(Path::new("/work"))
            .unwrap();
        assert_eq!(config.repositories, vec!["git@h:o/r.git"]);
        assert_eq!(config.mode, Mode::Aggregate);
    }

    #[test]
    fn reads_repository_and_ref_files() {
        let dir = tempfile::tempdir().unwrap();
        let repos = dir.path().join("repos.txt");
        let refs = dir.path().join("refs.txt");
        fs::write(&repos, "https://h/a.git\n\n# skipped\nhttps://h/b.git\n").unwrap();
        fs::write(&refs, "main\nrelease/1.0\n").unwrap();

        let config = parse(&[
            "--remote-repos",
            "--repositories",
            repos.to_str().unwrap(),
            "--refs",
            refs.to_str().unwrap(),
        ])
        .into_config(dir.path())
        .unwrap();

        assert_eq!(config.repositories, vec!["https://h/a.git", "https://h/b.git"]);
        assert_eq!(config.refs, vec!["main", "release/1.0"]);
    }

    #[test]
    fn missing_list_file_is_input_error() {
        let err = parse(&["--repositories", "/no/such/list"])
            .into_config(Path::new("/work"))
            .unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
        assert!(err.is_usage());
    }

    #[test]
    fn no_repositories() {
        let err = parse(&[]).into_config(Path::new("/work")).unwrap_err();
        assert!(matches!(err, Error::NoRepositories));
    }

    #[test]
    fn text_reports_use_txt() {
        assert_eq!(OutputFormat::Text.extension(), "txt");
        assert_eq!(OutputFormat::Xml.extension(), "xml");
    }
}

// src/orchestrator.rs

use crate::analyzer::Analyzer;
use crate::error::{Error, Result};
use crate::model::{Mode, PipelineOutcome, RunConfig, WorkingCopy};
use crate::naming;
use crate::store::{derive_name, ResultStore};
use crate::telemetry;
use crate::vcs::{self, SourceControl};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::slice;
use tracing::{error, info, warn};

/// Report name used in aggregate mode
pub const AGGREGATE_NAME: &str = "aggregated_repo";

/// Scratch root for cloned repositories.
///
/// On drop it removes what this run put there: the whole root if the run
/// created it, otherwise only the working copies it cloned. Anything that was
/// already in a pre-existing root is left alone.
#[derive(Debug)]
pub struct ScratchSpace {
    path: PathBuf,
    created: bool,
    claimed: Vec<PathBuf>,
    remove_on_drop: bool,
}

impl ScratchSpace {
    pub fn create(path: &Path, remove_on_drop: bool) -> Result<Self> {
        let created = !path.exists();
        fs::create_dir_all(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            created,
            claimed: Vec::new(),
            remove_on_drop,
        })
    }

    /// Marks `dir` as belonging to this run if it does not exist yet.
    pub fn claim(&mut self, dir: &Path) {
        if !dir.exists() {
            self.claimed.push(dir.to_path_buf());
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if !self.remove_on_drop {
            info!(path = %self.path.display(), "keeping scratch directory");
            return;
        }
        let doomed = if self.created {
            slice::from_ref(&self.path)
        } else {
            self.claimed.as_slice()
        };
        for dir in doomed.iter().filter(|d| d.exists()) {
            match fs::remove_dir_all(dir) {
                Ok(()) => info!(path = %dir.display(), "scratch removed"),
                Err(e) => warn!(path = %dir.display(), "could not remove scratch: {}", e),
            }
        }
    }
}

/// What happened to every pipeline of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<PipelineOutcome>,
}

impl RunSummary {
    pub fn failures(&self) -> impl Iterator<Item = &PipelineOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// A repository to process: where it comes from and what it is called.
struct Target {
    locator: String,
    identifier: String,
    root: PathBuf,
}

/// Drives a whole run: precheck, fan-out, barrier, teardown.
///
/// Pipeline failures never stop sibling pipelines; they come back as failed
/// [`PipelineOutcome`]s in the [`RunSummary`]. Only problems found before any
/// work starts (bad names, unreachable repositories, unusable directories) are
/// returned as `Err`.
pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    scm: &'a dyn SourceControl,
    analyzer: &'a dyn Analyzer,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a RunConfig, scm: &'a dyn SourceControl, analyzer: &'a dyn Analyzer) -> Self {
        Self { config, scm, analyzer }
    }

    pub fn run(&self) -> Result<RunSummary> {
        let config = self.config;
        let resolved = naming::resolve_all(&config.repositories, config.remote)?;
        naming::ensure_distinct_reports(&self.planned_reports(&resolved))?;
        self.check_access(&resolved)?;

        let store = ResultStore::new(&config.output_dir, config.format.extension());
        store.ensure_root()?;
        info!("Reports go to {}", store.root().display());

        let mut scratch = if config.remote {
            Some(ScratchSpace::create(&config.scratch_dir, !config.keep_scratch)?)
        } else {
            None
        };

        let targets: Vec<Target> = resolved
            .into_iter()
            .map(|(locator, identifier)| {
                let root = vcs::working_copy_root(&locator, &identifier, config.remote, &config.scratch_dir);
                if let Some(scratch) = scratch.as_mut() {
                    scratch.claim(&root);
                }
                Target { locator, identifier, root }
            })
            .collect();

        let pool = rayon::ThreadPoolBuilder::new().num_threads(config.jobs).build()?;

        // Every pipeline has returned once `install` does; only then may the
        // scratch guard drop.
        let outcomes = pool.install(|| match config.mode {
            Mode::Direct => self.run_direct(&targets, &store),
            Mode::Aggregate => self.run_aggregate(&targets, &store),
        });
        drop(scratch);

        Ok(RunSummary { outcomes })
    }

    fn check_access(&self, resolved: &[(String, String)]) -> Result<()> {
        info!("Checking access to {} repositories", resolved.len());
        for (locator, _) in resolved {
            self.scm
                .check_reachable(locator)
                .map_err(|source| Error::UnreachableRepository {
                    locator: locator.clone(),
                    source,
                })?;
        }
        info!("Access granted to all provided repositories");
        Ok(())
    }

    /// Every report file the run will write, with the pipeline writing it.
    fn planned_reports(&self, resolved: &[(String, String)]) -> Vec<(String, String)> {
        let filter = &self.config.filter;
        let refs = &self.config.refs;
        match self.config.mode {
            Mode::Direct => resolved
                .iter()
                .flat_map(|(locator, identifier)| {
                    refs.iter().map(move |reference| {
                        let name = derive_name(&self.base_name(identifier, reference), filter);
                        (name, format!("{} at {}", locator, reference))
                    })
                })
                .collect(),
            Mode::Aggregate => refs
                .iter()
                .map(|reference| {
                    let name = derive_name(&self.base_name(AGGREGATE_NAME, reference), filter);
                    (name, format!("aggregate at {}", reference))
                })
                .collect(),
        }
    }

    /// Report stem before filter suffixes. The ref is only part of the name
    /// when several refs are analyzed in one run.
    fn base_name(&self, identifier: &str, reference: &str) -> String {
        if self.config.refs.len() > 1 {
            format!("{}_{}", identifier, reference)
        } else {
            identifier.to_string()
        }
    }

    fn provision(&self, target: &Target, reference: &str) -> Result<WorkingCopy> {
        let acquire = self.config.remote && !target.root.exists();
        vcs::provision(
            self.scm,
            &target.locator,
            &target.identifier,
            &target.root,
            reference,
            acquire,
        )
    }

    fn run_direct(&self, targets: &[Target], store: &ResultStore) -> Vec<PipelineOutcome> {
        let bar = telemetry::progress_bar(targets.len() as u64);
        bar.set_message("Processing repositories");

        let outcomes: Vec<Vec<PipelineOutcome>> = targets
            .par_iter()
            .progress_with(bar.clone())
            .map(|target| self.direct_pipeline(target, store))
            .collect();
        bar.finish_with_message("Repositories processed");

        outcomes.into_iter().flatten().collect()
    }

    /// One repository, every ref in order. Refs share the working tree, so
    /// they never run concurrently.
    fn direct_pipeline(&self, target: &Target, store: &ResultStore) -> Vec<PipelineOutcome> {
        let filter = &self.config.filter;
        self.config
            .refs
            .iter()
            .map(|reference| {
                let name = derive_name(&self.base_name(&target.identifier, reference), filter);
                let result = self
                    .provision(target, reference)
                    .and_then(|wc| self.analyzer.run(slice::from_ref(&wc), filter))
                    .and_then(|report| store.persist(&name, &report));
                report_outcome(PipelineOutcome {
                    identifier: target.identifier.clone(),
                    reference: reference.clone(),
                    result,
                })
            })
            .collect()
    }

    fn run_aggregate(&self, targets: &[Target], store: &ResultStore) -> Vec<PipelineOutcome> {
        self.config
            .refs
            .iter()
            .map(|reference| report_outcome(self.aggregate_pipeline(targets, store, reference)))
            .collect()
    }

    /// Provisions every repository in parallel, then analyzes them all in a
    /// single invocation. Any provisioning failure fails the combined report.
    fn aggregate_pipeline(&self, targets: &[Target], store: &ResultStore, reference: &str) -> PipelineOutcome {
        let bar = telemetry::progress_bar(targets.len() as u64);
        bar.set_message(format!("Checking out {}", reference));

        let provisioned: Vec<Result<WorkingCopy>> = targets
            .par_iter()
            .progress_with(bar.clone())
            .map(|target| self.provision(target, reference))
            .collect();
        bar.finish_with_message("Repositories ready");

        let identifier = self.base_name(AGGREGATE_NAME, reference);
        let mut copies = Vec::with_capacity(provisioned.len());
        let mut first_failure = None;
        for result in provisioned {
            match result {
                Ok(wc) => copies.push(wc),
                Err(e) if first_failure.is_none() => first_failure = Some(e),
                Err(e) => error!("{}", e),
            }
        }

        let result = match first_failure {
            Some(e) => Err(e),
            None => {
                let name = derive_name(&identifier, &self.config.filter);
                self.analyzer
                    .run(&copies, &self.config.filter)
                    .and_then(|report| store.persist(&name, &report))
            }
        };

        PipelineOutcome {
            identifier,
            reference: reference.to_string(),
            result,
        }
    }
}

fn report_outcome(outcome: PipelineOutcome) -> PipelineOutcome {
    match &outcome.result {
        Ok(path) => info!(
            repo = %outcome.identifier,
            reference = %outcome.reference,
            "report stored at {}",
            path.display()
        ),
        Err(e) => error!(repo = %outcome.identifier, reference = %outcome.reference, "{}", e),
    }
    outcome
}

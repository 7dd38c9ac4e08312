// src/vcs.rs

use crate::error::{Error, Result};
use crate::model::WorkingCopy;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{BranchType, Cred, CredentialType, Direction, FetchOptions, Remote, RemoteCallbacks, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The source-control operations a run needs.
pub trait SourceControl: Send + Sync {
    /// Cheap connectivity check, the equivalent of `git ls-remote`.
    fn check_reachable(&self, locator: &str) -> std::result::Result<(), git2::Error>;

    /// Fresh clone of `locator` into `dest`.
    fn clone_into(&self, locator: &str, dest: &Path) -> std::result::Result<(), git2::Error>;

    /// Points the working tree at `reference`. Returns what HEAD now names.
    fn checkout(&self, work_tree: &Path, reference: &str) -> std::result::Result<String, git2::Error>;
}

/// `SourceControl` backed by libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitClient;

impl SourceControl for GitClient {
    fn check_reachable(&self, locator: &str) -> std::result::Result<(), git2::Error> {
        let mut remote = Remote::create_detached(locator)?;
        let connection = remote.connect_auth(Direction::Fetch, Some(callbacks()), None)?;
        let heads = connection.list()?.len();
        debug!(locator, heads, "remote answered");
        Ok(())
    }

    fn clone_into(&self, locator: &str, dest: &Path) -> std::result::Result<(), git2::Error> {
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks());
        RepoBuilder::new().fetch_options(fetch).clone(locator, dest)?;
        Ok(())
    }

    fn checkout(&self, work_tree: &Path, reference: &str) -> std::result::Result<String, git2::Error> {
        let repo = Repository::open(work_tree)?;

        // Local branch, then origin/<ref> (tracked locally), then any revision.
        let branch = match repo.find_branch(reference, BranchType::Local) {
            Ok(branch) => Some(branch),
            Err(_) => match repo.find_branch(&format!("origin/{}", reference), BranchType::Remote) {
                Ok(remote_branch) => {
                    let commit = remote_branch.get().peel_to_commit()?;
                    let mut local = repo.branch(reference, &commit, false)?;
                    local.set_upstream(Some(&format!("origin/{}", reference)))?;
                    Some(local)
                }
                Err(_) => None,
            },
        };

        let mut opts = CheckoutBuilder::new();
        opts.safe();

        match branch {
            Some(branch) => {
                let refname = branch
                    .get()
                    .name()
                    .ok_or_else(|| git2::Error::from_str("branch name is not valid utf-8"))?
                    .to_string();
                let target = branch.get().peel(git2::ObjectType::Commit)?;
                repo.checkout_tree(&target, Some(&mut opts))?;
                repo.set_head(&refname)?;
                Ok(reference.to_string())
            }
            None => {
                let target = repo.revparse_single(reference)?.peel(git2::ObjectType::Commit)?;
                repo.checkout_tree(&target, Some(&mut opts))?;
                repo.set_head_detached(target.id())?;
                Ok(target.id().to_string())
            }
        }
    }
}

fn callbacks() -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;
    callbacks.credentials(move |url, username, allowed| {
        // libgit2 keeps asking as long as we keep answering
        attempts += 1;
        if attempts > 3 {
            return Err(git2::Error::from_str("authentication failed"));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            Cred::ssh_key_from_agent(username.unwrap_or("git"))
        } else if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            Cred::credential_helper(&config, url, username)
        } else {
            Cred::default()
        }
    });
    callbacks
}

/// Where a repository's working copy lives for this run.
pub fn working_copy_root(locator: &str, identifier: &str, remote: bool, scratch: &Path) -> PathBuf {
    if remote {
        scratch.join(identifier)
    } else {
        PathBuf::from(locator)
    }
}

/// Makes sure `root` holds the repository checked out at `reference`.
///
/// With `acquire` set the repository is cloned from `locator` first; otherwise
/// `root` must already be a working tree. Nothing is retried.
pub fn provision(
    scm: &dyn SourceControl,
    locator: &str,
    identifier: &str,
    root: &Path,
    reference: &str,
    acquire: bool,
) -> Result<WorkingCopy> {
    let failed = |stage: &str, err: git2::Error| Error::CheckoutFailed {
        identifier: identifier.to_string(),
        reference: reference.to_string(),
        detail: format!("{}: {}", stage, err.message()),
    };

    if acquire {
        info!(repo = identifier, "cloning");
        scm.clone_into(locator, root).map_err(|e| failed("clone", e))?;
        info!(repo = identifier, "cloned");
    }

    info!(repo = identifier, reference, "checking out");
    let checked_out = scm.checkout(root, reference).map_err(|e| failed("checkout", e))?;
    debug!(repo = identifier, head = %checked_out, "checked out");

    Ok(WorkingCopy {
        identifier: identifier.to_string(),
        root: root.to_path_buf(),
        checked_out,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_repository_is_reachable() {
        let dir = tempfile::tempdir().unwrap();
        fixture::origin(dir.path());
        GitClient.check_reachable(dir.path().to_str().unwrap()).unwrap();
    }

    #[test]
    fn missing_repository_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(GitClient.check_reachable(missing.to_str().unwrap()).is_err());
    }

    #[test]
    fn clones_and_checks_out_remote_branch() {
        let origin_dir = tempfile::tempdir().unwrap();
        fixture::origin(origin_dir.path());
        let scratch = tempfile::tempdir().unwrap();
        let locator = origin_dir.path().to_str().unwrap();
        let root = working_copy_root(locator, "svc", true, scratch.path());

        let wc = provision(&GitClient, locator, "svc", &root, "develop", true).unwrap();

        assert_eq!(wc.root, scratch.path().join("svc"));
        assert_eq!(wc.checked_out, "develop");
        assert!(root.join("DEVELOP").exists());
        let repo = Repository::open(&root).unwrap();
        assert_eq!(repo.head().unwrap().shorthand(), Some("develop"));
    }

    #[test]
    fn local_mode_switches_in_place() {
        let dir = tempfile::tempdir().unwrap();
        fixture::origin(dir.path());
        let locator = dir.path().to_str().unwrap();
        let root = working_copy_root(locator, locator, false, Path::new("/unused"));
        assert!(!root.join("DEVELOP").exists());

        provision(&GitClient, locator, locator, &root, "develop", false).unwrap();
        assert!(root.join("DEVELOP").exists());

        // Re-checkout of another ref in the same tree
        provision(&GitClient, locator, locator, &root, "main", false).unwrap();
        assert!(!root.join("DEVELOP").exists());
    }

    #[test]
    fn detached_checkout_of_commit_id() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fixture::origin(dir.path());
        let main_id = repo.refname_to_id("refs/heads/main").unwrap().to_string();

        let head = GitClient.checkout(dir.path(), &main_id).unwrap();
        assert_eq!(head, main_id);
        assert!(Repository::open(dir.path()).unwrap().head_detached().unwrap());
    }

    #[test]
    fn unknown_ref_is_checkout_failure() {
        let dir = tempfile::tempdir().unwrap();
        fixture::origin(dir.path());
        let locator = dir.path().to_str().unwrap();

        let err = provision(&GitClient, locator, "svc", dir.path(), "no-such-branch", false).unwrap_err();
        match err {
            Error::CheckoutFailed { identifier, reference, .. } => {
                assert_eq!(identifier, "svc");
                assert_eq!(reference, "no-such-branch");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

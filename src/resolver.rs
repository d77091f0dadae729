//! # Checkout Resolution
//!
//! This module provides the [`CheckoutResolver`], which brings the on-disk
//! checkout of a [`RepositoryReference`] into conformance with its declared
//! ref: clone when absent, fetch and check out when the ref differs, no-op
//! when already correct.
//!
//! ## Design
//!
//! The resolver is built around the [`GitClient`] trait, which separates
//! the decision logic (clone vs. update vs. skip, directory validation,
//! freshness) from the concrete Git operations. In the application the
//! [`SystemGitClient`] is used, which shells out to the installed `git`
//! binary. In tests the client is replaced with a mock to simulate remote
//! state without network access or real repositories.
//!
//! All operations are blocking calls on the caller's thread; a slow fetch
//! blocks the configuration pass. An interrupted clone leaves partial state
//! that the next resolve treats as "not yet valid" and retries in place.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::git;
use crate::metadata::{CheckoutMetadata, MetadataStore};
use crate::reference::{GitRef, RepositoryReference};

/// The VCS state a checkout actually ended up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// HEAD points at a local branch.
    Branch(String),
    /// Detached HEAD at a commit (tag or commit refs).
    Detached(String),
    /// A local-override path used verbatim; the resolver never touched it.
    Unmanaged,
}

/// A successfully synchronized checkout, ready for wiring.
///
/// Not persisted beyond the configuration pass; the durable state is the
/// checkout on disk plus the metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCheckout {
    /// Name of the reference that produced this checkout.
    pub name: String,
    /// Origin URI the checkout tracks.
    pub uri: String,
    /// Path of the work tree.
    pub local_path: PathBuf,
    /// What is checked out at `local_path`.
    pub head: HeadState,
}

/// Trait for git operations - allows mocking in tests.
pub trait GitClient: Send + Sync {
    /// Whether `dir` already holds a git work tree.
    fn is_work_tree(&self, dir: &Path) -> bool;

    /// The origin URL of the repository at `dir`.
    fn remote_url(&self, dir: &Path) -> Result<String>;

    /// Produce a fresh checkout of `uri` at `target` in `dir`.
    ///
    /// Must tolerate a non-empty `dir` (partial previous clone, host build
    /// bookkeeping files) and never delete existing content.
    fn clone_into(&self, dir: &Path, uri: &str, target: &GitRef) -> Result<()>;

    /// Fetch from origin and check out `target` in an existing repository.
    fn update(&self, dir: &Path, target: &GitRef) -> Result<()>;

    /// The current HEAD state of the repository at `dir`.
    fn head(&self, dir: &Path) -> Result<HeadState>;
}

/// The default [`GitClient`], delegating to the system `git` binary.
pub struct SystemGitClient;

impl SystemGitClient {
    fn checkout(&self, dir: &Path, target: &GitRef) -> Result<()> {
        match target {
            GitRef::Branch(branch) => git::checkout_branch(dir, branch),
            GitRef::Tag(value) | GitRef::Commit(value) => git::checkout_detached(dir, value),
            GitRef::Default => {
                // sticky: stay on the branch that is already checked out,
                // falling back to the remote default when there is none yet
                let branch = match git::current_branch(dir)? {
                    Some(branch) if git::head_commit(dir).is_ok() => branch,
                    _ => git::default_branch(dir)?,
                };
                git::checkout_branch(dir, &branch)
            }
        }
    }
}

impl GitClient for SystemGitClient {
    fn is_work_tree(&self, dir: &Path) -> bool {
        git::is_work_tree(dir)
    }

    fn remote_url(&self, dir: &Path) -> Result<String> {
        git::remote_url(dir)
    }

    fn clone_into(&self, dir: &Path, uri: &str, target: &GitRef) -> Result<()> {
        fs::create_dir_all(dir)?;
        git::init(dir)?;
        git::set_remote(dir, uri)?;
        git::fetch(dir)?;
        self.checkout(dir, target)
    }

    fn update(&self, dir: &Path, target: &GitRef) -> Result<()> {
        git::fetch(dir)?;
        self.checkout(dir, target)
    }

    fn head(&self, dir: &Path) -> Result<HeadState> {
        match git::current_branch(dir)? {
            Some(branch) => Ok(HeadState::Branch(branch)),
            None => Ok(HeadState::Detached(git::head_commit(dir)?)),
        }
    }
}

/// Synchronizes checkouts below a configured root.
pub struct CheckoutResolver {
    client: Box<dyn GitClient>,
    root: PathBuf,
    refresh_interval: Duration,
}

impl CheckoutResolver {
    /// Resolver using the system git client.
    pub fn new(root: PathBuf, refresh_interval: Duration) -> Self {
        Self::with_client(root, refresh_interval, Box::new(SystemGitClient))
    }

    /// Resolver with a custom [`GitClient`] implementation.
    pub fn with_client(
        root: PathBuf,
        refresh_interval: Duration,
        client: Box<dyn GitClient>,
    ) -> Self {
        Self {
            client,
            root,
            refresh_interval,
        }
    }

    /// The directory a reference checks out into: its explicit override
    /// (resolved against the root when relative), else `<root>/<name>`.
    pub fn checkout_path(&self, reference: &RepositoryReference) -> PathBuf {
        match reference.checkout_directory_override() {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => self.root.join(dir),
            None => self.root.join(reference.name()),
        }
    }

    /// Bring the checkout for `reference` into conformance and describe the
    /// result.
    ///
    /// Re-running with an unchanged reference against a correct checkout
    /// performs no mutation beyond a state check, and no network traffic at
    /// all within the refresh interval.
    pub fn resolve(
        &self,
        reference: &RepositoryReference,
        metadata: &mut MetadataStore,
    ) -> Result<ResolvedCheckout> {
        let dir = self.checkout_path(reference);
        let uri = reference.uri_str();
        let target = reference.git_ref();
        let current = CheckoutMetadata::now(uri, &target);

        if self.client.is_work_tree(&dir) {
            match self.client.remote_url(&dir) {
                Ok(url) if url != uri => {
                    return Err(Error::Checkout {
                        name: reference.name().to_string(),
                        uri: uri.to_string(),
                        message: format!(
                            "checkout directory {} tracks a different repository ({})",
                            dir.display(),
                            url
                        ),
                        hint: Some(
                            "remove the directory or point checkout_directory elsewhere"
                                .to_string(),
                        ),
                    });
                }
                Ok(_) => {
                    if metadata.is_fresh(reference.name(), &current, self.refresh_interval) {
                        log::info!(
                            "checkout of '{}' is up to date, skipping fetch",
                            reference.name()
                        );
                    } else {
                        log::info!("updating '{}' to {} from {}", reference.name(), target, uri);
                        self.client
                            .update(&dir, &target)
                            .map_err(|e| self.checkout_error(reference, e))?;
                        metadata.record(reference.name(), current);
                    }
                }
                Err(_) => {
                    // a .git directory without a usable origin remote is an
                    // interrupted clone; redo the sequence in place
                    log::info!("resuming interrupted checkout of '{}'", reference.name());
                    self.client
                        .clone_into(&dir, uri, &target)
                        .map_err(|e| self.checkout_error(reference, e))?;
                    metadata.record(reference.name(), current);
                }
            }
        } else {
            let occupied = dir.exists()
                && fs::read_dir(&dir)
                    .map_err(|e| self.checkout_error(reference, e.into()))?
                    .next()
                    .is_some();
            if occupied {
                return Err(Error::Checkout {
                    name: reference.name().to_string(),
                    uri: uri.to_string(),
                    message: format!(
                        "checkout directory {} exists but is not a git checkout",
                        dir.display()
                    ),
                    hint: Some(
                        "refusing to overwrite existing content; remove the directory manually if it is disposable"
                            .to_string(),
                    ),
                });
            }
            log::info!("checking out {} of {} into {}", target, uri, dir.display());
            self.client
                .clone_into(&dir, uri, &target)
                .map_err(|e| self.checkout_error(reference, e))?;
            metadata.record(reference.name(), current);
        }

        let head = self
            .client
            .head(&dir)
            .map_err(|e| self.checkout_error(reference, e))?;
        Ok(ResolvedCheckout {
            name: reference.name().to_string(),
            uri: uri.to_string(),
            local_path: dir,
            head,
        })
    }

    fn checkout_error(&self, reference: &RepositoryReference, cause: Error) -> Error {
        match cause {
            already @ Error::Checkout { .. } => already,
            other => Error::Checkout {
                name: reference.name().to_string(),
                uri: reference.uri_str().to_string(),
                message: other.to_string(),
                hint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// Mock git client for testing.
    ///
    /// Tracks which directories hold "repositories" and records every
    /// mutating call so tests can assert on the decisions the resolver
    /// made.
    struct MockGitClient {
        work_trees: Mutex<HashSet<PathBuf>>,
        remote_urls: Mutex<HashMap<PathBuf, String>>,
        head: Mutex<HeadState>,
        calls: Arc<Mutex<Vec<String>>>,
        fail_clone: Option<String>,
    }

    impl MockGitClient {
        fn new() -> Self {
            Self {
                work_trees: Mutex::new(HashSet::new()),
                remote_urls: Mutex::new(HashMap::new()),
                head: Mutex::new(HeadState::Branch("main".to_string())),
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_clone: None,
            }
        }

        fn with_clone_error(message: &str) -> Self {
            Self {
                fail_clone: Some(message.to_string()),
                ..Self::new()
            }
        }

        fn with_existing(dir: &Path, url: &str) -> Self {
            let mock = Self::new();
            mock.work_trees.lock().unwrap().insert(dir.to_path_buf());
            mock.remote_urls
                .lock()
                .unwrap()
                .insert(dir.to_path_buf(), url.to_string());
            mock
        }

        fn set_head(&self, head: HeadState) {
            *self.head.lock().unwrap() = head;
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GitClient for MockGitClient {
        fn is_work_tree(&self, dir: &Path) -> bool {
            self.work_trees.lock().unwrap().contains(dir)
        }

        fn remote_url(&self, dir: &Path) -> Result<String> {
            self.remote_urls
                .lock()
                .unwrap()
                .get(dir)
                .cloned()
                .ok_or_else(|| Error::GitCommand {
                    command: "remote get-url origin".to_string(),
                    stderr: "No such remote 'origin'".to_string(),
                })
        }

        fn clone_into(&self, dir: &Path, uri: &str, target: &GitRef) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("clone {} {}", uri, target));
            if let Some(message) = &self.fail_clone {
                return Err(Error::GitCommand {
                    command: "fetch --tags origin".to_string(),
                    stderr: message.clone(),
                });
            }
            self.work_trees.lock().unwrap().insert(dir.to_path_buf());
            self.remote_urls
                .lock()
                .unwrap()
                .insert(dir.to_path_buf(), uri.to_string());
            Ok(())
        }

        fn update(&self, _dir: &Path, target: &GitRef) -> Result<()> {
            self.calls.lock().unwrap().push(format!("update {}", target));
            Ok(())
        }

        fn head(&self, _dir: &Path) -> Result<HeadState> {
            Ok(self.head.lock().unwrap().clone())
        }
    }

    fn reference(name: &str, uri: &str) -> RepositoryReference {
        let mut reference = RepositoryReference::new(name);
        reference.uri(uri);
        reference
    }

    fn resolver_with(
        root: &Path,
        client: MockGitClient,
    ) -> (CheckoutResolver, Arc<Mutex<Vec<String>>>) {
        let calls = client.calls.clone();
        let resolver = CheckoutResolver::with_client(
            root.to_path_buf(),
            Duration::from_secs(86_400),
            Box::new(client),
        );
        (resolver, calls)
    }

    #[test]
    fn test_clone_when_absent() {
        let temp = tempfile::tempdir().unwrap();
        let (resolver, calls) = resolver_with(temp.path(), MockGitClient::new());
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let mut reference = reference("testlib", "https://example.com/a.git");
        reference.branch("main");
        let resolved = resolver.resolve(&reference, &mut store).unwrap();

        assert_eq!(resolved.local_path, temp.path().join("testlib"));
        assert_eq!(resolved.head, HeadState::Branch("main".to_string()));
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            ["clone https://example.com/a.git branch 'main'"]
        );
        assert!(store.get("testlib").is_some());
    }

    #[test]
    fn test_second_resolve_within_interval_does_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let client = MockGitClient::new();
        let (resolver, calls) = resolver_with(temp.path(), client);
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let mut reference = reference("testlib", "https://example.com/a.git");
        reference.branch("main");

        let first = resolver.resolve(&reference, &mut store).unwrap();
        let second = resolver.resolve(&reference, &mut store).unwrap();

        assert_eq!(first.head, second.head);
        // one clone, no update: the second resolve only checked state
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stale_checkout_is_updated() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("testlib");
        let client = MockGitClient::with_existing(&dir, "https://example.com/a.git");
        let (resolver, calls) = resolver_with(temp.path(), client);
        // empty store: nothing recorded, so the checkout counts as stale
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let mut reference = reference("testlib", "https://example.com/a.git");
        reference.branch("main");
        resolver.resolve(&reference, &mut store).unwrap();

        assert_eq!(calls.lock().unwrap().as_slice(), ["update branch 'main'"]);
    }

    #[test]
    fn test_ref_switch_from_branch_to_commit_re_resolves() {
        let temp = tempfile::tempdir().unwrap();
        let client = MockGitClient::new();
        let (resolver, calls) = resolver_with(temp.path(), client);
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let mut by_branch = reference("testlib", "https://example.com/a.git");
        by_branch.branch("main");
        let resolved = resolver.resolve(&by_branch, &mut store).unwrap();
        assert_eq!(resolved.head, HeadState::Branch("main".to_string()));

        let mut by_commit = reference("testlib", "https://example.com/a.git");
        by_commit.commit("abc123");
        let resolved = resolver.resolve(&by_commit, &mut store).unwrap();

        // the interval did not suppress the update: the ref changed
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], "update commit abc123");
        assert_eq!(resolved.name, "testlib");
    }

    #[test]
    fn test_detached_head_reported_for_commit_ref() {
        let temp = tempfile::tempdir().unwrap();
        let client = MockGitClient::new();
        client.set_head(HeadState::Detached("abc123".to_string()));
        let (resolver, _calls) = resolver_with(temp.path(), client);
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let mut reference = reference("testlib", "https://example.com/a.git");
        reference.commit("abc123");
        let resolved = resolver.resolve(&reference, &mut store).unwrap();
        assert_eq!(resolved.head, HeadState::Detached("abc123".to_string()));
    }

    #[test]
    fn test_same_uri_two_names_get_separate_checkouts() {
        let temp = tempfile::tempdir().unwrap();
        let (resolver, calls) = resolver_with(temp.path(), MockGitClient::new());
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let uri = "https://example.com/a.git";
        let first = resolver.resolve(&reference("lib-a", uri), &mut store).unwrap();
        let second = resolver.resolve(&reference("lib-b", uri), &mut store).unwrap();

        assert_ne!(first.local_path, second.local_path);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_non_repository_directory_is_not_overwritten() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("testlib");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("precious.txt"), "user data").unwrap();

        let (resolver, calls) = resolver_with(temp.path(), MockGitClient::new());
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let err = resolver
            .resolve(&reference("testlib", "https://example.com/a.git"), &mut store)
            .unwrap_err();
        assert!(err.to_string().contains("is not a git checkout"));
        assert!(calls.lock().unwrap().is_empty());
        // contents untouched
        assert_eq!(fs::read_to_string(dir.join("precious.txt")).unwrap(), "user data");
    }

    #[test]
    fn test_unreadable_checkout_path_is_checkout_error() {
        let temp = tempfile::tempdir().unwrap();
        // a plain file where the checkout directory should be: listing it
        // fails, and the failure carries the reference context
        fs::write(temp.path().join("testlib"), "not a directory").unwrap();

        let (resolver, calls) = resolver_with(temp.path(), MockGitClient::new());
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let err = resolver
            .resolve(&reference("testlib", "https://example.com/a.git"), &mut store)
            .unwrap_err();
        assert!(matches!(err, Error::Checkout { .. }));
        assert!(err.to_string().contains("Checkout error for 'testlib'"));
        assert!(calls.lock().unwrap().is_empty());
        // the file is left alone
        assert_eq!(
            fs::read_to_string(temp.path().join("testlib")).unwrap(),
            "not a directory"
        );
    }

    #[test]
    fn test_uri_mismatch_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("testlib");
        let client = MockGitClient::with_existing(&dir, "https://example.com/other.git");
        let (resolver, calls) = resolver_with(temp.path(), client);
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let err = resolver
            .resolve(&reference("testlib", "https://example.com/a.git"), &mut store)
            .unwrap_err();
        assert!(err.to_string().contains("tracks a different repository"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_partial_clone_is_retried() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("testlib");
        // work tree exists but has no origin remote: an interrupted clone
        let client = MockGitClient::new();
        client.work_trees.lock().unwrap().insert(dir.clone());
        let (resolver, calls) = resolver_with(temp.path(), client);
        let mut store = MetadataStore::load(temp.path()).unwrap();

        resolver
            .resolve(&reference("testlib", "https://example.com/a.git"), &mut store)
            .unwrap();
        assert!(calls.lock().unwrap()[0].starts_with("clone "));
    }

    #[test]
    fn test_clone_error_propagates_as_checkout_error() {
        let temp = tempfile::tempdir().unwrap();
        let (resolver, _calls) =
            resolver_with(temp.path(), MockGitClient::with_clone_error("Could not resolve host"));
        let mut store = MetadataStore::load(temp.path()).unwrap();

        let err = resolver
            .resolve(&reference("testlib", "https://example.com/a.git"), &mut store)
            .unwrap_err();
        let display = err.to_string();
        assert!(display.contains("Checkout error for 'testlib'"));
        assert!(display.contains("Could not resolve host"));
        // nothing recorded for a failed resolve
        assert!(store.get("testlib").is_none());
    }

    #[test]
    fn test_checkout_directory_override() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = CheckoutResolver::with_client(
            temp.path().to_path_buf(),
            Duration::from_secs(86_400),
            Box::new(MockGitClient::new()),
        );

        let mut relative = reference("testlib", "https://example.com/a.git");
        relative.checkout_directory("vendor/testlib");
        assert_eq!(
            resolver.checkout_path(&relative),
            temp.path().join("vendor/testlib")
        );

        let mut absolute = reference("testlib", "https://example.com/a.git");
        absolute.checkout_directory(temp.path().join("elsewhere"));
        assert_eq!(resolver.checkout_path(&absolute), temp.path().join("elsewhere"));
    }
}

//! # Repository Reference Descriptors
//!
//! This module defines the value objects collected by the declarative
//! surface: one [`RepositoryReference`] per external repository, carrying
//! the origin URI, the desired Git ref, the checkout location, and the
//! included-build wiring requested for it.
//!
//! References are configured through mutating builder methods inside the
//! closure passed to [`crate::extension::GitIncludeExtension::include`],
//! then validated eagerly before any network activity.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The Git state a reference asks the resolver to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    /// Whatever branch the remote had as its default when the checkout was
    /// first cloned. The initially-cloned branch is sticky: later runs pull
    /// it up to date but never re-resolve the remote's default.
    Default,
    /// A branch, checked out as a local tracking branch reset to the remote
    /// tip on every (non-fresh) resolve.
    Branch(String),
    /// A tag, checked out detached.
    Tag(String),
    /// A commit hash, checked out detached.
    Commit(String),
}

impl GitRef {
    /// Stable kind label, used by the checkout metadata store.
    pub fn kind(&self) -> &'static str {
        match self {
            GitRef::Default => "default",
            GitRef::Branch(_) => "branch",
            GitRef::Tag(_) => "tag",
            GitRef::Commit(_) => "commit",
        }
    }

    /// The declared ref value; empty for [`GitRef::Default`].
    pub fn value(&self) -> &str {
        match self {
            GitRef::Default => "",
            GitRef::Branch(v) | GitRef::Tag(v) | GitRef::Commit(v) => v,
        }
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitRef::Default => write!(f, "default branch"),
            GitRef::Branch(v) => write!(f, "branch '{}'", v),
            GitRef::Tag(v) => write!(f, "tag '{}'", v),
            GitRef::Commit(v) => write!(f, "commit {}", v),
        }
    }
}

/// Target of a dependency substitution rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionTarget {
    /// A project path inside the included build, e.g. `:sub`.
    Project(String),
    /// Another binary module coordinate, e.g. `com.acme:other`.
    Module(String),
}

/// A rule replacing a binary module coordinate with a target built from
/// source (or another coordinate).
///
/// Rules apply in declared order; a later rule for the same module
/// coordinate overrides an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySubstitution {
    /// The module coordinate being replaced, e.g. `com.acme.somelib:somelib2`.
    pub module: String,
    /// What resolution of `module` should yield instead.
    pub target: SubstitutionTarget,
}

impl DependencySubstitution {
    /// Substitute `module` with a project path of the included build.
    pub fn project(module: impl Into<String>, project_path: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            target: SubstitutionTarget::Project(project_path.into()),
        }
    }

    /// Substitute `module` with another module coordinate.
    pub fn module(module: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            target: SubstitutionTarget::Module(replacement.into()),
        }
    }
}

/// One included-build registration requested by a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeBuildSpec {
    /// Directory of the build, relative to the checkout root (`.` for the
    /// checkout itself).
    pub directory: String,
    /// Optional name override for the included build.
    pub name: Option<String>,
    /// Dependency substitution rules, in declared order.
    pub substitutions: Vec<DependencySubstitution>,
}

impl IncludeBuildSpec {
    /// Spec for the checkout root itself.
    pub fn root() -> Self {
        Self::at(".")
    }

    /// Spec for a directory relative to the checkout root.
    pub fn at(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            name: None,
            substitutions: Vec::new(),
        }
    }

    /// Override the included-build name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a dependency substitution rule.
    pub fn substitute(mut self, substitution: DependencySubstitution) -> Self {
        self.substitutions.push(substitution);
        self
    }
}

/// Hook invoked with the final checkout path once the code is on disk.
pub type CodeReadyHook = Box<dyn Fn(&Path) -> Result<()>>;

/// Declarative description of one external Git repository.
///
/// Created by [`crate::extension::GitIncludeExtension::include`], configured
/// by the caller's closure, and discarded once the reference has been
/// resolved and wired. The durable artifact is the on-disk checkout.
pub struct RepositoryReference {
    name: String,
    uri: String,
    branch: Option<String>,
    tag: Option<String>,
    commit: Option<String>,
    checkout_directory: Option<PathBuf>,
    auto_include: bool,
    include_builds: Vec<IncludeBuildSpec>,
    code_ready: Vec<CodeReadyHook>,
}

impl RepositoryReference {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: String::new(),
            branch: None,
            tag: None,
            commit: None,
            checkout_directory: None,
            auto_include: true,
            include_builds: Vec::new(),
            code_ready: Vec::new(),
        }
    }

    /// The unique name of this reference within the configuration pass.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the origin URI (any URI the system `git` client accepts).
    pub fn uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.uri = uri.into();
        self
    }

    /// Check out a branch.
    pub fn branch(&mut self, branch: impl Into<String>) -> &mut Self {
        self.branch = Some(branch.into());
        self
    }

    /// Check out a tag (detached).
    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tag = Some(tag.into());
        self
    }

    /// Check out a specific commit (detached).
    pub fn commit(&mut self, commit: impl Into<String>) -> &mut Self {
        self.commit = Some(commit.into());
        self
    }

    /// Override the checkout directory. Relative paths are resolved against
    /// the configured checkouts root.
    pub fn checkout_directory(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.checkout_directory = Some(dir.into());
        self
    }

    /// Control automatic inclusion of the checkout as a build (default
    /// `true`). Ignored once an explicit [`Self::include_build`] is given.
    pub fn auto_include(&mut self, auto_include: bool) -> &mut Self {
        self.auto_include = auto_include;
        self
    }

    /// Request an explicit included-build registration.
    ///
    /// Calling this switches `auto_include` off: the explicit specs take
    /// over from the default whole-checkout registration.
    pub fn include_build(&mut self, spec: IncludeBuildSpec) -> &mut Self {
        self.auto_include = false;
        self.include_builds.push(spec);
        self
    }

    /// Register a hook to run with the checkout path once the code is
    /// available on disk. Hook failures are reported but never roll back
    /// the checkout or its wiring.
    pub fn code_ready<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Path) -> Result<()> + 'static,
    {
        self.code_ready.push(Box::new(hook));
        self
    }

    pub fn uri_str(&self) -> &str {
        &self.uri
    }

    pub fn checkout_directory_override(&self) -> Option<&Path> {
        self.checkout_directory.as_deref()
    }

    pub fn auto_include_enabled(&self) -> bool {
        self.auto_include
    }

    pub fn include_build_specs(&self) -> &[IncludeBuildSpec] {
        &self.include_builds
    }

    pub(crate) fn code_ready_hooks(&self) -> &[CodeReadyHook] {
        &self.code_ready
    }

    /// The requested Git ref. Only meaningful after [`Self::validate`].
    pub fn git_ref(&self) -> GitRef {
        if let Some(branch) = &self.branch {
            GitRef::Branch(branch.clone())
        } else if let Some(tag) = &self.tag {
            GitRef::Tag(tag.clone())
        } else if let Some(commit) = &self.commit {
            GitRef::Commit(commit.clone())
        } else {
            GitRef::Default
        }
    }

    /// Validate the reference invariants: a non-empty URI, a well-formed
    /// URL when an absolute one is given, and at most one of branch, tag
    /// and commit.
    pub fn validate(&self) -> Result<()> {
        if self.uri.is_empty() {
            return Err(Error::Configuration {
                message: format!("repository reference '{}' has no URI", self.name),
                hint: Some("set uri(...) inside the include block".to_string()),
            });
        }
        // scp-like ("git@host:path") and plain filesystem URIs are passed
        // through to git untouched; only absolute URLs are parsed here.
        if self.uri.contains("://") {
            url::Url::parse(&self.uri)?;
        }
        let set = [&self.branch, &self.tag, &self.commit]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if set > 1 {
            return Err(Error::Configuration {
                message: format!(
                    "repository reference '{}' declares more than one of branch, tag and commit",
                    self.name
                ),
                hint: Some("declare at most one of branch, tag or commit".to_string()),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryReference")
            .field("name", &self.name)
            .field("uri", &self.uri)
            .field("ref", &self.git_ref())
            .field("checkout_directory", &self.checkout_directory)
            .field("auto_include", &self.auto_include)
            .field("include_builds", &self.include_builds)
            .field("code_ready_hooks", &self.code_ready.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let reference = RepositoryReference::new("testlib");
        assert_eq!(reference.name(), "testlib");
        assert_eq!(reference.git_ref(), GitRef::Default);
        assert!(reference.auto_include_enabled());
        assert!(reference.include_build_specs().is_empty());
        assert!(reference.checkout_directory_override().is_none());
    }

    #[test]
    fn test_ref_kinds() {
        let mut reference = RepositoryReference::new("testlib");
        reference.branch("main");
        assert_eq!(reference.git_ref(), GitRef::Branch("main".to_string()));

        let mut reference = RepositoryReference::new("testlib");
        reference.tag("v1.0.0");
        assert_eq!(reference.git_ref(), GitRef::Tag("v1.0.0".to_string()));

        let mut reference = RepositoryReference::new("testlib");
        reference.commit("abc123");
        assert_eq!(reference.git_ref(), GitRef::Commit("abc123".to_string()));
    }

    #[test]
    fn test_validate_requires_uri() {
        let reference = RepositoryReference::new("testlib");
        let err = reference.validate().unwrap_err();
        assert!(err.to_string().contains("has no URI"));
    }

    #[test]
    fn test_validate_rejects_conflicting_refs() {
        let mut reference = RepositoryReference::new("testlib");
        reference
            .uri("https://github.com/acme/testlib.git")
            .branch("main")
            .commit("abc123");
        let err = reference.validate().unwrap_err();
        assert!(err.to_string().contains("more than one of branch, tag and commit"));
    }

    #[test]
    fn test_validate_rejects_malformed_url() {
        let mut reference = RepositoryReference::new("testlib");
        reference.uri("https://");
        assert!(reference.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_scp_and_path_uris() {
        let mut reference = RepositoryReference::new("testlib");
        reference.uri("git@github.com:acme/testlib.git");
        assert!(reference.validate().is_ok());

        let mut reference = RepositoryReference::new("testlib");
        reference.uri("/srv/git/testlib");
        assert!(reference.validate().is_ok());
    }

    #[test]
    fn test_include_build_disables_auto_include() {
        let mut reference = RepositoryReference::new("testlib");
        reference.include_build(IncludeBuildSpec::at("subdir"));
        assert!(!reference.auto_include_enabled());
        assert_eq!(reference.include_build_specs().len(), 1);
    }

    #[test]
    fn test_include_build_spec_builder() {
        let spec = IncludeBuildSpec::root()
            .named("testlib-renamed")
            .substitute(DependencySubstitution::project("com.acme:somelib", ":sub"));
        assert_eq!(spec.directory, ".");
        assert_eq!(spec.name.as_deref(), Some("testlib-renamed"));
        assert_eq!(
            spec.substitutions[0].target,
            SubstitutionTarget::Project(":sub".to_string())
        );
    }

    #[test]
    fn test_git_ref_kind_and_value() {
        assert_eq!(GitRef::Default.kind(), "default");
        assert_eq!(GitRef::Default.value(), "");
        let branch = GitRef::Branch("main".to_string());
        assert_eq!(branch.kind(), "branch");
        assert_eq!(branch.value(), "main");
        assert_eq!(format!("{}", branch), "branch 'main'");
    }
}

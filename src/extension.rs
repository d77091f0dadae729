//! # Extension Surface
//!
//! [`GitIncludeExtension`] is the declarative entry point a host build tool
//! exposes during its configuration phase. Each [`GitIncludeExtension::include`]
//! call constructs a [`RepositoryReference`], validates it, then eagerly
//! resolves and wires it before returning. Eager, declaration-ordered
//! processing is a guarantee: a later reference's dependency substitutions
//! may target projects contributed by an earlier included build.
//!
//! All knobs that the original surface read from ambient build properties
//! (local repository overrides, auto-discovery directories) are explicit
//! fields of [`GitIncludeSettings`] here, passed in at construction.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::metadata::MetadataStore;
use crate::reference::RepositoryReference;
use crate::resolver::{CheckoutResolver, GitClient, HeadState, ResolvedCheckout};
use crate::wiring::{BuildRegistrar, BuildWiringAdapter};

/// Name of the default checkouts directory below the host build's working
/// directory.
pub const DEFAULT_CHECKOUTS_DIR: &str = "checkouts";

/// Default refresh interval: 24 hours.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Process-wide configuration of the extension, fixed for one
/// configuration pass.
#[derive(Debug, Clone)]
pub struct GitIncludeSettings {
    /// Directory all checkouts are placed under, unless a reference
    /// overrides it with an absolute path.
    pub checkouts_directory: PathBuf,
    /// How long a synchronized checkout stays fresh before the next
    /// resolve fetches again.
    pub refresh_interval: Duration,
    /// Per-reference local repository paths used instead of cloning.
    /// Development affordance for working against a local copy.
    pub local_overrides: HashMap<String, PathBuf>,
    /// Directories scanned for a subdirectory matching a reference name,
    /// used as a local override when exactly one matches.
    pub auto_repo_dirs: Vec<PathBuf>,
}

impl GitIncludeSettings {
    /// Settings with an explicit checkouts directory and defaults for
    /// everything else.
    pub fn new(checkouts_directory: impl Into<PathBuf>) -> Self {
        Self {
            checkouts_directory: checkouts_directory.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            local_overrides: HashMap::new(),
            auto_repo_dirs: Vec::new(),
        }
    }

    /// Settings rooted at `<working_dir>/checkouts`, the conventional
    /// location below a host build's working directory.
    pub fn for_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self::new(working_dir.into().join(DEFAULT_CHECKOUTS_DIR))
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Use a local repository for `name` instead of cloning it.
    pub fn local_override(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.local_overrides.insert(name.into(), path.into());
        self
    }

    /// Add a directory whose subdirectories may serve as local overrides.
    pub fn auto_repo_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.auto_repo_dirs.push(dir.into());
        self
    }
}

/// Builder-style collector of repository references, exposed once per
/// configuration pass.
pub struct GitIncludeExtension {
    resolver: CheckoutResolver,
    adapter: BuildWiringAdapter,
    metadata: MetadataStore,
    local_overrides: HashMap<String, PathBuf>,
    auto_repo_dirs: Vec<PathBuf>,
    included: BTreeSet<String>,
}

impl GitIncludeExtension {
    /// Extension backed by the system git client.
    pub fn new(settings: GitIncludeSettings, registrar: Box<dyn BuildRegistrar>) -> Result<Self> {
        let resolver = CheckoutResolver::new(
            settings.checkouts_directory.clone(),
            settings.refresh_interval,
        );
        Self::build(settings, registrar, resolver)
    }

    /// Extension with a custom [`GitClient`] implementation.
    pub fn with_client(
        settings: GitIncludeSettings,
        registrar: Box<dyn BuildRegistrar>,
        client: Box<dyn GitClient>,
    ) -> Result<Self> {
        let resolver = CheckoutResolver::with_client(
            settings.checkouts_directory.clone(),
            settings.refresh_interval,
            client,
        );
        Self::build(settings, registrar, resolver)
    }

    fn build(
        settings: GitIncludeSettings,
        registrar: Box<dyn BuildRegistrar>,
        resolver: CheckoutResolver,
    ) -> Result<Self> {
        let metadata = MetadataStore::load(&settings.checkouts_directory)?;
        Ok(Self {
            resolver,
            adapter: BuildWiringAdapter::new(registrar),
            metadata,
            local_overrides: settings.local_overrides,
            auto_repo_dirs: settings.auto_repo_dirs,
            included: BTreeSet::new(),
        })
    }

    /// Declare, resolve and wire one external repository.
    ///
    /// The reference is processed fully before `include` returns; failures
    /// abort the configuration pass without undoing references wired
    /// earlier.
    pub fn include<F>(&mut self, name: &str, configure: F) -> Result<ResolvedCheckout>
    where
        F: FnOnce(&mut RepositoryReference),
    {
        if self.included.contains(name) {
            return Err(Error::Configuration {
                message: format!("duplicate repository reference '{}'", name),
                hint: Some("each include(...) needs a distinct name".to_string()),
            });
        }
        let mut reference = RepositoryReference::new(name);
        configure(&mut reference);
        reference.validate()?;

        let resolved = match self.local_override_for(name)? {
            Some(path) => {
                log::info!(
                    "using local repository {} for '{}' instead of cloning",
                    path.display(),
                    name
                );
                ResolvedCheckout {
                    name: name.to_string(),
                    uri: reference.uri_str().to_string(),
                    local_path: path,
                    head: HeadState::Unmanaged,
                }
            }
            None => {
                let resolved = self.resolver.resolve(&reference, &mut self.metadata)?;
                self.metadata.save()?;
                resolved
            }
        };

        self.adapter.wire(&reference, &resolved)?;

        // only a fully wired reference claims its name; a failed include
        // leaves the name available for a corrected retry within the pass
        self.included.insert(name.to_string());

        for hook in reference.code_ready_hooks() {
            if let Err(e) = hook(&resolved.local_path) {
                log::warn!("code-ready hook for '{}' failed: {}", name, e);
            }
        }

        Ok(resolved)
    }

    fn local_override_for(&self, name: &str) -> Result<Option<PathBuf>> {
        if let Some(path) = self.local_overrides.get(name) {
            return Ok(Some(path.clone()));
        }
        let mut matches: Vec<PathBuf> = self
            .auto_repo_dirs
            .iter()
            .map(|dir| dir.join(name))
            .filter(|candidate| candidate.is_dir())
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            _ => Err(Error::Configuration {
                message: format!(
                    "more than one directory named '{}' exists in auto repository directories: {}",
                    name,
                    matches
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                hint: Some("use an explicit local override to disambiguate".to_string()),
            }),
        }
    }
}

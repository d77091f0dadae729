//! # Build Wiring
//!
//! Integrates a [`ResolvedCheckout`] into the host build graph. The host
//! side is abstracted behind the [`BuildRegistrar`] trait: the adapter
//! decides *what* to register (which directory, under which name, with
//! which dependency substitutions) and the registrar performs the
//! host-specific registration, including validating that the directory
//! actually contains a build definition it recognizes.
//!
//! Three modes, in precedence order:
//! 1. explicit include-build specs on the reference, registered in
//!    declared order;
//! 2. auto-include (the default): the whole checkout as one included
//!    build named after the reference;
//! 3. checkout-only: no registration at all. The checkout stays available
//!    as a plain filesystem path. This is a valid outcome, not an error.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::reference::{DependencySubstitution, RepositoryReference, SubstitutionTarget};
use crate::resolver::ResolvedCheckout;

/// One included-build registration handed to the host build tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedBuildRequest {
    /// Name of the included build in the host build graph.
    pub name: String,
    /// Directory containing the build definition.
    pub directory: PathBuf,
    /// Dependency substitution rules, in declared order. Later rules for
    /// the same module coordinate override earlier ones.
    pub substitutions: Vec<DependencySubstitution>,
}

impl IncludedBuildRequest {
    /// The effective substitution target for a module coordinate, honoring
    /// last-rule-wins ordering.
    pub fn substitution_for(&self, module: &str) -> Option<&SubstitutionTarget> {
        self.substitutions
            .iter()
            .rev()
            .find(|s| s.module == module)
            .map(|s| &s.target)
    }
}

/// The narrow capability the host build tool provides.
///
/// Implementations should return [`Error::Wiring`] when the request names
/// a directory without a valid build definition for the host tool.
pub trait BuildRegistrar: Send + Sync {
    fn register(&mut self, request: IncludedBuildRequest) -> Result<()>;
}

/// A [`BuildRegistrar`] that records requests in memory.
///
/// Reference implementation used by the tests, and usable by hosts for
/// dry-runs. The request log is shared, so it stays inspectable after the
/// registrar has been handed to an extension.
#[derive(Clone, Default)]
pub struct RecordingRegistrar {
    log: Arc<Mutex<Vec<IncludedBuildRequest>>>,
}

impl RecordingRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the request log, valid after the registrar is moved.
    pub fn log(&self) -> Arc<Mutex<Vec<IncludedBuildRequest>>> {
        self.log.clone()
    }

    /// Snapshot of all requests registered so far.
    pub fn registered(&self) -> Vec<IncludedBuildRequest> {
        self.log.lock().unwrap().clone()
    }
}

impl BuildRegistrar for RecordingRegistrar {
    fn register(&mut self, request: IncludedBuildRequest) -> Result<()> {
        self.log.lock().unwrap().push(request);
        Ok(())
    }
}

/// Translates a resolved checkout into registrar calls.
pub struct BuildWiringAdapter {
    registrar: Box<dyn BuildRegistrar>,
}

impl BuildWiringAdapter {
    pub fn new(registrar: Box<dyn BuildRegistrar>) -> Self {
        Self { registrar }
    }

    /// Register the included builds requested by `reference` for
    /// `checkout`, if any.
    pub fn wire(
        &mut self,
        reference: &RepositoryReference,
        checkout: &ResolvedCheckout,
    ) -> Result<()> {
        let specs = reference.include_build_specs();
        if specs.is_empty() {
            if reference.auto_include_enabled() {
                log::info!("including build '{}' from {}", reference.name(), checkout.local_path.display());
                return self.registrar.register(IncludedBuildRequest {
                    name: reference.name().to_string(),
                    directory: checkout.local_path.clone(),
                    substitutions: Vec::new(),
                });
            }
            log::debug!(
                "'{}' is checkout-only, no build registered",
                reference.name()
            );
            return Ok(());
        }
        for spec in specs {
            let directory = if spec.directory == "." {
                checkout.local_path.clone()
            } else {
                checkout.local_path.join(&spec.directory)
            };
            if !directory.is_dir() {
                return Err(Error::Wiring {
                    name: reference.name().to_string(),
                    path: directory,
                    message: "included build directory does not exist".to_string(),
                });
            }
            let name = spec
                .name
                .clone()
                .or_else(|| {
                    if spec.directory == "." {
                        Some(reference.name().to_string())
                    } else {
                        directory
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                    }
                })
                .unwrap_or_else(|| reference.name().to_string());
            log::info!("including build '{}' from {}", name, directory.display());
            self.registrar.register(IncludedBuildRequest {
                name,
                directory,
                substitutions: spec.substitutions.clone(),
            })?;
        }
        Ok(())
    }
}

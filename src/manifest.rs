//! # Declarative Manifest
//!
//! A YAML front-end over the programmatic surface. A manifest declares the
//! same information as [`crate::extension::GitIncludeExtension::include`]
//! calls, and applying it drives those calls in file order, so every
//! invariant (name uniqueness, single ref kind, eager ordered processing)
//! holds identically. Post-checkout hooks are programmatic-only.
//!
//! ```yaml
//! repositories:
//!   - name: testlib
//!     uri: https://github.com/acme/testlib.git
//!     branch: testlib-0
//!   - name: somelib
//!     uri: https://github.com/acme/somelib.git
//!     tag: v1.4.0
//!     include-builds:
//!       - directory: libs/core
//!         name: somelib-core
//!         substitutions:
//!           - module: com.acme.somelib:somelib2
//!             project: ":"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extension::GitIncludeExtension;
use crate::reference::{
    DependencySubstitution, IncludeBuildSpec, RepositoryReference, SubstitutionTarget,
};
use crate::resolver::ResolvedCheckout;

/// A full manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// References in declaration order.
    pub repositories: Vec<ManifestEntry>,
}

/// One repository reference in manifest form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ManifestEntry {
    /// Unique reference name.
    pub name: String,
    /// Origin URI.
    pub uri: String,
    /// Branch to check out. At most one of `branch`, `tag` and `commit`.
    #[serde(default)]
    pub branch: Option<String>,
    /// Tag to check out (detached).
    #[serde(default)]
    pub tag: Option<String>,
    /// Commit to check out (detached).
    #[serde(default)]
    pub commit: Option<String>,
    /// Checkout directory override.
    #[serde(default)]
    pub checkout_directory: Option<PathBuf>,
    /// Automatic inclusion of the checkout as a build. Ignored when
    /// `include-builds` entries are given.
    #[serde(default)]
    pub auto_include: Option<bool>,
    /// Explicit included-build registrations.
    #[serde(default)]
    pub include_builds: Vec<ManifestIncludeBuild>,
}

/// An included-build registration in manifest form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ManifestIncludeBuild {
    /// Directory relative to the checkout root.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Name override for the included build.
    #[serde(default)]
    pub name: Option<String>,
    /// Substitution rules, in declared order.
    #[serde(default)]
    pub substitutions: Vec<ManifestSubstitution>,
}

fn default_directory() -> String {
    ".".to_string()
}

/// A substitution rule in manifest form. Exactly one of `project` and
/// `with-module` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ManifestSubstitution {
    /// The module coordinate being replaced.
    pub module: String,
    /// Project path of the included build to substitute with.
    #[serde(default)]
    pub project: Option<String>,
    /// Module coordinate to substitute with.
    #[serde(default)]
    pub with_module: Option<String>,
}

impl ManifestSubstitution {
    fn to_rule(&self) -> Result<DependencySubstitution> {
        match (&self.project, &self.with_module) {
            (Some(project), None) => Ok(DependencySubstitution {
                module: self.module.clone(),
                target: SubstitutionTarget::Project(project.clone()),
            }),
            (None, Some(module)) => Ok(DependencySubstitution {
                module: self.module.clone(),
                target: SubstitutionTarget::Module(module.clone()),
            }),
            _ => Err(Error::Configuration {
                message: format!(
                    "substitution for '{}' must set exactly one of 'project' and 'with-module'",
                    self.module
                ),
                hint: None,
            }),
        }
    }
}

impl ManifestEntry {
    /// Convert the manifest's included-build entries into validated specs.
    ///
    /// This happens before the entry is handed to the extension, so an
    /// invalid substitution is rejected before any clone or fetch.
    fn include_specs(&self) -> Result<Vec<IncludeBuildSpec>> {
        let mut specs = Vec::with_capacity(self.include_builds.len());
        for include in &self.include_builds {
            let mut spec = IncludeBuildSpec::at(&include.directory);
            if let Some(name) = &include.name {
                spec = spec.named(name);
            }
            for substitution in &include.substitutions {
                spec = spec.substitute(substitution.to_rule()?);
            }
            specs.push(spec);
        }
        Ok(specs)
    }

    fn apply_to(&self, reference: &mut RepositoryReference, specs: Vec<IncludeBuildSpec>) {
        reference.uri(&self.uri);
        if let Some(branch) = &self.branch {
            reference.branch(branch);
        }
        if let Some(tag) = &self.tag {
            reference.tag(tag);
        }
        if let Some(commit) = &self.commit {
            reference.commit(commit);
        }
        if let Some(dir) = &self.checkout_directory {
            reference.checkout_directory(dir);
        }
        if let Some(auto_include) = self.auto_include {
            reference.auto_include(auto_include);
        }
        for spec in specs {
            reference.include_build(spec);
        }
    }
}

/// Parse a manifest from YAML.
pub fn parse(yaml: &str) -> Result<Manifest> {
    serde_yaml::from_str(yaml).map_err(|e| Error::Configuration {
        message: format!("invalid manifest: {}", e),
        hint: Some("see the manifest module documentation for the expected schema".to_string()),
    })
}

/// Load a manifest from a file.
pub fn load(path: &Path) -> Result<Manifest> {
    parse(&fs::read_to_string(path)?)
}

/// Apply every entry of a manifest through the extension, in file order.
pub fn apply(
    manifest: &Manifest,
    extension: &mut GitIncludeExtension,
) -> Result<Vec<ResolvedCheckout>> {
    let mut resolved = Vec::with_capacity(manifest.repositories.len());
    for entry in &manifest.repositories {
        // reject invalid entries before the extension touches the network
        let specs = entry.include_specs()?;
        let checkout = extension.include(&entry.name, |reference| {
            entry.apply_to(reference, specs);
        })?;
        resolved.push(checkout);
    }
    Ok(resolved)
}

//! # include-git
//!
//! An embeddable library that lets a host build tool declare dependencies
//! on external Git repositories, synchronizes local checkouts of them at
//! configuration time, and wires each checkout into the host build graph
//! as an included (composable) build with optional dependency
//! substitutions.
//!
//! ## Quick Example
//!
//! ```no_run
//! use include_git::extension::{GitIncludeExtension, GitIncludeSettings};
//! use include_git::reference::{DependencySubstitution, IncludeBuildSpec};
//! use include_git::wiring::RecordingRegistrar;
//!
//! let settings = GitIncludeSettings::for_working_dir(".");
//! let registrar = RecordingRegistrar::new();
//! let mut git = GitIncludeExtension::new(settings, Box::new(registrar)).unwrap();
//!
//! git.include("testlib", |repo| {
//!     repo.uri("https://github.com/acme/testlib.git").branch("testlib-0");
//! })
//! .unwrap();
//!
//! git.include("somelib", |repo| {
//!     repo.uri("https://github.com/acme/somelib.git")
//!         .tag("v1.4.0")
//!         .include_build(
//!             IncludeBuildSpec::root()
//!                 .substitute(DependencySubstitution::project("com.acme:somelib", ":")),
//!         );
//! })
//! .unwrap();
//! ```
//!
//! ## Core Concepts
//!
//! - **References (`reference`)**: value objects describing one external
//!   repository: URI, desired ref (branch, tag, commit or default),
//!   checkout location, and requested build wiring.
//! - **Resolution (`resolver`, `git`, `metadata`)**: brings the on-disk
//!   checkout into conformance with the declared ref, delegating Git work
//!   to the system `git` binary and skipping fetches for checkouts still
//!   within the refresh interval.
//! - **Wiring (`wiring`)**: registers resolved checkouts as included
//!   builds through the narrow [`wiring::BuildRegistrar`] capability a
//!   host build tool implements.
//! - **Surface (`extension`, `manifest`)**: the builder-style collector
//!   invoked during the host's configuration phase, plus a YAML manifest
//!   front-end over it.
//!
//! ## Execution Flow
//!
//! Each `include` call runs to completion before the next begins:
//!
//! 1. validate the reference (duplicate name, single ref kind);
//! 2. honor local overrides, else resolve the checkout (clone, update or
//!    no-op);
//! 3. register the included builds with the host;
//! 4. fire `code_ready` hooks with the checkout path.
//!
//! Failures abort the configuration pass as errors; references wired
//! earlier stay wired, and partial checkout state is preserved on disk for
//! diagnosis.

pub mod error;
pub mod extension;
pub mod git;
pub mod manifest;
pub mod metadata;
pub mod reference;
pub mod resolver;
pub mod wiring;

pub use error::{Error, Result};
pub use extension::{GitIncludeExtension, GitIncludeSettings};
pub use reference::{DependencySubstitution, GitRef, IncludeBuildSpec, RepositoryReference};
pub use resolver::{CheckoutResolver, GitClient, HeadState, ResolvedCheckout, SystemGitClient};
pub use wiring::{BuildRegistrar, BuildWiringAdapter, IncludedBuildRequest, RecordingRegistrar};

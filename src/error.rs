//! # Error Handling
//!
//! Centralized error type for the crate, built with `thiserror`. The
//! taxonomy mirrors the phases of a configuration pass:
//!
//! - **`Configuration`**: the declarative surface rejected a reference
//!   (duplicate name, conflicting ref kinds, ambiguous local override,
//!   corrupt checkout metadata). Raised before any network activity.
//! - **`Checkout`**: the resolver could not bring a checkout into
//!   conformance (unreachable remote, unknown ref, directory that is not a
//!   repository for the declared URI). Fatal for the pass; references wired
//!   earlier stay wired, and partial local state is preserved for diagnosis.
//! - **`Wiring`**: an included-build target was invalid, surfaced with the
//!   reference name and the offending path.
//! - **`GitCommand`**: a `git` subprocess failed; carries the command line
//!   and captured stderr.
//!
//! Variants carry an optional `hint` with remediation advice where one is
//! known. No retries are attempted anywhere; transient failures propagate to
//! the user, who re-runs the build.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for include-git operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A repository reference (or the manifest declaring it) is invalid.
    ///
    /// Always raised before any clone or fetch happens.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Configuration {
        message: String,
        /// Optional hint for how to fix the declaration
        hint: Option<String>,
    },

    /// Synchronizing a checkout failed.
    ///
    /// Includes the reference name, the repository URI, the underlying
    /// message, and an optional hint for resolution.
    #[error("Checkout error for '{name}' ({uri}): {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Checkout {
        name: String,
        uri: String,
        message: String,
        /// Optional hint for how to resolve the checkout issue
        hint: Option<String>,
    },

    /// Registering an included build failed.
    #[error("Wiring error for '{name}': {message} ({})", path.display())]
    Wiring {
        name: String,
        path: PathBuf,
        message: String,
    },

    /// A git subprocess exited unsuccessfully.
    #[error("git {command} failed: {stderr}")]
    GitCommand { command: String, stderr: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

//! # Checkout Metadata
//!
//! A small per-checkout-root store recording, for every reference, which
//! URI and ref were last checked out and when. It backs two behaviors:
//!
//! - **Refresh interval**: a resolve whose reference is unchanged and whose
//!   last update is younger than the configured interval skips the network
//!   fetch entirely.
//! - **Ref-change detection**: a reference whose ref kind or value differs
//!   from the recorded one always re-fetches and re-checks-out, bypassing
//!   the interval.
//!
//! The store lives in `checkouts.yaml` at the checkouts root. A missing
//! file means an empty store; a corrupt file is a configuration error
//! (deleting the file resets the store without touching any checkout).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reference::GitRef;

/// File name of the store within the checkouts root.
pub const FILE_NAME: &str = "checkouts.yaml";

/// What was checked out for one reference, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    /// Origin URI the checkout was synchronized against.
    pub uri: String,
    /// Ref kind: `default`, `branch`, `tag` or `commit`.
    pub ref_kind: String,
    /// Declared ref value; empty for the default branch.
    pub ref_value: String,
    /// Last synchronization time, milliseconds since the Unix epoch.
    pub last_update: u64,
}

impl CheckoutMetadata {
    /// Metadata for a reference being resolved right now.
    pub fn now(uri: &str, git_ref: &GitRef) -> Self {
        Self {
            uri: uri.to_string(),
            ref_kind: git_ref.kind().to_string(),
            ref_value: git_ref.value().to_string(),
            last_update: now_millis(),
        }
    }

    /// Whether `other` requests the same URI and ref as this entry.
    pub fn same_target(&self, other: &CheckoutMetadata) -> bool {
        self.uri == other.uri && self.ref_kind == other.ref_kind && self.ref_value == other.ref_value
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// On-disk store of [`CheckoutMetadata`], keyed by reference name.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    entries: BTreeMap<String, CheckoutMetadata>,
    dirty: bool,
}

impl MetadataStore {
    /// Load the store for a checkouts root. A missing file yields an empty
    /// store.
    pub fn load(checkouts_root: &Path) -> Result<Self> {
        let path = checkouts_root.join(FILE_NAME);
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_yaml::from_str(&raw).map_err(|e| Error::Configuration {
                message: format!("corrupt checkout metadata in {}: {}", path.display(), e),
                hint: Some("delete the file to reset the store; checkouts are not affected".to_string()),
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    /// The recorded state for a reference, if any.
    pub fn get(&self, name: &str) -> Option<&CheckoutMetadata> {
        self.entries.get(name)
    }

    /// Record the state just synchronized for a reference.
    pub fn record(&mut self, name: &str, metadata: CheckoutMetadata) {
        self.entries.insert(name.to_string(), metadata);
        self.dirty = true;
    }

    /// Whether the recorded entry makes `current` fresh: same target, and
    /// updated within `interval`.
    pub fn is_fresh(&self, name: &str, current: &CheckoutMetadata, interval: Duration) -> bool {
        match self.entries.get(name) {
            Some(old) => {
                old.same_target(current)
                    && current.last_update.saturating_sub(old.last_update)
                        < interval.as_millis() as u64
            }
            None => false,
        }
    }

    /// Write the store back if it changed. A clean store writes nothing.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(&self.entries)?)?;
        self.dirty = false;
        Ok(())
    }
}

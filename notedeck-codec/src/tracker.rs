//! Asset lifecycle tracking.
//!
//! The tracker keeps the set of asset URLs a note referenced when it was
//! loaded (plus anything uploaded since). On save the live document is
//! scanned again and every baseline URL it no longer references is deleted
//! through the store. "Still referenced" is always derived from the document
//! in memory; storage is never scanned.

use std::collections::BTreeSet;

use crate::store::AssetStore;
use crate::types::{Block, Document};

/// Every non-empty asset URL referenced by `doc`, including nested children.
pub fn referenced_assets(doc: &Document) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    collect(&doc.blocks, &mut urls);
    urls
}

fn collect(blocks: &[Block], urls: &mut BTreeSet<String>) {
    for block in blocks {
        if let Some(url) = block.kind.url().filter(|u| !u.is_empty()) {
            urls.insert(url.to_string());
        }
        collect(&block.children, urls);
    }
}

/// Outcome of reconciling storage with a saved document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// URLs deleted successfully.
    pub deleted: Vec<String>,
    /// URLs whose deletion failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Baseline of asset URLs for the open note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetTracker {
    baseline: BTreeSet<String>,
}

impl AssetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline taken from a freshly loaded document.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            baseline: referenced_assets(doc),
        }
    }

    pub fn baseline(&self) -> &BTreeSet<String> {
        &self.baseline
    }

    /// Track an asset uploaded mid-edit, so removing it again before the next
    /// save still gets it cleaned up.
    pub fn record_upload(&mut self, url: impl Into<String>) {
        self.baseline.insert(url.into());
    }

    /// Baseline URLs `doc` no longer references.
    pub fn orphaned(&self, doc: &Document) -> BTreeSet<String> {
        let current = referenced_assets(doc);
        self.baseline.difference(&current).cloned().collect()
    }

    /// Delete orphaned assets and move the baseline to `doc`'s references.
    ///
    /// Deletion is best-effort: a failure is logged and recorded, and the
    /// remaining URLs are still processed. The baseline moves forward either
    /// way.
    pub fn reconcile<S: AssetStore + ?Sized>(&mut self, doc: &Document, store: &mut S) -> Reconciliation {
        let current = referenced_assets(doc);
        let mut outcome = Reconciliation::default();

        for url in self.baseline.difference(&current) {
            match store.delete_asset(url) {
                Ok(()) => {
                    tracing::debug!(url = %url, "deleted orphaned asset");
                    outcome.deleted.push(url.clone());
                }
                Err(error) => {
                    tracing::warn!(url = %url, error = %error, "failed to delete orphaned asset");
                    outcome.failed.push((url.clone(), error.to_string()));
                }
            }
        }

        self.baseline = current;
        outcome
    }

    /// Forget everything; used when the whole note is deleted.
    pub fn reset(&mut self) {
        self.baseline.clear();
    }
}

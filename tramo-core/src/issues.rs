//! Typed sink for non-fatal problems discovered while enriching the graph.
//!
//! Issues never abort a build; they are collected here and can be exported
//! as a JSON report afterwards.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::Error;

/// A single data-import problem, keyed by the graph element it concerns.
///
/// Edge and vertex identifiers are stored as raw indices so that reports stay
/// meaningful after the graph itself has been dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum DataImportIssue {
    /// An edge received a synthetic two-point profile instead of sampled data.
    ElevationFlattened { edge: usize },
    /// Elevation propagation gave up growing past this vertex.
    ElevationPropagationLimit { vertex: usize },
    /// A problem concerning the build as a whole.
    Graphwide { message: String },
}

/// Thread-safe, append-only store of [`DataImportIssue`]s.
#[derive(Debug, Default)]
pub struct IssueStore {
    issues: Mutex<Vec<DataImportIssue>>,
}

impl IssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, issue: DataImportIssue) {
        log::debug!("data import issue: {issue:?}");
        self.lock().push(issue);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of all issues recorded so far.
    pub fn issues(&self) -> Vec<DataImportIssue> {
        self.lock().clone()
    }

    /// Serialize the collected issues into a JSON report.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(&*self.lock())
            .map_err(|e| Error::InvalidData(format!("failed to serialize issue report: {e}")))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DataImportIssue>> {
        // A poisoned lock only means another thread panicked mid-push;
        // the vector itself is still usable.
        self.issues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

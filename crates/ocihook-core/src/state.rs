//! Invocation state handed to each hook on stdin.
//!
//! The JSON shape is a compatibility surface: hook authors parse it, so field
//! names and their order must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Stage;

/// Runtime-spec version reported to hooks.
pub const OCI_VERSION: &str = "1.0.2";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationState {
    #[serde(rename = "ociVersion")]
    pub oci_version: String,
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub bundle: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Build the state for one hook invocation.
///
/// `pid` is dropped for stages that have no live process to report.
pub fn build_state(stage: Stage, id: &str, bundle: &str, pid: Option<u32>) -> InvocationState {
    InvocationState {
        oci_version: OCI_VERSION.to_string(),
        id: id.to_string(),
        status: stage.status().to_string(),
        pid: pid.filter(|_| stage.reports_pid()),
        bundle: bundle.to_string(),
        annotations: BTreeMap::new(),
    }
}

impl InvocationState {
    pub fn with_annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Serialize to the bytes written on the hook's stdin.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

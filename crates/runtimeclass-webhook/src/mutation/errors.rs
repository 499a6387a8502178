use std::time::Duration;

use thiserror::Error;

use super::workload::WorkloadKind;

#[derive(Debug, Error)]
#[error("cannot decode {kind} object: {source}")]
pub struct DecodeError {
    pub kind: WorkloadKind,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("namespace {0} not found")]
    NotFound(String),

    #[error("cannot get namespace {namespace}: {source}")]
    Kube {
        namespace: String,
        #[source]
        source: kube::Error,
    },

    #[error("cannot get namespace {0}: not connected to Kubernetes")]
    Unavailable(String),

    #[error("lookup of namespace {namespace} timed out after {timeout:?}")]
    Timeout { namespace: String, timeout: Duration },
}

use std::fmt;

use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
    batch::v1::{CronJob, Job},
    core::v1::{Pod, PodSpec},
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::Metadata;
use serde::de::DeserializeOwned;

use super::errors::DecodeError;

const POD_TEMPLATE_PATCH_PATH: &str = "/spec/template/spec/runtimeClassName";

/// The workloads whose pod spec carries a runtime class.
///
/// The discriminant is the index of the kind inside of `WORKLOADS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pod = 0,
    Deployment = 1,
    ReplicaSet = 2,
    StatefulSet = 3,
    DaemonSet = 4,
    Job = 5,
    CronJob = 6,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkloadKind::Pod => write!(f, "Pod"),
            WorkloadKind::Deployment => write!(f, "Deployment"),
            WorkloadKind::ReplicaSet => write!(f, "ReplicaSet"),
            WorkloadKind::StatefulSet => write!(f, "StatefulSet"),
            WorkloadKind::DaemonSet => write!(f, "DaemonSet"),
            WorkloadKind::Job => write!(f, "Job"),
            WorkloadKind::CronJob => write!(f, "CronJob"),
        }
    }
}

impl WorkloadKind {
    /// Find the kind served under the given plural resource name
    /// (`pods`, `deployments`,...). Returns `None` for resources this
    /// webhook doesn't know about.
    pub fn from_resource(resource: &str) -> Option<WorkloadKind> {
        WORKLOADS
            .iter()
            .find(|workload| workload.resource == resource)
            .map(|workload| workload.kind)
    }

    /// JSON Pointer of the runtime class field for this kind
    pub fn patch_path(self) -> &'static str {
        self.workload().patch_path
    }

    fn workload(self) -> &'static Workload {
        &WORKLOADS[self as usize]
    }
}

type Decoded = (ObjectMeta, Option<String>);

struct Workload {
    kind: WorkloadKind,
    resource: &'static str,
    patch_path: &'static str,
    decode: fn(&[u8]) -> serde_json::Result<Decoded>,
}

static WORKLOADS: [Workload; 7] = [
    Workload {
        kind: WorkloadKind::Pod,
        resource: "pods",
        patch_path: "/spec/runtimeClassName",
        decode: |raw| decode::<Pod, _>(raw, |pod| pod.spec.as_ref()),
    },
    Workload {
        kind: WorkloadKind::Deployment,
        resource: "deployments",
        patch_path: POD_TEMPLATE_PATCH_PATH,
        decode: |raw| {
            decode::<Deployment, _>(raw, |deployment| {
                deployment.spec.as_ref()?.template.spec.as_ref()
            })
        },
    },
    Workload {
        kind: WorkloadKind::ReplicaSet,
        resource: "replicasets",
        patch_path: POD_TEMPLATE_PATCH_PATH,
        decode: |raw| {
            decode::<ReplicaSet, _>(raw, |replica_set| {
                replica_set.spec.as_ref()?.template.as_ref()?.spec.as_ref()
            })
        },
    },
    Workload {
        kind: WorkloadKind::StatefulSet,
        resource: "statefulsets",
        patch_path: POD_TEMPLATE_PATCH_PATH,
        decode: |raw| {
            decode::<StatefulSet, _>(raw, |stateful_set| {
                stateful_set.spec.as_ref()?.template.spec.as_ref()
            })
        },
    },
    Workload {
        kind: WorkloadKind::DaemonSet,
        resource: "daemonsets",
        patch_path: POD_TEMPLATE_PATCH_PATH,
        decode: |raw| {
            decode::<DaemonSet, _>(raw, |daemon_set| {
                daemon_set.spec.as_ref()?.template.spec.as_ref()
            })
        },
    },
    Workload {
        kind: WorkloadKind::Job,
        resource: "jobs",
        patch_path: POD_TEMPLATE_PATCH_PATH,
        decode: |raw| decode::<Job, _>(raw, |job| job.spec.as_ref()?.template.spec.as_ref()),
    },
    Workload {
        kind: WorkloadKind::CronJob,
        resource: "cronjobs",
        patch_path: "/jobTemplate/spec/template/spec/runtimeClassName",
        decode: |raw| {
            decode::<CronJob, _>(raw, |cron_job| {
                cron_job
                    .spec
                    .as_ref()?
                    .job_template
                    .spec
                    .as_ref()?
                    .template
                    .spec
                    .as_ref()
            })
        },
    },
];

fn decode<K, F>(raw: &[u8], pod_spec: F) -> serde_json::Result<Decoded>
where
    K: DeserializeOwned + Metadata<Ty = ObjectMeta>,
    F: Fn(&K) -> Option<&PodSpec>,
{
    let object: K = serde_json::from_slice(raw)?;
    let runtime_class_name = pod_spec(&object).and_then(|spec| spec.runtime_class_name.clone());

    Ok((object.metadata().clone(), runtime_class_name))
}

/// What the decision engine needs to know about the submitted workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeData {
    /// `None` when the object doesn't set a runtime class. An empty string
    /// is a legit value and counts as set.
    pub runtime_class_name: Option<String>,
    /// Empty when the object doesn't carry its namespace
    pub namespace: String,
    pub name: String,
    pub patch_path: &'static str,
}

/// Decode `raw` as an object of the given kind and extract the runtime
/// class data out of its pod spec.
pub fn extract(kind: WorkloadKind, raw: &[u8]) -> Result<ScopeData, DecodeError> {
    let workload = kind.workload();
    let (metadata, runtime_class_name) =
        (workload.decode)(raw).map_err(|source| DecodeError { kind, source })?;

    Ok(ScopeData {
        runtime_class_name,
        namespace: metadata.namespace.unwrap_or_default(),
        name: metadata
            .name
            .or(metadata.generate_name)
            .unwrap_or_default(),
        patch_path: workload.patch_path,
    })
}

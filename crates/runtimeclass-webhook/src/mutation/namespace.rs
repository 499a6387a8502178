use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::Api;
use tracing::debug;

use super::errors::LookupError;

/// Label holding the default runtime class of the namespace
pub const DEFAULT_RUNTIME_CLASS_LABEL: &str = "runtimeclassname-default";

/// Read access to the namespaces of the cluster.
#[cfg_attr(test, mockall::automock)]
pub trait NamespaceLookup: Send + Sync {
    /// Return the labels of the given namespace
    fn namespace_labels(
        &self,
        namespace: &str,
    ) -> BoxFuture<'static, Result<BTreeMap<String, String>, LookupError>>;
}

/// Fetch the namespaces from the Kubernetes API server.
#[derive(Clone)]
pub struct KubeNamespaceLookup {
    client: kube::Client,
}

impl KubeNamespaceLookup {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

impl NamespaceLookup for KubeNamespaceLookup {
    fn namespace_labels(
        &self,
        namespace: &str,
    ) -> BoxFuture<'static, Result<BTreeMap<String, String>, LookupError>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = namespace.to_owned();

        async move {
            match api.get_opt(&namespace).await {
                Ok(Some(ns)) => Ok(ns.metadata.labels.unwrap_or_default()),
                Ok(None) => Err(LookupError::NotFound(namespace)),
                Err(source) => Err(LookupError::Kube { namespace, source }),
            }
        }
        .boxed()
    }
}

/// Used when no connection to Kubernetes could be established at startup.
/// Every lookup fails.
#[derive(Clone, Default)]
pub struct UnavailableNamespaceLookup;

impl NamespaceLookup for UnavailableNamespaceLookup {
    fn namespace_labels(
        &self,
        namespace: &str,
    ) -> BoxFuture<'static, Result<BTreeMap<String, String>, LookupError>> {
        future::ready(Err(LookupError::Unavailable(namespace.to_owned()))).boxed()
    }
}

/// The default runtime class declared by a namespace, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceDefault {
    pub runtime_class_name: Option<String>,
}

impl NamespaceDefault {
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        NamespaceDefault {
            runtime_class_name: labels.get(DEFAULT_RUNTIME_CLASS_LABEL).cloned(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.runtime_class_name.is_some()
    }
}

/// Resolve the default runtime class of a namespace.
///
/// Every call goes to the cluster, nothing is cached.
#[derive(Clone)]
pub struct NamespaceDefaultResolver {
    lookup: Arc<dyn NamespaceLookup>,
    timeout: Duration,
}

impl NamespaceDefaultResolver {
    pub fn new(lookup: Arc<dyn NamespaceLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    pub async fn resolve_default(&self, namespace: &str) -> Result<NamespaceDefault, LookupError> {
        let labels = tokio::time::timeout(self.timeout, self.lookup.namespace_labels(namespace))
            .await
            .map_err(|_| LookupError::Timeout {
                namespace: namespace.to_owned(),
                timeout: self.timeout,
            })??;

        let namespace_default = NamespaceDefault::from_labels(&labels);
        debug!(
            namespace,
            default = ?namespace_default.runtime_class_name,
            "namespace default runtime class resolved"
        );

        Ok(namespace_default)
    }
}

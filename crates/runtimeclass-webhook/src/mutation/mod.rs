pub mod errors;
pub mod namespace;
pub mod verdict;
pub mod workload;

use tracing::{debug, info, warn};

use namespace::NamespaceDefaultResolver;
use verdict::{PatchOperation, Verdict};
use workload::WorkloadKind;

/// Decide whether a workload must be patched with the default runtime class
/// of its namespace.
///
/// The engine holds no per-request state: it can be shared between all the
/// in-flight requests.
#[derive(Clone)]
pub struct PatchDecisionEngine {
    resolver: NamespaceDefaultResolver,
}

impl PatchDecisionEngine {
    pub fn new(resolver: NamespaceDefaultResolver) -> Self {
        Self { resolver }
    }

    /// Compute the verdict for `raw`, an object served under `resource`.
    ///
    /// `request_namespace` is used when the object doesn't carry its own
    /// namespace, which is common on creation.
    ///
    /// Failures never deny the request: they are reported through the
    /// message of an allowing verdict without patches.
    pub async fn decide(
        &self,
        resource: &str,
        raw: &[u8],
        request_namespace: Option<&str>,
    ) -> Verdict {
        let kind = match WorkloadKind::from_resource(resource) {
            Some(kind) => kind,
            None => {
                debug!(resource, "resource not handled");
                return Verdict::allow();
            }
        };

        let scope = match workload::extract(kind, raw) {
            Ok(scope) => scope,
            Err(error) => {
                warn!(error = %error, "cannot decode object, allowing it unchanged");
                return Verdict::allow_with_message(error.to_string());
            }
        };

        let namespace = if scope.namespace.is_empty() {
            request_namespace.unwrap_or_default()
        } else {
            scope.namespace.as_str()
        };
        if namespace.is_empty() {
            debug!(kind = %kind, name = scope.name.as_str(), "object without namespace");
            return Verdict::allow();
        }

        let namespace_default = match self.resolver.resolve_default(namespace).await {
            Ok(namespace_default) => namespace_default,
            Err(error) => {
                warn!(
                    error = %error,
                    namespace,
                    "cannot resolve the default runtime class, allowing object unchanged"
                );
                return Verdict::allow_with_message(error.to_string());
            }
        };

        match (scope.runtime_class_name, namespace_default.runtime_class_name) {
            (None, Some(default)) => {
                info!(
                    kind = %kind,
                    namespace,
                    name = scope.name.as_str(),
                    runtime_class = default.as_str(),
                    "object lacks runtimeClassName, injecting namespace default"
                );
                Verdict::patch(PatchOperation::add(scope.patch_path, default))
            }
            _ => Verdict::allow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::LookupError;
    use futures::future::{self, FutureExt};
    use namespace::{MockNamespaceLookup, DEFAULT_RUNTIME_CLASS_LABEL};
    use rstest::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(lookup: MockNamespaceLookup) -> PatchDecisionEngine {
        PatchDecisionEngine::new(NamespaceDefaultResolver::new(
            Arc::new(lookup),
            Duration::from_secs(2),
        ))
    }

    /// A lookup that serves the given labels, expecting exactly `times` calls
    fn lookup_returning(labels: &[(&str, &str)], times: usize) -> MockNamespaceLookup {
        let labels: BTreeMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut lookup = MockNamespaceLookup::new();
        lookup
            .expect_namespace_labels()
            .times(times)
            .returning(move |_| future::ready(Ok(labels.clone())).boxed());
        lookup
    }

    fn lookup_with_default(default: &str) -> MockNamespaceLookup {
        lookup_returning(&[(DEFAULT_RUNTIME_CLASS_LABEL, default)], 1)
    }

    fn pod_spec(runtime_class_name: Option<&str>) -> serde_json::Value {
        let mut spec = json!({"containers": [{"name": "app", "image": "busybox"}]});
        if let Some(runtime_class_name) = runtime_class_name {
            spec["runtimeClassName"] = json!(runtime_class_name);
        }
        spec
    }

    fn object(resource: &str, runtime_class_name: Option<&str>) -> Vec<u8> {
        let metadata = json!({"name": "web", "namespace": "team-a"});
        let template = json!({"spec": pod_spec(runtime_class_name)});
        let object = match resource {
            "pods" => json!({"metadata": metadata, "spec": pod_spec(runtime_class_name)}),
            "cronjobs" => json!({
                "metadata": metadata,
                "spec": {"schedule": "@hourly", "jobTemplate": {"spec": {"template": template}}},
            }),
            "jobs" => json!({"metadata": metadata, "spec": {"template": template}}),
            _ => json!({
                "metadata": metadata,
                "spec": {"selector": {}, "serviceName": "web", "template": template},
            }),
        };
        serde_json::to_vec(&object).unwrap()
    }

    #[rstest]
    #[case("pods", "gvisor", "/spec/runtimeClassName")]
    #[case("deployments", "kata", "/spec/template/spec/runtimeClassName")]
    #[case("replicasets", "kata", "/spec/template/spec/runtimeClassName")]
    #[case("statefulsets", "kata", "/spec/template/spec/runtimeClassName")]
    #[case("daemonsets", "kata", "/spec/template/spec/runtimeClassName")]
    #[case("jobs", "kata", "/spec/template/spec/runtimeClassName")]
    #[case("cronjobs", "kata", "/jobTemplate/spec/template/spec/runtimeClassName")]
    #[tokio::test]
    async fn inject_namespace_default(
        #[case] resource: &str,
        #[case] default: &str,
        #[case] path: &str,
    ) {
        let verdict = engine(lookup_with_default(default))
            .decide(resource, &object(resource, None), None)
            .await;

        assert_eq!(verdict, Verdict::patch(PatchOperation::add(path, default)));
        assert!(verdict.allowed);
        assert_eq!(verdict.patches.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn runtime_class_already_set(
        #[values(
            "pods",
            "deployments",
            "replicasets",
            "statefulsets",
            "daemonsets",
            "jobs",
            "cronjobs"
        )]
        resource: &str,
        #[values("runc", "")] runtime_class_name: &str,
    ) {
        let verdict = engine(lookup_with_default("gvisor"))
            .decide(resource, &object(resource, Some(runtime_class_name)), None)
            .await;

        assert_eq!(verdict, Verdict::allow());
    }

    #[rstest]
    #[case::field_absent(None)]
    #[case::field_set(Some("runc"))]
    #[tokio::test]
    async fn namespace_without_default(#[case] runtime_class_name: Option<&str>) {
        let verdict = engine(lookup_returning(&[("team", "a")], 1))
            .decide("deployments", &object("deployments", runtime_class_name), None)
            .await;

        assert_eq!(verdict, Verdict::allow());
    }

    #[rstest]
    #[case("services")]
    #[case("configmaps")]
    #[case("deployment")]
    #[tokio::test]
    async fn unknown_resource_skips_namespace_lookup(#[case] resource: &str) {
        let verdict = engine(lookup_returning(&[], 0))
            .decide(resource, br#"{"metadata": {"namespace": "team-a"}}"#, Some("team-a"))
            .await;

        assert_eq!(verdict, Verdict::allow());
    }

    #[tokio::test]
    async fn malformed_object_is_allowed_with_message() {
        let verdict = engine(lookup_returning(&[], 0))
            .decide("pods", br#"{"spec": 42}"#, Some("team-a"))
            .await;

        assert!(verdict.allowed);
        assert!(verdict.patches.is_empty());
        assert!(verdict
            .message
            .expect("message should be set")
            .starts_with("cannot decode Pod object"));
    }

    #[tokio::test]
    async fn lookup_failure_is_allowed_with_message() {
        let mut lookup = MockNamespaceLookup::new();
        lookup
            .expect_namespace_labels()
            .times(1)
            .returning(|namespace| {
                future::ready(Err(LookupError::NotFound(namespace.to_owned()))).boxed()
            });

        let verdict = engine(lookup)
            .decide("pods", &object("pods", None), None)
            .await;

        assert_eq!(
            verdict,
            Verdict::allow_with_message("namespace team-a not found")
        );
    }

    #[tokio::test]
    async fn request_namespace_is_used_when_object_has_none() {
        let mut lookup = MockNamespaceLookup::new();
        lookup
            .expect_namespace_labels()
            .withf(|namespace| namespace == "from-request")
            .times(1)
            .returning(|_| {
                future::ready(Ok(BTreeMap::from([(
                    DEFAULT_RUNTIME_CLASS_LABEL.to_owned(),
                    "gvisor".to_owned(),
                )])))
                .boxed()
            });
        let raw = serde_json::to_vec(&json!({"metadata": {"generateName": "web-"}, "spec": pod_spec(None)}))
            .unwrap();

        let verdict = engine(lookup)
            .decide("pods", &raw, Some("from-request"))
            .await;

        assert_eq!(
            verdict,
            Verdict::patch(PatchOperation::add("/spec/runtimeClassName", "gvisor"))
        );
    }

    #[tokio::test]
    async fn object_namespace_wins_over_request_namespace() {
        let mut lookup = MockNamespaceLookup::new();
        lookup
            .expect_namespace_labels()
            .withf(|namespace| namespace == "team-a")
            .times(1)
            .returning(|_| future::ready(Ok(BTreeMap::new())).boxed());

        engine(lookup)
            .decide("pods", &object("pods", None), Some("team-b"))
            .await;
    }

    #[tokio::test]
    async fn no_namespace_at_all() {
        let raw = serde_json::to_vec(&json!({"spec": pod_spec(None)})).unwrap();

        let verdict = engine(lookup_returning(&[], 0))
            .decide("pods", &raw, None)
            .await;

        assert_eq!(verdict, Verdict::allow());
    }

    #[tokio::test]
    async fn same_inputs_same_verdict() {
        let engine = engine(lookup_returning(&[(DEFAULT_RUNTIME_CLASS_LABEL, "kata")], 2));
        let raw = object("statefulsets", None);

        let first = engine.decide("statefulsets", &raw, None).await;
        let second = engine.decide("statefulsets", &raw, None).await;

        assert_eq!(first, second);
        assert!(first.is_mutating());
    }
}

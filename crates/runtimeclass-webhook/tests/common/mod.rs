use axum::Router;
use futures::future::{self, BoxFuture, FutureExt};
use runtimeclass_webhook::{
    config::Config,
    mutation::{errors::LookupError, namespace::NamespaceLookup},
    WebhookServer,
};
use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// In-memory namespaces, counting the lookups served.
#[derive(Default)]
pub(crate) struct StaticNamespaces {
    namespaces: HashMap<String, BTreeMap<String, String>>,
    lookups: AtomicUsize,
}

impl StaticNamespaces {
    pub(crate) fn with_namespace(mut self, name: &str, labels: &[(&str, &str)]) -> Self {
        self.namespaces.insert(
            name.to_owned(),
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl NamespaceLookup for StaticNamespaces {
    fn namespace_labels(
        &self,
        namespace: &str,
    ) -> BoxFuture<'static, Result<BTreeMap<String, String>, LookupError>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let result = self
            .namespaces
            .get(namespace)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(namespace.to_owned()));
        future::ready(result).boxed()
    }
}

pub(crate) fn default_test_config() -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        tls_config: None,
        namespace_lookup_timeout: Duration::from_secs(2),
        ignore_kubernetes_connection_failure: false,
        log_level: "info".to_owned(),
        log_fmt: "json".to_owned(),
        log_no_color: false,
    }
}

pub(crate) fn app(namespaces: Arc<StaticNamespaces>) -> Router {
    WebhookServer::new_with_lookup(default_test_config(), namespaces).router()
}

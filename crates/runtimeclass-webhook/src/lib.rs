pub mod api;
mod certs;
pub mod cli;
pub mod config;
pub mod mutation;
mod tracing;

use ::tracing::{error, info, warn};
use anyhow::{anyhow, Result};
use axum::{
    routing::{get, post},
    Router,
};
use axum_server::Handle;
use lazy_static::lazy_static;
use std::{net::SocketAddr, process, sync::Arc, sync::RwLock, time::Duration};
use tower_http::trace::{self, TraceLayer};

use crate::api::{
    handlers::{healthz_handler, mutate_handler},
    state::ApiServerState,
};
use crate::certs::create_tls_config_and_watch_certificate_changes;
use crate::config::{Config, TlsConfig, SERVICE_NAME};
use crate::mutation::{
    namespace::{
        KubeNamespaceLookup, NamespaceDefaultResolver, NamespaceLookup,
        UnavailableNamespaceLookup,
    },
    PatchDecisionEngine,
};

lazy_static! {
    static ref TRACE_SYSTEM_INITIALIZED: RwLock<bool> = RwLock::new(false);
}

/// In-flight requests are given this long to complete once a shutdown
/// signal is received.
const GRACEFUL_SHUTDOWN_PERIOD: Duration = Duration::from_secs(10);

pub struct WebhookServer {
    router: Router,
    addr: SocketAddr,
    tls_config: Option<TlsConfig>,
}

impl WebhookServer {
    /// Build the server, connecting to the Kubernetes cluster the process
    /// runs in.
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let lookup: Arc<dyn NamespaceLookup> = match kube::Client::try_default().await {
            Ok(client) => Arc::new(KubeNamespaceLookup::new(client)),
            Err(e) if config.ignore_kubernetes_connection_failure => {
                warn!(
                    error = %e,
                    "Cannot connect to Kubernetes, no workload will be mutated"
                );
                Arc::new(UnavailableNamespaceLookup)
            }
            Err(e) => return Err(anyhow!("Cannot connect to Kubernetes: {e}")),
        };

        Ok(Self::new_with_lookup(config, lookup))
    }

    /// Build the server on top of the given namespace lookup.
    pub fn new_with_lookup(config: Config, lookup: Arc<dyn NamespaceLookup>) -> Self {
        let resolver = NamespaceDefaultResolver::new(lookup, config.namespace_lookup_timeout);
        let state = Arc::new(ApiServerState {
            engine: PatchDecisionEngine::new(resolver),
        });

        let router = Router::new()
            .route("/mutate", post(mutate_handler))
            .route("/healthz", get(healthz_handler))
            .with_state(state)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(::tracing::Level::DEBUG))
                    .on_response(trace::DefaultOnResponse::new().level(::tracing::Level::DEBUG)),
            );

        Self {
            router,
            addr: config.addr,
            tls_config: config.tls_config,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve requests until SIGINT or SIGTERM is received.
    pub async fn run(self) -> Result<()> {
        let handle = Handle::new();
        tokio::spawn(shutdown_on_signal(handle.clone()));

        let service = self.router.into_make_service();
        match self.tls_config {
            Some(tls_config) => {
                let rustls_config =
                    create_tls_config_and_watch_certificate_changes(tls_config).await?;
                info!(address = %self.addr, service = SERVICE_NAME, "started HTTPS server");
                axum_server::bind_rustls(self.addr, rustls_config)
                    .handle(handle)
                    .serve(service)
                    .await?;
            }
            None => {
                info!(address = %self.addr, service = SERVICE_NAME, "started HTTP server");
                axum_server::bind(self.addr)
                    .handle(handle)
                    .serve(service)
                    .await?;
            }
        }
        info!("server stopped");

        Ok(())
    }
}

async fn shutdown_on_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
    handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_PERIOD));
}

pub fn setup_tracing(log_level: &str, log_fmt: &str, log_no_color: bool) -> Result<()> {
    crate::tracing::setup_tracing(log_level, log_fmt, log_no_color)?;

    let mut w = TRACE_SYSTEM_INITIALIZED
        .write()
        .map_err(|e| anyhow!("cannot record tracing initialization: {e}"))?;
    *w = true;

    Ok(())
}

pub fn fatal_error(msg: String) -> ! {
    let trace_system_ready = TRACE_SYSTEM_INITIALIZED
        .read()
        .map(|initialized| *initialized)
        .unwrap_or_default();
    if trace_system_ready {
        error!("{}", msg);
    } else {
        eprintln!("{msg}");
    }

    process::exit(1);
}

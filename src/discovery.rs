//! Access to the platform's endpoint-discovery API.

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Endpoints;
use kube::api::{Api, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::WatchEvent;
use kube::{Client, Config};

/// One live subscription to membership-change events.
pub type EventStream = BoxStream<'static, kube::Result<WatchEvent<Endpoints>>>;

/// Supplies watch subscriptions for the membership of one logical service.
///
/// Each call opens a fresh session; the caller owns the returned stream and
/// consumes it until it ends or errors.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn subscribe(&self) -> kube::Result<EventStream>;
}

/// Watches the `Endpoints` object that backs a named service.
pub struct ServiceEndpoints {
    config: Config,
    namespace: String,
    service: String,
}

impl ServiceEndpoints {
    pub fn new(config: Config, namespace: &str, service: &str) -> Self {
        ServiceEndpoints {
            config,
            namespace: namespace.to_owned(),
            service: service.to_owned(),
        }
    }
}

#[async_trait]
impl MembershipSource for ServiceEndpoints {
    async fn subscribe(&self) -> kube::Result<EventStream> {
        // The client spawns its buffered-service worker onto the runtime it
        // is created on, so it is built per session here on the watcher's
        // runtime rather than once at startup.
        let client = Client::try_from(self.config.clone())?;
        let api: Api<Endpoints> = Api::namespaced(client, &self.namespace);

        let params = WatchParams::default().fields(&format!("metadata.name={}", self.service));
        let events = api.watch(&params, "0").await?;
        Ok(events.boxed())
    }
}

/// Resolve the platform configuration and credentials.
///
/// Loads the given kubeconfig file when a path is supplied, and falls back to
/// in-cluster configuration otherwise. Failure here is fatal to the process.
pub async fn platform_config(kubeconfig: Option<&str>) -> anyhow::Result<Config> {
    match kubeconfig {
        Some(path) => {
            log::info!("using configuration from '{path}'");
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig at '{path}'"))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("failed to load kubeconfig")
        }
        None => {
            log::info!("using in-cluster configuration");
            Config::incluster().context("in-cluster configuration unavailable")
        }
    }
}

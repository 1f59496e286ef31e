use crate::{
    core::{
        capability::{GET_RESOURCE_OPERATION, KUBERNETES_NAMESPACE, KUBEWARDEN_BINDING},
        GetResource, HostCallError, HostCapabilities,
    },
    index::SharedIndex,
    metrics::{Lookup, LookupMetrics, Source},
};
use bytes::Bytes;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use tracing::{debug, trace, warn};

/// Serves `get_resource` lookups for services from the cluster.
///
/// When a service index is configured, lookups that allow caching are answered from it. Misses
/// fall through to the API server, since the watch may lag behind recently created services.
#[derive(Clone)]
pub struct KubeCapabilities {
    client: kube::Client,
    services: Option<SharedIndex>,
    metrics: LookupMetrics,
}

// === impl KubeCapabilities ===

impl KubeCapabilities {
    pub fn new(client: kube::Client, services: Option<SharedIndex>, metrics: LookupMetrics) -> Self {
        Self {
            client,
            services,
            metrics,
        }
    }

    async fn get_service(&self, req: GetResource) -> Result<Bytes, HostCallError> {
        let GetResource {
            namespace,
            name,
            disable_cache,
            ..
        } = req;

        if let Some(services) = self.services.as_ref().filter(|_| !disable_cache) {
            let cached = services.read().get(&namespace, &name);
            if let Some(service) = cached {
                trace!(%namespace, %name, "Service found in cache");
                self.metrics.observe(Source::Cache, Lookup::Found);
                return encode(&service);
            }
            self.metrics.observe(Source::Cache, Lookup::NotFound);
        }

        debug!(%namespace, %name, "Getting service from the API server");
        let api = Api::<Service>::namespaced(self.client.clone(), &namespace);
        match api.get_opt(&name).await {
            Ok(Some(service)) => {
                self.metrics.observe(Source::Api, Lookup::Found);
                encode(&service)
            }
            Ok(None) => {
                self.metrics.observe(Source::Api, Lookup::NotFound);
                Err(HostCallError::new(format!(
                    "service {namespace}/{name} not found"
                )))
            }
            Err(error) => {
                warn!(%error, %namespace, %name, "Failed to get service");
                self.metrics.observe(Source::Api, Lookup::Error);
                Err(HostCallError::new(format!(
                    "failed to get service {namespace}/{name}: {error}"
                )))
            }
        }
    }
}

#[async_trait::async_trait]
impl HostCapabilities for KubeCapabilities {
    async fn call(
        &self,
        binding: &str,
        namespace: &str,
        operation: &str,
        payload: Bytes,
    ) -> Result<Bytes, HostCallError> {
        if (binding, namespace, operation)
            != (
                KUBEWARDEN_BINDING,
                KUBERNETES_NAMESPACE,
                GET_RESOURCE_OPERATION,
            )
        {
            return Err(HostCallError::new(format!(
                "unsupported capability: {binding}/{namespace}/{operation}"
            )));
        }

        let req = serde_json::from_slice::<GetResource>(&payload).map_err(|error| {
            HostCallError::new(format!("invalid get_resource request: {error}"))
        })?;
        if !req.is_service() {
            return Err(HostCallError::new(format!(
                "unsupported resource: {}/{}",
                req.api_version, req.kind
            )));
        }
        self.get_service(req).await
    }
}

fn encode(service: &Service) -> Result<Bytes, HostCallError> {
    serde_json::to_vec(service)
        .map(Bytes::from)
        .map_err(|error| HostCallError::new(format!("failed to encode service: {error}")))
}

use crate::capability::{
    GetResource, HostCallError, HostCapabilities, GET_RESOURCE_OPERATION, KUBERNETES_NAMESPACE,
    KUBEWARDEN_BINDING,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Checks whether services exist by looking them up through the host.
#[derive(Clone, Debug)]
pub struct ServiceChecker<H> {
    host: H,
}

/// The host could not determine whether a service exists.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("namespace cannot be empty")]
    EmptyNamespace,

    #[error("service name cannot be empty")]
    EmptyName,

    #[error("failed to encode get_resource request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("host call failed: {0}")]
    HostCall(#[from] HostCallError),
}

// === impl ServiceChecker ===

impl<H: HostCapabilities> ServiceChecker<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// Returns `Ok(false)` only when the host confirms that the service is absent.
    ///
    /// An empty response is treated like a not-found error. Any other host failure is returned
    /// as an error, since it says nothing about the service.
    pub async fn exists(
        &self,
        namespace: &str,
        name: &str,
        disable_cache: bool,
    ) -> Result<bool, CheckError> {
        if namespace.is_empty() {
            return Err(CheckError::EmptyNamespace);
        }
        if name.is_empty() {
            return Err(CheckError::EmptyName);
        }

        let req = GetResource::service(namespace, name, disable_cache);
        debug!(
            api_version = %req.api_version,
            kind = %req.kind,
            %namespace,
            %name,
            disable_cache,
            "Checking service existence"
        );
        let payload = serde_json::to_vec(&req)?;

        match self
            .host
            .call(
                KUBEWARDEN_BINDING,
                KUBERNETES_NAMESPACE,
                GET_RESOURCE_OPERATION,
                payload.into(),
            )
            .await
        {
            Ok(rsp) => Ok(!rsp.is_empty()),
            Err(error) if error.is_not_found() => {
                trace!(%error, %namespace, %name, "Service not found");
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }
}

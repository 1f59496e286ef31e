//! The host capability through which resources are looked up.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const KUBEWARDEN_BINDING: &str = "kubewarden";
pub const KUBERNETES_NAMESPACE: &str = "kubernetes";
pub const GET_RESOURCE_OPERATION: &str = "get_resource";

/// Invokes operations provided by the policy host.
///
/// Each call is a single request/response exchange: the payload and the response are opaque
/// bytes whose encoding is defined by the operation.
#[async_trait::async_trait]
pub trait HostCapabilities: Send + Sync {
    async fn call(
        &self,
        binding: &str,
        namespace: &str,
        operation: &str,
        payload: Bytes,
    ) -> Result<Bytes, HostCallError>;
}

/// A failed capability call.
///
/// Hosts describe failures only by message, so the message is all that is retained.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HostCallError {
    message: String,
}

/// The payload of a `kubewarden/kubernetes/get_resource` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResource {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub disable_cache: bool,
}

#[async_trait::async_trait]
impl<H: HostCapabilities + ?Sized> HostCapabilities for Arc<H> {
    async fn call(
        &self,
        binding: &str,
        namespace: &str,
        operation: &str,
        payload: Bytes,
    ) -> Result<Bytes, HostCallError> {
        (**self).call(binding, namespace, operation, payload).await
    }
}

// === impl HostCallError ===

impl HostCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Indicates whether the host reported that the requested resource does not exist.
    ///
    /// Hosts signal a missing resource with an error whose message contains `not found`.
    pub fn is_not_found(&self) -> bool {
        self.message.contains("not found")
    }
}

// === impl GetResource ===

impl GetResource {
    pub fn service(namespace: impl ToString, name: impl ToString, disable_cache: bool) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            disable_cache,
        }
    }

    pub fn is_service(&self) -> bool {
        self.api_version == "v1" && self.kind == "Service"
    }
}

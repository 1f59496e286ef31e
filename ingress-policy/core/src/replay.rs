//! Replays recorded host capability sessions.
//!
//! A session is a YAML list of exchanges, each pairing a tagged request document with the
//! host's response:
//!
//! ```yaml
//! - type: Exchange
//!   request: |
//!     !KubernetesGetResource
//!     api_version: v1
//!     kind: Service
//!     namespace: default
//!     name: my-service
//!     disable_cache: true
//!   response:
//!     type: Success
//!     payload: '{"apiVersion":"v1","kind":"Service"}'
//! ```
//!
//! Requests that match no exchange fail, so a session doubles as an assertion about which
//! lookups a validation performs.

use crate::capability::{
    GetResource, HostCallError, HostCapabilities, GET_RESOURCE_OPERATION, KUBERNETES_NAMESPACE,
    KUBEWARDEN_BINDING,
};
use bytes::Bytes;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct ReplayCapabilities {
    exchanges: Vec<(HostRequest, Outcome)>,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read session: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse session: {0}")]
    Session(#[source] serde_yaml::Error),

    #[error("failed to parse request of exchange {index}: {source}")]
    Request {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A capability request, tagged by the operation it invokes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub enum HostRequest {
    KubernetesGetResource(GetResource),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Entry {
    Exchange { request: String, response: Outcome },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
enum Outcome {
    Success {
        #[serde(default)]
        payload: String,
    },
    Failure {
        #[serde(default)]
        message: String,
    },
}

// === impl ReplayCapabilities ===

impl ReplayCapabilities {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let session = std::fs::read_to_string(path)?;
        Self::from_yaml(&session)
    }

    pub fn from_yaml(session: &str) -> Result<Self, ReplayError> {
        let entries =
            serde_yaml::from_str::<Vec<Entry>>(session).map_err(ReplayError::Session)?;
        let exchanges = entries
            .into_iter()
            .enumerate()
            .map(|(index, Entry::Exchange { request, response })| {
                let request = serde_yaml::from_str::<HostRequest>(&request)
                    .map_err(|source| ReplayError::Request { index, source })?;
                Ok((request, response))
            })
            .collect::<Result<Vec<_>, ReplayError>>()?;
        Ok(Self { exchanges })
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    fn respond(&self, request: &HostRequest) -> Result<Bytes, HostCallError> {
        let (_, outcome) = self
            .exchanges
            .iter()
            .find(|(recorded, _)| recorded == request)
            .ok_or_else(|| {
                HostCallError::new(format!("no recorded exchange for request {request:?}"))
            })?;
        match outcome {
            Outcome::Success { payload } => Ok(Bytes::from(payload.clone())),
            Outcome::Failure { message } => Err(HostCallError::new(message.clone())),
        }
    }
}

#[async_trait::async_trait]
impl HostCapabilities for ReplayCapabilities {
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
        self.respond(&HostRequest::KubernetesGetResource(req))
    }
}

//! A permissive model of `networking.k8s.io/v1` Ingress backends.
//!
//! Every field is optional: an ingress that omits any part of a backend reference is still
//! well-formed, it simply references nothing at that position. Fields that are present must have
//! the expected type.

use ahash::AHashSet;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Ingress {
    pub metadata: Option<ObjectMeta>,
    pub spec: Option<IngressSpec>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    pub default_backend: Option<IngressBackend>,
    pub rules: Option<Vec<IngressRule>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IngressRule {
    pub http: Option<HttpIngressRuleValue>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HttpIngressRuleValue {
    pub paths: Option<Vec<HttpIngressPath>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HttpIngressPath {
    pub backend: Option<IngressBackend>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IngressBackend {
    pub service: Option<IngressServiceBackend>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IngressServiceBackend {
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("empty ingress object")]
    Empty,

    #[error("failed to parse ingress: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("ingress metadata not found")]
    MissingMetadata,
}

// === impl Ingress ===

impl Ingress {
    /// Parses the object under review, which must be present and carry metadata.
    pub fn from_object(object: Option<&RawValue>) -> Result<Self, IngressError> {
        let object = object.ok_or(IngressError::Empty)?;
        let ingress = serde_json::from_str::<Self>(object.get())?;
        if ingress.metadata.is_none() {
            return Err(IngressError::MissingMetadata);
        }
        Ok(ingress)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.as_ref()?.name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
    }

    /// Returns the services referenced by this ingress. See [`IngressSpec::service_names`].
    pub fn service_names(&self) -> Vec<String> {
        self.spec
            .as_ref()
            .map(IngressSpec::service_names)
            .unwrap_or_default()
    }
}

// === impl IngressSpec ===

impl IngressSpec {
    /// Returns the distinct, non-empty service names referenced by this spec.
    ///
    /// Names are returned in the order they are first referenced: the default backend, then each
    /// rule's paths in document order.
    pub fn service_names(&self) -> Vec<String> {
        let rule_backends = self
            .rules
            .iter()
            .flatten()
            .filter_map(|rule| rule.http.as_ref())
            .flat_map(|http| http.paths.iter().flatten())
            .filter_map(|path| path.backend.as_ref());

        let mut seen = AHashSet::new();
        self.default_backend
            .iter()
            .chain(rule_backends)
            .filter_map(IngressBackend::service_name)
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }
}

// === impl IngressBackend ===

impl IngressBackend {
    fn service_name(&self) -> Option<&str> {
        self.service
            .as_ref()?
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}

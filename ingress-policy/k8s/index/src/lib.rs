//! Service index
//!
//! Holds the `Service` resources observed by a cluster-wide watch so that existence lookups can be
//! answered without a round trip to the API server. Services are keyed by namespace and then by
//! name; a namespace is dropped from the index once its last service is deleted.
//!
//! The index only ever reflects what the watch has delivered. A miss is not proof that a service
//! is absent (the watch may not have caught up), so callers confirm misses against the API.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod metrics;

use ahash::AHashMap as HashMap;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use parking_lot::RwLock;
use std::sync::Arc;

pub type SharedIndex = Arc<RwLock<Index>>;

#[derive(Debug, Default)]
pub struct Index {
    namespaces: HashMap<String, HashMap<String, Arc<Service>>>,
}

// === impl Index ===

impl Index {
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.namespaces.get(namespace)?.get(name).cloned()
    }

    /// The number of services indexed in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .get(namespace)
            .map_or(0, |services| services.len())
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl kubert::index::IndexNamespacedResource<Service> for Index {
    fn apply(&mut self, service: Service) {
        let Some(namespace) = service.namespace() else {
            tracing::warn!(name = %service.name_any(), "Ignoring service without a namespace");
            return;
        };
        let name = service.name_unchecked();
        tracing::trace!(%namespace, %name, "Indexing service");
        self.namespaces
            .entry(namespace)
            .or_default()
            .insert(name, Arc::new(service));
    }

    fn delete(&mut self, namespace: String, name: String) {
        tracing::trace!(%namespace, %name, "Removing service");
        if let Some(services) = self.namespaces.get_mut(&namespace) {
            services.remove(&name);
            if services.is_empty() {
                self.namespaces.remove(&namespace);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kubert::index::IndexNamespacedResource;
    use maplit::{btreemap, convert_args};

    pub(crate) fn mk_service(ns: impl ToString, name: impl ToString) -> Service {
        Service {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                labels: Some(convert_args!(btreemap!("app" => "web"))),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn applies_and_deletes() {
        let mut index = Index::default();
        assert!(index.is_empty());

        index.apply(mk_service("default", "web"));
        index.apply(mk_service("default", "api"));
        index.apply(mk_service("apps", "web"));
        assert_eq!(index.len("default"), 2);
        assert_eq!(index.len("apps"), 1);

        let web = index.get("default", "web").expect("service must be indexed");
        assert_eq!(web.name_any(), "web");
        assert_eq!(web.labels().get("app").map(String::as_str), Some("web"));
        assert!(index.get("default", "db").is_none());
        assert!(index.get("other", "web").is_none());

        index.delete("apps".to_string(), "web".to_string());
        assert!(index.get("apps", "web").is_none());
        assert_eq!(index.len("apps"), 0);
        assert!(!index.namespaces.contains_key("apps"));

        index.delete("missing".to_string(), "web".to_string());
        assert_eq!(index.len("default"), 2);
    }

    #[test]
    fn ignores_services_without_namespace() {
        let mut index = Index::default();
        let mut service = mk_service("default", "web");
        service.metadata.namespace = None;
        index.apply(service);
        assert!(index.is_empty());
    }

    #[test]
    fn replaces_updated_services() {
        let mut index = Index::default();
        index.apply(mk_service("default", "web"));

        let mut updated = mk_service("default", "web");
        updated.metadata.labels = None;
        index.apply(updated);

        assert_eq!(index.len("default"), 1);
        let web = index.get("default", "web").unwrap();
        assert!(web.labels().is_empty());
    }
}

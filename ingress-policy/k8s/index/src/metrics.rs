use crate::SharedIndex;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use parking_lot::RwLock;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

/// Instruments updates to a [`SharedIndex`].
///
/// The watch drives this wrapper while lookups read the inner index directly, so readers never
/// contend with metric updates.
#[derive(Debug)]
pub struct IndexMetrics {
    index: SharedIndex,

    size: Family<NamespaceLabels, Gauge>,
    applies: Family<NamespaceLabels, Counter>,
    deletes: Family<NamespaceLabels, Counter>,
    resets: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct NamespaceLabels {
    namespace: String,
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(index: SharedIndex, prom: &mut Registry) -> Self {
        let size = Family::default();
        prom.register(
            "service_index_size",
            "Gauge of the number of services in the index",
            size.clone(),
        );

        let applies = Family::default();
        prom.register(
            "service_index_applies",
            "Count of service applies to the index",
            applies.clone(),
        );

        let deletes = Family::default();
        prom.register(
            "service_index_deletes",
            "Count of service deletes from the index",
            deletes.clone(),
        );

        let resets = Counter::default();
        prom.register(
            "service_index_resets",
            "Count of resets to the index",
            resets.clone(),
        );

        Self {
            index,
            size,
            applies,
            deletes,
            resets,
        }
    }

    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    fn observe_size(&self, namespace: String) {
        let size = self.index.read().len(&namespace);
        self.size
            .get_or_create(&NamespaceLabels { namespace })
            .set(size as i64);
    }
}

impl IndexNamespacedResource<Service> for IndexMetrics {
    fn apply(&mut self, service: Service) {
        let namespace = service.namespace().unwrap_or_default();
        self.applies
            .get_or_create(&NamespaceLabels {
                namespace: namespace.clone(),
            })
            .inc();
        self.index.write().apply(service);
        self.observe_size(namespace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.deletes
            .get_or_create(&NamespaceLabels {
                namespace: namespace.clone(),
            })
            .inc();
        self.index.write().delete(namespace.clone(), name);
        self.observe_size(namespace);
    }

    fn reset(&mut self, services: Vec<Service>, removed: NamespacedRemoved) {
        let mut namespaces = services
            .iter()
            .flat_map(|s| s.namespace())
            .chain(removed.keys().cloned())
            .collect::<Vec<_>>();
        namespaces.sort();
        namespaces.dedup();

        self.resets.inc();
        self.index.write().reset(services, removed);
        for namespace in namespaces {
            self.observe_size(namespace);
        }
    }
}

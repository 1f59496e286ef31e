use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counts webhook decisions.
#[derive(Clone, Debug, Default)]
pub struct AdmissionMetrics {
    decisions: Family<DecisionLabels, Counter>,
}

/// Counts service lookups by where they were answered and what they found.
#[derive(Clone, Debug, Default)]
pub struct LookupMetrics {
    lookups: Family<LookupLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct DecisionLabels {
    endpoint: String,
    decision: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct LookupLabels {
    source: String,
    result: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Source {
    Cache,
    Api,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Found,
    NotFound,
    Error,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let decisions = Family::default();
        prom.register(
            "admission_decisions",
            "Count of admission decisions by endpoint",
            decisions.clone(),
        );
        Self { decisions }
    }

    pub(crate) fn decided(&self, endpoint: &str, accepted: bool) {
        self.decisions
            .get_or_create(&DecisionLabels {
                endpoint: endpoint.to_string(),
                decision: if accepted { "accepted" } else { "rejected" }.to_string(),
            })
            .inc();
    }
}

// === impl LookupMetrics ===

impl LookupMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let lookups = Family::default();
        prom.register(
            "service_lookup",
            "Count of service lookups by source and result",
            lookups.clone(),
        );
        Self { lookups }
    }

    pub(crate) fn observe(&self, source: Source, lookup: Lookup) {
        let source = match source {
            Source::Cache => "cache",
            Source::Api => "api",
        };
        let result = match lookup {
            Lookup::Found => "found",
            Lookup::NotFound => "not_found",
            Lookup::Error => "error",
        };
        self.lookups
            .get_or_create(&LookupLabels {
                source: source.to_string(),
                result: result.to_string(),
            })
            .inc();
    }
}

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ingress_policy_core as core;
pub use ingress_policy_k8s_index as index;

mod admission;
mod args;
mod capabilities;
mod metrics;

pub use self::{
    admission::Admission,
    args::Args,
    capabilities::KubeCapabilities,
    metrics::{AdmissionMetrics, LookupMetrics},
};

//! Ingress backend admission policy
//!
//! An `Ingress` is admitted only if every `Service` it routes to exists in the ingress's
//! namespace. Existence is determined through a host capability (`kubewarden/kubernetes/
//! get_resource`) so that the same validation logic can run against the Kubernetes API, a watch
//! cache, or a recorded session.
//!
//! ```text
//! [ settings ] -> [ Settings ] --enforce?--> [ Ingress ] -> [ service names ] -> [ get_resource ]*
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod capability;
pub mod ingress;
pub mod protocol;
pub mod replay;
mod service;
mod settings;
mod validate;

#[cfg(test)]
mod tests;

pub use self::{
    capability::{GetResource, HostCallError, HostCapabilities},
    ingress::{Ingress, IngressError},
    protocol::{SettingsValidationResponse, ValidationRequest, ValidationResponse},
    service::{CheckError, ServiceChecker},
    settings::{validate_settings, Settings, SettingsError},
    validate::Validator,
};

use crate::{
    capability::HostCapabilities,
    ingress::Ingress,
    protocol::{ValidationRequest, ValidationResponse},
    service::ServiceChecker,
    settings::Settings,
};
use tracing::{debug, info, warn};

/// Admits ingresses whose backend services exist.
#[derive(Clone, Debug)]
pub struct Validator<H> {
    services: ServiceChecker<H>,
}

// === impl Validator ===

impl<H: HostCapabilities> Validator<H> {
    pub fn new(host: H) -> Self {
        Self {
            services: ServiceChecker::new(host),
        }
    }

    /// Decodes a serialized [`ValidationRequest`] and validates it.
    pub async fn validate_payload(&self, payload: &[u8]) -> ValidationResponse {
        match serde_json::from_slice::<ValidationRequest>(payload) {
            Ok(req) => self.validate(req).await,
            Err(error) => {
                warn!(%error, "Failed to parse validation request");
                ValidationResponse::bad_request(error)
            }
        }
    }

    pub async fn validate(&self, req: ValidationRequest) -> ValidationResponse {
        let settings = match Settings::resolve(req.settings_bytes()) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(%error, "Invalid settings");
                return ValidationResponse::bad_request(error);
            }
        };

        if !settings.enforce_service_exists {
            debug!("Service enforcement is disabled");
            return ValidationResponse::accept();
        }

        let ingress = match Ingress::from_object(req.request.object.as_deref()) {
            Ok(ingress) => ingress,
            Err(error) => {
                info!(%error, uid = %req.request.uid, "Failed to parse ingress");
                return ValidationResponse::bad_request(error);
            }
        };

        let name = ingress
            .name()
            .or(req.request.name.as_deref())
            .unwrap_or_default();
        let namespace = ingress
            .namespace()
            .or(req.request.namespace.as_deref())
            .unwrap_or_default();
        debug!(%name, %namespace, "Validating ingress");

        let services = ingress.service_names();
        if services.is_empty() {
            debug!(%name, %namespace, "Ingress references no services");
            return ValidationResponse::accept();
        }

        for service in &services {
            match self
                .services
                .exists(namespace, service, settings.disable_cache)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    info!(%name, %namespace, %service, "Denied: service does not exist");
                    return ValidationResponse::reject(format_args!(
                        "Service '{service}' does not exist in namespace '{namespace}'"
                    ));
                }
                Err(error) => {
                    warn!(%error, %name, %namespace, %service, "Failed to check service");
                    return ValidationResponse::reject(format_args!(
                        "Error checking Service '{service}': {error}"
                    ));
                }
            }
        }

        debug!(%name, %namespace, ?services, "All referenced services exist");
        ValidationResponse::accept()
    }
}

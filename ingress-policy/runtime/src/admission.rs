use crate::{
    core::{
        protocol, validate_settings, HostCapabilities, ValidationRequest, ValidationResponse,
        Validator,
    },
    metrics::AdmissionMetrics,
};
use bytes::Bytes;
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    core::{admission::Operation, DynamicObject},
    Resource,
};
use serde::Serialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Serves the admission webhook and the raw policy endpoints.
pub struct Admission<H> {
    validator: Arc<Validator<H>>,
    settings: Option<Box<RawValue>>,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Route {
    /// A Kubernetes `AdmissionReview`.
    Review,
    /// A raw validation envelope.
    Validate,
    ValidateSettings,
}

type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<Bytes>;

// === impl Admission ===

impl<H> Clone for Admission<H> {
    fn clone(&self) -> Self {
        Self {
            validator: self.validator.clone(),
            settings: self.settings.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<H> tower::Service<Request<hyper::body::Incoming>> for Admission<H>
where
    H: HostCapabilities + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        let Some(route) = Route::recognize(req.method(), req.uri().path()) else {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        };

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            admission.handle(route, bytes).await
        })
    }
}

impl<H: HostCapabilities> Admission<H> {
    /// Serves validations with `settings` applied to every admission review.
    pub fn new(
        validator: Validator<H>,
        settings: Option<Box<RawValue>>,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            validator: Arc::new(validator),
            settings,
            metrics,
        }
    }

    async fn handle(self, route: Route, bytes: Bytes) -> Result<Response<Body>, Error> {
        match route {
            Route::Review => {
                let rsp = self.review(&bytes).await;
                self.metrics.decided(route.as_str(), rsp.allowed);
                json_response(&rsp.into_review())
            }
            Route::Validate => {
                let rsp = self.validator.validate_payload(&bytes).await;
                self.metrics.decided(route.as_str(), rsp.accepted);
                json_response(&rsp)
            }
            Route::ValidateSettings => {
                let rsp = validate_settings(&bytes);
                self.metrics.decided(route.as_str(), rsp.valid);
                json_response(&rsp)
            }
        }
    }

    async fn review(&self, bytes: &[u8]) -> AdmissionResponse {
        let review = match serde_json::from_slice::<AdmissionReview>(bytes) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                return AdmissionResponse::invalid(error);
            }
        };
        trace!(?review);

        let rsp = match review.try_into() {
            Ok(req) => {
                debug!(?req);
                self.admit(req).await
            }
            Err(error) => {
                warn!(%error, "Invalid admission request");
                AdmissionResponse::invalid(error)
            }
        };
        debug!(?rsp);
        rsp
    }

    async fn admit(&self, req: AdmissionRequest) -> AdmissionResponse {
        if !is_kind::<Ingress>(&req) {
            return AdmissionResponse::invalid(format_args!(
                "unsupported resource type: {}.{}.{}",
                req.kind.group, req.kind.version, req.kind.kind
            ));
        }

        let rsp = AdmissionResponse::from(&req);
        if matches!(req.operation, Operation::Delete) {
            trace!(name = %req.name, "Allowing deletion");
            return rsp;
        }

        let object = match req.object.as_ref().map(serde_json::value::to_raw_value) {
            None => None,
            Some(Ok(object)) => Some(object),
            Some(Err(error)) => {
                info!(%error, "Failed to encode ingress");
                return rsp.deny(error);
            }
        };

        let verdict = self
            .validator
            .validate(ValidationRequest {
                request: protocol::AdmissionRequest {
                    uid: req.uid.clone(),
                    name: Some(req.name.clone()).filter(|n| !n.is_empty()),
                    namespace: req.namespace.clone(),
                    object,
                },
                settings: self.settings.clone(),
            })
            .await;

        if verdict.accepted {
            return rsp;
        }
        info!(name = %req.name, namespace = ?req.namespace, message = ?verdict.message, "Denied");
        deny(rsp, verdict)
    }
}

// === impl Route ===

impl Route {
    fn recognize(method: &http::Method, path: &str) -> Option<Self> {
        if *method != http::Method::POST {
            return None;
        }
        match path {
            "/" => Some(Self::Review),
            "/validate" => Some(Self::Validate),
            "/validate_settings" => Some(Self::ValidateSettings),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Validate => "validate",
            Self::ValidateSettings => "validate_settings",
        }
    }
}

fn deny(rsp: AdmissionResponse, verdict: ValidationResponse) -> AdmissionResponse {
    let mut rsp = rsp.deny(verdict.message.unwrap_or_default());
    if let Some(code) = verdict.code {
        rsp.result.code = code;
    }
    rsp
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn json_response<T: Serialize>(rsp: &T) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

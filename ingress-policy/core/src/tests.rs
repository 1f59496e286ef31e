use crate::{
    capability::{
        GetResource, HostCallError, HostCapabilities, GET_RESOURCE_OPERATION,
        KUBERNETES_NAMESPACE, KUBEWARDEN_BINDING,
    },
    protocol::{ValidationRequest, ValidationResponse, BAD_REQUEST},
    Validator,
};
use ahash::AHashSet;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// A host that knows about a fixed set of services and records every lookup.
#[derive(Debug, Default)]
pub(crate) struct MockHost {
    services: AHashSet<String>,
    failure: Option<String>,
    empty_responses: bool,
    lookups: Mutex<Vec<GetResource>>,
}

impl MockHost {
    pub(crate) fn with_services(services: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            services: services.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn empty_responses(self) -> Self {
        Self {
            empty_responses: true,
            ..self
        }
    }

    pub(crate) fn lookups(&self) -> Vec<GetResource> {
        self.lookups.lock().clone()
    }
}

#[async_trait::async_trait]
impl HostCapabilities for MockHost {
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
            return Err(HostCallError::new("unexpected host call"));
        }

        let req = serde_json::from_slice::<GetResource>(&payload)
            .map_err(|error| HostCallError::new(error.to_string()))?;
        self.lookups.lock().push(req.clone());

        if let Some(message) = &self.failure {
            return Err(HostCallError::new(message.clone()));
        }
        if !self.services.contains(&req.name) {
            return Err(HostCallError::new("not found"));
        }
        if self.empty_responses {
            return Ok(Bytes::new());
        }
        Ok(Bytes::from(
            json!({ "apiVersion": "v1", "kind": "Service", "metadata": { "name": req.name } })
                .to_string(),
        ))
    }
}

fn request(settings: serde_json::Value, ingress: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "request": { "uid": "test", "object": ingress },
        "settings": settings,
    }))
    .expect("request must encode")
}

fn mk_ingress(spec: serde_json::Value) -> serde_json::Value {
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": { "name": "test-ingress", "namespace": "default" },
        "spec": spec,
    })
}

fn default_backend(service: &str) -> serde_json::Value {
    json!({ "defaultBackend": { "service": { "name": service, "port": { "number": 80 } } } })
}

fn mk_path(path: &str, service: &str) -> serde_json::Value {
    json!({
        "path": path,
        "pathType": "Prefix",
        "backend": { "service": { "name": service, "port": { "number": 8080 } } },
    })
}

fn validator() -> (Arc<MockHost>, Validator<Arc<MockHost>>) {
    let host = Arc::new(MockHost::with_services(["my-service"]));
    (host.clone(), Validator::new(host))
}

#[tokio::test(flavor = "current_thread")]
async fn accepts_existing_service() {
    let (host, validator) = validator();
    let rsp = validator
        .validate_payload(&request(json!({}), mk_ingress(default_backend("my-service"))))
        .await;
    assert_eq!(rsp, ValidationResponse::accept());
    assert_eq!(
        host.lookups(),
        vec![GetResource::service("default", "my-service", false)]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn rejects_missing_service() {
    let (_, validator) = validator();
    let rsp = validator
        .validate_payload(&request(
            json!({ "enforce_service_exists": true }),
            mk_ingress(default_backend("non-existent-service")),
        ))
        .await;
    assert_eq!(
        rsp,
        ValidationResponse {
            accepted: false,
            message: Some(
                "Service 'non-existent-service' does not exist in namespace 'default'".to_string()
            ),
            code: None,
        }
    );
}

#[tokio::test(flavor = "current_thread")]
async fn accepts_missing_service_when_not_enforced() {
    let (host, validator) = validator();
    let rsp = validator
        .validate_payload(&request(
            json!({ "enforce_service_exists": false }),
            mk_ingress(default_backend("non-existent-service")),
        ))
        .await;
    assert!(rsp.accepted, "{rsp:?}");
    assert!(host.lookups().is_empty(), "no lookups when not enforced");
}

#[tokio::test(flavor = "current_thread")]
async fn accepts_ingress_without_services() {
    for settings in [
        json!({}),
        json!({ "enforce_service_exists": true }),
        json!({ "enforce_service_exists": false }),
    ] {
        let (host, validator) = validator();
        let rsp = validator.validate_payload(&request(settings, mk_ingress(json!({})))).await;
        assert!(rsp.accepted, "{rsp:?}");
        assert!(host.lookups().is_empty());
    }
}

#[tokio::test(flavor = "current_thread")]
async fn stops_at_first_missing_service() {
    let (host, validator) = validator();
    let ingress = mk_ingress(json!({
        "defaultBackend": { "service": { "name": "my-service", "port": { "number": 80 } } },
        "rules": [{
            "host": "foo.bar.com",
            "http": { "paths": [
                mk_path("/foo", "my-service"),
                mk_path("/bar", "non-existent-service"),
                mk_path("/baz", "another-missing-service"),
            ] },
        }],
    }));
    let rsp = validator.validate_payload(&request(json!({}), ingress)).await;
    assert_eq!(
        rsp.message.as_deref(),
        Some("Service 'non-existent-service' does not exist in namespace 'default'")
    );
    assert_eq!(rsp.code, None);
    assert_eq!(
        host.lookups(),
        vec![
            GetResource::service("default", "my-service", false),
            GetResource::service("default", "non-existent-service", false),
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn forwards_cache_setting() {
    let (host, validator) = validator();
    let rsp = validator
        .validate_payload(&request(
            json!({ "disable_cache": true }),
            mk_ingress(default_backend("my-service")),
        ))
        .await;
    assert!(rsp.accepted, "{rsp:?}");
    assert_eq!(
        host.lookups(),
        vec![GetResource::service("default", "my-service", true)]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn resolves_nested_settings() {
    let (host, validator) = validator();
    let rsp = validator
        .validate_payload(&request(
            json!({ "signatures": [{ "enforce_service_exists": false }] }),
            mk_ingress(default_backend("non-existent-service")),
        ))
        .await;
    assert!(rsp.accepted, "{rsp:?}");
    assert!(host.lookups().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn rejects_host_failures_without_code() {
    let validator = Validator::new(MockHost::failing("forbidden: cannot get services"));
    let rsp = validator
        .validate_payload(&request(json!({}), mk_ingress(default_backend("my-service"))))
        .await;
    assert_eq!(
        rsp,
        ValidationResponse::reject(
            "Error checking Service 'my-service': host call failed: forbidden: cannot get services"
        )
    );
}

#[tokio::test(flavor = "current_thread")]
async fn uses_request_namespace_when_metadata_has_none() {
    let (host, validator) = validator();
    let payload = serde_json::to_vec(&json!({
        "request": {
            "uid": "test",
            "namespace": "apps",
            "object": {
                "metadata": { "name": "test-ingress" },
                "spec": default_backend("my-service"),
            },
        },
    }))
    .unwrap();
    let rsp = validator.validate_payload(&payload).await;
    assert!(rsp.accepted, "{rsp:?}");
    assert_eq!(
        host.lookups(),
        vec![GetResource::service("apps", "my-service", false)]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn rejects_ingress_without_namespace() {
    let (host, validator) = validator();
    let payload = serde_json::to_vec(&json!({
        "request": {
            "object": {
                "metadata": { "name": "test-ingress" },
                "spec": default_backend("my-service"),
            },
        },
    }))
    .unwrap();
    let rsp = validator.validate_payload(&payload).await;
    assert_eq!(
        rsp,
        ValidationResponse::reject("Error checking Service 'my-service': namespace cannot be empty")
    );
    assert!(host.lookups().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn rejects_malformed_input_as_bad_request() {
    let (host, validator) = validator();

    let rsp = validator.validate_payload(b"{not json").await;
    assert!(!rsp.accepted);
    assert_eq!(rsp.code, Some(BAD_REQUEST));

    let rsp = validator
        .validate_payload(&request(
            json!({ "signatures": [] }),
            mk_ingress(default_backend("my-service")),
        ))
        .await;
    assert_eq!(
        rsp,
        ValidationResponse::bad_request("nested settings contains empty signatures")
    );

    let rsp = validator
        .validate_payload(&request(json!({}), json!({ "spec": {} })))
        .await;
    assert_eq!(rsp, ValidationResponse::bad_request("ingress metadata not found"));

    let rsp = validator
        .validate_payload(&request(
            json!({}),
            mk_ingress(json!({ "rules": [{ "http": { "paths": "/" } }] })),
        ))
        .await;
    assert!(!rsp.accepted);
    assert_eq!(rsp.code, Some(BAD_REQUEST));

    assert!(host.lookups().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn rejects_empty_ingress() {
    let (_, validator) = validator();
    let rsp = validator.validate(ValidationRequest::default()).await;
    assert_eq!(rsp, ValidationResponse::bad_request("empty ingress object"));

    let rsp = validator
        .validate_payload(br#"{"request": {"uid": "test"}, "settings": {}}"#)
        .await;
    assert_eq!(rsp, ValidationResponse::bad_request("empty ingress object"));
}

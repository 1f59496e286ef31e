use crate::{
    admission::Admission,
    capabilities::KubeCapabilities,
    core::{validate_settings, Settings, Validator},
    index::{metrics::IndexMetrics, Index},
    metrics::{AdmissionMetrics, LookupMetrics},
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use serde_json::value::RawValue;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "ingress-policy",
    about = "Admits ingresses whose backend services exist"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress_policy=info,warn",
        env = "INGRESS_POLICY_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// Path to the policy settings, as JSON.
    ///
    /// Settings are validated on startup. When omitted, service existence is enforced.
    #[clap(long, env = "INGRESS_POLICY_SETTINGS")]
    settings: Option<PathBuf>,

    /// Looks up every service on the API server instead of a watch cache.
    #[clap(long)]
    services_cache_disabled: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            settings,
            services_cache_disabled,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let mut prom = <Registry>::default();
        let admission_metrics = AdmissionMetrics::register(&mut prom);
        let lookup_metrics = LookupMetrics::register(&mut prom);

        // The watch feeds the index through the metrics wrapper, while lookups read the index
        // directly.
        let services = if services_cache_disabled {
            None
        } else {
            let index = Index::shared();
            let indexer = IndexMetrics::register(index.clone(), &mut prom).shared();
            Some((index, indexer))
        };

        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        let settings = settings.as_deref().map(load_settings).transpose()?;

        let services = services.map(|(index, indexer)| {
            let watch = runtime.watch_all::<Service>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(indexer, watch).instrument(info_span!("services")),
            );
            index
        });
        if services.is_none() {
            info!("Service cache disabled; all lookups use the API server");
        }

        let host = KubeCapabilities::new(runtime.client(), services, lookup_metrics);
        let admission = Admission::new(Validator::new(host), settings, admission_metrics);
        let runtime = runtime.spawn_server(move || admission.clone());

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// Reads and validates the settings file, returning the settings as they will be embedded in
/// each validation request.
fn load_settings(path: &Path) -> Result<Box<RawValue>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;

    let validation = validate_settings(&raw);
    if !validation.valid {
        bail!(
            "invalid settings in {}: {}",
            path.display(),
            validation.message.unwrap_or_default()
        );
    }

    let settings = Settings::resolve(&raw)
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    info!(
        path = %path.display(),
        enforce_service_exists = settings.enforce_service_exists,
        disable_cache = settings.disable_cache,
        "Loaded settings"
    );

    serde_json::from_slice(&raw).context("failed to encode settings")
}

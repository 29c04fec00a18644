mod api;
mod auth;
mod middleware;
mod oidc;
mod stream;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use finops_connectors::{
    BinaryRunner, FixtureCost, FixtureInfra, FixtureKubeCost, FixtureWaste, KubeCostClient,
    SessionTenantFactory, StaticSessionBroker, TenantSessionProvider,
};
use finops_core::config::{Config, Mode};
use finops_core::ratelimit::{ActivityBudget, ServiceLimiter};
use finops_core::triage::{KubeCostFetcher, WasteFetcher};
use finops_engine::activities::{Activities, TenantClientFactory};
use finops_engine::querier::RuntimeQuerier;
use finops_engine::queues::parse_queues;
use finops_engine::runtime::WorkflowRuntime;
use finops_engine::worker::{WorkerPool, shutdown_channel, shutdown_on_signal};

use crate::api::AppState;
use crate::auth::TokenVerifier;
use crate::stream::StreamConfig;

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = Config::from_env().context("load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_target(false)
        .compact()
        .init();
    if config.otel_enabled {
        tracing::info!("otel export requested; tracer installation is deployment-provided");
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(shutdown_on_signal(shutdown_tx.clone()));

    let selected = parse_queues(&config.worker_queues).context("parse WORKER_QUEUES")?;
    let pool = Arc::new(WorkerPool::new(&selected).context("build worker pool")?);
    let activities = Arc::new(build_activities(&config)?);
    let runtime = WorkflowRuntime::new(activities, pool, shutdown_rx.clone());

    let verifier = build_verifier(&config).await?;
    let state = AppState {
        querier: Arc::new(RuntimeQuerier::new(runtime.store.clone())),
        runtime: Arc::clone(&runtime),
        verifier,
        cors_origins: config.cors_origins.clone(),
        stream: StreamConfig::default(),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.api_port))
        .await
        .with_context(|| format!("bind API port {}", config.api_port))?;
    tracing::info!(
        port = config.api_port,
        queues = ?selected,
        mode = ?config.mode,
        "finops server started"
    );

    let mut serve_shutdown = shutdown_rx.clone();
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            let _ = serve_shutdown.changed().await;
        })
        .await
        .context("serve API")?;

    runtime.drain().await;
    tracing::info!("finops server stopped");
    Ok(())
}

/// Wires the activity dependency bundle for the configured mode. Stub mode
/// reads everything from the fixtures directory; production mode attaches
/// the KubeCost endpoint and the waste-scan binary, with CUR/metrics data
/// still served by the recorded-fixture clients until the cloud connectors
/// are linked in at deployment.
fn build_activities(config: &Config) -> Result<Activities> {
    if config.mode == Mode::Stub && config.fixtures_dir.is_empty() {
        anyhow::bail!("FIXTURES_DIR is required in stub mode");
    }
    let fixtures = config.fixtures_dir.clone();

    let kubecost: Option<Arc<dyn KubeCostFetcher>> = if !config.kubecost_endpoint.is_empty() {
        Some(Arc::new(
            KubeCostClient::new(config.kubecost_endpoint.clone())
                .context("build kubecost client")?,
        ))
    } else if Path::new(&fixtures).join("kubecost_allocation.json").exists() {
        Some(Arc::new(FixtureKubeCost::new(&fixtures)))
    } else {
        None
    };

    let waste: Option<Arc<dyn WasteFetcher>> = match config.mode {
        Mode::Production => Some(Arc::new(BinaryRunner::new(&config.awsdoc_binary_path))),
        Mode::Stub => Path::new(&fixtures)
            .join("waste_report.json")
            .exists()
            .then(|| Arc::new(FixtureWaste::new(&fixtures)) as Arc<dyn WasteFetcher>),
    };

    let limiter = Arc::new(ServiceLimiter::new(config.rates));

    // Tenants with role ARNs get session-scoped clients; the broker behind
    // the session provider is the deployment's STS integration point.
    let tenants: Option<Arc<dyn TenantClientFactory>> = match config.mode {
        Mode::Stub => None,
        Mode::Production => {
            let provider = Arc::new(
                TenantSessionProvider::new(
                    config.aws_region.clone(),
                    StaticSessionBroker::default(),
                )
                .with_limiter(Arc::clone(&limiter)),
            );
            let cost_fixtures = fixtures.clone();
            let infra_fixtures = fixtures.clone();
            Some(Arc::new(SessionTenantFactory::new(
                provider,
                Box::new(move |_session| Arc::new(FixtureCost::new(&cost_fixtures)) as _),
                Box::new(move |_session| Arc::new(FixtureInfra::new(&infra_fixtures)) as _),
            )) as _)
        }
    };

    Ok(Activities {
        cost: Arc::new(FixtureCost::new(&fixtures)),
        infra: Arc::new(FixtureInfra::new(&fixtures)),
        kubecost,
        waste,
        tenants,
        limiter,
        budget: Some(Arc::new(ActivityBudget::new(
            120,
            std::time::Duration::from_secs(60),
        ))),
    })
}

async fn build_verifier(config: &Config) -> Result<Option<Arc<dyn TokenVerifier>>> {
    if !config.oidc_enabled() {
        return Ok(None);
    }
    let verifier = oidc::OidcVerifier::discover(&config.oidc_issuer, &config.oidc_audience)
        .await
        .map_err(|err| anyhow::anyhow!(err))
        .context("OIDC discovery")?;
    Ok(Some(Arc::new(verifier)))
}

//! Server startup: shared state initialization and the serve loop.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use oncall_core::Config;
use oncall_notify::templating::TemplateRenderer;
use oncall_notify::{HttpChannelFactory, RotationNotifier};
use oncall_scheduler::{FileCheckpointStore, RetryPolicy, SystemClock, WorkflowDeps, WorkflowEngine};

use crate::directory::FileDirectory;
use crate::router::build_router;
use crate::state::AppState;

/// Wire the directory, notifier, checkpoint store and engine together.
pub async fn build_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let directory = Arc::new(FileDirectory::new(&config.storage.directory_file));
    match directory.load().await {
        Ok(file) => info!(
            path = %directory.path().display(),
            rotations = file.rotations.len(),
            tenants_with_integration = file.integrations.len(),
            "directory loaded"
        ),
        Err(e) => warn!(error = %e, "directory not readable yet; workflows will retry"),
    }

    let checkpoints = FileCheckpointStore::open(config.storage.workflows_dir())
        .await
        .with_context(|| {
            format!(
                "failed to open checkpoint dir {}",
                config.storage.workflows_dir().display()
            )
        })?;
    info!(path = %checkpoints.dir().display(), "checkpoint store ready");

    let renderer = match &config.notify.message_template {
        Some(template) => TemplateRenderer::with_template(template.clone())
            .context("NOTIFY_MESSAGE_TEMPLATE is not a valid template")?,
        None => TemplateRenderer::new(),
    };

    let notifier = RotationNotifier::new(
        directory.clone(),
        directory.clone(),
        directory.clone(),
        Arc::new(HttpChannelFactory::from_config(&config.notify)),
    )
    .with_renderer(renderer);

    let deps = WorkflowDeps {
        rotations: directory.clone(),
        notifier: Arc::new(notifier),
        checkpoints: Arc::new(checkpoints),
        clock: Arc::new(SystemClock),
        retry: RetryPolicy::from_config(&config.scheduler),
    };
    let engine = Arc::new(WorkflowEngine::new(deps, config.scheduler.max_instances));

    Ok(Arc::new(AppState {
        config,
        rotations: directory,
        engine,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Resume checkpointed workflows and serve HTTP until ctrl-c.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = build_app_state(config).await?;

    if state.config.scheduler.resume_on_start {
        state.engine.resume_from_checkpoints().await;
    }

    let app = build_router(state.clone());

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.engine.shutdown();
    Ok(())
}

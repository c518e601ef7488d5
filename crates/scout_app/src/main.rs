use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scout_app::platform::logging;
use scout_app::{router, AppState, Args, BrowserLauncher, JobStore};
use scout_logging::scout_info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args);

    let config = args.scout_config();
    if let Some(dir) = &config.artifacts_dir {
        scout_engine::ensure_artifact_dir(dir)
            .with_context(|| format!("artifacts directory {}", dir.display()))?;
    }

    let launcher = Arc::new(BrowserLauncher::new(config.clone()));
    let state = AppState::new(JobStore::new(), launcher, config.orchestrator.clone());

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("could not bind {}", args.bind))?;
    scout_info!("Clinic scout listening on http://{}", args.bind);
    scout_info!("Expecting a browser with remote debugging at {}", config.cdp.endpoint);

    axum::serve(listener, router(state))
        .await
        .context("server stopped unexpectedly")?;
    Ok(())
}

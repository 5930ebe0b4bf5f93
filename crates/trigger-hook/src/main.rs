use anyhow::Context as _;
use trigger_hook::env::SystemEnv;
use trigger_hook::signal::wait_for_shutdown;
use trigger_hook::{CommandLauncher, HookConfig, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = HookConfig::from_env(&SystemEnv).context("invalid configuration")?;
    let routing = config.load_routing().context("failed to load routing tables")?;

    for group in routing.unrouted_groups() {
        tracing::warn!(group, "Group has no trigger endpoint; pushes to its repositories are ignored");
    }
    if config.server.secret.is_none() {
        tracing::warn!("GH_SECRET not set, webhook signatures will not be verified");
    }

    tracing::info!(
        bin = %config.trigger.bin.display(),
        timeout_secs = config.trigger.timeout.as_secs(),
        routes_file = ?config.routes_file,
        "Trigger configured"
    );

    let launcher = CommandLauncher::new(config.trigger.bin, config.trigger.timeout);
    serve(config.server, routing, launcher, wait_for_shutdown())
        .await
        .context("webhook server failed")?;

    tracing::info!("Webhook server stopped");
    Ok(())
}

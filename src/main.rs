use anyhow::Result;
use iroduke::Config;
use iroduke::patcher;
use iroduke::pipeline::{self, ReleaseSteps};
use iroduke::telemetry::init_tracing;
use tracing::Level;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::from_cli()?;
    init_tracing(config.log_json, Level::INFO);

    // Both units log their own failures; neither affects the exit status.
    tokio::join!(patcher::apply_all(&config.replacements), fetch_themes(&config));
    Ok(())
}

async fn fetch_themes(config: &Config) {
    if !config.fetch_themes {
        tracing::info!("theme download skipped");
        return;
    }
    match ReleaseSteps::new(config) {
        Ok(steps) => {
            pipeline::run(&steps).await;
        }
        Err(err) => tracing::error!(error = %format!("{err:#}"), "failed to set up theme download"),
    }
}

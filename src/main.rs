use crate::app::App;
use crate::cli::Args;
use crate::logging::setup_logging;
use clap::Parser;
use erp_attendance::config::Config;
use std::process::ExitCode;
use tracing::info;

mod app;
mod cli;
mod logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config and setup logging before anything else so startup logs are never silently dropped
    let config = Config::load().expect("Failed to load config");
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting erp-attendance"
    );

    let app = App::new(config).expect("Failed to initialize application");
    app.run(args.command).await
}

use crate::cli::Command;
use anyhow::Context;
use erp_attendance::config::Config;
use erp_attendance::credential::Credential;
use erp_attendance::driver::chromium::ChromiumLauncher;
use erp_attendance::pipeline::{ExtractionResponse, Extractor};
use erp_attendance::portal::Portal;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Main application struct containing all necessary components
pub struct App {
    portal: Portal,
    extractor: Extractor,
}

impl App {
    /// Create a new App instance from loaded configuration
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let portal = config
            .portal()
            .with_context(|| format!("Invalid portal address: {}", config.base_url))?;
        let launcher = Arc::new(ChromiumLauncher::new(config.launch_settings()));

        info!(
            base_url = %portal.base(),
            headless = config.headless,
            "application configured"
        );

        Ok(App {
            extractor: Extractor::new(launcher, portal.clone(), config.timeouts()),
            portal,
        })
    }

    /// Execute one command and report its outcome as a process exit code
    pub async fn run(self, command: Command) -> ExitCode {
        let result = match command {
            Command::Extract { roll } => self.extract(&roll).await,
            Command::Probe => self.probe().await,
        };
        match result {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!(error = ?e, "command failed");
                ExitCode::FAILURE
            }
        }
    }

    async fn extract(&self, roll: &str) -> Result<bool, anyhow::Error> {
        let Some(credential) = Credential::new(roll) else {
            print_json(&ExtractionResponse::failure("Roll number is required"))?;
            return Ok(false);
        };

        let response = match self.extractor.extract(&credential).await {
            Ok(response) => response,
            Err(e) => {
                let e = anyhow::Error::from(e);
                error!(roll = %credential.masked(), error = ?e, "extraction failed");
                ExtractionResponse::failure(format!("Failed to extract data: {e:#}"))
            }
        };
        print_json(&response)?;
        Ok(response.is_success())
    }

    async fn probe(&self) -> Result<bool, anyhow::Error> {
        let status = self.portal.probe().await;
        print_json(&status)?;
        Ok(status.reachable)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), anyhow::Error> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{rendered}");
    Ok(())
}

//! Errors that abort an extraction outright.
//!
//! Login rejections are not errors: they are reported through
//! [`crate::login::LoginOutcome`] and become a `success: false` response.

use crate::driver::DriverError;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to open browser session")]
    Launch(#[source] DriverError),
    #[error("browser failure during {stage}")]
    Driver {
        stage: &'static str,
        #[source]
        source: DriverError,
    },
}

impl ExtractError {
    pub fn driver(stage: &'static str) -> impl FnOnce(DriverError) -> Self {
        move |source| Self::Driver { stage, source }
    }
}

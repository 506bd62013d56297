//! Leave balance lookup against the published spreadsheet export
//!
//! The sheet is fetched fresh on every lookup; nothing is cached.

use std::time::Duration;

use config_rs::LeaveSheetConfig;
use relay_types::{LeaveBalance, LEAVE_LOOKUP_RETRY_MESSAGE};
use reqwest::Client;

pub mod sheet;

pub use sheet::{parse_sheet, LeaveRecord, LeaveSheet};

/// Lookup failures. They differ in logs only; users always see the same message.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no matching employee record")]
    NotFound,

    #[error("name and credential are both required")]
    EmptyInput,

    #[error("failed to fetch leave sheet: {0}")]
    FetchFailed(String),

    #[error("leave sheet is malformed: {0}")]
    MalformedSheet(String),
}

impl LookupError {
    pub fn user_message(&self) -> &'static str {
        LEAVE_LOOKUP_RETRY_MESSAGE
    }
}

#[derive(Debug, Clone)]
pub struct LeaveLookup {
    client: Client,
    sheet_url: String,
    allow_missing_credential: bool,
}

impl LeaveLookup {
    pub fn new(config: &LeaveSheetConfig, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::FetchFailed(format!("Failed to build HTTP client: {}", e)))?;

        if config.allow_missing_credential {
            log::warn!("Leave lookup accepts rows without a credential (LEAVE_ALLOW_MISSING_CREDENTIAL)");
        }

        Ok(Self {
            client,
            sheet_url: config.sheet_url.clone(),
            allow_missing_credential: config.allow_missing_credential,
        })
    }

    /// Unauthenticated GET of the CSV export
    pub async fn fetch_sheet(&self) -> Result<String, LookupError> {
        let response = self
            .client
            .get(&self.sheet_url)
            .send()
            .await
            .map_err(|e| LookupError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::FetchFailed(format!("sheet answered {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| LookupError::FetchFailed(e.to_string()))
    }

    /// Find the remaining leave days for `name` verified by `credential`
    pub async fn lookup(&self, name: &str, credential: &str) -> Result<LeaveBalance, LookupError> {
        let (name, credential) = (name.trim(), credential.trim());
        if name.is_empty() || credential.is_empty() {
            return Err(LookupError::EmptyInput);
        }

        let text = self.fetch_sheet().await?;
        let sheet = parse_sheet(&text)?;

        sheet
            .find_balance(name, credential, self.allow_missing_credential)
            .ok_or(LookupError::NotFound)
    }
}

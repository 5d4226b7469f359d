//! Google Sheets export
//!
//! Appends normalized rows to a spreadsheet tab in the fixed 16-column order.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use cardex_models::ExtractedRow;
use cardex_utils::{CardexError, CardexResult};

use crate::google_auth::GoogleAuth;

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";

/// Destination for a batch's unique rows.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Number of rows the sink reports as appended; 0 without a call for empty input.
    async fn append_rows(
        &self,
        sheet_id: &str,
        tab: &str,
        rows: &[ExtractedRow],
    ) -> CardexResult<usize>;

    async fn check_connectivity(&self) -> bool;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_rows: Option<usize>,
}

pub struct SheetsService {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
}

impl SheetsService {
    pub fn new(client: Client, auth: Arc<GoogleAuth>) -> Self {
        Self {
            client,
            auth,
            base_url: SHEETS_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn append_url(&self, sheet_id: &str, tab: &str) -> CardexResult<Url> {
        let range = format!("{}!A:P:append", tab);
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CardexError::configuration(format!("Sheets API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CardexError::configuration("Sheets API URL cannot be a base"))?
            .extend(["spreadsheets", sheet_id, "values", range.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl RowSink for SheetsService {
    async fn append_rows(
        &self,
        sheet_id: &str,
        tab: &str,
        rows: &[ExtractedRow],
    ) -> CardexResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let values: Vec<Vec<Value>> = rows.iter().map(ExtractedRow::to_sheet_values).collect();
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(self.append_url(sheet_id, tab)?)
            .bearer_auth(&token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": values }))
            .send()
            .await
            .map_err(sheets_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CardexError::external_service(
                "Google Sheets",
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let body: AppendResponse = response.json().await.map_err(sheets_error)?;
        let appended = body
            .updates
            .and_then(|updates| updates.updated_rows)
            .unwrap_or(values.len());

        info!(sheet_id = %sheet_id, tab = %tab, rows = appended, "sheets_rows_appended");
        Ok(appended)
    }

    async fn check_connectivity(&self) -> bool {
        self.auth.access_token().await.is_ok()
    }
}

fn sheets_error(error: reqwest::Error) -> CardexError {
    CardexError::external_service("Google Sheets", error.to_string())
}

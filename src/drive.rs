use crate::error::{Error, Result};
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

lazy_static! {
    static ref SHEETS_URL_ID: Regex = Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap();
    static ref BARE_ID: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Pulls the spreadsheet ID out of a user-supplied reference: either a
/// `docs.google.com/spreadsheets/d/<id>/...` link or a bare ID.
pub fn parse_spreadsheet_ref(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.contains("docs.google.com/spreadsheets") {
        if let Some(caps) = SHEETS_URL_ID.captures(trimmed) {
            return Ok(caps[1].to_string());
        }
    } else if BARE_ID.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }
    Err(Error::MalformedInput(format!(
        "could not extract a spreadsheet ID from \"{trimmed}\""
    )))
}

#[derive(Debug, Deserialize)]
struct CopiedFile {
    id: String,
}

/// Copies whole files through the Drive API.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Self {
        DriveClient {
            http: reqwest::Client::new(),
            api_base: DEFAULT_DRIVE_API_BASE.to_string(),
            token: token.into(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Copies file `file_id` under `new_name` and returns the copy's ID.
    pub async fn copy_file(&self, file_id: &str, new_name: &str) -> Result<String> {
        info!("copying template {file_id} as \"{new_name}\"");
        let url = format!("{}/files/{}/copy", self.api_base, file_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "name": new_name }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::RemoteApi {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await?;
        let copied: CopiedFile = serde_json::from_slice(&bytes).map_err(|e| {
            Error::MalformedInput(format!("file copy response has no usable id: {e}"))
        })?;
        info!("template copied to {}", copied.id);
        Ok(copied.id)
    }
}

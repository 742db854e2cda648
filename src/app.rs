#![cfg(not(tarpaulin_include))]

use crate::config::{CANVAS_BASE_VAR, CANVAS_TOKEN_VAR, Config, GOOGLE_TOKEN_VAR, env_value, require_token};
use crate::downloader;
use crate::drive::{DriveClient, parse_spreadsheet_ref};
use crate::error::{Error, Result};
use crate::export::GradebookExporter;
use crate::formatter::{FormatOutcome, format_rubrics};
use crate::gradebook::{Extraction, extract};
use crate::loader;
use crate::sheets::SheetsClient;
use log::info;
use std::path::PathBuf;

/// Where the gradebook export comes from.
#[derive(Clone, Debug)]
pub enum GradebookSource {
    File(PathBuf),
    Text(String),
    /// Export through the LMS API; base URL and token come from the
    /// environment.
    Course(String),
}

#[derive(Clone, Debug)]
pub struct RunRequest {
    pub source: GradebookSource,
    /// Link to, or ID of, the template spreadsheet.
    pub template: Option<String>,
    /// Name for the copy of the template.
    pub copy_name: String,
    pub dump: Option<PathBuf>,
    /// Extract (and dump) only; no spreadsheet calls.
    pub dry_run: bool,
    /// Google token; read from the environment when `None`.
    pub google_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub extraction: Extraction,
    pub formatted: Option<FormatOutcome>,
}

pub async fn load_source(config: &Config, source: &GradebookSource) -> Result<String> {
    match source {
        GradebookSource::File(path) => Ok(std::fs::read_to_string(path)?),
        GradebookSource::Text(text) => Ok(text.clone()),
        GradebookSource::Course(course_id) => {
            let base = env_value(CANVAS_BASE_VAR)?;
            let token = env_value(CANVAS_TOKEN_VAR)?;
            GradebookExporter::new(base, token)
                .with_polling(config.export.max_polls, config.poll_interval())
                .fetch_csv(course_id)
                .await
        }
    }
}

/// Parses export text and extracts student records.
pub fn prepare(config: &Config, text: &str) -> Result<Extraction> {
    let grid = loader::parse_grid(text.trim_start_matches('\u{feff}'))?;
    extract(&grid, &config.extract)
}

/// Copies the template and fills the copy from `extraction`.
pub async fn publish(
    config: &Config,
    extraction: &Extraction,
    template: &str,
    copy_name: &str,
    token: &str,
) -> Result<FormatOutcome> {
    let template_id = parse_spreadsheet_ref(template)?;

    let drive = DriveClient::new(token).with_api_base(&config.drive_api_base);
    let copy_id = drive.copy_file(&template_id, copy_name).await?;

    let sheets = SheetsClient::new(copy_id, token, config.rate_limiter())
        .with_api_base(&config.sheets_api_base)
        .with_docs_base(&config.docs_base)
        .with_retry_fallback(config.retry_fallback());
    format_rubrics(&sheets, extraction, &config.format_options()).await
}

/// Full pipeline: source → records → populated spreadsheet.
pub async fn run(config: &Config, request: &RunRequest) -> Result<RunReport> {
    let text = load_source(config, &request.source).await?;
    let extraction = prepare(config, &text)?;

    if let Some(path) = &request.dump {
        downloader::save_csv(&extraction, path)?;
        info!("records written to {}", path.display());
    }

    if request.dry_run {
        return Ok(RunReport {
            extraction,
            formatted: None,
        });
    }

    let token = match &request.google_token {
        Some(t) => require_token(Some(t.clone()), GOOGLE_TOKEN_VAR)?,
        None => env_value(GOOGLE_TOKEN_VAR)?,
    };
    let template = request
        .template
        .as_deref()
        .ok_or_else(|| Error::MalformedInput("no template spreadsheet given".to_string()))?;

    let formatted = publish(config, &extraction, template, &request.copy_name, &token).await?;
    Ok(RunReport {
        extraction,
        formatted: Some(formatted),
    })
}

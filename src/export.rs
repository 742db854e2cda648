#![cfg(not(tarpaulin_include))]

use crate::error::{Error, Result};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_MAX_POLLS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Deserialize)]
struct ExportStarted {
    progress_id: serde_json::Value,
    attachment_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Progress {
    workflow_state: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    url: String,
}

/// Obtains a gradebook CSV from the LMS host: start an export, poll its
/// progress until it completes, then download the attachment.
#[derive(Clone)]
pub struct GradebookExporter {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_polls: u32,
    poll_interval: Duration,
}

impl GradebookExporter {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        GradebookExporter {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            max_polls: DEFAULT_MAX_POLLS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_polling(mut self, max_polls: u32, poll_interval: Duration) -> Self {
        self.max_polls = max_polls;
        self.poll_interval = poll_interval;
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RemoteApi {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(serde_json::from_slice(&resp.bytes().await?)?)
    }

    /// Runs the whole export for `course_id` and returns the CSV text.
    pub async fn fetch_csv(&self, course_id: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/courses/{}/gradebook_csv", self.base_url, course_id))
            .bearer_auth(&self.token)
            .json(&json!({
                "gradebook_csv": {
                    "include_final_grade_overrides": true,
                    "show_inactive_enrollments": false,
                    "include_unposted_grades": false,
                }
            }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RemoteApi {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        let started: ExportStarted = serde_json::from_slice(&resp.bytes().await?)?;
        let progress_id = id_text(&started.progress_id)?;
        let attachment_id = id_text(&started.attachment_id)?;
        info!("gradebook export started (progress {progress_id})");

        let url = self.poll_for_csv_url(&progress_id, &attachment_id).await?;
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RemoteApi {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        let csv = resp.text().await?;
        info!("gradebook CSV downloaded, {} bytes", csv.len());
        Ok(csv)
    }

    /// Polls export progress at a fixed interval, at most `max_polls` times.
    pub async fn poll_for_csv_url(&self, progress_id: &str, attachment_id: &str) -> Result<String> {
        for attempt in 1..=self.max_polls {
            match self
                .get_json::<Progress>(&format!("/api/v1/progress/{progress_id}"))
                .await
            {
                Ok(progress) if progress.workflow_state == "completed" => {
                    match self
                        .get_json::<Attachment>(&format!("/api/v1/files/{attachment_id}"))
                        .await
                    {
                        Ok(attachment) => return Ok(attachment.url),
                        Err(e) => debug!("attachment not ready on poll {attempt}: {e}"),
                    }
                }
                Ok(progress) if progress.workflow_state == "failed" => {
                    return Err(Error::ExportFailed(
                        progress.message.unwrap_or_else(|| "no message".to_string()),
                    ));
                }
                Ok(progress) => debug!("export {} on poll {attempt}", progress.workflow_state),
                Err(e) => debug!("progress poll {attempt} failed: {e}"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(Error::ExportTimeout {
            attempts: self.max_polls,
        })
    }
}

// the host returns ids as numbers or strings depending on version
fn id_text(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::MalformedInput(format!(
            "export response has unusable id: {other}"
        ))),
    }
}

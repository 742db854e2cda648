use crate::cell::{CellRef, column_index_to_letter, sheet_range};
use crate::error::{Error, Result};
use crate::rate_limiter::RateLimiter;
use log::{debug, warn};
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_DOCS_BASE: &str = "https://docs.google.com";

/// Generous fixed window scanned by [`SheetsClient::data_bounds`].
const BOUNDS_SCAN_RANGE: &str = "A1:ZZZ10000";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub properties: SheetProperties,
    #[serde(default)]
    pub data: Vec<GridData>,
}

#[derive(Debug, Deserialize)]
pub struct SpreadsheetInfo {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridData {
    #[serde(default)]
    pub start_row: u32,
    #[serde(default)]
    pub start_column: u32,
    #[serde(default)]
    pub row_data: Vec<RowData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RowData {
    #[serde(default)]
    pub values: Vec<CellData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    pub formatted_value: Option<String>,
    pub effective_format: Option<CellFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    pub text_format: Option<TextFormat>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextFormat {
    pub bold: Option<bool>,
}

/// A range and its values, as read from or written to the values API.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    pub fn single(range: impl Into<String>, value: impl Into<Value>) -> Self {
        ValueRange {
            range: range.into(),
            values: vec![vec![value.into()]],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<Reply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    duplicate_sheet: Option<DuplicateSheetReply>,
}

#[derive(Debug, Deserialize)]
struct DuplicateSheetReply {
    properties: SheetProperties,
}

/// One cell of a tab read together with its formatting.
#[derive(Clone, Debug, PartialEq)]
pub struct FormattedCell {
    /// 1-based position.
    pub at: CellRef,
    pub value: String,
    pub bold: bool,
}

/// Used rectangle of a tab, anchored at A1.
#[derive(Clone, Debug, PartialEq)]
pub struct DataBounds {
    pub last_row: usize,
    pub last_column: String,
    pub range: String,
}

/// Thin typed wrapper over the Sheets v4 REST API for one spreadsheet.
///
/// Every network call waits on the shared [`RateLimiter`] first. A 429
/// response clears the limiter's history, sleeps for the server's
/// `Retry-After` (or the configured fallback) and retries the same call.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    api_base: String,
    docs_base: String,
    spreadsheet_id: String,
    token: String,
    limiter: RateLimiter,
    retry_fallback: Duration,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>, limiter: RateLimiter) -> Self {
        SheetsClient {
            http: reqwest::Client::new(),
            api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            docs_base: DEFAULT_DOCS_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
            limiter,
            retry_fallback: Duration::from_secs(60),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_docs_base(mut self, base: impl Into<String>) -> Self {
        self.docs_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_fallback(mut self, fallback: Duration) -> Self {
        self.retry_fallback = fallback;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn edit_url(&self) -> String {
        format!("{}/spreadsheets/d/{}/edit", self.docs_base, self.spreadsheet_id)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        loop {
            self.limiter.admit().await;
            let usage = self.limiter.usage();
            debug!(
                "{} {} (API usage {}/{}, {:.1}%)",
                method, endpoint, usage.current, usage.max, usage.percentage
            );

            match self.send_once(method.clone(), endpoint, body).await {
                Err(Error::RateLimited { retry_after }) => {
                    warn!("429 from Sheets API, waiting {:?} before retrying", retry_after);
                    self.limiter.reset();
                    tokio::time::sleep(retry_after).await;
                }
                other => return other,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!(
            "{}/spreadsheets/{}{}",
            self.api_base, self.spreadsheet_id, endpoint
        );
        let mut req = self.http.request(method, &url).bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(self.retry_fallback);
            return Err(Error::RateLimited { retry_after });
        }

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("").to_string()
            } else {
                text
            };
            return Err(Error::RemoteApi {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Spreadsheet metadata (tab list).
    pub async fn spreadsheet_info(&self) -> Result<SpreadsheetInfo> {
        self.request(Method::GET, "", None).await
    }

    pub async fn list_sheets(&self) -> Result<Vec<SheetProperties>> {
        let info = self.spreadsheet_info().await?;
        Ok(info.sheets.into_iter().map(|s| s.properties).collect())
    }

    pub async fn find_sheet(&self, title: &str) -> Result<SheetProperties> {
        self.list_sheets()
            .await?
            .into_iter()
            .find(|s| s.title == title)
            .ok_or_else(|| Error::TabNotFound(title.to_string()))
    }

    /// Reads `range` (A1 notation including the tab) with formatting.
    pub async fn cells_with_formatting(&self, range: &str) -> Result<Vec<FormattedCell>> {
        let endpoint = format!(
            "?includeGridData=true&ranges={}",
            urlencoding::encode(range)
        );
        let info: SpreadsheetInfo = self.request(Method::GET, &endpoint, None).await?;

        let Some(grid) = info.sheets.into_iter().next().and_then(|s| s.data.into_iter().next())
        else {
            return Ok(Vec::new());
        };

        let mut cells = Vec::new();
        for (r, row) in grid.row_data.into_iter().enumerate() {
            for (c, cell) in row.values.into_iter().enumerate() {
                let bold = cell
                    .effective_format
                    .and_then(|f| f.text_format)
                    .and_then(|t| t.bold)
                    .unwrap_or(false);
                cells.push(FormattedCell {
                    at: CellRef::new(
                        grid.start_row + r as u32 + 1,
                        grid.start_column + c as u32 + 1,
                    ),
                    value: cell.formatted_value.unwrap_or_default(),
                    bold,
                });
            }
        }
        Ok(cells)
    }

    pub async fn read_range(&self, range: &str) -> Result<ValueRange> {
        let endpoint = format!("/values/{}", urlencoding::encode(range));
        self.request(Method::GET, &endpoint, None).await
    }

    pub async fn write_range(&self, range: &str, values: Vec<Vec<Value>>) -> Result<()> {
        let endpoint = format!(
            "/values/{}?valueInputOption=USER_ENTERED",
            urlencoding::encode(range)
        );
        let body = json!({ "values": values });
        self.request::<Value>(Method::PUT, &endpoint, Some(&body)).await?;
        Ok(())
    }

    /// Writes one value at a 1-based position of `title`.
    pub async fn write_cell(&self, title: &str, at: CellRef, value: impl Into<Value>) -> Result<()> {
        let a1 = at
            .a1()
            .ok_or_else(|| Error::MalformedInput(format!("no A1 name for {at:?}")))?;
        self.write_range(&sheet_range(title, &a1), vec![vec![value.into()]])
            .await
    }

    pub async fn append_rows(&self, range: &str, values: Vec<Vec<Value>>) -> Result<()> {
        let endpoint = format!(
            "/values/{}:append?valueInputOption=USER_ENTERED",
            urlencoding::encode(range)
        );
        let body = json!({ "values": values });
        self.request::<Value>(Method::POST, &endpoint, Some(&body)).await?;
        Ok(())
    }

    pub async fn clear_range(&self, range: &str) -> Result<()> {
        let endpoint = format!("/values/{}:clear", urlencoding::encode(range));
        self.request::<Value>(Method::POST, &endpoint, Some(&json!({})))
            .await?;
        Ok(())
    }

    pub async fn batch_get(&self, ranges: &[String]) -> Result<Vec<ValueRange>> {
        let query = ranges
            .iter()
            .map(|r| format!("ranges={}", urlencoding::encode(r)))
            .collect::<Vec<_>>()
            .join("&");
        let resp: BatchGetResponse = self
            .request(Method::GET, &format!("/values:batchGet?{query}"), None)
            .await?;
        Ok(resp.value_ranges)
    }

    /// Writes several ranges in one call.
    pub async fn batch_write(&self, data: &[ValueRange]) -> Result<()> {
        let body = json!({
            "valueInputOption": "USER_ENTERED",
            "data": data,
        });
        self.request::<Value>(Method::POST, "/values:batchUpdate", Some(&body))
            .await?;
        Ok(())
    }

    async fn batch_update(&self, requests: Vec<Value>) -> Result<BatchUpdateResponse> {
        let body = json!({ "requests": requests });
        self.request(Method::POST, ":batchUpdate", Some(&body)).await
    }

    /// Copies tab `source_sheet_id`, inserting the copy at index 1.
    pub async fn duplicate_sheet(
        &self,
        source_sheet_id: i64,
        new_name: Option<&str>,
    ) -> Result<SheetProperties> {
        let request = json!({
            "duplicateSheet": {
                "sourceSheetId": source_sheet_id,
                "insertSheetIndex": 1,
                "newSheetName": new_name,
            }
        });
        let resp = self.batch_update(vec![request]).await?;
        resp.replies
            .into_iter()
            .next()
            .and_then(|r| r.duplicate_sheet)
            .map(|d| d.properties)
            .ok_or_else(|| {
                Error::MalformedInput("duplicateSheet reply missing from batchUpdate".to_string())
            })
    }

    pub async fn duplicate_sheet_by_title(
        &self,
        title: &str,
        new_name: Option<&str>,
    ) -> Result<SheetProperties> {
        let source = self.find_sheet(title).await?;
        self.duplicate_sheet(source.sheet_id, new_name).await
    }

    /// Moves tabs so those named in `desired_order` sit at their position in
    /// it. Tabs already in place are left alone; unknown titles are ignored.
    /// Returns the number of tabs moved.
    pub async fn reorder_sheets(&self, desired_order: &[String]) -> Result<usize> {
        let current = self.list_sheets().await?;
        let requests: Vec<Value> = reorder_requests(&current, desired_order);

        let moved = requests.len();
        if moved > 0 {
            debug!("reordering {moved} tabs");
            self.batch_update(requests).await?;
        }
        Ok(moved)
    }

    pub async fn reorder_sheets_alphabetically(&self) -> Result<usize> {
        let mut titles: Vec<String> = self
            .list_sheets()
            .await?
            .into_iter()
            .map(|s| s.title)
            .collect();
        titles.sort();
        self.reorder_sheets(&titles).await
    }

    /// Finds the used rectangle of tab `title` by reading a large fixed range.
    pub async fn data_bounds(&self, title: &str) -> Result<DataBounds> {
        let read = self.read_range(&sheet_range(title, BOUNDS_SCAN_RANGE)).await?;

        let last_row = read.values.len();
        let max_col = read.values.iter().map(Vec::len).max().unwrap_or(0);
        if last_row == 0 || max_col == 0 {
            return Ok(DataBounds {
                last_row: 0,
                last_column: "A".to_string(),
                range: sheet_range(title, "A1:A1"),
            });
        }

        let last_column = column_index_to_letter(max_col - 1);
        let range = sheet_range(title, &format!("A1:{last_column}{last_row}"));
        Ok(DataBounds {
            last_row,
            last_column,
            range,
        })
    }
}

/// Requests that move tabs into `desired_order`, applied one after another.
/// Each tab is moved only if the moves before it left it out of place.
fn reorder_requests(current: &[SheetProperties], desired_order: &[String]) -> Vec<Value> {
    let mut sorted: Vec<&SheetProperties> = current.iter().collect();
    sorted.sort_by_key(|s| s.index);
    let mut order: Vec<(i64, &str)> = sorted.iter().map(|s| (s.sheet_id, s.title.as_str())).collect();

    let mut requests = Vec::new();
    let mut target = 0;
    for title in desired_order {
        let Some(pos) = order.iter().position(|(_, t)| t == title) else {
            continue;
        };
        if pos != target {
            let tab = order.remove(pos);
            order.insert(target, tab);
            requests.push(json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": tab.0, "index": target },
                    "fields": "index",
                }
            }));
        }
        target += 1;
    }
    requests
}

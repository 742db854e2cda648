// In-process stand-in for the Sheets and Drive endpoints the crate talks to.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use rubricsheet::config::Config;
use rubricsheet::{RateLimiter, SheetsClient};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: Value,
}

#[derive(Clone, Debug)]
pub struct TemplateCell {
    pub row: usize,
    pub col: usize,
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    /// (sheetId, title) in tab order.
    pub tabs: Vec<(i64, String)>,
    pub template: Vec<TemplateCell>,
    pub next_sheet_id: i64,
    /// Answer this many requests with 429 before behaving.
    pub throttle: usize,
    pub retry_after: Option<String>,
    /// Fail any duplicateSheet request with this status.
    pub fail_duplicates: Option<u16>,
}

impl MockState {
    pub fn with_template(cells: Vec<TemplateCell>) -> Self {
        MockState {
            tabs: vec![(0, "Sheet1".to_string())],
            template: cells,
            next_sheet_id: 100,
            ..MockState::default()
        }
    }

    pub fn tab_titles(&self) -> Vec<String> {
        self.tabs.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn calls_matching(&self, f: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls.iter().filter(|c| f(c)).cloned().collect()
    }
}

pub fn label(row: usize, col: usize, text: &str, bold: bool) -> TemplateCell {
    TemplateCell {
        row,
        col,
        text: text.to_string(),
        bold,
    }
}

pub struct MockServer {
    pub base: String,
    pub state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        MockServer {
            base: format!("http://{addr}"),
            state,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            sheets_api_base: format!("{}/v4", self.base),
            drive_api_base: format!("{}/drive", self.base),
            docs_base: "https://docs.example".to_string(),
            ..Config::default()
        }
    }

    pub fn client(&self, spreadsheet_id: &str, limiter: RateLimiter) -> SheetsClient {
        SheetsClient::new(spreadsheet_id, "test-token", limiter)
            .with_api_base(format!("{}/v4", self.base))
            .with_docs_base("https://docs.example")
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }
}

pub fn is_duplicate(call: &Call) -> bool {
    call.path.ends_with(":batchUpdate")
        && !call.path.ends_with("values:batchUpdate")
        && call.body["requests"][0].get("duplicateSheet").is_some()
}

pub fn is_reorder(call: &Call) -> bool {
    call.path.ends_with(":batchUpdate")
        && !call.path.ends_with("values:batchUpdate")
        && call.body["requests"][0].get("updateSheetProperties").is_some()
}

pub fn is_value_write(call: &Call) -> bool {
    call.path.ends_with("/values:batchUpdate")
}

async fn handle(
    State(state): State<Arc<Mutex<MockState>>>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    let path = urlencoding::decode(uri.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| uri.path().to_string());
    let query = uri
        .query()
        .map(|q| urlencoding::decode(q).map(|d| d.into_owned()).unwrap_or_default())
        .unwrap_or_default();
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    let mut st = state.lock().unwrap();
    st.calls.push(Call {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        body: body.clone(),
    });

    if st.throttle > 0 {
        st.throttle -= 1;
        return match st.retry_after.clone() {
            Some(secs) => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, secs)],
                "quota exceeded",
            )
                .into_response(),
            None => (StatusCode::TOO_MANY_REQUESTS, "quota exceeded").into_response(),
        };
    }

    if path.starts_with("/drive/files/") && path.ends_with("/copy") {
        return Json(json!({ "id": "copy-1", "name": body["name"] })).into_response();
    }

    if path.ends_with("/values:batchUpdate") {
        let updated = body["data"].as_array().map(Vec::len).unwrap_or(0);
        return Json(json!({ "totalUpdatedCells": updated })).into_response();
    }

    if path.ends_with(":batchUpdate") {
        return batch_update(&mut st, &body);
    }

    if path.ends_with("/values:batchGet") {
        let ranges: Vec<Value> = query
            .split('&')
            .filter_map(|kv| kv.strip_prefix("ranges="))
            .map(|r| json!({ "range": r, "values": [["x"]] }))
            .collect();
        return Json(json!({ "valueRanges": ranges })).into_response();
    }

    if method == Method::PUT || path.ends_with(":append") || path.ends_with(":clear") {
        return Json(json!({ "updatedCells": 1 })).into_response();
    }

    if method == Method::GET && path.contains("/values/") {
        if !path.contains("Sheet1") {
            return (StatusCode::NOT_FOUND, "Unable to parse range").into_response();
        }
        return Json(json!({ "range": "Sheet1!A1:ZZZ10000", "values": template_values(&st.template) }))
            .into_response();
    }

    if method == Method::GET && query.contains("includeGridData=true") {
        return Json(json!({
            "sheets": [{
                "properties": { "sheetId": 0, "title": "Sheet1", "index": 0 },
                "data": [{ "rowData": template_row_data(&st.template) }]
            }]
        }))
        .into_response();
    }

    if method == Method::GET {
        let sheets: Vec<Value> = st
            .tabs
            .iter()
            .enumerate()
            .map(|(i, (id, title))| {
                json!({ "properties": { "sheetId": id, "title": title, "index": i } })
            })
            .collect();
        return Json(json!({ "sheets": sheets })).into_response();
    }

    (StatusCode::NOT_FOUND, format!("unmocked {method} {path}")).into_response()
}

fn batch_update(st: &mut MockState, body: &Value) -> Response {
    let requests = body["requests"].as_array().cloned().unwrap_or_default();
    let mut replies = Vec::new();

    for request in requests {
        if let Some(dup) = request.get("duplicateSheet") {
            if let Some(status) = st.fail_duplicates {
                return (
                    StatusCode::from_u16(status).unwrap(),
                    "duplicate refused",
                )
                    .into_response();
            }
            let title = dup["newSheetName"].as_str().unwrap_or("Copy").to_string();
            if st.tabs.iter().any(|(_, t)| *t == title) {
                return (StatusCode::BAD_REQUEST, "duplicate sheet name").into_response();
            }
            let id = st.next_sheet_id;
            st.next_sheet_id += 1;
            let at = (dup["insertSheetIndex"].as_u64().unwrap_or(1) as usize).min(st.tabs.len());
            st.tabs.insert(at, (id, title.clone()));
            replies.push(json!({
                "duplicateSheet": { "properties": { "sheetId": id, "title": title, "index": at } }
            }));
        } else if let Some(update) = request.get("updateSheetProperties") {
            let id = update["properties"]["sheetId"].as_i64().unwrap_or(-1);
            let target = update["properties"]["index"].as_u64().unwrap_or(0) as usize;
            if let Some(pos) = st.tabs.iter().position(|(sid, _)| *sid == id) {
                let tab = st.tabs.remove(pos);
                let target = target.min(st.tabs.len());
                st.tabs.insert(target, tab);
            }
            replies.push(json!({}));
        }
    }

    Json(json!({ "spreadsheetId": "copy-1", "replies": replies })).into_response()
}

fn template_extent(cells: &[TemplateCell]) -> (usize, usize) {
    let rows = cells.iter().map(|c| c.row).max().unwrap_or(0);
    let cols = cells.iter().map(|c| c.col).max().unwrap_or(0);
    (rows, cols)
}

fn template_values(cells: &[TemplateCell]) -> Vec<Vec<String>> {
    let (rows, cols) = template_extent(cells);
    let mut grid = vec![vec![String::new(); cols]; rows];
    for c in cells {
        grid[c.row - 1][c.col - 1] = c.text.clone();
    }
    grid
}

fn template_row_data(cells: &[TemplateCell]) -> Vec<Value> {
    let (rows, cols) = template_extent(cells);
    (1..=rows)
        .map(|r| {
            let values: Vec<Value> = (1..=cols)
                .map(|c| match cells.iter().find(|t| t.row == r && t.col == c) {
                    Some(t) => json!({
                        "formattedValue": t.text,
                        "effectiveFormat": { "textFormat": { "bold": t.bold } }
                    }),
                    None => json!({}),
                })
                .collect();
            json!({ "values": values })
        })
        .collect()
}

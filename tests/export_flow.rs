use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rubricsheet::Error;
use rubricsheet::export::GradebookExporter;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone, Copy, PartialEq)]
enum Outcome {
    CompletesAfter(usize),
    Fails,
    NeverFinishes,
}

struct Lms {
    base: String,
    outcome: Outcome,
    polls: usize,
}

type Shared = Arc<Mutex<Lms>>;

async fn start_export(Path(course): Path<String>) -> Json<Value> {
    assert_eq!(course, "1234");
    Json(json!({ "progress_id": 77, "attachment_id": "555" }))
}

async fn progress(State(lms): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    assert_eq!(id, "77");
    let mut lms = lms.lock().unwrap();
    lms.polls += 1;
    let state = match lms.outcome {
        Outcome::CompletesAfter(n) if lms.polls >= n => "completed",
        Outcome::Fails => "failed",
        _ => "running",
    };
    Json(json!({ "workflow_state": state, "message": "export crashed" }))
}

async fn attachment(State(lms): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    assert_eq!(id, "555");
    let base = lms.lock().unwrap().base.clone();
    Json(json!({ "url": format!("{base}/download/grades.csv") }))
}

async fn download() -> &'static str {
    "Student,ID\n    Points Possible,\n"
}

async fn lms(outcome: Outcome) -> (GradebookExporter, Shared) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shared = Arc::new(Mutex::new(Lms {
        base: base.clone(),
        outcome,
        polls: 0,
    }));

    let app = Router::new()
        .route("/courses/:course/gradebook_csv", post(start_export))
        .route("/api/v1/progress/:id", get(progress))
        .route("/api/v1/files/:id", get(attachment))
        .route("/download/grades.csv", get(download))
        .with_state(Arc::clone(&shared));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let exporter =
        GradebookExporter::new(base, "canvas-token").with_polling(4, Duration::from_millis(5));
    (exporter, shared)
}

#[tokio::test]
async fn completed_export_is_downloaded() {
    let (exporter, shared) = lms(Outcome::CompletesAfter(3)).await;

    let csv = exporter.fetch_csv("1234").await.unwrap();
    assert!(csv.contains("Points Possible"));
    assert_eq!(shared.lock().unwrap().polls, 3);
}

#[tokio::test]
async fn failed_export_reports_host_message() {
    let (exporter, shared) = lms(Outcome::Fails).await;

    let err = exporter.fetch_csv("1234").await.unwrap_err();
    assert!(matches!(err, Error::ExportFailed(ref m) if m == "export crashed"), "{err:?}");
    assert_eq!(shared.lock().unwrap().polls, 1);
}

#[tokio::test]
async fn polling_gives_up_after_bound() {
    let (exporter, shared) = lms(Outcome::NeverFinishes).await;

    let err = exporter.fetch_csv("1234").await.unwrap_err();
    assert!(matches!(err, Error::ExportTimeout { attempts: 4 }), "{err:?}");
    assert_eq!(shared.lock().unwrap().polls, 4);
}

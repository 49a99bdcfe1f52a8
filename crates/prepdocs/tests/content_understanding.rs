//! Content Understanding client against an in-process fake service

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use prepdocs::enrichment::{ContentUnderstandingDescriber, MediaDescriber, PollPolicy};
use prepdocs::providers::StaticTokenCredential;
use prepdocs::Error;

const ANALYZER_PATH: &str = "/contentunderstanding/analyzers/image_analyzer";

struct FakeService {
    base_url: String,
    put_status: StatusCode,
    operations: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<String>>,
    authorization: Mutex<Vec<String>>,
}

impl FakeService {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

async fn handle(
    State(service): State<Arc<FakeService>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_string();
    service.requests.lock().push(format!("{} {}", method, path));
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        service.authorization.lock().push(auth.to_string());
    }

    let operation = |name: &str| format!("{}/operations/{}", service.base_url, name);

    match (method, path.as_str()) {
        (Method::PUT, ANALYZER_PATH) => {
            if service.put_status == StatusCode::CREATED {
                (
                    StatusCode::CREATED,
                    [("operation-location", operation("create"))],
                    Json(json!({"status": "Running"})),
                )
                    .into_response()
            } else {
                (service.put_status, "analyzer backend exploded").into_response()
            }
        }
        (Method::POST, p) if p == format!("{}:analyze", ANALYZER_PATH) => (
            StatusCode::ACCEPTED,
            [("operation-location", operation("analyze"))],
            Json(json!({"status": "Running"})),
        )
            .into_response(),
        (Method::GET, p) if p.starts_with("/operations/") => {
            let next = service
                .operations
                .lock()
                .pop_front()
                .unwrap_or_else(|| json!({"status": "Running"}));
            Json(next).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start(put_status: StatusCode, operations: Vec<Value>) -> Arc<FakeService> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = Arc::new(FakeService {
        base_url: format!("http://{}", addr),
        put_status,
        operations: Mutex::new(operations.into()),
        requests: Mutex::new(Vec::new()),
        authorization: Mutex::new(Vec::new()),
    });

    let app = Router::new().fallback(handle).with_state(service.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    service
}

fn describer(service: &FakeService, attempts: u32) -> ContentUnderstandingDescriber {
    ContentUnderstandingDescriber::new(
        service.base_url.clone(),
        Arc::new(StaticTokenCredential::new("t0k")),
    )
    .unwrap()
    .with_poll_policy(PollPolicy::new(attempts, Duration::ZERO))
}

fn analysis(description: Option<&str>) -> Value {
    let fields = match description {
        Some(text) => json!({"Description": {"type": "string", "valueString": text}}),
        None => json!({}),
    };
    json!({"status": "Succeeded", "result": {"contents": [{"fields": fields}]}})
}

#[tokio::test]
async fn test_existing_analyzer_is_not_polled() {
    let service = start(StatusCode::CONFLICT, Vec::new()).await;

    describer(&service, 60).create_analyzer().await.unwrap();

    assert_eq!(service.requests(), vec![format!("PUT {}", ANALYZER_PATH)]);
    assert_eq!(service.authorization.lock()[0], "Bearer t0k");
}

#[tokio::test]
async fn test_created_analyzer_is_polled_to_completion() {
    let service = start(
        StatusCode::CREATED,
        vec![json!({"status": "Running"}), json!({"status": "Succeeded"})],
    )
    .await;

    describer(&service, 60).create_analyzer().await.unwrap();

    assert_eq!(
        service.requests(),
        vec![
            format!("PUT {}", ANALYZER_PATH),
            "GET /operations/create".to_string(),
            "GET /operations/create".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_unexpected_status_is_fatal() {
    let service = start(StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).await;

    let error = describer(&service, 60).create_analyzer().await.unwrap_err();

    match &error {
        Error::AnalyzerCreation { status, body } => {
            assert_eq!(*status, 500);
            assert!(body.contains("exploded"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(error.is_fatal());
    assert_eq!(service.requests().len(), 1);
}

#[tokio::test]
async fn test_describe_image_returns_description() {
    let service = start(
        StatusCode::CONFLICT,
        vec![json!({"status": "Running"}), analysis(Some("A bar chart of sales"))],
    )
    .await;

    let description = describer(&service, 60)
        .describe_image(b"\x89PNG fake")
        .await
        .unwrap();

    assert_eq!(description, "A bar chart of sales");
    assert_eq!(
        service.requests(),
        vec![
            format!("POST {}:analyze", ANALYZER_PATH),
            "GET /operations/analyze".to_string(),
            "GET /operations/analyze".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_describe_image_without_description_is_format_error() {
    let service = start(StatusCode::CONFLICT, vec![analysis(None)]).await;

    let result = describer(&service, 60).describe_image(b"img").await;
    assert!(matches!(result, Err(Error::Format(_))));
}

#[tokio::test]
async fn test_failed_operation_stops_polling() {
    let service = start(
        StatusCode::CONFLICT,
        vec![json!({"status": "Failed", "error": {"code": "InvalidImage"}})],
    )
    .await;

    let result = describer(&service, 60).describe_image(b"img").await;

    assert!(matches!(result, Err(Error::EnrichmentFailed(_))));
    assert_eq!(service.requests().len(), 2);
}

#[tokio::test]
async fn test_poll_budget_exhaustion_is_timeout() {
    let service = start(StatusCode::CONFLICT, Vec::new()).await;

    let result = describer(&service, 3).describe_image(b"img").await;

    assert!(matches!(result, Err(Error::EnrichmentTimeout { attempts: 3 })));
    let polls = service
        .requests()
        .iter()
        .filter(|r| r.starts_with("GET"))
        .count();
    assert_eq!(polls, 3);
}

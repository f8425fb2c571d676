//! JSON HTTP front end.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check |
//! | `GET`  | `/indexes` | Complete indexes under the indexes root |
//! | `POST` | `/ask` | Answer a question against one index |
//!
//! Errors are `{"detail": "..."}` with 400, 404 or 500. Unexpected failures are
//! logged and returned as an opaque 500 unless `REPO_QA_EXPOSE_ERRORS` is set.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::indexes::{list_indexes, IndexLookupError};
use crate::orchestrator::pipeline::{AskError, AskResponse, QaService};

#[derive(Clone)]
struct AppState {
    service: Arc<QaService>,
}

pub fn router(service: Arc<QaService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/indexes", get(handle_indexes))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(AppState { service })
}

pub async fn run_server(service: Arc<QaService>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    index: String,
    question: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct IndexEntry {
    name: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: rejection.body_text(),
        }
    }
}

impl AppError {
    fn internal(err: &anyhow::Error, expose: bool) -> Self {
        error!(?err, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: if expose {
                format!("{err:#}")
            } else {
                "internal error".to_string()
            },
        }
    }

    fn from_ask(err: AskError, expose: bool) -> Self {
        match err {
            AskError::Lookup(IndexLookupError::NotFound(name)) => Self {
                status: StatusCode::NOT_FOUND,
                detail: IndexLookupError::NotFound(name).to_string(),
            },
            AskError::Lookup(lookup) => Self {
                status: StatusCode::BAD_REQUEST,
                detail: lookup.to_string(),
            },
            AskError::EmptyQuestion => Self {
                status: StatusCode::BAD_REQUEST,
                detail: AskError::EmptyQuestion.to_string(),
            },
            AskError::Failed(err) => Self::internal(&err, expose),
        }
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_indexes(State(state): State<AppState>) -> Result<Json<Vec<IndexEntry>>, AppError> {
    let config = state.service.config();
    let names = list_indexes(&config.indexes_dir)
        .map_err(|err| AppError::internal(&err, config.expose_errors))?;
    Ok(Json(
        names.into_iter().map(|name| IndexEntry { name }).collect(),
    ))
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(request) = payload?;
    let expose = state.service.config().expose_errors;
    state
        .service
        .ask(&request.index, &request.question)
        .await
        .map(Json)
        .map_err(|err| AppError::from_ask(err, expose))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm_client::EchoLlmClient;
    use crate::rag::mock::LetterEmbeddings;
    use chrono::Utc;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "repo-qa-{label}-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or(0)
        ))
    }

    fn state(indexes_dir: PathBuf) -> AppState {
        let mut config = AppConfig::from_lookup(|key| (key == "MODE").then(|| "echo".to_string()))
            .expect("echo config");
        config.indexes_dir = indexes_dir;
        config.history_dir = temp_dir("server-history");
        AppState {
            service: Arc::new(QaService::with_clients(
                Arc::new(config),
                EchoLlmClient::shared(),
                EchoLlmClient::shared(),
                Arc::new(LetterEmbeddings::default()),
            )),
        }
    }

    async fn ask_status(state: AppState, index: &str, question: &str) -> StatusCode {
        let request = AskRequest {
            index: index.to_string(),
            question: question.to_string(),
        };
        match handle_ask(State(state), Ok(Json(request))).await {
            Ok(_) => StatusCode::OK,
            Err(err) => err.into_response().status(),
        }
    }

    #[tokio::test]
    async fn ask_maps_lookup_errors_to_client_statuses() {
        let root = temp_dir("server-root");
        fs::create_dir_all(&root).expect("create root");
        let state = state(root.clone());

        assert_eq!(ask_status(state.clone(), "", "hi").await, StatusCode::BAD_REQUEST);
        assert_eq!(
            ask_status(state.clone(), "../../etc", "hi").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ask_status(state.clone(), "missing", "hi").await,
            StatusCode::NOT_FOUND
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn malformed_ask_body_gets_detail_response() {
        use axum::body::{to_bytes, Body};
        use axum::extract::FromRequest;
        use axum::http::{header, Request};

        let request = Request::builder()
            .method("POST")
            .uri("/ask")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"index\": \"payments\""))
            .expect("request");
        let rejection = Json::<AskRequest>::from_request(request, &())
            .await
            .expect_err("truncated body");

        let root = temp_dir("server-malformed");
        let response = match handle_ask(State(state(root)), Err(rejection)).await {
            Ok(_) => panic!("malformed body was accepted"),
            Err(err) => err.into_response(),
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert!(body["detail"].as_str().is_some_and(|detail| !detail.is_empty()));
    }

    #[test]
    fn runtime_failures_are_opaque_unless_exposed() {
        let err = AskError::Failed(anyhow::anyhow!("database password leaked"));
        let hidden = AppError::from_ask(err, false);
        assert_eq!(hidden.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(hidden.detail, "internal error");

        let err = AskError::Failed(anyhow::anyhow!("embedding timeout"));
        let shown = AppError::from_ask(err, true);
        assert!(shown.detail.contains("embedding timeout"));
    }

    #[tokio::test]
    async fn indexes_lists_complete_indexes() {
        let root = temp_dir("server-indexes");
        fs::create_dir_all(root.join("payments")).expect("create index");
        fs::write(
            root.join("payments").join(crate::rag::local::LocalVectorStore::FILE_NAME),
            "{}",
        )
        .expect("write marker");
        fs::create_dir_all(root.join("partial")).expect("create partial");

        let Json(entries) = handle_indexes(State(state(root.clone())))
            .await
            .expect("list indexes");
        assert_eq!(
            entries,
            vec![IndexEntry {
                name: "payments".to_string()
            }]
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = handle_health().await;
        assert_eq!(body["status"], "ok");
    }
}

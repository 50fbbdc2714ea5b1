//! REST endpoints for chat turns, greetings, registration and progress.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use super::orchestrator::{MentorOrchestrator, NewStudent};
use crate::error::MentorError;

/// Shared state for mentor routes.
#[derive(Clone)]
pub struct MentorRouteState {
    pub mentor: Arc<MentorOrchestrator>,
}

#[derive(Debug, Deserialize)]
struct StudentQuery {
    #[serde(rename = "studentId")]
    student_id: Option<String>,
}

/// Map a mentor error to its HTTP status and `{ "error": ... }` body.
fn error_response(err: MentorError) -> Response {
    let status = match &err {
        MentorError::Validation(_) => StatusCode::BAD_REQUEST,
        MentorError::Unauthenticated => StatusCode::UNAUTHORIZED,
        MentorError::StudentNotFound { .. } => StatusCode::NOT_FOUND,
        MentorError::StudentExists { .. } => StatusCode::CONFLICT,
        MentorError::Generation(_) => StatusCode::SERVICE_UNAVAILABLE,
        MentorError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &err {
        MentorError::Persistence(e) => {
            error!(error = %e, "Mentor request failed");
            "Internal server error".to_string()
        }
        MentorError::Generation(e) => {
            warn!(error = %e, "Mentor reply generation failed");
            "The mentor is unavailable right now, please try again".to_string()
        }
        other => other.to_string(),
    };

    (status, Json(json!({ "error": message }))).into_response()
}

fn body_or_400(body: Result<Json<Value>, JsonRejection>) -> Result<Value, Response> {
    body.map(|Json(v)| v).map_err(|rejection| {
        error_response(MentorError::Validation(rejection.body_text()))
    })
}

fn string_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

/// POST /api/chat
///
/// `{ studentId, message }` → `{ message, checkpointAdvanced, newCheckpoint }`.
async fn post_chat(
    State(state): State<MentorRouteState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body_or_400(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let Some(student_id) = string_field(&body, "studentId") else {
        return error_response(MentorError::Unauthenticated);
    };
    let Some(message) = string_field(&body, "message") else {
        return error_response(MentorError::Validation("Message is required".to_string()));
    };

    match state.mentor.handle_turn(student_id, message).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/chat/initial?studentId=
///
/// The greeting for the student's current checkpoint.
async fn get_initial(
    State(state): State<MentorRouteState>,
    Query(query): Query<StudentQuery>,
) -> Response {
    let student_id = query.student_id.unwrap_or_default();
    match state.mentor.initial_message(&student_id).await {
        Ok(initial) => Json(initial).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/student
///
/// `{ studentId, name, grade? }` → `{ success, student }`.
async fn post_student(
    State(state): State<MentorRouteState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body_or_400(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let Some(student_id) = string_field(&body, "studentId") else {
        return error_response(MentorError::Unauthenticated);
    };
    let name = string_field(&body, "name").unwrap_or_default();
    let grade = match body.get("grade") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64().and_then(|g| u8::try_from(g).ok()) {
            Some(g) => Some(g),
            None => {
                return error_response(MentorError::Validation(
                    "Grade must be a small whole number".to_string(),
                ));
            }
        },
    };

    let new = NewStudent {
        id: student_id.to_string(),
        name: name.to_string(),
        grade,
    };
    match state.mentor.register_student(new).await {
        Ok(student) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "student": student })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/student?studentId=
///
/// The student's progress dashboard.
async fn get_student(
    State(state): State<MentorRouteState>,
    Query(query): Query<StudentQuery>,
) -> Response {
    let student_id = query.student_id.unwrap_or_default();
    match state.mentor.progress(&student_id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => error_response(e),
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Build the mentor REST routes.
pub fn mentor_routes(state: MentorRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(post_chat))
        .route("/api/chat/initial", get(get_initial))
        .route("/api/student", post(post_student).get(get_student))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::MentorConfig;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::store::LibSqlBackend;

    struct EchoLlm {
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            if self.fail {
                return Err(LlmError::RateLimited {
                    provider: "echo".into(),
                    retry_after: None,
                });
            }
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(CompletionResponse {
                content: format!("You said: {last}"),
                ..Default::default()
            })
        }
    }

    async fn app(fail: bool) -> Router {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mentor = MentorOrchestrator::new(db, Arc::new(EchoLlm { fail }), MentorConfig::default());
        mentor
            .register_student(NewStudent {
                id: "s1".into(),
                name: "Ada".into(),
                grade: Some(7),
            })
            .await
            .unwrap();
        mentor_routes(MentorRouteState {
            mentor: Arc::new(mentor),
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn chat_turn_advances() {
        let app = app(false).await;
        let (status, body) = send(
            &app,
            post_json("/api/chat", json!({"studentId": "s1", "message": "my mom"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "You said: my mom");
        assert_eq!(body["checkpointAdvanced"], true);
        assert_eq!(body["newCheckpoint"], "target_identified");
    }

    #[tokio::test]
    async fn chat_without_advance_has_null_checkpoint() {
        let app = app(false).await;
        let (status, body) = send(
            &app,
            post_json("/api/chat", json!({"studentId": "s1", "message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checkpointAdvanced"], false);
        assert!(body["newCheckpoint"].is_null());
    }

    #[tokio::test]
    async fn chat_error_statuses() {
        let app = app(false).await;

        let cases = [
            (json!({"message": "hi"}), StatusCode::UNAUTHORIZED),
            (json!({"studentId": "", "message": "hi"}), StatusCode::UNAUTHORIZED),
            (json!({"studentId": "s1"}), StatusCode::BAD_REQUEST),
            (json!({"studentId": "s1", "message": ""}), StatusCode::BAD_REQUEST),
            (json!({"studentId": "s1", "message": 42}), StatusCode::BAD_REQUEST),
            (json!({"studentId": "ghost", "message": "hi"}), StatusCode::NOT_FOUND),
        ];
        for (payload, expected) in cases {
            let (status, body) = send(&app, post_json("/api/chat", payload.clone())).await;
            assert_eq!(status, expected, "payload {payload}");
            assert!(body["error"].is_string(), "payload {payload}");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = app(false).await;
        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn generation_failure_is_service_unavailable() {
        let app = app(true).await;
        let (status, body) = send(
            &app,
            post_json("/api/chat", json!({"studentId": "s1", "message": "my mom"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("try again"));
    }

    #[tokio::test]
    async fn initial_message_route() {
        let app = app(false).await;
        let (status, body) = send(&app, get("/api/chat/initial?studentId=s1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checkpoint"], "welcome");
        assert!(body["message"].as_str().unwrap().starts_with("Hey Ada!"));

        let (status, _) = send(&app, get("/api/chat/initial")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, get("/api/chat/initial?studentId=ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn registration_route() {
        let app = app(false).await;
        let (status, body) = send(
            &app,
            post_json("/api/student", json!({"studentId": "s2", "name": "Sam", "grade": 6})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["student"]["currentCheckpoint"], "welcome");
        assert_eq!(body["student"]["grade"], 6);

        let (status, _) = send(
            &app,
            post_json("/api/student", json!({"studentId": "s2", "name": "Sam"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, post_json("/api/student", json!({"studentId": "s3"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn progress_route() {
        let app = app(false).await;
        let (status, body) = send(&app, get("/api/student?studentId=s1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["student"]["name"], "Ada");
        assert_eq!(body["progress"]["totalCheckpoints"], 11);
        assert_eq!(body["checkpoints"][0]["name"], "welcome");
        assert_eq!(body["conversation"]["messages"][0]["role"], "assistant");
    }

    #[tokio::test]
    async fn health_route() {
        let app = app(false).await;
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ok");
    }
}

//! Integration tests for the Gemini HTTP provider and the processors on top.
//!
//! Each test spins up an Axum server on a random port that impersonates the
//! `generateContent` endpoint, then drives the real reqwest-based provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use comms_assist::config::GenerationConfig;
use comms_assist::data::Table;
use comms_assist::error::LlmError;
use comms_assist::llm::{
    ChatMessage, CompletionRequest, FinishReason, GeminiClient, GeminiProvider, LlmProvider,
};
use comms_assist::pipeline::email::{GENERATED_REPLY_COLUMN, PREDICTED_CATEGORY_COLUMN};
use comms_assist::pipeline::{ChatbotProcessor, EmailAutomation};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const GOOD_KEY: &str = "test-key";

/// One request as seen by the fake server.
#[derive(Debug, Clone)]
struct Recorded {
    model_action: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct FakeGemini {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeGemini {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn prompt_text(body: &Value) -> String {
    body["contents"]
        .as_array()
        .and_then(|c| c.last())
        .and_then(|c| c["parts"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string()
}

async fn generate_content(
    State(fake): State<FakeGemini>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let api_key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    fake.requests.lock().unwrap().push(Recorded {
        model_action: model_action.clone(),
        api_key: api_key.clone(),
        body: body.clone(),
    });

    if api_key.as_deref() != Some(GOOD_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": 403, "message": "API key not valid"}})),
        )
            .into_response();
    }
    if model_action.starts_with("expired-model") {
        return (StatusCode::UNAUTHORIZED, "token expired").into_response();
    }
    if model_action.starts_with("broken-model") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response();
    }
    if model_action.starts_with("busy-model") {
        return (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "7")], "slow down").into_response();
    }
    if model_action.starts_with("blocked-model") {
        return Json(json!({"promptFeedback": {"blockReason": "SAFETY"}})).into_response();
    }

    let prompt = prompt_text(&body);
    let text = if prompt.starts_with("Categorize") {
        "Support"
    } else if prompt.contains("AI assistant for business communication") {
        "Happy to help with that."
    } else {
        "Thank you for reaching out. We are looking into it."
    };

    Json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
    }))
    .into_response()
}

/// Start the fake Gemini server on a random port, return (base_url, state).
async fn start_server() -> (String, FakeGemini) {
    let fake = FakeGemini::default();
    let app = Router::new()
        .route("/v1beta/models/{model_action}", post(generate_content))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}/v1beta/"), fake)
}

fn provider(base_url: &str, key: &str, model: &str) -> Arc<GeminiProvider> {
    Arc::new(GeminiProvider::new(SecretString::from(key.to_string()), model, base_url).unwrap())
}

fn email_table() -> Table {
    let mut table = Table::new(
        "emails",
        vec!["Subject".into(), "Email_Body".into(), "Sender".into()],
    );
    table
        .push_row(vec![
            "Login broken".into(),
            "I get an error when signing in.".into(),
            "ann@acme.com".into(),
        ])
        .unwrap();
    table
        .push_row(vec![
            "Export".into(),
            "The CSV export is missing rows.".into(),
            "bo@acme.com".into(),
        ])
        .unwrap();
    table
}

#[tokio::test]
async fn provider_speaks_gemini_wire_format() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, fake) = start_server().await;
        let llm = provider(&base_url, GOOD_KEY, "gemini-test");

        let request = CompletionRequest::new(vec![
            ChatMessage::system("Be terse."),
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi."),
            ChatMessage::user("Status of my ticket?"),
        ])
        .with_temperature(0.2)
        .with_top_k(40)
        .with_max_tokens(256);

        let response = llm.complete(request).await.unwrap();
        assert_eq!(response.content, "Thank you for reaching out. We are looking into it.");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.output_tokens, 4);
        assert_eq!(response.finish_reason, FinishReason::Stop);

        let seen = fake.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model_action, "gemini-test:generateContent");
        assert_eq!(seen[0].api_key.as_deref(), Some(GOOD_KEY));

        let body = &seen[0].body;
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be terse.");
        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn forbidden_key_is_auth_failure() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _fake) = start_server().await;
        let llm = provider(&base_url, "wrong-key", "gemini-test");
        let err = llm
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }), "{err:?}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unauthorized_is_auth_failure() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _fake) = start_server().await;
        let llm = provider(&base_url, GOOD_KEY, "expired-model");
        let err = llm
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }), "{err:?}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn server_error_keeps_status_and_body() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _fake) = start_server().await;
        let llm = provider(&base_url, GOOD_KEY, "broken-model");
        let err = llm
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        match err {
            LlmError::RequestFailed { provider, reason } => {
                assert_eq!(provider, "gemini");
                assert!(reason.contains("HTTP 500"), "{reason}");
                assert!(reason.contains("backend exploded"), "{reason}");
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_host_is_request_failure() {
    timeout(TEST_TIMEOUT, async {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let llm = provider(&format!("http://127.0.0.1:{port}/v1beta/"), GOOD_KEY, "gemini-test");
        let err = llm
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed { .. }), "{err:?}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _fake) = start_server().await;
        let llm = provider(&base_url, GOOD_KEY, "busy-model");
        let err = llm
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        match err {
            LlmError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blocked_prompt_is_invalid_response() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _fake) = start_server().await;
        let llm = provider(&base_url, GOOD_KEY, "blocked-model");
        let err = llm
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }), "{err:?}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn email_batch_over_http() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, fake) = start_server().await;
        let client = Arc::new(GeminiClient::new(
            provider(&base_url, GOOD_KEY, "gemini-test"),
            GenerationConfig::default(),
        ));
        let automation = EmailAutomation::new(client.clone(), Vec::new());

        let out = automation.batch_process_emails(&email_table()).await.unwrap();
        for row in 0..2 {
            assert_eq!(out.get(row, PREDICTED_CATEGORY_COLUMN), Some("Support"));
            assert_eq!(
                out.get(row, GENERATED_REPLY_COLUMN),
                Some("Thank you for reaching out. We are looking into it.")
            );
        }

        // categorize + reply per row
        assert_eq!(fake.requests().len(), 4);
        let usage = client.usage();
        assert_eq!(usage.requests, 4);
        assert_eq!(usage.input_tokens, 48);
        assert_eq!(usage.output_tokens, 16);

        let config = &fake.requests()[0].body["generationConfig"];
        assert_eq!(config["topK"], 40);
        assert_eq!(config["maxOutputTokens"], 1024);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn email_batch_survives_auth_failure() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _fake) = start_server().await;
        let client = Arc::new(GeminiClient::new(
            provider(&base_url, "wrong-key", "gemini-test"),
            GenerationConfig::default(),
        ));
        let automation = EmailAutomation::new(client, Vec::new());

        let out = automation.batch_process_emails(&email_table()).await.unwrap();
        // keyword rules still categorize the first email
        assert_eq!(out.get(0, PREDICTED_CATEGORY_COLUMN), Some("Support"));
        for row in 0..2 {
            let reply = out.get(row, GENERATED_REPLY_COLUMN).unwrap();
            assert!(reply.starts_with("Error generating reply:"), "{reply}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chatbot_conversation_over_http() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, fake) = start_server().await;
        let client = Arc::new(GeminiClient::new(
            provider(&base_url, GOOD_KEY, "gemini-test"),
            GenerationConfig::default(),
        ));
        let mut chatbot = ChatbotProcessor::new(client, 10);

        assert_eq!(chatbot.generate_response("Hello!").await, "Happy to help with that.");
        assert_eq!(
            chatbot.generate_response("Can you book a demo?").await,
            "Happy to help with that."
        );
        assert_eq!(chatbot.history().len(), 4);

        let second = prompt_text(&fake.requests()[1].body);
        assert!(second.contains("user: Hello!\nassistant: Happy to help with that.\nuser: Can you book a demo?\n"));
        assert!(second.contains("User intent: question"));
    })
    .await
    .expect("test timed out");
}

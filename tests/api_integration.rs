//! Integration tests for the HTTP API.
//!
//! Each test spins up an Axum server on a random port, points the draft
//! generator at a WireMock chat-completions endpoint, swaps SMTP for a
//! recording stub, and drives the real JSON contract with reqwest.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ai_email_assistant::config::{LlmConfig, MailConfig, SmtpSettings};
use ai_email_assistant::draft::{DEFAULT_SUBJECT, DraftGenerator};
use ai_email_assistant::llm::ChatClient;
use ai_email_assistant::mail::{Dispatcher, MailTransport, OutgoingEmail, TransportConnector};
use ai_email_assistant::web::{AppState, app_routes};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

// ── Stub SMTP ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SmtpLog {
    connects: usize,
    verifies: usize,
    sent: Vec<OutgoingEmail>,
}

#[derive(Clone)]
struct StubSmtp {
    log: Arc<Mutex<SmtpLog>>,
    verify_error: Option<String>,
}

impl TransportConnector for StubSmtp {
    fn connect(&self, _settings: &SmtpSettings) -> Result<Box<dyn MailTransport>, String> {
        self.log.lock().unwrap().connects += 1;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl MailTransport for StubSmtp {
    async fn verify(&self) -> Result<(), String> {
        self.log.lock().unwrap().verifies += 1;
        self.verify_error.clone().map_or(Ok(()), Err)
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String, String> {
        self.log.lock().unwrap().sent.push(email.clone());
        Ok("<queued-1@example.com>".to_string())
    }
}

// ── Harness ──────────────────────────────────────────────────────────

struct TestServer {
    base: String,
    http: reqwest::Client,
    smtp: Arc<Mutex<SmtpLog>>,
}

impl TestServer {
    async fn post(&self, route: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}{route}", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

fn llm_config(base_url: &str) -> LlmConfig {
    LlmConfig {
        api_key: Some(SecretString::from("sk-test")),
        base_url: base_url.to_string(),
        model: "test-model".to_string(),
        timeout: Duration::from_millis(300),
        ..LlmConfig::default()
    }
}

fn mail_config() -> MailConfig {
    MailConfig {
        host: Some("smtp.example.com".into()),
        port: 465,
        username: Some("assistant@example.com".into()),
        password: Some(SecretString::from("hunter2")),
        from_address: None,
        ..MailConfig::default()
    }
}

/// Start an Axum server on a random port.
async fn start_server(llm: LlmConfig, mail: MailConfig, verify_error: Option<&str>) -> TestServer {
    let smtp = Arc::new(Mutex::new(SmtpLog::default()));
    let connector = StubSmtp {
        log: Arc::clone(&smtp),
        verify_error: verify_error.map(String::from),
    };
    let state = AppState::new(
        DraftGenerator::new(ChatClient::new(llm)),
        Dispatcher::new(mail, Arc::new(connector)),
    );
    let app = app_routes(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        http: reqwest::Client::new(),
        smtp,
    }
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

// ── Generate ─────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_splits_subject_from_body() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "messages": [
                    {"role": "system"},
                    {"role": "user", "content": "Write a follow-up email to a client"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "Subject: Follow-up on our recent discussion\n\nDear Client,...",
            )))
            .expect(1)
            .mount(&llm)
            .await;

        let server = start_server(llm_config(&llm.uri()), mail_config(), None).await;
        let (status, body) = server
            .post(
                "/api/generate",
                json!({"prompt": "Write a follow-up email to a client"}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"subject": "Follow-up on our recent discussion", "body": "Dear Client,..."})
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn generate_without_subject_uses_default() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("  Hi there,\n\nThanks!  ")),
            )
            .mount(&llm)
            .await;

        let server = start_server(llm_config(&llm.uri()), mail_config(), None).await;
        let (status, body) = server.post("/api/generate", json!({"prompt": "thank them"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], DEFAULT_SUBJECT);
        assert_eq!(body["body"], "Hi there,\n\nThanks!");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_prompt_never_reaches_provider() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
            .expect(0)
            .mount(&llm)
            .await;

        let server = start_server(llm_config(&llm.uri()), mail_config(), None).await;
        for payload in [json!({}), json!({"prompt": ""}), json!({"prompt": 7}), json!({"prompt": null})] {
            let (status, body) = server.post("/api/generate", payload.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
            assert!(body["error"].is_string());
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn provider_error_status_and_text_are_relayed() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("  invalid api key <html>  "))
            .mount(&llm)
            .await;

        let server = start_server(llm_config(&llm.uri()), mail_config(), None).await;
        let (status, body) = server.post("/api/generate", json!({"prompt": "hello"})).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("401"));
        assert!(error.ends_with("invalid api key <html>"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_completion_is_bad_gateway() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("   \n ")))
            .mount(&llm)
            .await;

        let server = start_server(llm_config(&llm.uri()), mail_config(), None).await;
        let (status, _) = server.post("/api/generate", json!({"prompt": "hello"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unexpected_completion_shape_is_bad_gateway() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .mount(&llm)
            .await;

        let server = start_server(llm_config(&llm.uri()), mail_config(), None).await;
        let (status, _) = server.post("/api/generate", json!({"prompt": "hello"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_provider_times_out() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("Subject: late\n\nbody"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&llm)
            .await;

        let server = start_server(llm_config(&llm.uri()), mail_config(), None).await;
        let (status, body) = server.post("/api/generate", json!({"prompt": "hello"})).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
    })
    .await
    .expect("test timed out");
}

// ── Send ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_delivers_to_valid_recipients() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(llm_config("http://127.0.0.1:1"), mail_config(), None).await;
        let (status, body) = server
            .post(
                "/api/send",
                json!({
                    "recipients": "a@example.com, not-an-email, b@example.com",
                    "subject": "Follow-up",
                    "body": "Dear Client,\nThanks."
                }),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["messageId"], "<queued-1@example.com>");
        assert!(body["message"].is_string());

        let smtp = server.smtp.lock().unwrap();
        assert_eq!(smtp.verifies, 1);
        assert_eq!(smtp.sent.len(), 1);
        let sent = &smtp.sent[0];
        assert_eq!(sent.to, vec!["a@example.com", "b@example.com"]);
        assert_eq!(sent.from_address, "assistant@example.com");
        assert_eq!(sent.from_name, "AI Email Assistant");
        assert_eq!(sent.text, "Dear Client,\nThanks.");
        assert!(sent.html.contains("Dear Client,<br>"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn send_with_no_valid_recipients_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(llm_config("http://127.0.0.1:1"), mail_config(), None).await;
        let (status, body) = server
            .post(
                "/api/send",
                json!({"recipients": "not-an-email", "subject": "Hi", "body": "Hello"}),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("No valid email"));
        assert_eq!(server.smtp.lock().unwrap().verifies, 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn send_validation_reports_every_field() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(llm_config("http://127.0.0.1:1"), mail_config(), None).await;
        let (status, body) = server
            .post(
                "/api/send",
                json!({"recipients": "x", "subject": "s".repeat(201), "body": ""}),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["body", "recipients", "subject"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn send_without_secret_is_server_error_and_never_connects() {
    timeout(TEST_TIMEOUT, async {
        let mail = MailConfig {
            password: None,
            ..mail_config()
        };
        let server = start_server(llm_config("http://127.0.0.1:1"), mail, None).await;
        let (status, body) = server
            .post(
                "/api/send",
                json!({"recipients": "a@example.com", "subject": "Hi", "body": "Hello"}),
            )
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("hunter2"));
        let smtp = server.smtp.lock().unwrap();
        assert_eq!(smtp.connects, 0);
        assert_eq!(smtp.verifies, 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn send_with_unreachable_transport_is_bad_gateway() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(
            llm_config("http://127.0.0.1:1"),
            mail_config(),
            Some("Connection error: connection refused"),
        )
        .await;
        let (status, body) = server
            .post(
                "/api/send",
                json!({"recipients": "a@example.com", "subject": "Hi", "body": "Hello"}),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["details"].as_str().unwrap().contains("connection refused"));
        assert!(server.smtp.lock().unwrap().sent.is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Misc ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(llm_config("http://127.0.0.1:1"), mail_config(), None).await;
        let body: Value = server
            .http
            .get(format!("{}/health", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

use std::sync::Arc;

use chatwidget::config::Config;
use chatwidget::console::ConsoleSurface;
use chatwidget::error::GENERIC_SERVICE_ERROR;
use chatwidget::models::ReplyStatus;
use chatwidget::session::SessionId;
use chatwidget::{ChatService, ConversationController, DispatchError, HttpChatService};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_for(server: &MockServer, api_key: Option<&str>) -> HttpChatService {
    let config = Config {
        base_url: format!("{}/", server.uri()),
        api_key: api_key.map(str::to_string),
        api_key_env: "CHATWIDGET_TEST_UNSET_KEY".to_string(),
        ..Config::default()
    };
    HttpChatService::new(&config).unwrap()
}

async fn mount_chat(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn chat_posts_message_and_session_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({"message": "track order"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"answer": "It ships today."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, Some("test-key"));
    let session = SessionId::generate();
    let reply = service.post_message("track order", &session).await.unwrap();

    assert_eq!(reply.status, ReplyStatus::Success);
    assert_eq!(reply.answer(), Some("It ships today."));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["session_id"], session.as_str());
}

#[tokio::test]
async fn api_key_header_is_omitted_when_not_configured() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"status": "success", "data": {}})),
    )
    .await;

    let service = service_for(&server, None);
    service.post_message("hi", &SessionId::generate()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn response_envelope_is_unwrapped() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "status": "success",
                "data": {"orders": [{"order_id": "9", "itemname": "Fan"}]}
            }
        })),
    )
    .await;

    let reply = service_for(&server, None)
        .post_message("orders", &SessionId::generate())
        .await
        .unwrap();
    let data = reply.data.unwrap();
    assert_eq!(data.orders.len(), 1);
    assert_eq!(data.orders[0].display_item_name(), "Fan");
}

#[tokio::test]
async fn error_status_uses_detail_from_body() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid API key"})),
    )
    .await;

    let err = service_for(&server, Some("wrong"))
        .post_message("hi", &SessionId::generate())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::Http { status: 401, detail: Some("Invalid API key".to_string()) }
    );
}

#[tokio::test]
async fn structured_validation_detail_is_kept() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{"loc": ["body", "message"], "msg": "field required"}]
        })),
    )
    .await;

    let err = service_for(&server, None)
        .post_message("hi", &SessionId::generate())
        .await
        .unwrap_err();
    match err {
        DispatchError::Http { status: 422, detail: Some(detail) } => {
            assert!(detail.contains("field required"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_without_json_has_no_detail() {
    let server = MockServer::start().await;
    mount_chat(&server, ResponseTemplate::new(500).set_body_string("upstream exploded")).await;

    let err = service_for(&server, None)
        .post_message("hi", &SessionId::generate())
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Http { status: 500, detail: None });
}

#[tokio::test]
async fn service_reported_error_becomes_service_error() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"status": "error", "data": {}})),
    )
    .await;

    let err = service_for(&server, None)
        .post_message("hi", &SessionId::generate())
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Service { answer: None });
    assert_eq!(err.to_string(), GENERIC_SERVICE_ERROR);
}

#[tokio::test]
async fn non_json_success_body_is_malformed() {
    let server = MockServer::start().await;
    mount_chat(&server, ResponseTemplate::new(200).set_body_string("<html>ok</html>")).await;

    let err = service_for(&server, None)
        .post_message("hi", &SessionId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = Config {
        base_url: format!("http://127.0.0.1:{port}"),
        api_key_env: "CHATWIDGET_TEST_UNSET_KEY".to_string(),
        ..Config::default()
    };

    let err = HttpChatService::new(&config)
        .unwrap()
        .post_message("hi", &SessionId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport(_)));
}

#[tokio::test]
async fn otp_endpoints_carry_phone_code_and_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/send-otp"))
        .and(body_partial_json(json!({"phone": "9876543210"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "0"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-otp"))
        .and(body_partial_json(json!({"phone": "9876543210", "otp": "1234"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "1",
            "message": "Invalid OTP"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, None);
    let session = SessionId::generate();

    let sent = service.request_otp("9876543210", &session).await.unwrap();
    assert!(sent.accepted);

    let verified = service.verify_otp("9876543210", "1234", &session).await.unwrap();
    assert!(!verified.accepted);
    assert_eq!(verified.message.as_deref(), Some("Invalid OTP"));
}

#[tokio::test]
async fn one_shot_turn_prints_reply_and_cards() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "answer": "Here are some picks.",
                "products": [{"name": "Steel Bottle", "price": 499, "link": "https://shop/b"}],
                "end": "Anything else?"
            }
        })),
    )
    .await;

    let service = Arc::new(service_for(&server, None));
    let mut controller = ConversationController::new(service, ConsoleSurface::new(Vec::new()));
    assert!(controller.send_user_text("  bottles  ").await);

    let output = String::from_utf8(controller.display().get_ref().clone()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "👤 bottles");
    assert_eq!(lines[1], "🤖 Here are some picks.");
    assert_eq!(lines[2], "🛒 Steel Bottle");
    assert_eq!(lines[3], "   499");
    assert_eq!(lines.last().copied(), Some("🤖 Anything else?"));
}

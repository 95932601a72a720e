//! API endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use journal_gateway::context::{CURRENT_CONVERSATION_MARKER, PREVIOUS_CONVERSATION_MARKER, TurnRole};
use journal_gateway::{ContextConfig, MemoryScope, SpeechParams};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    FakeCompletion, FakeSpeech, TEST_API_KEY, TestApp, body_json, create_test_conversation,
    post_json,
};

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::happy().router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = TestApp::happy().router();

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["transcription"]["status"], "ok");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = TestApp::happy().with_api_key().router();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/functions/v1/voice-chat")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type,authorization")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn test_chat_first_turn() {
    let app = TestApp::happy();
    let conversation = create_test_conversation(&app.db, "user-1");

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/chat",
            &json!({
                "userInput": "How was my day?",
                "userId": "user-1",
                "chatId": conversation.id,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, json!({ "botResponse": "That sounds like a full day." }));

    // Fresh conversation: system instruction then the utterance, nothing else
    let calls = app.completion.calls();
    assert_eq!(calls.len(), 1);
    let turns = &calls[0];
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, TurnRole::System);
    assert_eq!(turns[1].role, TurnRole::User);
    assert_eq!(turns[1].content, "How was my day?");

    assert_eq!(app.message_count(&conversation.id), 2);
    assert!(app.speech.calls().is_empty());
}

#[tokio::test]
async fn test_voice_chat_happy_path() {
    let app = TestApp::happy();
    let conversation = create_test_conversation(&app.db, "user-1");

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/voice-chat",
            &json!({
                "userInput": "How was my day?",
                "userId": "user-1",
                "chatId": conversation.id,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["botResponse"], "That sounds like a full day.");

    let audio = STANDARD
        .decode(json["audioContent"].as_str().unwrap())
        .unwrap();
    assert_eq!(audio, b"ID3-fake-mp3");

    let speech_calls = app.speech.calls();
    assert_eq!(speech_calls.len(), 1);
    assert_eq!(speech_calls[0].0, "That sounds like a full day.");
    assert_eq!(app.message_count(&conversation.id), 2);
}

#[tokio::test]
async fn test_voice_chat_speech_failure_keeps_reply() {
    let app = TestApp::new(
        FakeCompletion::replying("Tell me more."),
        FakeSpeech::failing(),
    );
    let conversation = create_test_conversation(&app.db, "user-1");

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/voice-chat",
            &json!({
                "userInput": "I had a long day",
                "userId": "user-1",
                "chatId": conversation.id,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("speech synthesis failed"));
    assert!(json.get("audioContent").is_none());

    // Both sides of the exchange were stored before synthesis failed
    assert_eq!(app.message_count(&conversation.id), 2);
}

#[tokio::test]
async fn test_chat_completion_failure_keeps_user_message() {
    let app = TestApp::new(
        FakeCompletion::failing("model overloaded"),
        FakeSpeech::returning(b"unused"),
    );
    let conversation = create_test_conversation(&app.db, "user-1");

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/voice-chat",
            &json!({
                "userInput": "Anyone there?",
                "userId": "user-1",
                "chatId": conversation.id,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("model overloaded"));

    assert_eq!(app.message_count(&conversation.id), 1);
    assert!(app.speech.calls().is_empty());
}

#[tokio::test]
async fn test_chat_foreign_conversation_is_forbidden() {
    let app = TestApp::happy();
    let conversation = create_test_conversation(&app.db, "owner");

    for uri in ["/functions/v1/chat", "/functions/v1/voice-chat"] {
        let response = app
            .router()
            .oneshot(post_json(
                uri,
                &json!({
                    "userInput": "Let me read this",
                    "userId": "intruder",
                    "chatId": conversation.id,
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert!(json["error"].is_string());
    }

    assert!(app.completion.calls().is_empty());
    assert!(app.speech.calls().is_empty());
    assert_eq!(app.message_count(&conversation.id), 0);
}

#[tokio::test]
async fn test_chat_unknown_conversation_is_forbidden() {
    let app = TestApp::happy();

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/chat",
            &json!({
                "userInput": "Hello",
                "userId": "user-1",
                "chatId": "no-such-chat",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.completion.calls().is_empty());
}

#[tokio::test]
async fn test_chat_rejects_missing_and_blank_fields() {
    let app = TestApp::happy();
    let conversation = create_test_conversation(&app.db, "user-1");

    let bodies = [
        json!({ "userInput": "Hello", "userId": "user-1" }),
        json!({ "userId": "user-1", "chatId": conversation.id }),
        json!({ "userInput": "   ", "userId": "user-1", "chatId": conversation.id }),
        json!({ "userInput": "Hello", "userId": "", "chatId": conversation.id }),
    ];

    for body in bodies {
        let response = app
            .router()
            .oneshot(post_json("/functions/v1/chat", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let json = body_json(response).await;
        assert!(json["error"].is_string());
    }

    assert!(app.completion.calls().is_empty());
    assert_eq!(app.message_count(&conversation.id), 0);
}

#[tokio::test]
async fn test_chat_rejects_malformed_json() {
    let app = TestApp::happy().router();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/functions/v1/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let app = TestApp::happy().with_api_key();
    let conversation = create_test_conversation(&app.db, "user-1");
    let body = json!({
        "userInput": "Hello",
        "userId": "user-1",
        "chatId": conversation.id,
    });

    let response = app
        .router()
        .oneshot(post_json("/functions/v1/chat", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/functions/v1/chat", &body);
    request.headers_mut().insert(
        "authorization",
        "Bearer wrong-key".parse().unwrap(),
    );
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/functions/v1/chat", &body);
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {TEST_API_KEY}").parse().unwrap(),
    );
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Probes stay open
    let response = app
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_history_spans_conversations_with_markers() {
    let app = TestApp::happy();
    let earlier = create_test_conversation(&app.db, "user-1");
    let current = create_test_conversation(&app.db, "user-1");
    let router = app.router();

    let send = |chat_id: String, input: &'static str| {
        post_json(
            "/functions/v1/chat",
            &json!({ "userInput": input, "userId": "user-1", "chatId": chat_id }),
        )
    };

    let response = router
        .clone()
        .oneshot(send(earlier.id.clone(), "Yesterday I ran 5k"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(send(current.id.clone(), "I feel sore"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(send(current.id.clone(), "Should I rest?"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = app.completion.calls();
    let turns = &calls[2];
    let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();

    assert_eq!(turns.len(), 6);
    assert_eq!(turns[0].role, TurnRole::System);
    assert_eq!(
        contents[1],
        format!("Yesterday I ran 5k{PREVIOUS_CONVERSATION_MARKER}")
    );
    assert_eq!(turns[2].role, TurnRole::Assistant);
    assert_eq!(
        contents[3],
        format!("I feel sore{CURRENT_CONVERSATION_MARKER}")
    );
    assert_eq!(turns[4].role, TurnRole::Assistant);
    assert_eq!(contents[5], "Should I rest?");
}

#[tokio::test]
async fn test_history_current_only_scope_and_cap() {
    let app = TestApp::happy().with_context(ContextConfig::for_scope(MemoryScope::CurrentOnly, 3));
    let other = create_test_conversation(&app.db, "user-1");
    let current = create_test_conversation(&app.db, "user-1");
    let router = app.router();

    for (chat_id, input) in [
        (&other.id, "Elsewhere"),
        (&current.id, "one"),
        (&current.id, "two"),
        (&current.id, "three"),
    ] {
        let response = router
            .clone()
            .oneshot(post_json(
                "/functions/v1/chat",
                &json!({ "userInput": input, "userId": "user-1", "chatId": chat_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let calls = app.completion.calls();
    let turns = calls.last().unwrap();
    let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();

    // System, the 3 newest of [one, reply, two, reply], then the utterance
    assert_eq!(turns.len(), 5);
    assert_eq!(
        &contents[1..],
        &[
            "That sounds like a full day.",
            "two",
            "That sounds like a full day.",
            "three",
        ]
    );
}

#[tokio::test]
async fn test_history_all_conversations_scope_and_cap() {
    let app =
        TestApp::happy().with_context(ContextConfig::for_scope(MemoryScope::AllConversations, 3));
    let earlier = create_test_conversation(&app.db, "user-1");
    let current = create_test_conversation(&app.db, "user-1");
    let foreign = create_test_conversation(&app.db, "user-2");
    let router = app.router();

    for (user_id, chat_id, input) in [
        ("user-1", &earlier.id, "Yesterday I ran 5k"),
        ("user-1", &current.id, "one"),
        ("user-1", &current.id, "two"),
        ("user-2", &foreign.id, "Not mine"),
        ("user-1", &current.id, "three"),
    ] {
        let response = router
            .clone()
            .oneshot(post_json(
                "/functions/v1/chat",
                &json!({ "userInput": input, "userId": user_id, "chatId": chat_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let calls = app.completion.calls();
    let turns = calls.last().unwrap();
    let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();

    // System, the 3 newest of the user's 6 stored rows, then the utterance
    assert_eq!(turns.len(), 5);
    assert_eq!(turns[0].role, TurnRole::System);
    assert_eq!(turns[1].role, TurnRole::Assistant);
    assert_eq!(turns[2].role, TurnRole::User);
    assert_eq!(contents[2], format!("two{CURRENT_CONVERSATION_MARKER}"));
    assert_eq!(turns[3].role, TurnRole::Assistant);
    assert_eq!(turns[4].role, TurnRole::User);
    assert_eq!(contents[4], "three");
    assert!(
        contents
            .iter()
            .all(|c| !c.contains("Yesterday") && !c.contains("Not mine") && !c.starts_with("one"))
    );
}

#[tokio::test]
async fn test_conversation_lifecycle() {
    let app = TestApp::happy();
    let router = app.router();

    let response = router
        .clone()
        .oneshot(post_json("/functions/v1/conversations", &json!({ "userId": "user-1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["title"], "New Journal Entry");
    let id = created["id"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/functions/v1/conversations?userId=user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    let response = router
        .clone()
        .oneshot(post_json(
            "/functions/v1/chat",
            &json!({ "userInput": "First entry", "userId": "user-1", "chatId": id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/functions/v1/conversations/{id}/messages?userId=user-1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let messages = body_json(response).await;
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "First entry");
    assert_eq!(messages[1]["role"], "assistant");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/functions/v1/conversations/{id}/messages?userId=intruder"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/functions/v1/conversations/{id}"))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "userId": "user-1", "title": "Running log" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let renamed = body_json(response).await;
    assert_eq!(renamed["title"], "Running log");
}

#[tokio::test]
async fn test_list_conversations_requires_user() {
    let app = TestApp::happy().router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/functions/v1/conversations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_to_speech_truncates_and_applies_overrides() {
    let params = SpeechParams {
        max_input_chars: 10,
        ..SpeechParams::default()
    };
    let app = TestApp::happy().with_speech_params(params);

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/text-to-speech",
            &json!({ "text": "abcdefghijkl", "speed": 1.0, "voice": "nova" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        STANDARD.decode(json["audioContent"].as_str().unwrap()).unwrap(),
        b"ID3-fake-mp3"
    );

    let calls = app.speech.calls();
    assert_eq!(calls.len(), 1);
    let (text, used) = &calls[0];
    assert_eq!(text, "abcdefg...");
    assert_eq!(used.voice, "nova");
    assert_eq!(used.model, "tts-1");
    assert!((used.speed - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_text_to_speech_rejects_blank_text() {
    let app = TestApp::happy();

    let response = app
        .router()
        .oneshot(post_json("/functions/v1/text-to-speech", &json!({ "text": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.speech.calls().is_empty());
}

#[tokio::test]
async fn test_speech_to_text_data_url() {
    let app = TestApp::happy();
    let audio = STANDARD.encode(b"OggS-recording");

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/speech-to-text",
            &json!({ "audio": format!("data:audio/ogg;base64,{audio}") }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, json!({ "text": "I went for a walk" }));

    let calls = app.transcriber.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, b"OggS-recording");
    assert_eq!(calls[0].1, "audio/ogg");
}

#[tokio::test]
async fn test_speech_to_text_rejects_malformed_mime_type() {
    let app = TestApp::happy();

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/speech-to-text",
            &json!({ "audio": "AQID", "mimeType": "not a mime type" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("mimeType"));
    assert!(app.transcriber.calls().is_empty());
}

#[tokio::test]
async fn test_speech_to_text_rejects_invalid_base64() {
    let app = TestApp::happy();

    let response = app
        .router()
        .oneshot(post_json(
            "/functions/v1/speech-to-text",
            &json!({ "audio": "!!!not base64!!!" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.transcriber.calls().is_empty());
}

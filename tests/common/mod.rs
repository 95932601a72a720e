//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use journal_gateway::api::ApiServerBuilder;
use journal_gateway::context::PromptTurn;
use journal_gateway::db::{self, Conversation, ConversationRepo};
use journal_gateway::{
    CompletionParams, CompletionProvider, ContextAssembler, ContextConfig, DbPool, Error,
    JournalService, MemoryScope, Result, SpeechParams, SpeechProvider, Transcriber,
};
use secrecy::SecretString;

/// Bearer key used by routers built with [`TestApp::with_api_key`]
pub const TEST_API_KEY: &str = "test-api-key";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Create a conversation owned by `user_id`
pub fn create_test_conversation(db: &DbPool, user_id: &str) -> Conversation {
    ConversationRepo::new(db.clone())
        .create(user_id, Some("Test entry"))
        .expect("failed to create test conversation")
}

/// Completion provider that records every prompt it is given
pub struct FakeCompletion {
    reply: std::result::Result<String, String>,
    calls: Mutex<Vec<Vec<PromptTurn>>>,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<PromptTurn>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeCompletion {
    async fn complete(&self, turns: &[PromptTurn], _params: &CompletionParams) -> Result<String> {
        self.calls.lock().unwrap().push(turns.to_vec());
        self.reply.clone().map_err(|message| Error::CompletionFailed {
            status: Some(500),
            message,
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Speech provider that records every input and returns fixed bytes
pub struct FakeSpeech {
    audio: Option<Vec<u8>>,
    calls: Mutex<Vec<(String, SpeechParams)>>,
}

impl FakeSpeech {
    pub fn returning(audio: &[u8]) -> Self {
        Self {
            audio: Some(audio.to_vec()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails the way a provider answering HTTP 500 does
    pub fn failing() -> Self {
        Self {
            audio: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, SpeechParams)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    async fn synthesize(&self, text: &str, params: &SpeechParams) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), params.clone()));
        self.audio
            .clone()
            .ok_or_else(|| Error::SpeechSynthesisFailed {
                status: Some(500),
                message: "upstream exploded".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Transcriber that records what it was sent and returns a fixed transcript
pub struct FakeTranscriber {
    transcript: String,
    calls: Mutex<Vec<(Vec<u8>, String)>>,
}

impl FakeTranscriber {
    pub fn hearing(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<u8>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((audio.to_vec(), mime.to_string()));
        Ok(self.transcript.clone())
    }
}

/// A router wired to fake providers, with handles for inspecting them
pub struct TestApp {
    pub db: DbPool,
    pub completion: Arc<FakeCompletion>,
    pub speech: Arc<FakeSpeech>,
    pub transcriber: Arc<FakeTranscriber>,
    pub context: ContextConfig,
    pub speech_params: SpeechParams,
    pub require_key: bool,
}

impl TestApp {
    pub fn new(completion: FakeCompletion, speech: FakeSpeech) -> Self {
        Self {
            db: setup_test_db(),
            completion: Arc::new(completion),
            speech: Arc::new(speech),
            transcriber: Arc::new(FakeTranscriber::hearing("I went for a walk")),
            context: ContextConfig::for_scope(MemoryScope::AllConversations, 20),
            speech_params: SpeechParams::default(),
            require_key: false,
        }
    }

    /// Fakes that always succeed
    pub fn happy() -> Self {
        Self::new(
            FakeCompletion::replying("That sounds like a full day."),
            FakeSpeech::returning(b"ID3-fake-mp3"),
        )
    }

    #[must_use]
    pub fn with_api_key(mut self) -> Self {
        self.require_key = true;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_speech_params(mut self, params: SpeechParams) -> Self {
        self.speech_params = params;
        self
    }

    /// Build the full application router
    pub fn router(&self) -> Router {
        let journal = JournalService::new(
            self.db.clone(),
            ContextAssembler::new(self.context.clone()),
            self.completion.clone(),
            self.speech.clone(),
        )
        .with_speech_params(self.speech_params.clone());

        let api_key = self
            .require_key
            .then(|| SecretString::from(TEST_API_KEY.to_string()));

        ApiServerBuilder::new(self.db.clone(), Arc::new(journal))
            .transcriber(self.transcriber.clone())
            .api_key(api_key)
            .build()
            .router()
    }

    pub fn message_count(&self, conversation_id: &str) -> usize {
        journal_gateway::db::MessageRepo::new(self.db.clone())
            .count_in_conversation(conversation_id)
            .expect("failed to count messages")
    }
}

/// Build a JSON POST request
pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock server");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{addr}")
}

//! Shared test utilities
//!
//! `FakeAws` is an in-process HTTP server answering the identity pool, bot
//! runtime and speech endpoints on one local port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use lexchat::Config;
use lexchat::config::ConfigFile;
use lexchat::voice::{AudioSink, Playback};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const IDENTITY_POOL_ID: &str = "us-east-1:00000000-pool";
/// First identity handed out; later `GetId` calls count up from it
pub const IDENTITY_ID: &str = "us-east-1:guest-0001";
pub const ACCESS_KEY_ID: &str = "ASIAFAKEKEY";
pub const SESSION_TOKEN: &str = "fake-session-token";
pub const BOT_ID: &str = "BOT123";
pub const BOT_ALIAS_ID: &str = "ALIAS42";
pub const FAKE_MP3: &[u8] = b"ID3-fake-mp3";

/// How the fake services answer
#[derive(Clone)]
pub struct Behavior {
    /// Body returned by `RecognizeText`
    pub lex_reply: Value,
    pub lex_status: StatusCode,
    pub cognito_status: StatusCode,
    /// Engines the speech endpoint rejects
    pub failing_engines: Vec<&'static str>,
    /// Identity the pool refuses credentials for
    pub revoked_identity: Option<&'static str>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            lex_reply: json!({
                "messages": [
                    { "content": "Hola", "contentType": "PlainText" },
                    { "content": "¿en qué ayudo?", "contentType": "PlainText" }
                ]
            }),
            lex_status: StatusCode::OK,
            cognito_status: StatusCode::OK,
            failing_engines: Vec::new(),
            revoked_identity: None,
        }
    }
}

/// One request seen by the fake services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Identity pool action (`GetId`, `GetCredentialsForIdentity`)
    Cognito(String),
    Lex {
        locale: String,
        session: String,
        text: String,
        signed: bool,
    },
    Polly {
        engine: String,
        voice: String,
        text: String,
        signed: bool,
    },
}

struct FakeState {
    behavior: Behavior,
    calls: Mutex<Vec<Call>>,
    identities: AtomicUsize,
}

impl FakeState {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn issue_identity(&self) -> String {
        let n = self.identities.fetch_add(1, Ordering::SeqCst) + 1;
        format!("us-east-1:guest-{n:04}")
    }
}

/// Running fake server
pub struct FakeAws {
    pub url: String,
    state: Arc<FakeState>,
}

impl FakeAws {
    /// Serve `behavior` on an ephemeral local port
    pub async fn start(behavior: Behavior) -> Self {
        let state = Arc::new(FakeState {
            behavior,
            calls: Mutex::new(Vec::new()),
            identities: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/", post(cognito))
            .route(
                "/bots/{bot}/botAliases/{alias}/botLocales/{locale}/sessions/{session}/text",
                post(recognize_text),
            )
            .route("/v1/speech", post(synthesize_speech))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Every request so far, in arrival order
    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn cognito_calls(&self, action: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Cognito(a) if a == action))
            .count()
    }

    pub fn lex_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Lex { .. }))
            .collect()
    }

    pub fn polly_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Polly { .. }))
            .collect()
    }

    /// Configuration pointing every service at this server
    pub fn config(&self, data_dir: &Path) -> Config {
        self.config_with(data_dir, &[])
    }

    /// Like [`FakeAws::config`], with extra environment variables
    pub fn config_with(&self, data_dir: &Path, extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = [
            ("LEXCHAT_IDENTITY_POOL_ID", IDENTITY_POOL_ID),
            ("LEXCHAT_BOT_ID", BOT_ID),
            ("LEXCHAT_BOT_ALIAS_ID", BOT_ALIAS_ID),
            ("LEXCHAT_COGNITO_ENDPOINT", self.url.as_str()),
            ("LEXCHAT_LEX_ENDPOINT", self.url.as_str()),
            ("LEXCHAT_POLLY_ENDPOINT", self.url.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        vars.insert(
            "LEXCHAT_DATA_DIR".to_string(),
            data_dir.display().to_string(),
        );
        for (k, v) in extra {
            vars.insert((*k).to_string(), (*v).to_string());
        }

        Config::from_sources(ConfigFile::default(), move |key: &str| vars.get(key).cloned())
            .unwrap()
    }
}

fn is_signed(headers: &HeaderMap) -> bool {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let token = headers
        .get("x-amz-security-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    authorization.starts_with(&format!("AWS4-HMAC-SHA256 Credential={ACCESS_KEY_ID}/"))
        && token == SESSION_TOKEN
        && headers.contains_key("x-amz-date")
}

fn service_error(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "__type": kind, "message": message })),
    )
        .into_response()
}

async fn cognito(State(state): State<Arc<FakeState>>, headers: HeaderMap, body: Bytes) -> Response {
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let action = target.rsplit('.').next().unwrap_or_default().to_string();
    state.record(Call::Cognito(action.clone()));

    if state.behavior.cognito_status != StatusCode::OK {
        return service_error(
            state.behavior.cognito_status,
            "com.amazonaws.cognito.identity#ResourceNotFoundException",
            "IdentityPool not found",
        );
    }

    let body: Value = serde_json::from_slice(&body).unwrap_or_default();
    let identity_id = body["IdentityId"].as_str().unwrap_or_default();
    match action.as_str() {
        "GetId" if body["IdentityPoolId"] == IDENTITY_POOL_ID => {
            Json(json!({ "IdentityId": state.issue_identity() })).into_response()
        }
        "GetCredentialsForIdentity" if state
                .behavior
                .revoked_identity
                .is_some_and(|id| id == identity_id) =>
        {
            service_error(
                StatusCode::BAD_REQUEST,
                "com.amazonaws.cognito.identity#NotAuthorizedException",
                "Invalid identity",
            )
        }
        "GetCredentialsForIdentity" if identity_id.starts_with("us-east-1:guest-") => Json(json!({
            "IdentityId": identity_id,
            "Credentials": {
                "AccessKeyId": ACCESS_KEY_ID,
                "SecretKey": "fake-secret",
                "SessionToken": SESSION_TOKEN,
                "Expiration": 4_102_444_800.0
            }
        }))
        .into_response(),
        _ => service_error(StatusCode::BAD_REQUEST, "InvalidParameterException", "bad request"),
    }
}

async fn recognize_text(
    State(state): State<Arc<FakeState>>,
    UrlPath((_bot, _alias, locale, session)): UrlPath<(String, String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or_default();
    state.record(Call::Lex {
        locale,
        session,
        text: body["text"].as_str().unwrap_or_default().to_string(),
        signed: is_signed(&headers),
    });

    (state.behavior.lex_status, Json(state.behavior.lex_reply.clone())).into_response()
}

async fn synthesize_speech(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or_default();
    let engine = body["Engine"].as_str().unwrap_or_default().to_string();
    state.record(Call::Polly {
        engine: engine.clone(),
        voice: body["VoiceId"].as_str().unwrap_or_default().to_string(),
        text: body["Text"].as_str().unwrap_or_default().to_string(),
        signed: is_signed(&headers) && body["OutputFormat"] == "mp3",
    });

    if state.behavior.failing_engines.contains(&engine.as_str()) {
        return service_error(
            StatusCode::BAD_REQUEST,
            "EngineNotSupportedException",
            "This voice does not support the selected engine",
        );
    }

    ([(header::CONTENT_TYPE, "audio/mpeg")], FAKE_MP3).into_response()
}

/// Sink that keeps every clip it is handed
#[derive(Default)]
pub struct RecordingSink {
    played: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioSink for RecordingSink {
    fn play(&self, audio: Vec<u8>) -> Playback {
        if !audio.is_empty() {
            self.played.lock().unwrap().push(audio);
        }
        Playback::none()
    }
}

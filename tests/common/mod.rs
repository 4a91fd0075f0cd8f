//! In-process stand-in for the identity service.
//!
//! Speaks the same endpoints as the real service and manages the session
//! cookie the same way: set on login, cleared on logout, required by `/me`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use auth_session::{ClientConfig, SessionClient};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const SESSION_COOKIE: &str = "ACCESS_TOKEN";
const SESSION_TOKEN: &str = "tok";

static TRACING: LazyLock<()> = LazyLock::new(|| {
    let filter = if std::env::var("TEST_LOG").is_ok() {
        "auth_session=trace"
    } else {
        "off"
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_test_writer()
        .try_init()
        .ok();
});

#[derive(Debug, Default)]
pub struct Hits {
    pub register: AtomicUsize,
    pub login: AtomicUsize,
    pub logout: AtomicUsize,
    pub me: AtomicUsize,
}

impl Hits {
    pub fn me(&self) -> usize {
        self.me.load(Ordering::SeqCst)
    }

    pub fn login(&self) -> usize {
        self.login.load(Ordering::SeqCst)
    }

    pub fn logout(&self) -> usize {
        self.logout.load(Ordering::SeqCst)
    }
}

/// Canned failures the stub can be told to produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubOptions {
    /// Answer `/me` with this status instead of checking the cookie.
    pub me_status: Option<StatusCode>,
    /// Answer `/logout` with this status and leave the cookie alone.
    pub logout_status: Option<StatusCode>,
}

#[derive(Clone)]
struct StubState {
    hits: Arc<Hits>,
    options: StubOptions,
}

pub struct StubService {
    pub addr: SocketAddr,
    pub hits: Arc<Hits>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl StubService {
    pub async fn spawn() -> Self {
        Self::spawn_with(StubOptions::default()).await
    }

    pub async fn spawn_with(options: StubOptions) -> Self {
        LazyLock::force(&TRACING);

        let hits = Arc::new(Hits::default());
        let state = StubState {
            hits: hits.clone(),
            options,
        };
        let app = Router::new()
            .route("/api/auth/register", post(register))
            .route("/api/auth/login", post(login))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/me", get(me))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let addr = listener.local_addr().expect("Failed to read local address");
        let (shutdown, signal) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    signal.await.ok();
                })
                .await
                .expect("stub identity service failed");
        });

        Self {
            addr,
            hits,
            shutdown: Some(shutdown),
            server: Some(server),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url().parse().unwrap()).unwrap()
    }

    /// Client with its own cookie store.
    pub fn client(&self) -> SessionClient {
        SessionClient::new(self.config()).unwrap()
    }

    /// Client sharing `http`'s cookie store, like a page reload in the same browser.
    pub fn client_with(&self, http: reqwest::Client) -> SessionClient {
        self.client().with_http_client(http)
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shut_down(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        if let Some(server) = self.server.take() {
            server.await.expect("stub server task panicked");
        }
    }
}

/// Base URL nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Base URL of a listener that accepts connections and never answers.
/// The accepted sockets are held until the returned task is aborted.
pub async fn silent_base_url() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    (format!("http://{addr}"), task)
}

pub fn cookie_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

// ── Handlers ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
}

async fn register(State(state): State<StubState>, Json(body): Json<RegisterBody>) -> Response {
    state.hits.register.fetch_add(1, Ordering::SeqCst);

    if body.email == "taken@x.com" {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "email_taken"}))).into_response();
    }
    if body.name == "crash" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }
    StatusCode::CREATED.into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(
    State(state): State<StubState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Response {
    state.hits.login.fetch_add(1, Ordering::SeqCst);

    let valid = matches!(
        (body.email.as_str(), body.password.as_str()),
        ("a@x.com", "p1") | ("garbled@x.com", "p1")
    );
    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid credentials"})),
        )
            .into_response();
    }

    let cookie = Cookie::build((SESSION_COOKIE, SESSION_TOKEN))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    let jar = jar.add(cookie);

    if body.email == "garbled@x.com" {
        return (jar, "not json").into_response();
    }
    (
        jar,
        Json(json!({"accessToken": SESSION_TOKEN, "tokenType": "Bearer", "expiresIn": 3600})),
    )
        .into_response()
}

async fn logout(State(state): State<StubState>, jar: CookieJar) -> Response {
    state.hits.logout.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = state.options.logout_status {
        return status.into_response();
    }
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(removal), StatusCode::NO_CONTENT).into_response()
}

async fn me(State(state): State<StubState>, jar: CookieJar) -> Response {
    state.hits.me.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = state.options.me_status {
        return (status, "service unavailable").into_response();
    }
    match jar.get(SESSION_COOKIE) {
        Some(cookie) if cookie.value() == SESSION_TOKEN => Json(json!({
            "id": 1,
            "name": "Ann",
            "email": "a@x.com",
            "scope": "ROLE_USER"
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

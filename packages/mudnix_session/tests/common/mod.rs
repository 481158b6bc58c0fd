//! In-process fake game backend and a scripted console.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use mudnix_session::console::ANONYMOUS_PROMPT;
use mudnix_session::{Console, GameApi};

pub const USERNAME: &str = "bob";
pub const PASSWORD: &str = "s3cret&more";
pub const CHEST_LOCATION: &str = "Spam_Village::public_library";
pub const EMPTY_CHEST_LOCATION: &str = "Spam_Village::empty_vault";

type Params = Query<HashMap<String, String>>;

#[derive(Default)]
pub struct BackendState {
    pub logged_in: bool,
    pub logins: u32,
    pub logout_calls: u32,
    pub reject_logout: bool,
    pub chest_closed: u32,
    pub fail_close_chest: bool,
    pub said: Vec<String>,
    pub last_destination: Option<String>,
    pub seen_passwords: Vec<String>,
}

#[derive(Clone)]
pub struct FakeBackend {
    pub state: Arc<Mutex<BackendState>>,
    pub feed: broadcast::Sender<String>,
    pub idle: broadcast::Sender<String>,
}

impl FakeBackend {
    fn new() -> Self {
        let (feed, _) = broadcast::channel(64);
        let (idle, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(BackendState::default())),
            feed,
            idle,
        }
    }

    pub fn push_feed(&self, payload: Value) {
        self.feed.send(payload.to_string()).unwrap();
    }

    pub fn push_idle(&self, payload: Value) {
        self.idle.send(payload.to_string()).unwrap();
    }

    /// Wait until the client holds `n` connections to each push channel.
    pub async fn wait_for_channels(&self, n: usize) {
        wait_until(|| self.feed.receiver_count() == n && self.idle.receiver_count() == n).await;
    }
}

fn authorized(backend: &FakeBackend, params: &HashMap<String, String>) -> bool {
    let mut state = backend.state.lock().unwrap();
    if let Some(pw) = params.get("password") {
        state.seen_passwords.push(pw.clone());
    }
    params.get("username").map(String::as_str) == Some(USERNAME)
        && params.get("password").map(String::as_str) == Some(PASSWORD)
}

fn sse_from(
    rx: broadcast::Receiver<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(data) => Some((Ok(Event::default().data(data)), rx)),
            Err(_) => None,
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn login(State(b): State<FakeBackend>, Query(p): Params) -> Json<Value> {
    if !authorized(&b, &p) {
        return Json(json!({"logged_in": false, "err": "Invalid username or password"}));
    }
    let mut state = b.state.lock().unwrap();
    state.logged_in = true;
    state.logins += 1;
    Json(json!({"logged_in": true, "username": USERNAME, "info": "You are in Spam Village."}))
}

async fn logout(State(b): State<FakeBackend>, Query(p): Params) -> Json<Value> {
    let ok = authorized(&b, &p);
    let mut state = b.state.lock().unwrap();
    state.logout_calls += 1;
    if !ok || state.reject_logout {
        return Json(json!({"logged_out": false, "err": "Logout refused"}));
    }
    state.logged_in = false;
    Json(json!({"logged_out": true}))
}

async fn message_queue(State(b): State<FakeBackend>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_from(b.feed.subscribe())
}

async fn autologout(State(b): State<FakeBackend>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_from(b.idle.subscribe())
}

async fn check_connection() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream::unfold(1u64, |count| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let data = json!({"alive": true, "count": count}).to_string();
        Some((Ok(Event::default().data(data)), count + 1))
    });
    Sse::new(events)
}

async fn goto(State(b): State<FakeBackend>, Query(p): Params) -> Json<Value> {
    if !authorized(&b, &p) {
        return Json(json!({"succeeded": false, "err": "Not logged in"}));
    }
    let destination = p.get("new_location_id").cloned().unwrap_or_default();
    b.state.lock().unwrap().last_destination = Some(destination.clone());
    match destination.as_str() {
        CHEST_LOCATION => Json(json!({
            "succeeded": true,
            "info": "You are now in the public library.",
            "active_treasure_chest": {"contents": [
                {"name": "Can of Spam", "qty": 3, "rarity": "common", "description": "Pink."},
                {"name": "Rusty Key", "qty": 1, "rarity": 4, "description": "Opens nothing."}
            ]}
        })),
        EMPTY_CHEST_LOCATION => Json(json!({
            "succeeded": true,
            "info": "You are now in the empty vault.",
            "active_treasure_chest": {"contents": []}
        })),
        "Spam_Village::town_square" => Json(json!({
            "succeeded": true,
            "info": "You are now in the town square.",
            "active_treasure_chest": null
        })),
        _ => Json(json!({"succeeded": false, "err": "No such location"})),
    }
}

async fn teleport(State(b): State<FakeBackend>, Query(p): Params) -> Json<Value> {
    if !authorized(&b, &p) {
        return Json(json!({"succeeded": false, "err": "Not logged in"}));
    }
    match p.get("new_location").map(String::as_str) {
        Some("Spam_Village::town_square") => Json(json!({
            "succeeded": true,
            "info": "You teleport to the town square.",
            "active_treasure_chest": null
        })),
        _ => Json(json!({"succeeded": false, "err": "Insufficient privileges"})),
    }
}

async fn map(State(b): State<FakeBackend>, Query(p): Params) -> Json<Value> {
    if !authorized(&b, &p) {
        return Json(json!({"succeeded": false, "err": "Not logged in"}));
    }
    Json(json!({
        "succeeded": true,
        "locations": [CHEST_LOCATION, "Spam_Village::town_square"]
    }))
}

async fn close_chest(State(b): State<FakeBackend>) -> Result<Json<Value>, StatusCode> {
    let mut state = b.state.lock().unwrap();
    state.chest_closed += 1;
    if state.fail_close_chest {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(json!({"info": "The chest crumbles to dust."})))
}

async fn inventory(State(b): State<FakeBackend>, Query(p): Params) -> Json<Value> {
    if !authorized(&b, &p) {
        return Json(json!({"succeeded": false, "err": "Not logged in"}));
    }
    Json(json!({
        "succeeded": true,
        "inventory": [{"name": "Can of Spam", "qty": 3, "rarity": "common", "description": "Pink."}]
    }))
}

async fn say(State(b): State<FakeBackend>, Query(p): Params) -> String {
    let message = p.get("message").cloned().unwrap_or_default();
    b.state.lock().unwrap().said.push(message.clone());
    if message.contains("rude") {
        "Message rejected by moderation".to_string()
    } else {
        "Ok".to_string()
    }
}

async fn sha256(Query(p): Params) -> String {
    format!("hash({})", p.get("s").cloned().unwrap_or_default())
}

/// Spawn the fake backend on an ephemeral port.
/// Returns its base URL, the backend handle and a shutdown sender.
pub async fn spawn_backend() -> (String, FakeBackend, tokio::sync::oneshot::Sender<()>) {
    let backend = FakeBackend::new();
    let app = Router::new()
        .route("/version", get(|| async { "1.2.3" }))
        .route("/user/new-user", post(|| async { "User created" }))
        .route("/user/login", get(login))
        .route("/user/logout", get(logout))
        .route("/user/autologout", get(autologout))
        .route("/user/inventory", get(inventory))
        .route("/game/message-queue", get(message_queue))
        .route("/game/goto", get(goto))
        .route("/game/tp", get(teleport))
        .route("/game/map", get(map))
        .route("/game/close-chest", get(close_chest))
        .route("/game/say", post(say))
        .route("/hash/sha256", get(sha256))
        .route("/check-connection", get(check_connection))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (format!("http://127.0.0.1:{port}"), backend, tx)
}

pub fn api(base_url: &str) -> GameApi {
    GameApi::new(base_url, Duration::from_secs(5))
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Out(String),
    Err(String),
}

struct Input {
    text: String,
    /// Hold the input back until some output line contains this text.
    after: Option<String>,
}

/// Console fed from a script of inputs that records everything shown.
pub struct ScriptedConsole {
    inputs: Mutex<VecDeque<Input>>,
    lines: Mutex<Vec<Line>>,
    prompt: Mutex<String>,
    secret_prompts: Mutex<Vec<String>>,
}

impl ScriptedConsole {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inputs: Mutex::new(VecDeque::new()),
            lines: Mutex::new(Vec::new()),
            prompt: Mutex::new(ANONYMOUS_PROMPT.to_string()),
            secret_prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn type_line(&self, text: &str) {
        self.inputs.lock().unwrap().push_back(Input {
            text: text.to_string(),
            after: None,
        });
    }

    pub fn type_line_after(&self, text: &str, after: &str) {
        self.inputs.lock().unwrap().push_back(Input {
            text: text.to_string(),
            after: Some(after.to_string()),
        });
    }

    pub fn type_credentials(&self, username: &str, password: &str) {
        self.type_line(username);
        self.type_line(password);
    }

    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().unwrap().clone()
    }

    pub fn output(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                Line::Out(s) => Some(s),
                Line::Err(_) => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                Line::Err(s) => Some(s),
                Line::Out(_) => None,
            })
            .collect()
    }

    pub fn count_output(&self, line: &str) -> usize {
        self.output().iter().filter(|l| *l == line).count()
    }

    pub fn has_error(&self, fragment: &str) -> bool {
        self.errors().iter().any(|e| e.contains(fragment))
    }

    pub fn secret_prompts(&self) -> Vec<String> {
        self.secret_prompts.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap().clear();
    }

    async fn next_input(&self) -> io::Result<String> {
        let input = self
            .inputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))?;
        if let Some(after) = &input.after {
            wait_until(|| self.output().iter().any(|l| l.contains(after.as_str()))).await;
        }
        Ok(input.text)
    }
}

#[async_trait]
impl Console for ScriptedConsole {
    fn echo(&self, line: &str) {
        self.lines.lock().unwrap().push(Line::Out(line.to_string()));
    }

    fn error(&self, line: &str) {
        self.lines.lock().unwrap().push(Line::Err(line.to_string()));
    }

    fn set_prompt(&self, prompt: &str) {
        *self.prompt.lock().unwrap() = prompt.to_string();
    }

    fn prompt(&self) -> String {
        self.prompt.lock().unwrap().clone()
    }

    async fn read_line(&self, _prompt: &str) -> io::Result<String> {
        self.next_input().await
    }

    async fn read_secret(&self, prompt: &str) -> io::Result<String> {
        self.secret_prompts.lock().unwrap().push(prompt.to_string());
        self.next_input().await
    }
}

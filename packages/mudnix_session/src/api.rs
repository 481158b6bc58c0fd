//! HTTP client for the game backend.
//!
//! One method per endpoint. Query parameters go through reqwest's encoder, so
//! credentials and chat text containing `&`, `=` or spaces arrive intact.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::dedup::Message;
use crate::error::ClientError;
use crate::location::LocationId;
use crate::stream::{RawEvents, sse_events};

pub const DEFAULT_BASE_URL: &str = "https://mudnix.dantefalzone.repl.co";

/// Username and password as typed by the player.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn query(&self) -> [(&'static str, &str); 2] {
        [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// -- Wire types --

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub logged_in: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub err: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
    #[serde(default)]
    pub err: Option<String>,
}

/// Rarity arrives as a name on some backends and as a tier number on others.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Rarity {
    Named(String),
    Tier(i64),
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rarity::Named(name) => f.write_str(name),
            Rarity::Tier(tier) => write!(f, "{tier}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
    #[serde(default)]
    pub rarity: Option<Rarity>,
    #[serde(default)]
    pub description: String,
}

fn default_qty() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreasureChest {
    #[serde(default)]
    pub contents: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryResponse {
    pub succeeded: bool,
    #[serde(default)]
    pub inventory: Vec<Item>,
    #[serde(default)]
    pub err: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveResponse {
    pub succeeded: bool,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub active_treasure_chest: Option<TreasureChest>,
    #[serde(default)]
    pub err: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapResponse {
    pub succeeded: bool,
    #[serde(default)]
    pub locations: Vec<LocationId>,
    #[serde(default)]
    pub err: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseChestResponse {
    #[serde(default)]
    pub info: Option<String>,
}

/// Feed channel payload: the server's current message queue.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedPayload {
    pub succeeded: bool,
    #[serde(default)]
    pub queue: Vec<Message>,
}

/// Idle-timeout channel payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IdlePayload {
    pub succeeded: bool,
    #[serde(default)]
    pub info: String,
}

impl IdlePayload {
    pub fn is_logout_signal(&self) -> bool {
        self.succeeded && self.info == "logout"
    }
}

/// Liveness channel payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LivenessPayload {
    pub alive: bool,
    #[serde(default)]
    pub count: u64,
}

// -- Client --

#[derive(Clone, Debug)]
pub struct GameApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl GameApi {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).timeout(self.request_timeout)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).timeout(self.request_timeout)
    }

    async fn send(
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        debug!(endpoint, "request");
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(ClientError::Status {
                endpoint,
                status: resp.status(),
            });
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let body = Self::send(endpoint, request).await?.text().await?;
        serde_json::from_str(&body).map_err(|source| ClientError::Decode { endpoint, source })
    }

    async fn text(
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, ClientError> {
        Ok(Self::send(endpoint, request).await?.text().await?)
    }

    /// Open a push channel. Long-lived, so no request timeout applies.
    fn events(
        &self,
        endpoint: &'static str,
        query: Vec<(&'static str, String)>,
    ) -> impl Future<Output = Result<RawEvents, ClientError>> + Send + 'static {
        let request = self
            .client
            .get(self.url(endpoint))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .query(&query);
        async move { Ok(sse_events(Self::send(endpoint, request).await?)) }
    }

    fn owned_query(creds: &Credentials) -> Vec<(&'static str, String)> {
        creds
            .query()
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect()
    }

    pub async fn version(&self) -> Result<String, ClientError> {
        Self::text("/version", self.get("/version")).await
    }

    pub async fn new_user(&self, creds: &Credentials) -> Result<String, ClientError> {
        Self::text(
            "/user/new-user",
            self.post("/user/new-user").query(&creds.query()),
        )
        .await
    }

    pub async fn login(&self, creds: &Credentials) -> Result<LoginResponse, ClientError> {
        Self::json("/user/login", self.get("/user/login").query(&creds.query())).await
    }

    pub async fn logout(&self, creds: &Credentials) -> Result<LogoutResponse, ClientError> {
        Self::json("/user/logout", self.get("/user/logout").query(&creds.query())).await
    }

    pub async fn inventory(&self, creds: &Credentials) -> Result<InventoryResponse, ClientError> {
        Self::json(
            "/user/inventory",
            self.get("/user/inventory").query(&creds.query()),
        )
        .await
    }

    pub async fn goto(
        &self,
        creds: &Credentials,
        destination: &LocationId,
    ) -> Result<MoveResponse, ClientError> {
        Self::json(
            "/game/goto",
            self.get("/game/goto")
                .query(&creds.query())
                .query(&[("new_location_id", destination.as_str())]),
        )
        .await
    }

    pub async fn teleport(
        &self,
        creds: &Credentials,
        destination: &str,
    ) -> Result<MoveResponse, ClientError> {
        Self::json(
            "/game/tp",
            self.get("/game/tp")
                .query(&creds.query())
                .query(&[("new_location", destination)]),
        )
        .await
    }

    pub async fn map(&self, creds: &Credentials) -> Result<MapResponse, ClientError> {
        Self::json("/game/map", self.get("/game/map").query(&creds.query())).await
    }

    pub async fn close_chest(&self, creds: &Credentials) -> Result<CloseChestResponse, ClientError> {
        Self::json(
            "/game/close-chest",
            self.get("/game/close-chest").query(&creds.query()),
        )
        .await
    }

    pub async fn say(&self, creds: &Credentials, message: &str) -> Result<String, ClientError> {
        Self::text(
            "/game/say",
            self.post("/game/say")
                .query(&creds.query())
                .query(&[("message", message)]),
        )
        .await
    }

    pub async fn sha256(&self, input: &str) -> Result<String, ClientError> {
        Self::text("/hash/sha256", self.get("/hash/sha256").query(&[("s", input)])).await
    }

    pub fn message_queue(
        &self,
        creds: &Credentials,
    ) -> impl Future<Output = Result<RawEvents, ClientError>> + Send + 'static {
        self.events("/game/message-queue", Self::owned_query(creds))
    }

    pub fn autologout(
        &self,
        creds: &Credentials,
    ) -> impl Future<Output = Result<RawEvents, ClientError>> + Send + 'static {
        self.events("/user/autologout", Self::owned_query(creds))
    }

    pub fn check_connection(
        &self,
    ) -> impl Future<Output = Result<RawEvents, ClientError>> + Send + 'static {
        self.events("/check-connection", Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("bob", "hunter2");
        let shown = format!("{creds:?}");
        assert!(shown.contains("bob"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = GameApi::new("http://localhost:8080/", Duration::from_secs(1));
        assert_eq!(api.url("/version"), "http://localhost:8080/version");
    }

    #[test]
    fn move_response_with_null_chest() {
        let resp: MoveResponse = serde_json::from_str(
            r#"{"succeeded":true,"info":"You arrive.","active_treasure_chest":null}"#,
        )
        .unwrap();
        assert!(resp.succeeded);
        assert!(resp.active_treasure_chest.is_none());
    }

    #[test]
    fn move_response_with_chest() {
        let resp: MoveResponse = serde_json::from_str(
            r#"{"succeeded":true,"info":"ok","active_treasure_chest":{"contents":[
                {"name":"Spam","qty":2,"rarity":"common","description":"canned"}]}}"#,
        )
        .unwrap();
        let chest = resp.active_treasure_chest.unwrap();
        assert_eq!(chest.contents.len(), 1);
        assert_eq!(chest.contents[0].qty, 2);
        assert_eq!(chest.contents[0].rarity, Some(Rarity::Named("common".into())));
    }

    #[test]
    fn rarity_accepts_numbers() {
        let item: Item =
            serde_json::from_str(r#"{"name":"Gem","qty":1,"rarity":3,"description":"shiny"}"#)
                .unwrap();
        assert_eq!(item.rarity, Some(Rarity::Tier(3)));
        assert_eq!(item.rarity.unwrap().to_string(), "3");
    }

    #[test]
    fn failed_login_carries_err() {
        let resp: LoginResponse =
            serde_json::from_str(r#"{"logged_in":false,"err":"wrong password"}"#).unwrap();
        assert!(!resp.logged_in);
        assert_eq!(resp.err.as_deref(), Some("wrong password"));
    }

    #[test]
    fn idle_payload_logout_signal() {
        let p: IdlePayload =
            serde_json::from_str(r#"{"succeeded":true,"info":"logout"}"#).unwrap();
        assert!(p.is_logout_signal());
        let p: IdlePayload = serde_json::from_str(r#"{"succeeded":true,"info":"ok"}"#).unwrap();
        assert!(!p.is_logout_signal());
        let p: IdlePayload =
            serde_json::from_str(r#"{"succeeded":false,"info":"logout"}"#).unwrap();
        assert!(!p.is_logout_signal());
    }

    #[test]
    fn feed_payload_wire_format() {
        let p: FeedPayload = serde_json::from_str(
            r#"{"succeeded":true,"queue":[{"user":"bob","text":"hi"},{"user":"amy","text":"yo"}]}"#,
        )
        .unwrap();
        assert_eq!(p.queue, vec![Message::new("bob", "hi"), Message::new("amy", "yo")]);
    }
}

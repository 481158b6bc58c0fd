//! Login state and the push channels that live while logged in.
//!
//! ```text
//! LoggedOut --login ok--> LoggedIn --logout ok--> LoggedOut
//! ```
//!
//! Failed attempts leave the state untouched. While logged in exactly two
//! subscriptions are open: the chat feed and the idle-timeout notice. Logout
//! closes both before the credentials are dropped.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{Credentials, FeedPayload, GameApi, IdlePayload};
use crate::chest::ChestState;
use crate::console::{ANONYMOUS_PROMPT, Console, user_prompt};
use crate::dedup::MessageDeduplicator;
use crate::error::CommandError;
use crate::location::LocationId;
use crate::stream::Subscription;

pub const DIVIDER: &str = "================";

pub const FEED_CHANNEL: &str = "feed";
pub const IDLE_CHANNEL: &str = "idle-timeout";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    LoggedOut,
    LoggedIn(Credentials),
}

impl AuthState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthState::LoggedIn(_))
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            AuthState::LoggedIn(creds) => Some(creds),
            AuthState::LoggedOut => None,
        }
    }
}

#[derive(Default)]
struct SessionState {
    auth: AuthState,
    feed: Option<Subscription>,
    idle: Option<Subscription>,
    /// Locations listed by the last successful `map` of this login.
    map_entries: Vec<LocationId>,
}

impl SessionState {
    fn close_channels(&mut self) {
        for sub in [self.feed.take(), self.idle.take()].into_iter().flatten() {
            sub.close();
        }
    }

    /// Drop everything that belongs to the ended login.
    fn end(&mut self) {
        self.close_channels();
        self.map_entries.clear();
        self.auth = AuthState::LoggedOut;
    }
}

/// Explicit session context. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    api: GameApi,
    console: Arc<dyn Console>,
    state: Arc<Mutex<SessionState>>,
    seen: Arc<Mutex<MessageDeduplicator>>,
    chest: Arc<Mutex<ChestState>>,
}

/// Ask for a username, then for a password with echo suppressed.
pub async fn read_credentials(
    console: &dyn Console,
    username_prompt: &str,
    password_prompt: &str,
) -> io::Result<Credentials> {
    let username = console.read_line(username_prompt).await?;
    let password = console.read_secret(password_prompt).await?;
    Ok(Credentials::new(username.trim(), password))
}

impl SessionManager {
    pub fn new(api: GameApi, console: Arc<dyn Console>) -> Self {
        Self {
            api,
            console,
            state: Arc::new(Mutex::new(SessionState::default())),
            seen: Arc::new(Mutex::new(MessageDeduplicator::new())),
            chest: Arc::new(Mutex::new(ChestState::default())),
        }
    }

    pub fn api(&self) -> &GameApi {
        &self.api
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    pub fn chest(&self) -> &Mutex<ChestState> {
        &self.chest
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.lock().await.auth.is_logged_in()
    }

    /// Credentials of the logged-in player, or the "not logged in" error that
    /// every protected command reports.
    pub async fn require_login(&self) -> Result<Credentials, CommandError> {
        self.state
            .lock()
            .await
            .auth
            .credentials()
            .cloned()
            .ok_or(CommandError::NotLoggedIn)
    }

    /// Names of the push channels currently open for this session.
    pub async fn open_channels(&self) -> Vec<&'static str> {
        let state = self.state.lock().await;
        [state.feed.as_ref(), state.idle.as_ref()]
            .into_iter()
            .flatten()
            .filter(|sub| sub.is_open())
            .map(Subscription::name)
            .collect()
    }

    pub async fn login(&self) -> Result<(), CommandError> {
        if self.is_logged_in().await {
            return Err(CommandError::AlreadyLoggedIn);
        }

        let creds = read_credentials(self.console.as_ref(), "Username: ", "Password: ").await?;
        let resp = self.api.login(&creds).await?;
        if !resp.logged_in {
            info!(username = %creds.username, "login rejected");
            return Err(CommandError::rejected("You have not logged in.", resp.err));
        }

        let mut state = self.state.lock().await;
        if state.auth.is_logged_in() {
            return Err(CommandError::AlreadyLoggedIn);
        }

        info!(username = %creds.username, "logged in");
        self.console.echo("You have successfully logged in.");
        self.console
            .echo("Remember to log out before you leave so your character will be safe.");
        self.console.echo(DIVIDER);

        state.feed = Some(self.open_feed(&creds));
        state.idle = Some(self.open_idle_timeout(&creds));

        let display_name = resp.username.as_deref().unwrap_or(&creds.username);
        self.console.set_prompt(&user_prompt(display_name));
        state.auth = AuthState::LoggedIn(creds);
        drop(state);

        if let Some(info) = resp.info {
            self.console.echo(&info);
        }
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), CommandError> {
        // Held across the request so push handlers observe either the old or
        // the new state, never a half-torn-down one.
        let mut state = self.state.lock().await;
        let creds = state
            .auth
            .credentials()
            .cloned()
            .ok_or(CommandError::MustBeLoggedIn)?;

        let resp = self.api.logout(&creds).await?;
        if !resp.logged_out {
            info!(username = %creds.username, "logout rejected");
            return Err(CommandError::rejected("You have not logged out.", resp.err));
        }

        state.end();
        drop(state);
        self.chest.lock().await.clear();

        info!(username = %creds.username, "logged out");
        self.console.echo("You have successfully logged out.");
        self.console.set_prompt(ANONYMOUS_PROMPT);
        Ok(())
    }

    /// Logout triggered by the idle-timeout channel. A notice that arrives
    /// after the session already ended is ignored.
    pub async fn force_logout(&self) {
        if !self.is_logged_in().await {
            debug!("ignoring idle-timeout notice for an ended session");
            return;
        }
        self.console
            .error("You have been automatically logged out due to inactivity.");
        if let Err(e) = self.logout().await {
            warn!(error = %e, "forced logout failed");
            self.console.error(&e.to_string());
        }
    }

    /// Best-effort logout on shutdown, bounded by `grace`.
    pub async fn teardown(&self, grace: Duration) {
        if self.is_logged_in().await {
            let session = self.clone();
            let logout = tokio::spawn(async move { session.logout().await });
            match tokio::time::timeout(grace, logout).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(error = %e, "logout during teardown failed"),
                Ok(Err(e)) => warn!(error = %e, "logout task during teardown panicked"),
                Err(_) => warn!(?grace, "logout during teardown timed out"),
            }
        }
        // The timed-out logout may still hold the lock; its channels are
        // dropped with the runtime in that case.
        if let Ok(mut state) = self.state.try_lock() {
            state.close_channels();
            state.map_entries.clear();
        }
    }

    /// Remember the locations a `map` listed, replacing the previous listing.
    pub async fn remember_map(&self, entries: Vec<LocationId>) {
        self.state.lock().await.map_entries = entries;
    }

    /// The `n`th (1-based) location of the current listing.
    pub async fn map_entry(&self, n: usize) -> Option<LocationId> {
        let state = self.state.lock().await;
        n.checked_sub(1).and_then(|i| state.map_entries.get(i)).cloned()
    }

    /// Create an account. Never touches the session's own credentials.
    pub async fn new_user(&self) -> Result<(), CommandError> {
        let creds = read_credentials(
            self.console.as_ref(),
            "Enter your desired username: ",
            "Enter your desired password: ",
        )
        .await?;
        let reply = self.api.new_user(&creds).await?;
        info!(username = %creds.username, "account creation requested");
        self.console.echo(&reply);
        Ok(())
    }

    /// Surface every message of `payload` not shown before, in queue order.
    pub async fn surface_feed(&self, payload: FeedPayload) {
        if !payload.succeeded {
            return;
        }
        if !self.is_logged_in().await {
            debug!("dropping feed payload for an ended session");
            return;
        }
        let mut seen = self.seen.lock().await;
        for message in &payload.queue {
            if seen.observe(message) {
                self.console.echo(&message.to_string());
            }
        }
    }

    fn open_feed(&self, creds: &Credentials) -> Subscription {
        let session = self.clone();
        Subscription::open(
            FEED_CHANNEL,
            self.api.message_queue(creds),
            move |payload: FeedPayload| {
                let session = session.clone();
                async move { session.surface_feed(payload).await }
            },
        )
    }

    fn open_idle_timeout(&self, creds: &Credentials) -> Subscription {
        let session = self.clone();
        Subscription::open(
            IDLE_CHANNEL,
            self.api.autologout(creds),
            move |payload: IdlePayload| {
                let session = session.clone();
                async move {
                    if payload.is_logout_signal() {
                        session.force_logout().await;
                    }
                }
            },
        )
    }
}

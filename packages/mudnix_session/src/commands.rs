//! Command table of the client.
//!
//! Every handler that touches protected server state checks the login state
//! itself through [`SessionManager::require_login`] before any request is made.

use std::sync::Arc;

use futures::future;
use tracing::{debug, warn};

use crate::api::LivenessPayload;
use crate::chest::{self, ChestChange};
use crate::console::Console;
use crate::error::CommandError;
use crate::api::MoveResponse;
use crate::location::{LocationId, LocationLabel};
use crate::session::{DIVIDER, SessionManager};
use crate::stream::Subscription;

/// Usage and description of every command, in `help` order.
pub const HELP: &[(&str, &str)] = &[
    ("help", "print a list of all commands"),
    ("echo \"<string>\"", "prints <string> to stdout"),
    (
        "sha256 \"<string>\"",
        "prints the SHA-256 hash of <string> to stdout",
    ),
    ("new-user", "create a new account"),
    ("login", "log in to an existing user account"),
    ("logout", "log out of your account"),
    (
        "say \"<message>\"",
        "broadcasts <message> to everyone in your area",
    ),
    ("goto \"<location>\"", "moves you to <location>"),
    (
        "map",
        "lists all the locations adjacent to your current location; enter a listed number to travel there",
    ),
    ("open-chest", "opens a treasure chest if you've found one"),
    ("inventory", "shows you what's in your inventory"),
    (
        "check-connection",
        "listen to see if the server is online (alias: ping)",
    ),
    ("exit", "log out if needed and leave (alias: quit)"),
];

/// Outcome of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Unknown(String),
    Exit,
}

/// Split a command line into arguments.
///
/// Whitespace separates arguments; single or double quotes group them. A
/// backslash outside single quotes takes the next character literally.
pub fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"') | None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_token = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}

fn single_arg<'a>(command: &'static str, args: &'a [String]) -> Result<&'a str, CommandError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(CommandError::Arity {
            command,
            expected: 1,
            got: args.len(),
        }),
    }
}

fn no_args(command: &'static str, args: &[String]) -> Result<(), CommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandError::Arity {
            command,
            expected: 0,
            got: args.len(),
        })
    }
}

pub struct CommandDispatcher {
    session: SessionManager,
}

impl CommandDispatcher {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn console(&self) -> &Arc<dyn Console> {
        self.session.console()
    }

    /// Run one input line. Failures are reported on the console.
    pub async fn dispatch(&mut self, line: &str) -> Dispatch {
        let args = match tokenize(line) {
            Ok(args) => args,
            Err(e) => {
                self.console().error(&e.to_string());
                return Dispatch::Handled;
            }
        };
        let Some((name, args)) = args.split_first() else {
            return Dispatch::Handled;
        };
        debug!(command = %name, args = args.len(), "dispatch");

        let result = match name.as_str() {
            "help" => no_args("help", args).map(|()| self.help()),
            "echo" => single_arg("echo", args).map(|text| self.console().echo(text)),
            "sha256" => match single_arg("sha256", args) {
                Ok(input) => self.sha256(input).await,
                Err(e) => Err(e),
            },
            "new-user" => match no_args("new-user", args) {
                Ok(()) => self.session.new_user().await,
                Err(e) => Err(e),
            },
            "login" => match no_args("login", args) {
                Ok(()) => self.session.login().await,
                Err(e) => Err(e),
            },
            "logout" => match no_args("logout", args) {
                Ok(()) => self.session.logout().await,
                Err(e) => Err(e),
            },
            "say" => match single_arg("say", args) {
                Ok(message) => self.say(message).await,
                Err(e) => Err(e),
            },
            "goto" => match single_arg("goto", args) {
                Ok(label) => self.goto(LocationLabel::new(label).to_id()).await,
                Err(e) => Err(e),
            },
            "tp" => match single_arg("tp", args) {
                Ok(destination) => self.teleport(destination).await,
                Err(e) => Err(e),
            },
            "map" => match no_args("map", args) {
                Ok(()) => self.map().await,
                Err(e) => Err(e),
            },
            "open-chest" => match no_args("open-chest", args) {
                Ok(()) => chest::open(&self.session).await,
                Err(e) => Err(e),
            },
            "inventory" => match no_args("inventory", args) {
                Ok(()) => self.inventory().await,
                Err(e) => Err(e),
            },
            "check-connection" | "ping" => match no_args("check-connection", args) {
                Ok(()) => self.check_connection().await,
                Err(e) => Err(e),
            },
            "exit" | "quit" => return Dispatch::Exit,
            other => match other.parse::<usize>() {
                Ok(n) if args.is_empty() => self.travel_to_entry(n).await,
                _ => return Dispatch::Unknown(name.clone()),
            },
        };

        if let Err(e) = result {
            if let CommandError::Transport(inner) = &e {
                warn!(command = %name, error = %inner, "request failed");
            }
            self.console().error(&e.to_string());
        }
        Dispatch::Handled
    }

    fn help(&self) {
        let console = self.console();
        console.echo("List of currently supported commands:");
        for (usage, description) in HELP {
            console.echo(&format!("{usage}: {description}"));
        }
    }

    async fn sha256(&self, input: &str) -> Result<(), CommandError> {
        self.console().echo(&format!("SHA-256 hash of {input}:"));
        let hash = self.session.api().sha256(input).await?;
        self.console().echo(&hash);
        Ok(())
    }

    async fn say(&self, message: &str) -> Result<(), CommandError> {
        let creds = self.session.require_login().await?;
        let reply = self.session.api().say(&creds, message).await?;
        if reply == "Ok" {
            Ok(())
        } else {
            Err(CommandError::NotSent(reply))
        }
    }

    /// Move to `destination` and update the chest state from the reply.
    pub async fn goto(&self, destination: LocationId) -> Result<(), CommandError> {
        let creds = self.session.require_login().await?;
        let resp = self.session.api().goto(&creds, &destination).await?;
        if !resp.succeeded {
            return Err(CommandError::MoveRejected {
                reason: resp.err.unwrap_or_else(|| "no reason given".to_string()),
            });
        }

        let change = self.arrive(resp).await;
        debug!(destination = %destination, ?change, "moved");
        Ok(())
    }

    async fn teleport(&self, destination: &str) -> Result<(), CommandError> {
        let creds = self.session.require_login().await?;
        let resp = self.session.api().teleport(&creds, destination).await?;
        if !resp.succeeded {
            return Err(CommandError::rejected(
                "Unable to move your character.",
                resp.err,
            ));
        }
        let change = self.arrive(resp).await;
        debug!(destination, ?change, "teleported");
        Ok(())
    }

    /// Show the arrival text and take over the chest the reply reports.
    async fn arrive(&self, resp: MoveResponse) -> ChestChange {
        let console = self.console();
        if let Some(info) = &resp.info {
            console.echo(info);
        }
        let change = self
            .session
            .chest()
            .lock()
            .await
            .apply_move(resp.active_treasure_chest);
        if change == ChestChange::Encountered {
            console.echo("You have encountered a treasure chest. Run `open-chest` to open it.");
        }
        change
    }

    async fn map(&self) -> Result<(), CommandError> {
        let creds = self.session.require_login().await?;
        let resp = self.session.api().map(&creds).await?;
        if !resp.succeeded {
            return Err(CommandError::rejected(
                "Unable to retrieve the requested data.",
                resp.err,
            ));
        }

        let console = self.console();
        console.echo("Locations adjacent to you (enter a number to travel there):");
        for (i, id) in resp.locations.iter().enumerate() {
            console.echo(&format!("[{}] {}", i + 1, id.to_label()));
        }
        self.session.remember_map(resp.locations).await;
        Ok(())
    }

    /// Selecting a listed map entry moves by its id directly.
    async fn travel_to_entry(&self, n: usize) -> Result<(), CommandError> {
        self.session.require_login().await?;
        let destination = self
            .session
            .map_entry(n)
            .await
            .ok_or(CommandError::NoMapEntry(n))?;
        self.goto(destination).await
    }

    async fn inventory(&self) -> Result<(), CommandError> {
        let creds = self.session.require_login().await?;
        let resp = self.session.api().inventory(&creds).await?;
        if !resp.succeeded {
            return Err(CommandError::rejected("Unable to get inventory.", resp.err));
        }

        let console = self.console();
        for item in &resp.inventory {
            console.echo(DIVIDER);
            console.echo(&format!("Item: {} (quantity {})", item.name, item.qty));
            match &item.rarity {
                Some(rarity) => console.echo(&format!("Rarity: {rarity}")),
                None => console.echo("Rarity: unknown"),
            }
            console.echo(&format!("Description: {}", item.description));
        }
        Ok(())
    }

    /// Stream liveness pings until the player presses Enter. Independent of
    /// the login state.
    async fn check_connection(&self) -> Result<(), CommandError> {
        let console = self.console().clone();
        console.echo("Checking connection to server.");

        let sink = console.clone();
        let liveness = Subscription::open(
            "liveness",
            self.session.api().check_connection(),
            move |payload: LivenessPayload| {
                if payload.alive {
                    sink.echo(&format!("Server is alive. Count: {}", payload.count));
                }
                future::ready(())
            },
        );

        let waited = console.read_line("press Enter to stop").await;
        liveness.close();
        waited?;
        Ok(())
    }
}

use std::io;

/// Transport-level failures talking to the game backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server is unavailable")]
    Unavailable,

    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Http(reqwest::Error),
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Http(err)
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(err)
    }
}

/// Why a single command did not complete. Every variant is terminal for that
/// command only; the REPL keeps running.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("You are not logged in.")]
    NotLoggedIn,

    #[error("You are already logged in.")]
    AlreadyLoggedIn,

    #[error("You must be logged in to log out.")]
    MustBeLoggedIn,

    #[error("You are not near a treasure chest.")]
    NoActiveChest,

    /// The server answered with a failure flag and an `err` string.
    #[error("{context}\nReason: {reason}")]
    Rejected { context: &'static str, reason: String },

    /// Movement failed; the hint covers the common case of an unquoted
    /// multi-word destination.
    #[error(
        "Unable to move your character.\nReason: {reason}\nPerhaps you forgot to put the destination in quotation marks?"
    )]
    MoveRejected { reason: String },

    #[error("Your message was not sent.\nError message: {0}")]
    NotSent(String),

    #[error("There is no map entry {0}. Run `map` to list the locations adjacent to you.")]
    NoMapEntry(usize),

    #[error("Wrong number of arguments. Command '{command}' expects {expected} got {got}!")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unterminated quote in command line.")]
    UnterminatedQuote,

    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),

    #[error("Request failed: {0}")]
    Transport(#[from] ClientError),
}

impl CommandError {
    pub(crate) fn rejected(context: &'static str, reason: Option<String>) -> Self {
        Self::Rejected {
            context,
            reason: reason.unwrap_or_else(|| "no reason given".to_string()),
        }
    }
}

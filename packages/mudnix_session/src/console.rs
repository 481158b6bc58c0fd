use std::io;

use async_trait::async_trait;

/// Prompt shown while nobody is logged in.
pub const ANONYMOUS_PROMPT: &str = "mudnix> ";

/// The line editor the player types into and reads output from.
///
/// Output methods are synchronous and may be called from push-channel tasks
/// while a read is pending.
#[async_trait]
pub trait Console: Send + Sync {
    fn echo(&self, line: &str);

    fn error(&self, line: &str);

    fn set_prompt(&self, prompt: &str);

    fn prompt(&self) -> String;

    /// Read one line with `prompt` shown, without the trailing newline.
    async fn read_line(&self, prompt: &str) -> io::Result<String>;

    /// Like [`read_line`](Self::read_line) with input echo suppressed.
    async fn read_secret(&self, prompt: &str) -> io::Result<String>;
}

/// Prompt shown while `username` is logged in.
pub fn user_prompt(username: &str) -> String {
    format!("{username}> ")
}

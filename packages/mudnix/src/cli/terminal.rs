use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use colored::Colorize;

use mudnix_session::Console;
use mudnix_session::console::ANONYMOUS_PROMPT;

/// Line-oriented console on stdin/stdout. Errors go to stderr in red.
///
/// Reads run on the blocking pool so push-channel output keeps flowing
/// while a prompt is waiting.
pub struct TerminalConsole {
    prompt: Mutex<String>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            prompt: Mutex::new(ANONYMOUS_PROMPT.to_string()),
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

fn read_stdin_line(prompt: &str) -> io::Result<String> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write!(out, "{prompt}")?;
    out.flush()?;
    drop(out);

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(strip_newline(line))
}

fn strip_newline(mut line: String) -> String {
    while line.ends_with(['\n', '\r']) {
        line.pop();
    }
    line
}

#[async_trait]
impl Console for TerminalConsole {
    fn echo(&self, line: &str) {
        println!("{line}");
    }

    fn error(&self, line: &str) {
        eprintln!("{}", line.red());
    }

    fn set_prompt(&self, prompt: &str) {
        if let Ok(mut current) = self.prompt.lock() {
            *current = prompt.to_string();
        }
    }

    fn prompt(&self) -> String {
        self.prompt
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|_| ANONYMOUS_PROMPT.to_string())
    }

    async fn read_line(&self, prompt: &str) -> io::Result<String> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || read_stdin_line(&prompt))
            .await
            .map_err(io::Error::other)?
    }

    async fn read_secret(&self, prompt: &str) -> io::Result<String> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
            .await
            .map_err(io::Error::other)?
    }
}

pub mod terminal;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use mudnix_session::session::DIVIDER;
use mudnix_session::{CommandDispatcher, Console, Dispatch, GameApi, SessionManager};

/// Backend version for the greeting. Unreachable servers show as "unknown".
pub async fn backend_version(api: &GameApi) -> String {
    match api.version().await {
        Ok(version) => version.trim().to_string(),
        Err(e) => {
            warn!(error = %e, base_url = api.base_url(), "failed to fetch backend version");
            "unknown".to_string()
        }
    }
}

pub fn greeting(backend_version: &str) -> Vec<String> {
    vec![
        "Welcome to Mudnix".to_string(),
        format!(
            "Client v{} backend v{} (pre-alpha)",
            env!("CARGO_PKG_VERSION"),
            backend_version
        ),
        DIVIDER.to_string(),
        "Type \"new-user\" to create a new account.".to_string(),
        "Type \"login\" if you already have an account.".to_string(),
        "Type \"help\" for a list of commands.".to_string(),
    ]
}

/// Run the interactive client until EOF, `exit` or Ctrl-C, then log out.
pub async fn run(api: GameApi, console: Arc<dyn Console>, teardown_grace: Duration) -> Result<()> {
    let version = backend_version(&api).await;
    info!(backend_version = %version, base_url = api.base_url(), "client started");
    for line in greeting(&version) {
        console.echo(&line);
    }

    let session = SessionManager::new(api, console.clone());
    let mut commands = CommandDispatcher::new(session.clone());
    let outcome = repl(console.as_ref(), &mut commands, interrupted()).await;

    session.teardown(teardown_grace).await;
    info!("client stopped");
    outcome
}

/// Resolves on the first Ctrl-C. Never resolves if the handler cannot be
/// installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Read and dispatch lines until EOF, `exit` or `interrupt` resolves. The
/// interrupt also cuts short a command that is still running.
async fn repl(
    console: &dyn Console,
    commands: &mut CommandDispatcher,
    interrupt: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(interrupt);
    loop {
        let prompt = console.prompt();
        let line = tokio::select! {
            line = console.read_line(&prompt) => line,
            () = &mut interrupt => break,
        };

        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("input closed");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to read from the terminal"),
        };

        let outcome = tokio::select! {
            outcome = commands.dispatch(&line) => outcome,
            () = &mut interrupt => break,
        };
        match outcome {
            Dispatch::Handled => {}
            Dispatch::Unknown(name) => console.error(&format!("Command '{name}' Not Found!")),
            Dispatch::Exit => return Ok(()),
        }
    }

    info!("interrupted");
    console.echo("");
    Ok(())
}

//! Mudnix session layer - login state, push channels and the command table
//!
//! This crate holds everything the Mudnix terminal client does between the
//! line editor and the game backend. It knows nothing about how lines are
//! read or printed; that is the job of a [`Console`] implementation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mudnix_session::{CommandDispatcher, Console, Dispatch, GameApi, SessionManager};
//!
//! async fn run(console: Arc<dyn Console>) {
//!     let api = GameApi::new("http://127.0.0.1:8080", Duration::from_secs(10));
//!     let session = SessionManager::new(api, console.clone());
//!     let mut dispatcher = CommandDispatcher::new(session.clone());
//!
//!     while let Ok(line) = console.read_line(&console.prompt()).await {
//!         match dispatcher.dispatch(&line).await {
//!             Dispatch::Exit => break,
//!             Dispatch::Unknown(name) => console.error(&format!("Command '{name}' Not Found!")),
//!             Dispatch::Handled => {}
//!         }
//!     }
//!
//!     session.teardown(Duration::from_millis(1500)).await;
//! }
//! ```

pub mod api;
pub mod chest;
pub mod commands;
pub mod console;
pub mod dedup;
mod error;
pub mod location;
pub mod session;
pub mod stream;

pub use api::{Credentials, GameApi};
pub use commands::{CommandDispatcher, Dispatch};
pub use console::Console;
pub use dedup::{Message, MessageDeduplicator};
pub use error::{ClientError, CommandError};
pub use location::{LocationId, LocationLabel};
pub use session::{AuthState, SessionManager};
pub use stream::Subscription;

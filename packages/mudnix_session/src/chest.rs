//! The treasure chest the player is currently standing next to, if any.

use tracing::{debug, warn};

use crate::api::TreasureChest;
use crate::error::CommandError;
use crate::session::SessionManager;

#[derive(Debug, Default)]
pub struct ChestState {
    active: Option<TreasureChest>,
}

/// What a successful move did to the chest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChestChange {
    Encountered,
    Cleared,
    Unchanged,
}

impl ChestState {
    pub fn active(&self) -> Option<&TreasureChest> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Apply the chest reported by a successful move. Moving somewhere
    /// without a chest drops a stale one.
    pub fn apply_move(&mut self, reported: Option<TreasureChest>) -> ChestChange {
        match reported {
            Some(chest) => {
                self.active = Some(chest);
                ChestChange::Encountered
            }
            None if self.active.is_some() => {
                self.active = None;
                ChestChange::Cleared
            }
            None => ChestChange::Unchanged,
        }
    }

    pub fn take(&mut self) -> Option<TreasureChest> {
        self.active.take()
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Open the active chest: list its items, then tell the server it was
/// closed. The chest is gone client-side whatever the server answers.
pub async fn open(session: &SessionManager) -> Result<(), CommandError> {
    let creds = session.require_login().await?;
    let chest = session
        .chest()
        .lock()
        .await
        .take()
        .ok_or(CommandError::NoActiveChest)?;

    let console = session.console();
    console.echo("You open the treasure chest.");
    if chest.contents.is_empty() {
        console.echo("The chest is empty.");
    } else {
        console.echo("The chest contains the following items:");
        for item in &chest.contents {
            console.echo(&item.name);
        }
        console.echo("You take the items from the chest and add them to your inventory.");
    }
    debug!(items = chest.contents.len(), "chest opened");

    match session.api().close_chest(&creds).await {
        Ok(resp) => {
            if let Some(info) = resp.info {
                console.echo(&info);
            }
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "close-chest request failed");
            Err(e.into())
        }
    }
}

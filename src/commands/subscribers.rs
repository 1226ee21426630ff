//! Subscriber management command

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use forex_signals::store::{SignalStore, SqliteStore};

#[derive(Debug, Clone, Copy)]
pub enum Action {
    List,
    Add(i64),
    Remove(i64),
}

pub fn run(state_db: PathBuf, action: Action) -> Result<()> {
    let store = SqliteStore::open(&state_db)
        .with_context(|| format!("Failed to open state database {}", state_db.display()))?;

    match action {
        Action::List => {
            let ids = store.subscribers()?;
            if ids.is_empty() {
                println!("No subscribers");
            }
            for id in ids {
                println!("{}", id);
            }
        }
        Action::Add(chat_id) => {
            if store.add_subscriber(chat_id)? {
                info!("Subscribed chat {}", chat_id);
                println!("Subscribed {}", chat_id);
            } else {
                println!("{} is already subscribed", chat_id);
            }
        }
        Action::Remove(chat_id) => {
            if store.remove_subscriber(chat_id)? {
                info!("Unsubscribed chat {}", chat_id);
                println!("Unsubscribed {}", chat_id);
            } else {
                println!("{} was not subscribed", chat_id);
            }
        }
    }

    Ok(())
}

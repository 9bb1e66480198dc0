use anyhow::Context;
use chrono::Utc;
use tracing::info;

use parley_client::config::ClientConfig;
use parley_client::{init_tracing, ChatApp};
use parley_shared::constants::APP_NAME;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    info!(store = ?config.store, session = %config.session_path.display(), "Loaded {APP_NAME} configuration");

    let app = ChatApp::start(config)
        .await
        .context("failed to start the Parley client")?;

    match app.identity.current_user() {
        Some(user) => {
            let now = Utc::now();
            let active_stories = app.stories.stories_at(now).len();
            let unread: u32 = app
                .conversations
                .conversations()
                .iter()
                .map(|c| c.unread_count)
                .sum();
            info!(
                username = %user.username,
                conversations = app.conversations.conversations().len(),
                unread,
                active_stories,
                custom_emojis = app.emojis.emojis().len(),
                "Session restored"
            );
        }
        None => info!(
            users = app.identity.users().len(),
            backend = app.store().backend(),
            "No saved session; sign in to continue"
        ),
    }

    Ok(())
}

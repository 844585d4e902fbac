// ABOUTME: Slack pumper relaying one channel through Socket Mode and the Web API
// ABOUTME: Reads message events into the inbox and posts outbox updates as mrkdwn text

pub mod events;

pub use events::SlackEvent;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cable_core::config::SlackConfig;
use cable_core::{
    ConversionError, HasPump, Identity, IdentityCache, IdentityMap, IdentitySource, Pump,
    ReadPumper, Update, WritePumper, DEFAULT_BUFFER_SIZE,
};
use slack_morphism::prelude::*;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

const PLATFORM_ID: &str = "slack";

/// Page size for users.list
const USERS_PAGE_LIMIT: u16 = 200;

// =============================================================================
// Socket Mode callbacks
// =============================================================================

/// State shared with Socket Mode callbacks via user state storage.
/// Callbacks are fn pointers (not closures), so they cannot capture variables.
#[derive(Clone)]
struct SlackBridgeState {
    tx: mpsc::Sender<SlackEvent>,
}

async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bridge = {
        let guard = states.read().await;
        guard
            .get_user_state::<SlackBridgeState>()
            .cloned()
            .ok_or("SlackBridgeState not found in user state")?
    };

    if let SlackEventCallbackBody::Message(msg_event) = event.event {
        if bridge.tx.send(decode_message_event(&msg_event)).await.is_err() {
            tracing::warn!(platform = PLATFORM_ID, "Event receiver dropped");
        }
    }
    Ok(())
}

fn socket_mode_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::error!(platform = PLATFORM_ID, error = %err, "Socket Mode error");
    HttpStatusCode::OK
}

fn decode_message_event(msg_event: &SlackMessageEvent) -> SlackEvent {
    SlackEvent {
        channel: msg_event.origin.channel.as_ref().map(|c| c.to_string()),
        user: msg_event.sender.user.as_ref().map(|u| u.to_string()),
        bot_id: msg_event.sender.bot_id.as_ref().map(|b| b.to_string()),
        text: msg_event.content.as_ref().and_then(|c| c.text.clone()),
    }
}

/// Run the Socket Mode listener until the process exits.
///
/// The app token must already be verified with apps.connections.open; the
/// listener itself only reports a bad token in its error handler.
fn spawn_listener(
    client: Arc<SlackHyperClient>,
    app_token: SlackApiToken,
    tx: mpsc::Sender<SlackEvent>,
) {
    tokio::spawn(async move {
        let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

        let environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(client)
                .with_error_handler(socket_mode_error_handler)
                .with_user_state(SlackBridgeState { tx }),
        );

        let listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            environment,
            callbacks,
        );

        if let Err(e) = listener.listen_for(&app_token).await {
            tracing::error!(
                platform = PLATFORM_ID,
                error = %e,
                "Failed to start Socket Mode listener"
            );
            return;
        }
        tracing::info!(platform = PLATFORM_ID, "Socket Mode listener started");
        listener.serve().await;
    });
}

// =============================================================================
// Identities
// =============================================================================

/// Workspace user directory backed by users.list
pub struct SlackDirectory {
    client: Arc<SlackHyperClient>,
    bot_token: SlackApiToken,
}

#[async_trait]
impl IdentitySource for SlackDirectory {
    async fn fetch_identities(&self) -> Result<IdentityMap> {
        let session = self.client.open_session(&self.bot_token);
        let mut identities = IdentityMap::new();
        let mut cursor: Option<SlackCursorId> = None;

        loop {
            let mut req = SlackApiUsersListRequest::new().with_limit(USERS_PAGE_LIMIT);
            if let Some(c) = cursor.take() {
                req = req.with_cursor(c);
            }
            let resp = session
                .users_list(&req)
                .await
                .context("Failed to call Slack users.list")?;

            for user in &resp.members {
                identities.insert(user.id.to_string(), identity_of(user));
            }

            cursor = resp
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.0.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(platform = PLATFORM_ID, users = identities.len(), "Fetched workspace users");
        Ok(identities)
    }
}

fn identity_of(user: &SlackUser) -> Identity {
    let real_name = user
        .profile
        .as_ref()
        .and_then(|p| p.real_name.clone())
        .unwrap_or_default();
    Identity::new(real_name, user.name.clone().unwrap_or_default())
}

// =============================================================================
// SlackPumper
// =============================================================================

/// Relays one Slack channel
pub struct SlackPumper {
    pump: Pump,
    client: Arc<SlackHyperClient>,
    bot_token: SlackApiToken,
    relayed_channel: String,
    /// Messages posted under this id are never relayed back
    bot_user_id: String,
    events: Mutex<mpsc::Receiver<SlackEvent>>,
    identities: IdentityCache<SlackDirectory>,
}

impl SlackPumper {
    /// Authenticate with auth.test, check the app token with
    /// apps.connections.open and start listening on Socket Mode.
    ///
    /// The configured bot user id wins over the one auth.test reports.
    pub async fn connect(config: &SlackConfig) -> Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("Failed to create Slack HTTP connector")?,
        ));

        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.bot_token.clone()));
        let app_token = SlackApiToken::new(SlackApiTokenValue(config.app_token.clone()));

        let auth = client
            .open_session(&bot_token)
            .auth_test()
            .await
            .context("Failed to call Slack auth.test, check the bot token")?;

        let bot_user_id = if config.bot_user_id.trim().is_empty() {
            auth.user_id.to_string()
        } else {
            config.bot_user_id.clone()
        };

        tracing::info!(
            platform = PLATFORM_ID,
            bot_user = %bot_user_id,
            team = %auth.team,
            channel = %config.relayed_channel,
            "Slack bot authenticated"
        );

        client
            .open_session(&app_token)
            .apps_connections_open(&SlackApiAppsConnectionOpenRequest::new())
            .await
            .context("Failed to open a Socket Mode connection, check the app token")?;

        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER_SIZE);
        spawn_listener(Arc::clone(&client), app_token, tx);

        let directory = SlackDirectory {
            client: Arc::clone(&client),
            bot_token: bot_token.clone(),
        };

        Ok(Self {
            pump: Pump::new(),
            client,
            bot_token,
            relayed_channel: config.relayed_channel.clone(),
            bot_user_id,
            events: Mutex::new(rx),
            identities: IdentityCache::new(directory),
        })
    }
}

impl HasPump for SlackPumper {
    fn platform_id(&self) -> &'static str {
        PLATFORM_ID
    }

    fn pump(&self) -> &Pump {
        &self.pump
    }
}

#[async_trait]
impl ReadPumper for SlackPumper {
    type Event = SlackEvent;

    async fn next_event(&self) -> Option<SlackEvent> {
        self.events.lock().await.recv().await
    }

    async fn to_inbox_update(&self, event: SlackEvent) -> Result<Update, ConversionError> {
        events::screen_event(&event, &self.relayed_channel, &self.bot_user_id)?;
        let identities = self.identities.get_identities().await;
        Ok(events::event_to_update(event, &identities))
    }
}

#[async_trait]
impl WritePumper for SlackPumper {
    type Outgoing = String;

    async fn from_outbox_update(&self, update: Update) -> Result<String, ConversionError> {
        events::render_update(&update)
    }

    async fn send(&self, text: String) -> Result<()> {
        let req = SlackApiChatPostMessageRequest::new(
            self.relayed_channel.clone().into(),
            SlackMessageContent::new().with_text(text),
        );
        self.client
            .open_session(&self.bot_token)
            .chat_post_message(&req)
            .await
            .context("Failed to post Slack message")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slack_pumper_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SlackPumper>();
    }

    #[test]
    fn test_bridge_state_clone_shares_sender() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = SlackBridgeState { tx };
        let cloned = state.clone();
        cloned.tx.try_send(SlackEvent::default()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SlackEvent::default());
    }
}

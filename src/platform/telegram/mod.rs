// ABOUTME: Telegram pumper relaying one group chat through long polling
// ABOUTME: Decodes getUpdates batches into events and sends outbox updates as HTML

pub mod events;

pub use events::{OutgoingMessage, TelegramEvent};

use anyhow::{Context, Result};
use async_trait::async_trait;
use cable_core::config::TelegramConfig;
use cable_core::{ConversionError, HasPump, Pump, ReadPumper, Update, WritePumper};
use std::collections::VecDeque;
use std::time::Duration;
use teloxide::prelude::*;
use std::sync::{Mutex, MutexGuard};
use teloxide::types::{MediaKind, MessageKind, ParseMode, UpdateKind};

const PLATFORM_ID: &str = "telegram";

/// Long polling timeout for getUpdates, in seconds
const POLL_TIMEOUT_SECS: u32 = 60;

/// Pause before polling again after a failed getUpdates
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// HTTP timeout for the bot client. It has to outlast the long poll or every
/// quiet getUpdates call ends in a client-side timeout.
fn poll_client_timeout() -> Duration {
    Duration::from_secs(u64::from(POLL_TIMEOUT_SECS) + 10)
}

/// Offset of the next getUpdates call plus events decoded but not yet served
#[derive(Default)]
struct PollState {
    offset: i32,
    pending: VecDeque<TelegramEvent>,
}

impl PollState {
    fn next_pending(&mut self) -> Option<TelegramEvent> {
        self.pending.pop_front()
    }

    /// Queue an event and move the offset past the update it came from
    fn record(&mut self, offset: i32, event: TelegramEvent) {
        self.offset = offset;
        self.pending.push_back(event);
    }
}

/// Relays one Telegram chat
pub struct TelegramPumper {
    pump: Pump,
    bot: Bot,
    relayed_chat: i64,
    /// Messages sent by this user are never relayed back
    bot_user_id: u64,
    poll: Mutex<PollState>,
}

impl TelegramPumper {
    /// Create the bot and verify the token with getMe.
    ///
    /// The configured bot user id wins over the one getMe reports.
    pub async fn connect(config: &TelegramConfig) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(poll_client_timeout())
            .build()
            .context("Failed to build Telegram HTTP client")?;
        let bot = Bot::with_client(&config.bot_token, client);

        let me = bot.get_me().await.context("Failed to call Telegram getMe")?;
        let bot_user_id = if config.bot_user_id == 0 {
            me.id.0
        } else {
            config.bot_user_id
        };

        tracing::info!(
            platform = PLATFORM_ID,
            bot_username = %me.username(),
            bot_id = bot_user_id,
            chat = config.relayed_chat,
            "Telegram bot authenticated"
        );

        Ok(Self {
            pump: Pump::new(),
            bot,
            relayed_chat: config.relayed_chat,
            bot_user_id,
            poll: Mutex::new(PollState::default()),
        })
    }

    fn poll_state(&self) -> MutexGuard<'_, PollState> {
        self.poll.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Reduce a teloxide update to the relay's event shape
fn decode_update(update: &teloxide::types::Update) -> TelegramEvent {
    let message = match &update.kind {
        UpdateKind::Message(msg) => msg,
        UpdateKind::EditedMessage(_) => return TelegramEvent::Other { kind: "edited message" },
        _ => return TelegramEvent::Other { kind: "non-message update" },
    };

    let text = match &message.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(text) => text.text.clone(),
            _ => return TelegramEvent::Other { kind: "non-text message" },
        },
        _ => return TelegramEvent::Other { kind: "service message" },
    };

    let Some(from) = message.from.as_ref() else {
        return TelegramEvent::Other { kind: "message without sender" };
    };

    TelegramEvent::Text {
        chat_id: message.chat.id.0,
        sender_id: from.id.0,
        first_name: from.first_name.clone(),
        last_name: from.last_name.clone(),
        username: from.username.clone(),
        text,
    }
}

impl HasPump for TelegramPumper {
    fn platform_id(&self) -> &'static str {
        PLATFORM_ID
    }

    fn pump(&self) -> &Pump {
        &self.pump
    }
}

#[async_trait]
impl ReadPumper for TelegramPumper {
    type Event = TelegramEvent;

    /// Serve the buffered batch, long polling for a new one when it runs dry.
    /// Polling errors are retried, so this only returns events.
    ///
    /// The poll state is only locked between requests, never across one.
    async fn next_event(&self) -> Option<TelegramEvent> {
        loop {
            let offset = {
                let mut poll = self.poll_state();
                if let Some(event) = poll.next_pending() {
                    return Some(event);
                }
                poll.offset
            };

            match self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .await
            {
                Ok(updates) => {
                    let mut poll = self.poll_state();
                    for update in &updates {
                        poll.record(update.id.as_offset(), decode_update(update));
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        platform = PLATFORM_ID,
                        error = %e,
                        "Long polling error, retrying in 5s"
                    );
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn to_inbox_update(&self, event: TelegramEvent) -> Result<Update, ConversionError> {
        events::event_to_update(event, self.relayed_chat, self.bot_user_id)
    }
}

#[async_trait]
impl WritePumper for TelegramPumper {
    type Outgoing = OutgoingMessage;

    async fn from_outbox_update(&self, update: Update) -> Result<OutgoingMessage, ConversionError> {
        events::render_update(&update, self.relayed_chat)
    }

    async fn send(&self, outgoing: OutgoingMessage) -> Result<()> {
        self.bot
            .send_message(ChatId(outgoing.chat_id), outgoing.html)
            .parse_mode(ParseMode::Html)
            .await
            .context("Failed to send Telegram message")?;
        Ok(())
    }
}

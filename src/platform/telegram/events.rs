// ABOUTME: Translation between Telegram updates and canonical relay updates
// ABOUTME: Filters foreign chats and the bot's own messages, renders outbound HTML

use crate::platform::emoji::expand_shortcodes;
use cable_core::{Author, Contents, ConversionError, Message, Update};

/// A Telegram update reduced to what the relay needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramEvent {
    /// Plain text message in some chat
    Text {
        chat_id: i64,
        sender_id: u64,
        first_name: String,
        last_name: Option<String>,
        username: Option<String>,
        text: String,
    },
    /// Anything else: edits, stickers, joins, callback queries...
    Other { kind: &'static str },
}

/// Message ready for sendMessage with HTML parse mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub html: String,
}

/// Convert an event from the relayed chat into a canonical update.
///
/// A `bot_user_id` of zero disables the own-message check.
pub fn event_to_update(
    event: TelegramEvent,
    relayed_chat: i64,
    bot_user_id: u64,
) -> Result<Update, ConversionError> {
    let (chat_id, sender_id, first_name, last_name, username, text) = match event {
        TelegramEvent::Text {
            chat_id,
            sender_id,
            first_name,
            last_name,
            username,
            text,
        } => (chat_id, sender_id, first_name, last_name, username, text),
        TelegramEvent::Other { kind } => return Err(ConversionError::ignored(kind)),
    };

    if chat_id != relayed_chat {
        return Err(ConversionError::ignored(format!(
            "message in chat {} is not relayed",
            chat_id
        )));
    }
    if bot_user_id != 0 && sender_id == bot_user_id {
        return Err(ConversionError::ignored("message sent by the relay bot"));
    }

    let name = match last_name.filter(|l| !l.is_empty()) {
        Some(last) if !first_name.is_empty() => format!("{} {}", first_name, last),
        Some(last) => last,
        None => first_name,
    };
    let author = Author::new(name, username.unwrap_or_default());
    Ok(Message::new(author, Contents::new(text)).into())
}

/// Render an update as `<b>Name (alias):</b> text` addressed to `chat_id`.
/// Emoji shortcodes in the text are expanded.
pub fn render_update(update: &Update, chat_id: i64) -> Result<OutgoingMessage, ConversionError> {
    let message = update.as_message().ok_or_else(|| {
        ConversionError::unsupported(format!("{} cannot be sent to Telegram", update))
    })?;

    let text = escape_html(&expand_shortcodes(message.contents().raw()));
    let label = message.author().label();
    let html = if label.is_empty() {
        text
    } else {
        format!("<b>{}:</b> {}", escape_html(&label), text)
    };
    Ok(OutgoingMessage { chat_id, html })
}

/// Escape the characters Telegram's HTML parse mode treats as markup
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

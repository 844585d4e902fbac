// ABOUTME: Translation between Slack message events and canonical relay updates
// ABOUTME: Pure functions so filtering and rendering rules can be tested without a workspace

use crate::platform::emoji::expand_shortcodes;
use cable_core::{Author, Contents, ConversionError, IdentityMap, Message, Update};

/// A Slack message event reduced to the fields the relay looks at.
///
/// Decoded once from the Socket Mode push event; everything downstream works
/// on this shape instead of the slack-morphism types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackEvent {
    pub channel: Option<String>,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub text: Option<String>,
}

/// Decide whether an event should be relayed at all.
///
/// Events outside the relayed channel, events posted by the relay bot and
/// events without text are ignored.
pub fn screen_event(
    event: &SlackEvent,
    relayed_channel: &str,
    bot_user_id: &str,
) -> Result<(), ConversionError> {
    match event.channel.as_deref() {
        Some(channel) if channel == relayed_channel => {}
        Some(channel) => {
            return Err(ConversionError::ignored(format!(
                "message in channel {} is not relayed",
                channel
            )))
        }
        None => return Err(ConversionError::ignored("message without a channel")),
    }

    if !bot_user_id.is_empty() {
        let from_bot = event.bot_id.as_deref() == Some(bot_user_id)
            || event.user.as_deref() == Some(bot_user_id);
        if from_bot {
            return Err(ConversionError::ignored("message posted by the relay bot"));
        }
    }

    if event.user.is_none() {
        return Err(ConversionError::ignored("message without a user"));
    }

    match event.text.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(()),
        _ => Err(ConversionError::ignored("message without text")),
    }
}

/// Build the canonical update for a screened event.
///
/// Users missing from `identities` become strangers aliased by their id.
/// Slack sends `&`, `<` and `>` entity-encoded; the contents hold them decoded.
pub fn event_to_update(event: SlackEvent, identities: &IdentityMap) -> Update {
    let user = event.user.unwrap_or_default();
    let author = match identities.get(&user) {
        Some(identity) => Author::new(identity.name.clone(), identity.handle.clone()),
        None => Author::stranger(user),
    };
    let text = unescape_mrkdwn(&event.text.unwrap_or_default());
    Message::new(author, Contents::new(text)).into()
}

/// Render an outbound update as mrkdwn text: `*Name (alias):* text`
pub fn render_update(update: &Update) -> Result<String, ConversionError> {
    let message = update
        .as_message()
        .ok_or_else(|| ConversionError::unsupported(format!("{} cannot be posted to Slack", update)))?;

    let text = escape_mrkdwn(&expand_shortcodes(message.contents().raw()));
    let label = message.author().label();
    if label.is_empty() {
        return Ok(text);
    }
    Ok(format!("*{}:* {}", escape_mrkdwn(&label), text))
}

/// Escape the three characters Slack reserves for links and mentions
fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Inverse of [`escape_mrkdwn`]. `&amp;` goes last so `&amp;lt;` stays `&lt;`.
fn unescape_mrkdwn(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

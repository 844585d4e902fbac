// ABOUTME: Canonical, platform-independent updates exchanged between pumps
// ABOUTME: Defines Update (sum type), Message, Author, and Contents value objects

use std::fmt;

/// Name given to authors whose identity could not be resolved on the origin platform
pub const STRANGER_NAME: &str = "Stranger";

/// A value interchanged by pumps. Adapters decode their wire events into an
/// `Update` once, at the boundary, and render it back on the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// A chat message written by someone on one of the relayed platforms
    Message(Message),
}

impl Update {
    /// Returns the message carried by this update, if it is one
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Update::Message(message) => Some(message),
        }
    }
}

impl From<Message> for Update {
    fn from(message: Message) -> Self {
        Update::Message(message)
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Message(message) => message.fmt(f),
        }
    }
}

/// Some contents sent by an author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    author: Author,
    contents: Contents,
}

impl Message {
    pub fn new(author: Author, contents: Contents) -> Self {
        Self { author, contents }
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn contents(&self) -> &Contents {
        &self.contents
    }
}

/// Renders as `<alias>: <raw>`
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.author, self.contents)
    }
}

/// Platform independent author of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Author {
    name: String,
    alias: String,
}

impl Author {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// Placeholder for an author the origin platform could not resolve.
    /// The alias keeps the raw platform identifier.
    pub fn stranger(alias: impl Into<String>) -> Self {
        Self::new(STRANGER_NAME, alias)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn is_stranger(&self) -> bool {
        self.name == STRANGER_NAME
    }

    /// Human label combining name and alias: `Name (alias)`, `Name`, `alias`
    /// or an empty string when both are empty.
    pub fn label(&self) -> String {
        match (self.name.is_empty(), self.alias.is_empty()) {
            (false, false) => format!("{} ({})", self.name, self.alias),
            (false, true) => self.name.clone(),
            (true, false) => self.alias.clone(),
            (true, true) => String::new(),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)
    }
}

/// Platform independent contents of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Contents {
    raw: String,
}

impl Contents {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_display_uses_alias_and_raw() {
        let msg = Message::new(
            Author::new("Will Smith", "freshprince"),
            Contents::new("Hello from Bel-Air"),
        );
        assert_eq!(msg.to_string(), "freshprince: Hello from Bel-Air");
    }

    #[test]
    fn test_update_display_delegates_to_message() {
        let update = Update::from(Message::new(
            Author::new("", "left-side"),
            Contents::new("Fed into left"),
        ));
        assert_eq!(update.to_string(), "left-side: Fed into left");
    }

    #[test]
    fn test_stranger_author() {
        let author = Author::stranger("U999");
        assert!(author.is_stranger());
        assert_eq!(author.name(), "Stranger");
        assert_eq!(author.alias(), "U999");
        assert!(!Author::new("Ann", "ann").is_stranger());
    }

    #[test]
    fn test_author_label_variants() {
        assert_eq!(Author::new("Will Smith", "freshprince").label(), "Will Smith (freshprince)");
        assert_eq!(Author::new("Will Smith", "").label(), "Will Smith");
        assert_eq!(Author::new("", "freshprince").label(), "freshprince");
        assert_eq!(Author::new("", "").label(), "");
    }

    #[test]
    fn test_as_message() {
        let update = Update::Message(Message::new(Author::new("a", "b"), Contents::new("c")));
        assert_eq!(update.as_message().map(|m| m.contents().raw()), Some("c"));
    }
}

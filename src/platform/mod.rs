// ABOUTME: Backend adapters implementing the pumper contract
// ABOUTME: Each platform sits behind its own cargo feature

pub mod emoji;
#[cfg(feature = "slack")]
pub mod slack;
#[cfg(feature = "telegram")]
pub mod telegram;

#[cfg(feature = "slack")]
pub use slack::SlackPumper;
#[cfg(feature = "telegram")]
pub use telegram::TelegramPumper;

// ABOUTME: Root library module for the Slack/Telegram relay
// ABOUTME: Exposes the platform adapters, the health server and logging setup

pub mod health;
pub mod logging;
pub mod platform;

// Re-export the platform-agnostic core
pub use cable_core::config;
pub use cable_core::connection;
pub use cable_core::traits;
pub use cable_core::update;

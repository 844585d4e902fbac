// ABOUTME: Platform-agnostic core of the chat relay
// ABOUTME: Canonical updates, pumps, the pumper contract, and bidirectional connections

pub mod config;
pub mod connection;
pub mod error;
pub mod identity;
pub mod pump;
pub mod traits;
pub mod update;

pub use connection::{BidirectionalPumpConnection, ConnectionState};
pub use error::ConversionError;
pub use identity::{Identity, IdentityCache, IdentityMap, IdentitySource};
pub use pump::{Pump, Queue, StopSignal, DEFAULT_BUFFER_SIZE};
pub use traits::{HasPump, Pumper, ReadPumper, WritePumper};
pub use update::{Author, Contents, Message, Update};

//! Bridge between a chat group and a game server.
//!
//! ## Module Structure
//!
//! - `ports`: Host adapter traits (`ChatPlatform`, `GameServer`)
//! - `transform`: Segment-to-text rule table
//! - `formatter`: Template rendering for relayed messages
//! - `gate`: Command prefix and allow-list checks
//! - `orchestrator`: Main bridge orchestrator (`Bridge` struct)

pub mod formatter;
pub mod gate;
pub mod orchestrator;
pub mod ports;
pub mod transform;

#[cfg(test)]
mod fakes;

pub use orchestrator::Bridge;

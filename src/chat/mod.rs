//! OneBot v11 chat platform adapter.

pub mod client;
pub mod events;

pub use client::{OneBotClient, OneBotConnection};
